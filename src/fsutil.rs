//! Filesystem helpers for staging trees.
//!
//! BusyBox's install tree is mostly applet symlinks pointing at
//! `bin/busybox`. A naive copy would materialize every symlink into a full
//! copy of the binary, so [`copy_tree`] recreates symlinks as symlinks.

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;
use walkdir::WalkDir;

/// Recursively copy `src` into `dst`, preserving symlinks.
///
/// Existing files in `dst` are overwritten; existing directories are
/// merged, so re-running a copy into a previously staged tree works.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("Path outside copy root: {}", entry.path().display()))?;
        if rel.as_os_str().is_empty() {
            continue;
        }

        let out = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&out)
                .with_context(|| format!("Failed to create {}", out.display()))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &out)?;
        } else {
            copy_file(entry.path(), &out)?;
        }
    }
    Ok(())
}

fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    // fs::copy would write through a stale symlink at dst; clear it first.
    if fs::symlink_metadata(dst).is_ok() {
        fs::remove_file(dst).with_context(|| format!("Failed to remove {}", dst.display()))?;
    }
    // fs::copy carries permission bits, so executables stay executable.
    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} -> {}", src.display(), dst.display()))?;
    Ok(())
}

fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    if fs::symlink_metadata(dst).is_ok() {
        fs::remove_file(dst).with_context(|| format!("Failed to remove {}", dst.display()))?;
    }
    let target =
        fs::read_link(src).with_context(|| format!("Failed to read link {}", src.display()))?;
    symlink(&target, dst).with_context(|| {
        format!(
            "Failed to create symlink {} -> {}",
            dst.display(),
            target.display()
        )
    })?;
    Ok(())
}

/// Count the files, directories, and symlinks under `path`, for staging
/// summaries. The root itself is not counted.
pub fn count_items(path: &Path) -> Result<(usize, usize, usize)> {
    let (mut files, mut dirs, mut symlinks) = (0, 0, 0);
    for entry in WalkDir::new(path).min_depth(1) {
        let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            symlinks += 1;
        } else if file_type.is_dir() {
            dirs += 1;
        } else {
            files += 1;
        }
    }
    Ok((files, dirs, symlinks))
}

/// Total size in bytes of the regular files under `path`. Symlinks are
/// skipped, not followed.
pub fn dir_size(path: &Path) -> Result<u64> {
    let mut size = 0;
    for entry in WalkDir::new(path) {
        let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
        if entry.file_type().is_file() {
            size += entry.metadata()?.len();
        }
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fixture_tree(root: &Path) {
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::write(root.join("bin/busybox"), "binary").unwrap();
        symlink("busybox", root.join("bin/sh")).unwrap();
        fs::create_dir_all(root.join("usr/bin")).unwrap();
        fs::write(root.join("usr/bin/env"), "env").unwrap();
    }

    #[test]
    fn test_copy_tree_preserves_symlinks() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fixture_tree(&src);

        copy_tree(&src, &dst).unwrap();

        assert!(dst.join("bin/busybox").is_file());
        assert!(dst.join("usr/bin/env").is_file());
        let link = dst.join("bin/sh");
        assert!(link.is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), Path::new("busybox"));
    }

    #[test]
    fn test_copy_tree_into_existing_tree() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fixture_tree(&src);

        copy_tree(&src, &dst).unwrap();
        // Second copy must overwrite files and re-create links, not fail.
        copy_tree(&src, &dst).unwrap();

        assert!(dst.join("bin/sh").is_symlink());
    }

    #[test]
    fn test_recopy_replaces_symlink_with_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fixture_tree(&src);
        copy_tree(&src, &dst).unwrap();

        // bin/sh changes upstream from an applet link to a real script.
        fs::remove_file(src.join("bin/sh")).unwrap();
        fs::write(src.join("bin/sh"), "wrapper script").unwrap();
        copy_tree(&src, &dst).unwrap();

        let sh = dst.join("bin/sh");
        assert!(!sh.is_symlink());
        assert_eq!(fs::read_to_string(&sh).unwrap(), "wrapper script");
        // The old link target must not have been written through.
        assert_eq!(
            fs::read_to_string(dst.join("bin/busybox")).unwrap(),
            "binary"
        );
    }

    #[test]
    fn test_count_items() {
        let dir = tempdir().unwrap();
        let path = dir.path();

        fs::write(path.join("file1.txt"), "test").unwrap();
        fs::write(path.join("file2.txt"), "test").unwrap();
        fs::create_dir(path.join("subdir")).unwrap();
        fs::write(path.join("subdir/file3.txt"), "test").unwrap();
        symlink("file1.txt", path.join("link")).unwrap();

        let (files, dirs, symlinks) = count_items(path).unwrap();
        assert_eq!(files, 3);
        assert_eq!(dirs, 1);
        assert_eq!(symlinks, 1);
    }

    #[test]
    fn test_dir_size() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a"), "12345").unwrap();
        fs::write(dir.path().join("b"), "12345").unwrap();
        assert_eq!(dir_size(dir.path()).unwrap(), 10);
    }
}
