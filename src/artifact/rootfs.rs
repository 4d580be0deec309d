//! Root filesystem staging.
//!
//! Copies the BusyBox `_install/` tree into `output/rootfs` and installs
//! the init binary at the rootfs root with mode 0755. The booted kernel
//! executes that `/init` as PID 1.

use anyhow::{bail, Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::config::{Paths, INIT_BINARY};
use crate::fsutil;

/// Stage the root filesystem, returning its path.
pub fn stage_rootfs(paths: &Paths) -> Result<PathBuf> {
    println!("=== Staging Root Filesystem ===");

    let install = paths.busybox_install();
    if !install.join("bin").exists() {
        bail!(
            "BusyBox install tree not found at {}.\n\
             Run 'sprout build busybox' first.",
            install.display()
        );
    }

    let init_binary = paths.init_binary();
    if !init_binary.exists() {
        bail!(
            "Init binary not found at {}.\n\
             Run 'sprout build init' first.",
            init_binary.display()
        );
    }

    fs::create_dir_all(&paths.rootfs)
        .with_context(|| format!("Failed to create {}", paths.rootfs.display()))?;

    println!("  Copying BusyBox tree into {}", paths.rootfs.display());
    fsutil::copy_tree(&install, &paths.rootfs)?;

    println!("  Installing {} as /init", INIT_BINARY);
    let init = paths.rootfs.join("init");
    fs::copy(&init_binary, &init)
        .with_context(|| format!("Failed to install init at {}", init.display()))?;
    let mut perms = fs::metadata(&init)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&init, perms)
        .with_context(|| format!("Failed to mark {} executable", init.display()))?;

    verify_rootfs(&paths.rootfs)?;

    let (files, _, symlinks) = fsutil::count_items(&paths.rootfs)?;
    let size = fsutil::dir_size(&paths.rootfs)?;
    println!(
        "  Rootfs: {} ({} files, {} links, {} MB)",
        paths.rootfs.display(),
        files,
        symlinks,
        size / 1024 / 1024
    );
    println!();
    Ok(paths.rootfs.clone())
}

/// Verify the staged tree is bootable: an executable `init` at the root
/// and the BusyBox binary behind the applet links.
fn verify_rootfs(rootfs: &Path) -> Result<()> {
    let init = rootfs.join("init");
    let meta = fs::metadata(&init)
        .with_context(|| format!("Rootfs has no init at {}", init.display()))?;
    if meta.permissions().mode() & 0o111 == 0 {
        bail!("{} is not executable", init.display());
    }

    if !rootfs.join("bin").join("busybox").exists() {
        bail!(
            "Rootfs has no bin/busybox under {}.\n\
             The BusyBox copy is incomplete.",
            rootfs.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    /// Lay out what `make install` and the init project build produce.
    fn fixture(paths: &Paths) {
        let install = paths.busybox_install();
        fs::create_dir_all(install.join("bin")).unwrap();
        fs::write(install.join("bin/busybox"), "binary").unwrap();
        symlink("busybox", install.join("bin/sh")).unwrap();
        fs::create_dir_all(install.join("usr/bin")).unwrap();
        symlink("../../bin/busybox", install.join("usr/bin/env")).unwrap();

        fs::create_dir_all(&paths.init_src).unwrap();
        fs::write(paths.init_binary(), "init binary").unwrap();
    }

    #[test]
    fn test_stage_produces_executable_init() {
        let dir = tempdir().unwrap();
        let paths = Paths::new(dir.path());
        fixture(&paths);

        let rootfs = stage_rootfs(&paths).unwrap();

        let init = rootfs.join("init");
        assert!(init.is_file());
        let mode = fs::metadata(&init).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_stage_preserves_applet_links() {
        let dir = tempdir().unwrap();
        let paths = Paths::new(dir.path());
        fixture(&paths);

        let rootfs = stage_rootfs(&paths).unwrap();

        let sh = rootfs.join("bin/sh");
        assert!(sh.is_symlink());
        assert_eq!(fs::read_link(&sh).unwrap(), Path::new("busybox"));
        assert!(rootfs.join("usr/bin/env").is_symlink());
    }

    #[test]
    fn test_stage_without_busybox_tree_fails() {
        let dir = tempdir().unwrap();
        let paths = Paths::new(dir.path());

        let err = stage_rootfs(&paths).unwrap_err();
        assert!(err.to_string().contains("build busybox"));
    }

    #[test]
    fn test_stage_without_init_binary_fails() {
        let dir = tempdir().unwrap();
        let paths = Paths::new(dir.path());
        fs::create_dir_all(paths.busybox_install().join("bin")).unwrap();

        let err = stage_rootfs(&paths).unwrap_err();
        assert!(err.to_string().contains("build init"));
    }
}
