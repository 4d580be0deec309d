//! BusyBox fetch and build.
//!
//! Downloads the pinned BusyBox release, runs `make defconfig` and
//! `make install`, and verifies the resulting `_install/` tree. That tree
//! (one `busybox` binary plus applet symlinks) becomes the userspace of
//! the root filesystem.

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::arch::Arch;
use crate::config::{Paths, BUSYBOX_TARBALL_ENV, BUSYBOX_URL, BUSYBOX_VERSION};
use crate::fsutil;
use crate::process::Cmd;

/// Build BusyBox, returning the path to its `_install/` tree.
pub fn build(paths: &Paths, arch: Arch) -> Result<PathBuf> {
    println!("=== Building BusyBox {} ===", BUSYBOX_VERSION);

    let install = paths.busybox_install();
    if install.join("bin").join("busybox").exists() {
        println!("  [SKIP] Install tree exists: {}", install.display());
        println!();
        return Ok(install);
    }

    let tarball = super::fetch_tarball(
        "BusyBox tarball",
        BUSYBOX_TARBALL_ENV,
        BUSYBOX_URL,
        &paths.busybox_tarball,
    )?;
    super::extract_tarball(&tarball, &paths.work, &paths.busybox_src)?;

    println!("  Configuring BusyBox (defconfig)...");
    Cmd::new("make")
        .arg("defconfig")
        .cwd(&paths.busybox_src)
        .error_msg("BusyBox defconfig failed")
        .run_interactive()?;

    println!("  Building BusyBox (ARCH={})...", arch);
    Cmd::new("make")
        .arg(format!("ARCH={}", arch.kernel_arch()))
        .arg("install")
        .cwd(&paths.busybox_src)
        .error_msg("BusyBox build failed. Check the compiler output above.")
        .run_interactive()?;

    if !install.join("bin").join("busybox").exists() {
        bail!(
            "BusyBox install tree incomplete: bin/busybox missing.\n\
             Expected under: {}",
            install.display()
        );
    }

    let (files, _, symlinks) = fsutil::count_items(&install)?;
    println!(
        "  Install tree: {} ({} files, {} applet links)",
        install.display(),
        files,
        symlinks
    );
    println!();
    Ok(install)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_skips_when_install_tree_exists() {
        let dir = tempdir().unwrap();
        let paths = Paths::new(dir.path());
        let bin = paths.busybox_install().join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("busybox"), "binary").unwrap();

        let install = build(&paths, Arch::X86_64).unwrap();
        assert_eq!(install, paths.busybox_install());
    }
}
