//! Raw disk image provisioning.
//!
//! Five external-tool steps, strictly in order: create the raw image with
//! qemu-img, format it ext4, loop-mount it, copy the staged rootfs in,
//! unmount. There is no rollback: a failure after the mount step leaves
//! the image mounted, and the diagnostic says how to clean up by hand.
//!
//! Loop mounts need root, so `sprout image` is normally run via sudo.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::config::Paths;
use crate::fsutil;
use crate::process::Cmd;

/// Provision the disk image, returning its path. `size` uses qemu-img
/// syntax (e.g. "512M", "2G").
pub fn provision_image(paths: &Paths, size: &str) -> Result<PathBuf> {
    println!("=== Provisioning Disk Image ===");

    if !paths.rootfs.join("init").exists() {
        bail!(
            "Rootfs not staged at {}.\n\
             Run 'sprout build' first.",
            paths.rootfs.display()
        );
    }

    fs::create_dir_all(&paths.output)
        .with_context(|| format!("Failed to create {}", paths.output.display()))?;

    println!("  Creating {} raw image: {}", size, paths.disk_image.display());
    Cmd::new("qemu-img")
        .args(["create", "-f", "raw"])
        .arg_path(&paths.disk_image)
        .arg(size)
        .error_msg("qemu-img create failed. Install: sudo dnf install qemu-img")
        .run_interactive()?;

    println!("  Formatting ext4...");
    Cmd::new("mkfs.ext4")
        .arg("-F") // image file, not a block device
        .arg_path(&paths.disk_image)
        .error_msg("mkfs.ext4 failed. Install: sudo dnf install e2fsprogs")
        .run_interactive()?;

    fs::create_dir_all(&paths.mount_point)
        .with_context(|| format!("Failed to create {}", paths.mount_point.display()))?;

    println!("  Mounting at {}", paths.mount_point.display());
    Cmd::new("mount")
        .args(["-o", "loop"])
        .arg_path(&paths.disk_image)
        .arg_path(&paths.mount_point)
        .error_msg("mount failed. Loop mounts need root; rerun via sudo.")
        .run_interactive()?;

    println!("  Copying rootfs into the image...");
    fsutil::copy_tree(&paths.rootfs, &paths.mount_point).with_context(|| {
        format!(
            "Failed to populate the image; it may still be mounted at {}.\n\
             Unmount manually: sudo umount {}",
            paths.mount_point.display(),
            paths.mount_point.display()
        )
    })?;

    println!("  Unmounting...");
    Cmd::new("umount")
        .arg_path(&paths.mount_point)
        .error_msg(format!(
            "umount failed; the image is still mounted.\n\
             Unmount manually: sudo umount {}",
            paths.mount_point.display()
        ))
        .run_interactive()?;

    println!("=== Disk Image Complete ===");
    println!("  Output: {}", paths.disk_image.display());
    if let Ok(meta) = fs::metadata(&paths.disk_image) {
        println!("  Size: {} MB", meta.len() / 1024 / 1024);
    }
    println!();
    Ok(paths.disk_image.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_provision_without_rootfs_fails() {
        let dir = tempdir().unwrap();
        let paths = Paths::new(dir.path());

        // First check fires before any external tool runs.
        let err = provision_image(&paths, "512M").unwrap_err();
        assert!(err.to_string().contains("Rootfs not staged"));
    }
}
