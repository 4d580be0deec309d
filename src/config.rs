//! Build configuration: pinned versions, URLs, and workspace layout.
//!
//! Everything the pipeline downloads or produces lives under one base
//! directory:
//!
//! - `downloads/` - source tarballs (kept across runs)
//! - `work/` - extracted source trees and the init project checkout
//! - `output/` - the staged rootfs and the disk image
//!
//! # Example
//!
//! ```rust
//! use sprout::config::{Paths, KERNEL_VERSION};
//!
//! let paths = Paths::new(std::path::Path::new("/tmp/sprout"));
//! assert!(paths.kernel_src.ends_with("linux-6.5"));
//! assert_eq!(KERNEL_VERSION, "6.5");
//! ```

use std::path::{Path, PathBuf};

use crate::arch::Arch;

/// Linux kernel release to build.
pub const KERNEL_VERSION: &str = "6.5";
/// Kernel source tarball filename.
pub const KERNEL_TARBALL: &str = "linux-6.5.tar.xz";
/// Kernel source download URL.
pub const KERNEL_URL: &str = "https://cdn.kernel.org/pub/linux/kernel/v6.x/linux-6.5.tar.xz";
/// Directory the kernel tarball extracts to.
pub const KERNEL_SRC_DIR: &str = "linux-6.5";

/// BusyBox release to build.
pub const BUSYBOX_VERSION: &str = "1.34.1";
/// BusyBox source tarball filename.
pub const BUSYBOX_TARBALL: &str = "busybox-1.34.1.tar.bz2";
/// BusyBox source download URL.
pub const BUSYBOX_URL: &str = "https://busybox.net/downloads/busybox-1.34.1.tar.bz2";
/// Directory the BusyBox tarball extracts to.
pub const BUSYBOX_SRC_DIR: &str = "busybox-1.34.1";

/// Companion project that builds the init binary.
pub const INIT_REPO_URL: &str = "https://github.com/beispiel/external-repo.git";
/// Directory name for the init project checkout (under `work/`).
pub const INIT_SRC_DIR: &str = "hprocs";
/// Binary the init project's `make` must produce at its checkout root.
pub const INIT_BINARY: &str = "hprocs";

/// Override path to a pre-downloaded kernel tarball.
pub const KERNEL_TARBALL_ENV: &str = "SPROUT_KERNEL_TARBALL";
/// Override path to a pre-downloaded BusyBox tarball.
pub const BUSYBOX_TARBALL_ENV: &str = "SPROUT_BUSYBOX_TARBALL";
/// Override URL for the init project repository.
pub const INIT_REPO_ENV: &str = "SPROUT_INIT_REPO";

/// Default raw disk image size, in qemu-img syntax.
pub const DEFAULT_IMAGE_SIZE: &str = "512M";

/// Guest memory for QEMU boots. BusyBox userspace needs very little.
pub const QEMU_MEMORY_MB: u32 = 512;
/// Guest CPU count for QEMU boots.
pub const QEMU_SMP: u32 = 2;

/// Parallel make jobs: one per available core, 4 if that cannot be
/// determined.
pub fn make_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Paths used across the pipeline, all relative to one base directory.
pub struct Paths {
    /// Base directory for the whole workspace.
    pub base: PathBuf,
    /// Downloads directory (source tarballs).
    pub downloads: PathBuf,
    /// Work directory (extracted sources, init checkout).
    pub work: PathBuf,
    /// Output directory (rootfs, disk image).
    pub output: PathBuf,
    /// Kernel tarball in `downloads/`.
    pub kernel_tarball: PathBuf,
    /// Extracted kernel source tree.
    pub kernel_src: PathBuf,
    /// BusyBox tarball in `downloads/`.
    pub busybox_tarball: PathBuf,
    /// Extracted BusyBox source tree.
    pub busybox_src: PathBuf,
    /// Init project checkout.
    pub init_src: PathBuf,
    /// Staged root filesystem.
    pub rootfs: PathBuf,
    /// Raw disk image.
    pub disk_image: PathBuf,
    /// Mount point used while populating the disk image.
    pub mount_point: PathBuf,
}

impl Paths {
    /// Create paths relative to the base directory.
    pub fn new(base_dir: &Path) -> Self {
        let base = base_dir.to_path_buf();
        let downloads = base.join("downloads");
        let work = base.join("work");
        let output = base.join("output");
        Self {
            kernel_tarball: downloads.join(KERNEL_TARBALL),
            kernel_src: work.join(KERNEL_SRC_DIR),
            busybox_tarball: downloads.join(BUSYBOX_TARBALL),
            busybox_src: work.join(BUSYBOX_SRC_DIR),
            init_src: work.join(INIT_SRC_DIR),
            rootfs: output.join("rootfs"),
            disk_image: output.join("sprout.img"),
            mount_point: output.join("mnt"),
            base,
            downloads,
            work,
            output,
        }
    }

    /// Compiled kernel image for `arch`, inside the kernel source tree.
    pub fn kernel_image(&self, arch: Arch) -> PathBuf {
        self.kernel_src.join(arch.kernel_image())
    }

    /// BusyBox install tree produced by `make install`.
    pub fn busybox_install(&self) -> PathBuf {
        self.busybox_src.join("_install")
    }

    /// Init binary produced by the companion project's `make`.
    pub fn init_binary(&self) -> PathBuf {
        self.init_src.join(INIT_BINARY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = Paths::new(Path::new("/tmp/base"));
        assert_eq!(paths.downloads, Path::new("/tmp/base/downloads"));
        assert_eq!(paths.work, Path::new("/tmp/base/work"));
        assert_eq!(paths.output, Path::new("/tmp/base/output"));
        assert_eq!(paths.kernel_src, Path::new("/tmp/base/work/linux-6.5"));
        assert_eq!(paths.rootfs, Path::new("/tmp/base/output/rootfs"));
    }

    #[test]
    fn test_urls_match_tarball_names() {
        assert!(KERNEL_URL.ends_with(KERNEL_TARBALL));
        assert!(BUSYBOX_URL.ends_with(BUSYBOX_TARBALL));
        assert!(KERNEL_TARBALL.contains(KERNEL_VERSION));
        assert!(BUSYBOX_TARBALL.contains(BUSYBOX_VERSION));
    }

    #[test]
    fn test_kernel_image_per_arch() {
        let paths = Paths::new(Path::new("/tmp/base"));
        assert_eq!(
            paths.kernel_image(Arch::X86_64),
            Path::new("/tmp/base/work/linux-6.5/arch/x86/boot/bzImage")
        );
        assert_eq!(
            paths.kernel_image(Arch::Arm64),
            Path::new("/tmp/base/work/linux-6.5/arch/arm64/boot/Image")
        );
    }

    #[test]
    fn test_make_jobs_positive() {
        assert!(make_jobs() >= 1);
    }
}
