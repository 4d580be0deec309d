//! Preflight checks.
//!
//! `sprout check` runs these before any expensive work: required host
//! tools, free disk space, reachability of the kernel CDN, and a scan of
//! what is already downloaded or built. Each probe yields a [`Check`]
//! carrying a remedy when it fails, and the whole run is summarized in
//! one [`Report`].
//!
//! ```rust,ignore
//! let report = sprout::preflight::run_checks(&paths).await;
//! report.print_summary();
//! if !report.is_ok() {
//!     std::process::exit(1);
//! }
//! ```

mod disk_space;
mod host_tools;
mod network;

pub use disk_space::check_disk_space;
pub use host_tools::check_host_tools;
pub use network::check_network;

use crate::arch::Arch;
use crate::config::Paths;

/// Outcome of one preflight probe.
#[derive(Debug, Clone)]
pub struct Check {
    /// What was checked.
    pub label: String,
    /// Whether it passed.
    pub passed: bool,
    /// One-line finding.
    pub detail: String,
    /// How to fix it, when it failed.
    pub remedy: Option<String>,
}

impl Check {
    pub fn pass(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            passed: true,
            detail: detail.into(),
            remedy: None,
        }
    }

    pub fn fail(
        label: impl Into<String>,
        detail: impl Into<String>,
        remedy: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            passed: false,
            detail: detail.into(),
            remedy: Some(remedy.into()),
        }
    }
}

/// Everything `sprout check` found.
#[derive(Debug, Default)]
pub struct Report {
    pub checks: Vec<Check>,
    pub cache: CacheStatus,
}

impl Report {
    /// True when every check passed.
    pub fn is_ok(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// The checks that failed.
    pub fn failures(&self) -> Vec<&Check> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    /// Print the checks, the cache scan, and a verdict line.
    pub fn print_summary(&self) {
        println!("=== Preflight ===\n");
        for check in &self.checks {
            if check.passed {
                println!("[OK]   {}: {}", check.label, check.detail);
            } else {
                println!("[FAIL] {}: {}", check.label, check.detail);
                if let Some(remedy) = &check.remedy {
                    println!("       Fix: {}", remedy);
                }
            }
        }

        println!("\n=== Cache ===\n");
        self.cache.print();

        let passed = self.checks.len() - self.failures().len();
        println!();
        if self.is_ok() {
            println!("Preflight OK ({}/{} checks passed)", passed, self.checks.len());
        } else {
            println!(
                "Preflight FAILED ({}/{} checks passed)",
                passed,
                self.checks.len()
            );
        }
    }
}

/// What is already downloaded or built under the base directory. Purely
/// informational; a cold cache is not a failure.
#[derive(Debug, Default)]
pub struct CacheStatus {
    pub kernel_tarball: bool,
    pub kernel_src: bool,
    pub kernel_image: bool,
    pub busybox_tarball: bool,
    pub busybox_install: bool,
    pub init_binary: bool,
    pub rootfs: bool,
    pub disk_image: bool,
}

impl CacheStatus {
    /// Probe the workspace for downloads and artifacts.
    pub fn scan(paths: &Paths) -> Self {
        // The compiled image lives at an arch-specific path; count it as
        // present if either arch has one.
        let kernel_image = paths.kernel_image(Arch::X86_64).exists()
            || paths.kernel_image(Arch::Arm64).exists();

        Self {
            kernel_tarball: paths.kernel_tarball.exists(),
            kernel_src: paths.kernel_src.join("Makefile").exists(),
            kernel_image,
            busybox_tarball: paths.busybox_tarball.exists(),
            busybox_install: paths.busybox_install().join("bin").exists(),
            init_binary: paths.init_binary().exists(),
            rootfs: paths.rootfs.join("init").exists(),
            disk_image: paths.disk_image.exists(),
        }
    }

    pub fn print(&self) {
        let tag = |present: bool| if present { "[cached]" } else { "[missing]" };
        println!("{:9}  Kernel tarball", tag(self.kernel_tarball));
        println!("{:9}  Kernel source tree", tag(self.kernel_src));
        println!("{:9}  Kernel image", tag(self.kernel_image));
        println!("{:9}  BusyBox tarball", tag(self.busybox_tarball));
        println!("{:9}  BusyBox install tree", tag(self.busybox_install));
        println!("{:9}  Init binary", tag(self.init_binary));
        println!("{:9}  Rootfs", tag(self.rootfs));
        println!("{:9}  Disk image", tag(self.disk_image));
    }
}

/// Run every preflight check and scan the cache.
pub async fn run_checks(paths: &Paths) -> Report {
    let mut checks = check_host_tools();
    checks.push(check_disk_space(&paths.base));
    checks.push(check_network().await);

    Report {
        checks,
        cache: CacheStatus::scan(paths),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_check_constructors() {
        let ok = Check::pass("tar", "/usr/bin/tar");
        assert!(ok.passed);
        assert!(ok.remedy.is_none());

        let bad = Check::fail("wget", "not found", "Install: sudo dnf install wget");
        assert!(!bad.passed);
        assert_eq!(bad.remedy.as_deref(), Some("Install: sudo dnf install wget"));
    }

    #[test]
    fn test_report_verdict() {
        let mut report = Report::default();
        assert!(report.is_ok());

        report.checks.push(Check::pass("a", "ok"));
        assert!(report.is_ok());
        assert!(report.failures().is_empty());

        report.checks.push(Check::fail("b", "bad", "fix"));
        assert!(!report.is_ok());
        assert_eq!(report.failures().len(), 1);
    }

    #[test]
    fn test_cache_scan_cold() {
        let dir = tempdir().unwrap();
        let paths = Paths::new(dir.path());

        let cache = CacheStatus::scan(&paths);
        assert!(!cache.kernel_tarball);
        assert!(!cache.kernel_image);
        assert!(!cache.rootfs);
        assert!(!cache.disk_image);
    }

    #[test]
    fn test_cache_scan_finds_artifacts() {
        let dir = tempdir().unwrap();
        let paths = Paths::new(dir.path());

        fs::create_dir_all(&paths.downloads).unwrap();
        fs::write(&paths.kernel_tarball, "tarball").unwrap();
        let image = paths.kernel_image(Arch::X86_64);
        fs::create_dir_all(image.parent().unwrap()).unwrap();
        fs::write(&image, "bzImage").unwrap();
        fs::create_dir_all(&paths.rootfs).unwrap();
        fs::write(paths.rootfs.join("init"), "init").unwrap();

        let cache = CacheStatus::scan(&paths);
        assert!(cache.kernel_tarball);
        assert!(cache.kernel_image);
        assert!(cache.rootfs);
        assert!(!cache.busybox_tarball);
    }
}
