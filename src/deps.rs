//! OS-level build dependency installation.
//!
//! The pipeline needs a compiler toolchain, download tools, and QEMU from
//! the host distribution. Both apt and dnf hosts are supported; the package
//! manager is probed at runtime and each gets its distribution's package
//! spellings (`libncurses-dev` vs `ncurses-devel`).

use anyhow::{bail, Result};

use crate::process::{self, Cmd};

/// Packages installed on apt hosts.
const APT_PACKAGES: &[&str] = &[
    "qemu",
    "gcc",
    "make",
    "wget",
    "git",
    "libncurses-dev",
    "bison",
    "flex",
];

/// Packages installed on dnf hosts.
const DNF_PACKAGES: &[&str] = &[
    "qemu",
    "gcc",
    "make",
    "wget",
    "git",
    "ncurses-devel",
    "bison",
    "flex",
];

/// Supported host package managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
}

impl PackageManager {
    /// Probe the host for a supported package manager.
    pub fn detect() -> Result<Self> {
        if process::exists("apt-get") {
            Ok(PackageManager::Apt)
        } else if process::exists("dnf") {
            Ok(PackageManager::Dnf)
        } else {
            bail!(
                "No supported package manager found (apt-get or dnf).\n\
                 Install the build dependencies manually:\n\
                 gcc, make, wget, git, bison, flex, ncurses headers, qemu"
            )
        }
    }

    /// Command name of this package manager.
    pub fn name(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Dnf => "dnf",
        }
    }

    /// Packages to install, in this distribution's spellings.
    pub fn packages(&self) -> &'static [&'static str] {
        match self {
            PackageManager::Apt => APT_PACKAGES,
            PackageManager::Dnf => DNF_PACKAGES,
        }
    }

    /// Run the installation. Needs root; the error hint says so.
    pub fn install(&self) -> Result<()> {
        match self {
            PackageManager::Apt => {
                Cmd::new("apt-get")
                    .arg("update")
                    .error_msg("apt-get update failed. Run as root (or via sudo).")
                    .run_interactive()?;
                Cmd::new("apt-get")
                    .args(["install", "-y"])
                    .args(self.packages())
                    .error_msg("apt-get install failed. Run as root (or via sudo).")
                    .run_interactive()?;
            }
            PackageManager::Dnf => {
                Cmd::new("dnf")
                    .args(["install", "-y"])
                    .args(self.packages())
                    .error_msg("dnf install failed. Run as root (or via sudo).")
                    .run_interactive()?;
            }
        }
        Ok(())
    }
}

/// Detect the host package manager and install the build dependencies.
pub fn install_dependencies() -> Result<()> {
    println!("=== Installing Dependencies ===");
    let pm = PackageManager::detect()?;
    println!("  Package manager: {}", pm.name());
    println!("  Packages: {}", pm.packages().join(" "));
    pm.install()?;
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_lists_not_empty() {
        assert!(!PackageManager::Apt.packages().is_empty());
        assert!(!PackageManager::Dnf.packages().is_empty());
    }

    #[test]
    fn test_common_tools_in_both_lists() {
        for tool in ["gcc", "make", "wget", "git", "bison", "flex", "qemu"] {
            assert!(PackageManager::Apt.packages().contains(&tool));
            assert!(PackageManager::Dnf.packages().contains(&tool));
        }
    }

    #[test]
    fn test_ncurses_spellings_differ() {
        assert!(PackageManager::Apt.packages().contains(&"libncurses-dev"));
        assert!(PackageManager::Dnf.packages().contains(&"ncurses-devel"));
    }

    #[test]
    fn test_names() {
        assert_eq!(PackageManager::Apt.name(), "apt-get");
        assert_eq!(PackageManager::Dnf.name(), "dnf");
    }
}
