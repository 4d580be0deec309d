//! Required host tools.
//!
//! The pipeline shells out for everything, so a missing tool should
//! surface here rather than halfway through a kernel build.

use super::Check;
use crate::process::which;

/// (tool, what it is needed for, how to install it)
const REQUIRED_TOOLS: &[(&str, &str, &str)] = &[
    ("wget", "download source tarballs", "sudo dnf install wget"),
    ("tar", "extract source tarballs", "sudo dnf install tar"),
    ("make", "drive the kernel and BusyBox builds", "sudo dnf install make"),
    ("gcc", "compile the kernel and BusyBox", "sudo dnf install gcc"),
    ("git", "clone the init project", "sudo dnf install git"),
    ("qemu-img", "create the disk image", "sudo dnf install qemu-img"),
    ("mkfs.ext4", "format the disk image", "sudo dnf install e2fsprogs"),
    ("mount", "loop-mount the disk image", "sudo dnf install util-linux"),
];

/// Probe every required tool.
pub fn check_host_tools() -> Vec<Check> {
    let mut checks = Vec::with_capacity(REQUIRED_TOOLS.len());
    for (tool, purpose, install) in REQUIRED_TOOLS {
        checks.push(match which(tool) {
            Some(path) => Check::pass(*tool, format!("{} ({})", path, purpose)),
            None => Check::fail(
                *tool,
                format!("not found; needed to {}", purpose),
                format!("Install: {}", install),
            ),
        });
    }
    checks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_check_per_tool() {
        assert_eq!(check_host_tools().len(), REQUIRED_TOOLS.len());
    }

    #[test]
    fn test_tar_present() {
        // tar ships with every Linux environment this builder supports.
        let checks = check_host_tools();
        let tar = checks.iter().find(|c| c.label == "tar").unwrap();
        assert!(tar.passed, "{}", tar.detail);
    }
}
