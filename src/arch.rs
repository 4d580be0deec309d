//! Host architecture detection.
//!
//! The kernel and BusyBox builds need two strings: the value for `ARCH=`
//! and the cross-compiler prefix for `CROSS_COMPILE=`. Both come from the
//! host machine string reported by `uname -m`. Only x86_64 and arm64 hosts
//! are supported; anything else is a hard error.

use anyhow::{bail, Result};
use std::fmt;

use crate::process::Cmd;

/// Supported build architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    Arm64,
}

impl Arch {
    /// Detect the host architecture via `uname -m`.
    pub fn detect() -> Result<Self> {
        let result = Cmd::new("uname")
            .arg("-m")
            .error_msg("Failed to detect host architecture.")
            .run()?;
        Self::from_machine(result.stdout.trim())
    }

    /// Map a `uname -m` machine string to a supported architecture.
    ///
    /// Accepts both the Linux (`aarch64`) and Darwin (`arm64`) spellings
    /// for 64-bit ARM.
    pub fn from_machine(machine: &str) -> Result<Self> {
        match machine {
            "x86_64" => Ok(Arch::X86_64),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            other => bail!(
                "Unsupported architecture: {}\n\
                 Supported: x86_64, arm64/aarch64",
                other
            ),
        }
    }

    /// Value passed to make as `ARCH=`.
    pub fn kernel_arch(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Arm64 => "arm64",
        }
    }

    /// Toolchain prefix passed to make as `CROSS_COMPILE=`.
    pub fn cross_compile(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64-elf-",
            Arch::Arm64 => "aarch64-linux-gnu-",
        }
    }

    /// Kernel image path relative to the kernel source tree.
    pub fn kernel_image(&self) -> &'static str {
        match self {
            Arch::X86_64 => "arch/x86/boot/bzImage",
            Arch::Arm64 => "arch/arm64/boot/Image",
        }
    }

    /// QEMU system emulator binary for this architecture.
    pub fn qemu_system(&self) -> &'static str {
        match self {
            Arch::X86_64 => "qemu-system-x86_64",
            Arch::Arm64 => "qemu-system-aarch64",
        }
    }

    /// Serial console device for the kernel command line.
    pub fn console(&self) -> &'static str {
        match self {
            Arch::X86_64 => "ttyS0",
            Arch::Arm64 => "ttyAMA0",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kernel_arch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x86_64_selection() {
        let arch = Arch::from_machine("x86_64").unwrap();
        assert_eq!(arch.kernel_arch(), "x86_64");
        assert_eq!(arch.cross_compile(), "x86_64-elf-");
        assert_eq!(arch.kernel_image(), "arch/x86/boot/bzImage");
    }

    #[test]
    fn test_arm64_selection() {
        let arch = Arch::from_machine("arm64").unwrap();
        assert_eq!(arch.kernel_arch(), "arm64");
        assert_eq!(arch.cross_compile(), "aarch64-linux-gnu-");
        assert_eq!(arch.kernel_image(), "arch/arm64/boot/Image");
    }

    #[test]
    fn test_aarch64_is_arm64() {
        assert_eq!(Arch::from_machine("aarch64").unwrap(), Arch::Arm64);
    }

    #[test]
    fn test_unknown_machine_fails() {
        let err = Arch::from_machine("riscv64").unwrap_err();
        assert!(err.to_string().contains("Unsupported architecture"));
    }
}
