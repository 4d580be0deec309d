//! Kernel fetch, configure, and compile.
//!
//! Downloads the pinned kernel release, extracts it under `work/`, runs
//! `make defconfig` and a full build, and verifies the resulting image.
//! A kernel build takes a long time, so if the image already exists the
//! stage is skipped; `--clean` forces a from-scratch rebuild.

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::arch::Arch;
use crate::config::{self, Paths, KERNEL_TARBALL_ENV, KERNEL_URL, KERNEL_VERSION};
use crate::process::Cmd;

/// Build the kernel, returning the path to the compiled image.
pub fn build(paths: &Paths, arch: Arch, clean: bool) -> Result<PathBuf> {
    println!("=== Building Kernel {} ===", KERNEL_VERSION);

    let image = paths.kernel_image(arch);
    if image.exists() && !clean {
        println!("  [SKIP] Kernel image exists: {}", image.display());
        println!("  (use 'build kernel --clean' to rebuild)");
        println!();
        return Ok(image);
    }

    let tarball = super::fetch_tarball(
        "Kernel tarball",
        KERNEL_TARBALL_ENV,
        KERNEL_URL,
        &paths.kernel_tarball,
    )?;
    super::extract_tarball(&tarball, &paths.work, &paths.kernel_src)?;

    if clean && paths.kernel_src.join("Makefile").exists() {
        println!("  Cleaning kernel tree...");
        Cmd::new("make")
            .arg("mrproper")
            .cwd(&paths.kernel_src)
            .error_msg("make mrproper failed in the kernel tree")
            .run_interactive()?;
    }

    println!("  Configuring kernel (defconfig, ARCH={})...", arch);
    Cmd::new("make")
        .arg("defconfig")
        .arg(format!("ARCH={}", arch.kernel_arch()))
        .cwd(&paths.kernel_src)
        .error_msg("Kernel defconfig failed")
        .run_interactive()?;

    let jobs = config::make_jobs();
    println!("  Compiling kernel (-j{}), this takes a while...", jobs);
    Cmd::new("make")
        .arg(format!("ARCH={}", arch.kernel_arch()))
        .arg(format!("CROSS_COMPILE={}", arch.cross_compile()))
        .arg("all")
        .arg(format!("-j{}", jobs))
        .cwd(&paths.kernel_src)
        .error_msg("Kernel build failed. Check the compiler output above.")
        .run_interactive()?;

    if !image.exists() {
        bail!(
            "Kernel build finished but no image was produced.\n\
             Expected at: {}",
            image.display()
        );
    }

    println!("  Kernel image: {}", image.display());
    println!();
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_skips_when_image_exists() {
        let dir = tempdir().unwrap();
        let paths = Paths::new(dir.path());
        let image = paths.kernel_image(Arch::X86_64);
        fs::create_dir_all(image.parent().unwrap()).unwrap();
        fs::write(&image, "bzImage").unwrap();

        // No tarball, no source tree: only the skip path can succeed.
        let built = build(&paths, Arch::X86_64, false).unwrap();
        assert_eq!(built, image);
    }
}
