//! Build stages for the bootable system.
//!
//! Three stages, each driving external tools:
//!
//! - `kernel` - Download and compile the Linux kernel
//! - `busybox` - Download and build the BusyBox install tree
//! - `init` - Clone and build the companion project that produces the
//!   init binary
//!
//! Kernel and BusyBox sources resolve through the same 3-tier pattern:
//! an environment variable override, then a cached tarball in
//! `downloads/`, then a fresh download.

pub mod busybox;
pub mod init;
pub mod kernel;

use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::process::Cmd;

/// Resolve a source tarball: env override, cached file, or wget download.
pub(crate) fn fetch_tarball(
    label: &str,
    env_var: &str,
    url: &str,
    dest: &Path,
) -> Result<PathBuf> {
    // Tier 1: Environment variable
    if let Ok(path) = env::var(env_var) {
        let path = PathBuf::from(path);
        if path.exists() {
            println!("  {}: {} (from {})", label, path.display(), env_var);
            return Ok(path);
        }
    }

    // Tier 2: Existing file in downloads
    if dest.exists() {
        println!("  {}: {} (cached)", label, dest.display());
        return Ok(dest.to_path_buf());
    }

    // Tier 3: Download
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    println!("  Downloading {}...", label);
    println!("  URL: {}", url);

    let download = Cmd::new("wget")
        .args(["-O"])
        .arg_path(dest)
        .arg(url)
        .error_msg(format!(
            "Failed to download {}.\n\
             Check the URL, or set {} to a local tarball.",
            label, env_var
        ))
        .run_interactive();

    // wget leaves a partial file behind; don't let it pass as cached.
    if download.is_err() {
        let _ = fs::remove_file(dest);
    }
    download?;

    Ok(dest.to_path_buf())
}

/// Extract a tarball into the work directory, skipping if the source tree
/// is already there.
pub(crate) fn extract_tarball(tarball: &Path, work: &Path, src: &Path) -> Result<()> {
    if src.join("Makefile").exists() {
        println!("  Already extracted: {}", src.display());
        return Ok(());
    }

    fs::create_dir_all(work).with_context(|| format!("Failed to create {}", work.display()))?;

    Cmd::new("tar")
        .args(["-xf"])
        .arg_path(tarball)
        .args(["-C"])
        .arg_path(work)
        .error_msg("Failed to extract tarball")
        .run_interactive()?;

    if !src.join("Makefile").exists() {
        bail!(
            "Extraction incomplete: no Makefile in the source tree.\n\
             Expected at: {}",
            src.display()
        );
    }

    Ok(())
}
