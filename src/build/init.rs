//! Init project checkout and build.
//!
//! The init binary comes from a companion git repository: clone it (or
//! pull if already checked out), run its `make`, and require the binary
//! at the checkout root.

use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Paths, INIT_BINARY, INIT_REPO_ENV, INIT_REPO_URL};
use crate::process::Cmd;

/// Build the init binary, returning its path.
pub fn build(paths: &Paths) -> Result<PathBuf> {
    println!("=== Building Init Binary ===");

    let repo_url = env::var(INIT_REPO_ENV).unwrap_or_else(|_| INIT_REPO_URL.to_string());
    clone_or_update(&paths.init_src, &repo_url)?;

    Cmd::new("make")
        .cwd(&paths.init_src)
        .error_msg("Init project build failed. Check the output above.")
        .run_interactive()?;

    let binary = paths.init_binary();
    if !binary.exists() {
        bail!(
            "{} not found after build.\n\
             Expected at: {}\n\
             The init project's make must produce it at the checkout root.",
            INIT_BINARY,
            binary.display()
        );
    }

    println!("  Init binary: {}", binary.display());
    println!();
    Ok(binary)
}

/// Clone the repository, or pull if the checkout already exists.
fn clone_or_update(dir: &Path, url: &str) -> Result<()> {
    if !dir.exists() {
        println!("  Cloning {}", url);
        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        Cmd::new("git")
            .arg("clone")
            .arg(url)
            .arg_path(dir)
            .error_msg(format!(
                "git clone failed.\n\
                 Check the repository URL, or set {} to override it.",
                INIT_REPO_ENV
            ))
            .run_interactive()?;
    } else {
        if !dir.join(".git").exists() {
            bail!(
                "Directory {} exists but is not a git checkout.\n\
                 Remove it and rerun.",
                dir.display()
            );
        }
        println!("  Updating checkout: {}", dir.display());
        Cmd::new("git")
            .arg("pull")
            .cwd(dir)
            .error_msg("git pull failed in the init checkout")
            .run_interactive()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn git(dir: &Path, args: &[&str]) {
        Cmd::new("git")
            .arg("-C")
            .arg_path(dir)
            .args(args.iter().copied())
            .run()
            .unwrap();
    }

    #[test]
    fn test_existing_non_git_dir_is_an_error() {
        let dir = tempdir().unwrap();
        let checkout = dir.path().join("hprocs");
        fs::create_dir_all(&checkout).unwrap();

        let err = clone_or_update(&checkout, "https://example.invalid/repo.git").unwrap_err();
        assert!(err.to_string().contains("not a git checkout"));
    }

    #[test]
    fn test_build_without_produced_binary_is_fatal() {
        let dir = tempdir().unwrap();

        // A repo whose make succeeds but never produces the binary.
        let origin = dir.path().join("origin");
        fs::create_dir_all(&origin).unwrap();
        fs::write(origin.join("Makefile"), "all:\n\ttrue\n").unwrap();
        git(&origin, &["init", "-q"]);
        git(&origin, &["add", "Makefile"]);
        git(
            &origin,
            &[
                "-c",
                "user.email=build@localhost",
                "-c",
                "user.name=build",
                "commit",
                "-q",
                "-m",
                "makefile",
            ],
        );

        let paths = Paths::new(dir.path());
        env::set_var(INIT_REPO_ENV, origin.to_str().unwrap());
        let err = build(&paths).unwrap_err();
        env::remove_var(INIT_REPO_ENV);

        let msg = err.to_string();
        assert!(msg.contains(INIT_BINARY));
        assert!(msg.contains(&paths.init_binary().display().to_string()));
    }
}
