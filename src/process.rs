//! Subprocess execution for the build pipeline.
//!
//! Every external tool (wget, tar, make, git, qemu-img, mkfs.ext4, mount)
//! is invoked through [`Cmd`], which provides:
//!
//! - a builder for program + args + working directory
//! - uniform fail-fast behavior: non-zero exit becomes an error unless
//!   [`Cmd::allow_fail`] was set
//! - custom error messages with install hints via [`Cmd::error_msg`]
//!
//! Two execution modes:
//!
//! - [`Cmd::run`] captures stdout/stderr (for probes like `uname -m` or `df`)
//! - [`Cmd::run_interactive`] inherits the terminal so the user sees
//!   compiler/download progress; the command line is echoed first

use anyhow::{Context, Result};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Builder for an external command invocation.
pub struct Cmd {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    error_msg: Option<String>,
    allow_fail: bool,
}

/// Captured result of a [`Cmd::run`] invocation.
#[derive(Debug)]
pub struct CmdResult {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CmdResult {
    /// True if the command exited with status 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl Cmd {
    /// Start building an invocation of `program`.
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            cwd: None,
            error_msg: None,
            allow_fail: false,
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Append a path argument (lossy conversion; build paths are UTF-8).
    pub fn arg_path(mut self, path: impl AsRef<Path>) -> Self {
        self.args
            .push(path.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Run the command from `dir` instead of the current directory.
    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Message to use when the command fails (typically with an install hint).
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    /// Do not treat a non-zero exit as an error; the caller inspects the result.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    /// The full command line, for echoing and diagnostics.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn failure(&self, detail: String) -> anyhow::Error {
        match &self.error_msg {
            Some(msg) => anyhow::anyhow!("{}\n{}", msg, detail),
            None => anyhow::anyhow!("{}", detail),
        }
    }

    /// Run, capturing stdout and stderr.
    ///
    /// Non-zero exit is an error unless [`Cmd::allow_fail`] was set.
    pub fn run(self) -> Result<CmdResult> {
        let output = self
            .build()
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to run '{}'. Is it installed?", self.program))?;

        let result = CmdResult {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() && !self.allow_fail {
            let stderr = result.stderr.trim();
            let detail = if stderr.is_empty() {
                format!("'{}' exited with {:?}", self.command_line(), result.code)
            } else {
                format!(
                    "'{}' exited with {:?}:\n{}",
                    self.command_line(),
                    result.code,
                    stderr
                )
            };
            return Err(self.failure(detail));
        }

        Ok(result)
    }

    /// Run with inherited stdio so progress is visible on the terminal.
    ///
    /// Echoes the command line first; non-zero exit is an error unless
    /// [`Cmd::allow_fail`] was set.
    pub fn run_interactive(self) -> Result<()> {
        println!("  $ {}", self.command_line());

        let status = self
            .build()
            .status()
            .with_context(|| format!("Failed to run '{}'. Is it installed?", self.program))?;

        if !status.success() && !self.allow_fail {
            let detail = format!("'{}' exited with {}", self.command_line(), status);
            return Err(self.failure(detail));
        }

        Ok(())
    }
}

/// Directories searched after $PATH; mkfs.ext4 and mount commonly live in
/// sbin, which unprivileged user PATHs omit.
const EXTRA_TOOL_DIRS: &[&str] = &["/usr/sbin", "/sbin", "/usr/local/sbin"];

/// Find a tool on $PATH (plus the sbin directories), returning its full path.
pub fn which(tool: &str) -> Option<String> {
    let path_var = std::env::var_os("PATH")?;
    let candidates = std::env::split_paths(&path_var)
        .chain(EXTRA_TOOL_DIRS.iter().map(PathBuf::from));

    for dir in candidates {
        let candidate = dir.join(tool);
        if is_executable(&candidate) {
            return Some(candidate.to_string_lossy().into_owned());
        }
    }
    None
}

/// True if `tool` is available on this host.
pub fn exists(tool: &str) -> bool {
    which(tool).is_some()
}

fn is_executable(path: &Path) -> bool {
    path.is_file()
        && std::fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_captures_stdout() {
        let result = Cmd::new("echo").args(["hello"]).run().unwrap();
        assert!(result.success());
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[test]
    fn test_failing_command_is_an_error() {
        assert!(Cmd::new("false").run().is_err());
    }

    #[test]
    fn test_allow_fail_suppresses_error() {
        let result = Cmd::new("false").allow_fail().run().unwrap();
        assert!(!result.success());
    }

    #[test]
    fn test_error_msg_is_reported() {
        let err = Cmd::new("false")
            .error_msg("false failed. Install: nothing, it ships with coreutils")
            .run()
            .unwrap_err();
        assert!(format!("{:#}", err).contains("false failed"));
    }

    #[test]
    fn test_missing_program_is_an_error() {
        assert!(Cmd::new("definitely_not_a_real_command_12345").run().is_err());
    }

    #[test]
    fn test_command_line_formatting() {
        let cmd = Cmd::new("tar").args(["-xf", "kernel.tar.xz", "-C", "work"]);
        assert_eq!(cmd.command_line(), "tar -xf kernel.tar.xz -C work");
    }

    #[test]
    fn test_which_finds_sh() {
        // sh exists on any Unix system.
        assert!(which("sh").is_some());
    }

    #[test]
    fn test_which_missing_tool() {
        assert!(which("definitely_not_a_real_command_12345").is_none());
    }

    #[test]
    fn test_exists() {
        assert!(exists("sh"));
        assert!(!exists("definitely_not_a_real_command_12345"));
    }
}
