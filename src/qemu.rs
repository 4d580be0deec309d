//! QEMU runner for the built system.
//!
//! Boots the compiled kernel directly with `-kernel`, with the provisioned
//! disk image attached as the virtio root device and `/init` as PID 1.
//!
//! # Testing
//!
//! [`test_boot`] boots headless with a serial console and watches the
//! output for success/failure patterns, so a built system can be verified
//! without a display or manual interaction.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::arch::Arch;
use crate::config::{Paths, QEMU_MEMORY_MB, QEMU_SMP};

/// Serial lines that mark a successful hand-off to userspace. The kernel
/// logs this when it executes the `init=` binary.
const SUCCESS_PATTERNS: &[&str] = &["Run /init as init process"];

/// Serial lines that mark a dead boot; any one aborts the watch.
const FAILURE_PATTERNS: &[&str] = &[
    "Kernel panic",
    "not syncing",
    "VFS: Cannot open root device",
    "No working init found",
    "Failed to execute /init",
    "No init found",
    "can't find /init",
];

/// Assembles the QEMU invocation for a direct kernel boot.
struct QemuBuilder {
    arch: Arch,
    kernel: PathBuf,
    disk: PathBuf,
    headless: bool,
}

impl QemuBuilder {
    fn new(arch: Arch, kernel: PathBuf, disk: PathBuf) -> Self {
        Self {
            arch,
            kernel,
            disk,
            headless: false,
        }
    }

    fn headless(mut self) -> Self {
        self.headless = true;
        self
    }

    fn build(self) -> Command {
        let mut cmd = Command::new(self.arch.qemu_system());

        // The arm64 emulator has no default machine type
        if self.arch == Arch::Arm64 {
            cmd.args(["-M", "virt"]);
        }

        if kvm_available(self.arch) {
            cmd.args(["-enable-kvm", "-cpu", "host"]);
        } else {
            match self.arch {
                Arch::X86_64 => cmd.args(["-cpu", "max"]),
                Arch::Arm64 => cmd.args(["-cpu", "cortex-a57"]),
            };
        }

        cmd.args(["-smp", &QEMU_SMP.to_string()]);
        cmd.args(["-m", &format!("{}M", QEMU_MEMORY_MB)]);

        // Virtio root disk -> /dev/vda in the guest
        cmd.args([
            "-drive",
            &format!("file={},format=raw,if=virtio", self.disk.display()),
        ]);

        // Direct kernel boot, root and console on the kernel command line
        cmd.arg("-kernel");
        cmd.arg(&self.kernel);
        cmd.args([
            "-append",
            &format!(
                "root=/dev/vda rw console={} init=/init",
                self.arch.console()
            ),
        ]);

        // Serial console on the terminal either way
        cmd.args(["-nographic", "-serial", "mon:stdio"]);
        if self.headless {
            cmd.arg("-no-reboot");
        }

        cmd
    }
}

/// Last `n` captured lines, oldest first, for error context.
fn tail(lines: &[String], n: usize) -> String {
    let skip = lines.len().saturating_sub(n);
    lines[skip..].join("\n")
}

/// KVM acceleration applies only when the guest matches the host arch.
fn kvm_available(arch: Arch) -> bool {
    let host_matches = match arch {
        Arch::X86_64 => std::env::consts::ARCH == "x86_64",
        Arch::Arm64 => std::env::consts::ARCH == "aarch64",
    };
    host_matches && Path::new("/dev/kvm").exists()
}

/// Locate the built kernel and disk image, with next-step hints.
fn boot_artifacts(paths: &Paths, arch: Arch) -> Result<(PathBuf, PathBuf)> {
    let kernel = paths.kernel_image(arch);
    if !kernel.exists() {
        bail!(
            "Kernel image not found at {}.\n\
             Run 'sprout build' first.",
            kernel.display()
        );
    }
    if !paths.disk_image.exists() {
        bail!(
            "Disk image not found at {}.\n\
             Run 'sprout image' first.",
            paths.disk_image.display()
        );
    }
    Ok((kernel, paths.disk_image.clone()))
}

/// Boot the system interactively on the serial console.
pub fn run(paths: &Paths, arch: Arch) -> Result<()> {
    let (kernel, disk) = boot_artifacts(paths, arch)?;

    println!("Booting in QEMU (serial console)...");
    println!("  Kernel: {}", kernel.display());
    println!("  Disk: {}", disk.display());
    if kvm_available(arch) {
        println!("  Acceleration: KVM");
    } else {
        println!("  Acceleration: TCG software emulation (slow)");
    }
    println!("  Exit with Ctrl-A X");
    println!();

    let status = QemuBuilder::new(arch, kernel, disk)
        .build()
        .status()
        .with_context(|| format!("Failed to run {}. Is QEMU installed?", arch.qemu_system()))?;

    if !status.success() {
        bail!("QEMU exited with status: {}", status);
    }

    Ok(())
}

/// Boot headless and watch serial output for success/failure patterns.
///
/// Succeeds once the kernel reports that it is executing `/init`; fails on
/// a panic pattern, on `timeout_secs` overall, or after 30s without any
/// serial output.
pub fn test_boot(paths: &Paths, arch: Arch, timeout_secs: u64) -> Result<()> {
    let (kernel, disk) = boot_artifacts(paths, arch)?;

    println!("Boot test (headless, serial console)");
    println!("  Kernel: {}", kernel.display());
    println!("  Disk: {}", disk.display());
    println!("  Timeout: {}s", timeout_secs);
    println!();

    let mut cmd = QemuBuilder::new(arch, kernel, disk).headless().build();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn {}", arch.qemu_system()))?;
    let stdout = child.stdout.take().context("Failed to capture stdout")?;

    // Reader thread feeds serial lines into a channel so the watch loop
    // can poll with timeouts.
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let reader = BufReader::new(stdout);
        for line in reader.lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let start = Instant::now();
    let timeout = Duration::from_secs(timeout_secs);
    // 30s of serial silence counts as a stall
    let stall_timeout = Duration::from_secs(30);
    let mut last_output = Instant::now();
    let mut output_buffer: Vec<String> = Vec::new();
    // Whether kernel output was ever seen, for stall diagnostics
    let mut saw_kernel = false;

    println!("Watching boot output...\n");

    loop {
        // Hard deadline
        if start.elapsed() > timeout {
            let _ = child.kill();
            bail!(
                "TIMEOUT: no successful boot within {}s\n\nLast output:\n{}",
                timeout_secs,
                tail(&output_buffer, 20)
            );
        }

        // Silence watchdog
        if last_output.elapsed() > stall_timeout {
            let _ = child.kill();
            let stage = if saw_kernel {
                "kernel started but went quiet before init"
            } else {
                "no output at all; QEMU or the serial console is broken"
            };
            bail!(
                "STALL: {} ({}s without output)",
                stage,
                stall_timeout.as_secs()
            );
        }

        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => {
                last_output = Instant::now();
                output_buffer.push(line.clone());

                // Echo so the user can watch the boot
                println!("  {}", line);

                if line.contains("Linux version") || line.contains("Booting Linux") {
                    saw_kernel = true;
                }

                // Failure lines win over a success line arriving later
                for pattern in FAILURE_PATTERNS {
                    if line.contains(pattern) {
                        let _ = child.kill();
                        bail!(
                            "BOOT FAILED: matched '{}'\n\nContext:\n{}",
                            pattern,
                            tail(&output_buffer, 30)
                        );
                    }
                }

                for pattern in SUCCESS_PATTERNS {
                    if line.contains(pattern) {
                        let elapsed = start.elapsed().as_secs_f64();
                        let _ = child.kill();
                        let _ = child.wait();

                        println!();
                        println!("═══════════════════════════════════════════════════════════");
                        println!("BOOT OK: Matched '{}'", pattern);
                        println!("═══════════════════════════════════════════════════════════");
                        println!();
                        println!("Kernel handed off to /init in {:.1}s", elapsed);
                        return Ok(());
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                bail!(
                    "QEMU exited before the boot finished\n\nLast output:\n{}",
                    tail(&output_buffer, 20)
                );
            }
        }
    }
}
