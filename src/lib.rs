//! Minimal bootable Linux system builder library.
//!
//! Orchestrates external tools (package manager, wget, tar, make, git,
//! qemu-img, mkfs.ext4, mount) to assemble a bootable system: a compiled
//! kernel, a BusyBox userspace with an externally built init binary, and
//! a raw disk image to boot from.

pub mod arch;
pub mod artifact;
pub mod build;
pub mod config;
pub mod deps;
pub mod fsutil;
pub mod preflight;
pub mod process;
pub mod qemu;

use std::time::Instant;

/// Wall-clock timer for build stages.
///
/// ```rust
/// use sprout::Timer;
///
/// let t = Timer::start("Kernel");
/// // ... do the work ...
/// t.finish();
/// ```
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    /// Start timing a stage.
    pub fn start(label: &str) -> Self {
        Self {
            label: label.to_string(),
            start: Instant::now(),
        }
    }

    /// Report the elapsed time for the stage.
    pub fn finish(self) {
        let secs = self.start.elapsed().as_secs_f64();
        if secs >= 60.0 {
            println!("  [{}] finished in {:.1}m", self.label, secs / 60.0);
        } else {
            println!("  [{}] finished in {:.1}s", self.label, secs);
        }
    }
}
