//! Free disk space.
//!
//! A kernel build eats space fast; check up front instead of dying at 90%
//! of a compile.

use std::path::Path;

use super::Check;
use crate::process::Cmd;

/// 15 GB: ~2 GB tarballs and source trees, ~10 GB kernel build output,
/// ~1 GB BusyBox, ~1 GB rootfs plus image, and headroom.
const MIN_FREE_BYTES: u64 = 15 * 1024 * 1024 * 1024;

/// Check free space on the filesystem holding `base_dir`.
pub fn check_disk_space(base_dir: &Path) -> Check {
    let gb = |bytes: u64| bytes as f64 / (1024.0 * 1024.0 * 1024.0);

    match df_available_bytes(base_dir) {
        Some(avail) if avail >= MIN_FREE_BYTES => Check::pass(
            "Disk space",
            format!("{:.1} GB free ({:.0} GB needed)", gb(avail), gb(MIN_FREE_BYTES)),
        ),
        Some(avail) => Check::fail(
            "Disk space",
            format!("{:.1} GB free, {:.0} GB needed", gb(avail), gb(MIN_FREE_BYTES)),
            "Free up space, or run with -C on a roomier disk",
        ),
        None => Check::fail(
            "Disk space",
            "could not determine free space",
            "Check that the base directory exists and df works there",
        ),
    }
}

/// Free bytes on the filesystem holding `path`, via `df --output=avail -B1`.
fn df_available_bytes(path: &Path) -> Option<u64> {
    let result = Cmd::new("df")
        .args(["--output=avail", "-B1"])
        .arg_path(path)
        .allow_fail()
        .run()
        .ok()?;
    if !result.success() {
        return None;
    }
    // df prints a header line, then the number.
    result.stdout.lines().nth(1)?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_df_reports_space_for_cwd() {
        let avail = df_available_bytes(Path::new(".")).unwrap();
        assert!(avail > 0);
    }

    #[test]
    fn test_check_produces_a_verdict() {
        let check = check_disk_space(Path::new("."));
        assert_eq!(check.label, "Disk space");
        assert!(!check.detail.is_empty());
    }

    #[test]
    fn test_threshold_is_15_gb() {
        assert_eq!(MIN_FREE_BYTES, 15 * 1024 * 1024 * 1024);
    }
}
