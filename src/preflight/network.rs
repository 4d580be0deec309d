//! Network reachability.
//!
//! Downloads come from the kernel.org CDN; probe it before promising a
//! build. The probe uses `wget --spider`, which requests the resource
//! without downloading it, so no HTTP client dependency is needed beyond
//! the wget the pipeline already requires.

use super::Check;
use crate::config::{KERNEL_TARBALL_ENV, KERNEL_URL};

/// Host named in check output.
const CDN_HOST: &str = "cdn.kernel.org";

/// Probe the kernel CDN.
pub async fn check_network() -> Check {
    let probe = tokio::process::Command::new("wget")
        .args(["--spider", "--quiet", "--tries=1", "--timeout=10", KERNEL_URL])
        .output()
        .await;

    match probe {
        Ok(output) if output.status.success() => {
            Check::pass("Network", format!("{} reachable", CDN_HOST))
        }
        Ok(_) => Check::fail(
            "Network",
            format!("{} not reachable", CDN_HOST),
            format!(
                "Check connectivity, or set {} to a local tarball for offline builds",
                KERNEL_TARBALL_ENV
            ),
        ),
        Err(e) => Check::fail(
            "Network",
            format!("could not run wget: {}", e),
            "Install wget; downloads need it too",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_targets_the_download_host() {
        assert!(KERNEL_URL.contains(CDN_HOST));
    }
}
