//! Resident-memory telemetry
//!
//! The serverless runtime kills an invocation without warning once it crosses
//! its memory ceiling, so each heavy stage logs the resident set it reached.

use tracing::{debug, info};

const STATUS_PATH: &str = "/proc/self/status";

/// Resident set size of this process in megabytes, where the OS reports it.
pub fn resident_memory_mb() -> Option<u64> {
    let status = std::fs::read_to_string(STATUS_PATH).ok()?;
    parse_vm_rss_kb(&status).map(|kb| kb / 1024)
}

fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

/// Log resident memory after `stage`.
pub fn log_memory(stage: &str) {
    match resident_memory_mb() {
        Some(rss_mb) => info!(stage, rss_mb, "memory"),
        None => debug!(stage, "resident memory unavailable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vm_rss_line() {
        let status = "Name:\tbootstrap\nVmPeak:\t  204800 kB\nVmRSS:\t  102400 kB\nThreads:\t4\n";
        assert_eq!(parse_vm_rss_kb(status), Some(102_400));
        assert_eq!(parse_vm_rss_kb("Name:\tbootstrap\n"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn reads_own_resident_set() {
        assert!(resident_memory_mb().is_some());
    }
}
