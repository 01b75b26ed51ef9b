//! Resource usage sampling for supervised JVM processes.
//!
//! - **Linux**: parsed from `/proc/{pid}/stat`, `/proc/{pid}/status` and `/proc/uptime`
//! - **macOS**: parsed from `ps -o rss=,vsz=,%cpu=,thcount=`
//! - **Other platforms**: every field is `None`
//!
//! CPU percentage is the lifetime average since the process started, not an
//! instantaneous rate.

use serde::{Deserialize, Serialize};

/// Clock ticks per second assumed for `/proc` jiffies.
#[cfg(target_os = "linux")]
const CLOCK_TICKS: f64 = 100.0;

#[cfg(target_os = "linux")]
const PAGE_SIZE: u64 = 4096;

/// A point-in-time resource sample of one process.
///
/// Fields are `None` when the value could not be read (process gone,
/// permission denied, unsupported platform).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsage {
    /// Resident set size in bytes.
    pub memory_rss_bytes: Option<u64>,

    /// Virtual memory size in bytes.
    pub memory_vsz_bytes: Option<u64>,

    /// Per-core percentage, so it can exceed 100 on multi-core machines.
    pub cpu_percent: Option<f64>,

    pub thread_count: Option<u64>,
}

impl ResourceUsage {
    /// Sample the process `pid`. Never fails; unreadable values are `None`.
    pub async fn query(pid: u32) -> Self {
        #[cfg(target_os = "linux")]
        {
            Self::query_linux(pid).await
        }

        #[cfg(target_os = "macos")]
        {
            Self::query_macos(pid).await
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            let _ = pid;
            Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.memory_rss_bytes.is_none()
            && self.memory_vsz_bytes.is_none()
            && self.cpu_percent.is_none()
            && self.thread_count.is_none()
    }

    #[cfg(target_os = "linux")]
    async fn query_linux(pid: u32) -> Self {
        let Ok(stat) = tokio::fs::read_to_string(format!("/proc/{}/stat", pid)).await else {
            return Self::default();
        };
        let status = tokio::fs::read_to_string(format!("/proc/{}/status", pid))
            .await
            .unwrap_or_default();
        let uptime_secs = tokio::fs::read_to_string("/proc/uptime")
            .await
            .ok()
            .and_then(|s| s.split_whitespace().next()?.parse::<f64>().ok());

        Self::from_proc(&stat, &status, uptime_secs)
    }

    /// Build a sample from the text of `/proc/{pid}/stat` and `/proc/{pid}/status`.
    ///
    /// Indices below count from the state field (field 3 in `man 5 proc`),
    /// since `pid (comm)` is stripped first.
    #[cfg(target_os = "linux")]
    fn from_proc(stat: &str, status: &str, uptime_secs: Option<f64>) -> Self {
        let fields = parse_proc_stat(stat);
        if fields.is_empty() {
            return Self::default();
        }
        let field = |index: usize| fields.get(index).and_then(|s| s.parse::<u64>().ok());

        let utime = field(11);
        let stime = field(12);
        let num_threads = field(17);
        let starttime = field(19);
        let vsize = field(20);
        let rss_pages = field(21);

        let cpu_percent = match (utime, stime, starttime, uptime_secs) {
            (Some(u), Some(s), Some(start), Some(uptime)) => {
                let elapsed = uptime - start as f64 / CLOCK_TICKS;
                if elapsed > 0.0 {
                    Some(100.0 * ((u + s) as f64 / CLOCK_TICKS) / elapsed)
                } else {
                    None
                }
            }
            _ => None,
        };

        Self {
            memory_rss_bytes: parse_vmrss(status).or(rss_pages.map(|p| p * PAGE_SIZE)),
            memory_vsz_bytes: vsize,
            cpu_percent,
            thread_count: num_threads,
        }
    }

    #[cfg(target_os = "macos")]
    async fn query_macos(pid: u32) -> Self {
        let output = tokio::process::Command::new("ps")
            .args(["-p", &pid.to_string(), "-o", "rss=,vsz=,%cpu=,thcount="])
            .output()
            .await;

        let Ok(output) = output else {
            return Self::default();
        };
        if !output.status.success() {
            return Self::default();
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parts: Vec<&str> = stdout.split_whitespace().collect();
        if parts.len() < 4 {
            return Self::default();
        }

        Self {
            memory_rss_bytes: parts[0].parse::<u64>().ok().map(|kb| kb * 1024),
            memory_vsz_bytes: parts[1].parse::<u64>().ok().map(|kb| kb * 1024),
            cpu_percent: parts[2].parse::<f64>().ok(),
            thread_count: parts[3].parse::<u64>().ok(),
        }
    }

    /// Format memory bytes as human-readable string (e.g., "512.0 MB").
    pub fn format_memory(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.1} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.1} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.1} KB", bytes as f64 / KB as f64)
        } else {
            format!("{} B", bytes)
        }
    }
}

/// Split `/proc/{pid}/stat` after the `(comm)` field, which may itself
/// contain spaces and parentheses.
#[cfg(target_os = "linux")]
fn parse_proc_stat(content: &str) -> Vec<&str> {
    let Some(comm_end) = content.rfind(')') else {
        return Vec::new();
    };
    content[comm_end + 1..].split_whitespace().collect()
}

/// `VmRSS:    12345 kB` in bytes.
#[cfg(target_os = "linux")]
fn parse_vmrss(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}
