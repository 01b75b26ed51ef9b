//! Per-service health and uptime statistics.

use super::ResourceUsage;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Number of recent checks kept for latency history and the error rate.
pub const METRICS_WINDOW: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UptimeStatistics {
    pub starts: u64,
    pub unexpected_exits: u64,
    /// Sum of all completed run sessions.
    pub total_uptime_secs: u64,
    /// Length of the most recently completed session.
    pub last_session_secs: u64,
}

impl UptimeStatistics {
    pub fn record_session(&mut self, session: Duration) {
        let secs = session.as_secs();
        self.total_uptime_secs = self.total_uptime_secs.saturating_add(secs);
        self.last_session_secs = secs;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetrics {
    pub request_count: u64,
    pub error_count: u64,
    /// Failure ratio over the last [`METRICS_WINDOW`] checks, in `0.0..=1.0`.
    pub error_rate: f64,
    /// Latencies of the last [`METRICS_WINDOW`] checks, in milliseconds.
    pub response_times: VecDeque<u64>,
    pub uptime: UptimeStatistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceUsage>,
    #[serde(skip)]
    recent_outcomes: VecDeque<bool>,
}

impl ServiceMetrics {
    /// Record one health probe.
    pub fn record_check(&mut self, latency: Duration, success: bool) {
        self.request_count += 1;
        if !success {
            self.error_count += 1;
        }

        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        if self.response_times.len() == METRICS_WINDOW {
            self.response_times.pop_front();
        }
        self.response_times.push_back(millis);

        if self.recent_outcomes.len() == METRICS_WINDOW {
            self.recent_outcomes.pop_front();
        }
        self.recent_outcomes.push_back(success);

        let failures = self.recent_outcomes.iter().filter(|ok| !**ok).count();
        self.error_rate = failures as f64 / self.recent_outcomes.len() as f64;
    }

    /// Mean of the recorded latencies, if any.
    pub fn average_response_ms(&self) -> Option<f64> {
        if self.response_times.is_empty() {
            return None;
        }
        let sum: u64 = self.response_times.iter().sum();
        Some(sum as f64 / self.response_times.len() as f64)
    }
}
