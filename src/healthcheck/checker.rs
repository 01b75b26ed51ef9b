use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw result of a single probe, before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutcome {
    /// HTTP status code, when a response arrived.
    pub http_status: Option<u16>,
    /// Transport error, when no response arrived.
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn status(code: u16) -> Self {
        Self {
            http_status: Some(code),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            http_status: None,
            error: Some(error.into()),
        }
    }

    /// A 2xx response.
    pub fn is_success(&self) -> bool {
        matches!(self.http_status, Some(code) if (200..300).contains(&code))
    }
}

/// Issues a health request against a URL.
///
/// Implementations never fail: transport errors are reported in the outcome.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome;
}
