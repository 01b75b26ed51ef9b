use crate::service::ServiceSummary;
use serde::Serialize;

/// Reply to a single-service action (start, stop, restart, health).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceActionResponse {
    pub service: ServiceSummary,
    pub message: String,
}

impl ServiceActionResponse {
    pub fn new(service: ServiceSummary, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}
