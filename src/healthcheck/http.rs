use super::{HealthProbe, ProbeOutcome};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;

/// Global shared HTTP client for health checks.
///
/// One connection pool for every service. The client timeout is only a
/// fallback; each request sets its own.
static SHARED_HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

fn get_shared_client() -> &'static Client {
    SHARED_HTTP_CLIENT.get_or_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            })
    })
}

/// Validate that a URL is well-formed and uses HTTP/HTTPS scheme.
pub fn validate_url(url: &str) -> Result<()> {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                return Err(Error::Config(format!(
                    "Invalid health URL '{}': scheme must be http or https, got '{}'",
                    url, scheme
                )));
            }
            Ok(())
        }
        Err(e) => Err(Error::Config(format!(
            "Invalid health URL '{}': {}",
            url, e
        ))),
    }
}

/// Production probe: `GET url` on the shared client.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpProbe;

impl HttpProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        if let Err(e) = validate_url(url) {
            return ProbeOutcome::failed(e.to_string());
        }

        match get_shared_client().get(url).timeout(timeout).send().await {
            Ok(response) => ProbeOutcome::status(response.status().as_u16()),
            Err(e) if e.is_timeout() => {
                ProbeOutcome::failed(format!("timed out after {:?}", timeout))
            }
            Err(e) => ProbeOutcome::failed(e.to_string()),
        }
    }
}
