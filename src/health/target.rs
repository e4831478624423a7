//! What the probe talks to.

use async_trait::async_trait;
use url::Url;

use crate::resilience::error::BackendError;

/// A dependency endpoint that can be probed with one minimal,
/// side-effect-free request.
#[async_trait]
pub trait ProbeTarget: Send + Sync {
    /// Issue the request. `Ok` means the backend answered successfully.
    async fn probe(&self) -> Result<(), BackendError>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// Probes `GET {base_url}{path}` over HTTP. A path prefix on `base_url`
/// (e.g. `/api`) is kept.
#[derive(Debug, Clone)]
pub struct HttpProbeTarget {
    client: reqwest::Client,
    url: Url,
}

impl HttpProbeTarget {
    pub fn new(base_url: &str, path: &str) -> Result<Self, url::ParseError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let prefixed = format!("{}/", base.path());
            base.set_path(&prefixed);
        }
        let url = base.join(path.trim_start_matches('/'))?;
        Ok(Self {
            client: reqwest::Client::new(),
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ProbeTarget for HttpProbeTarget {
    async fn probe(&self) -> Result<(), BackendError> {
        let response = self
            .client
            .get(self.url.clone())
            .header(reqwest::header::USER_AGENT, "backend-guard-health-check")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BackendError::http(
                status.as_u16(),
                status.canonical_reason().unwrap_or("unexpected status"),
            ))
        }
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}
