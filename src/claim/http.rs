//! reqwest-backed claim client.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{CLAIM_PATH, ClaimError, ClaimReceipt, ClaimRequest, ClaimService, parse_claim_body};

#[cfg(test)]
#[path = "http_test.rs"]
mod http_test;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

pub struct HttpClaimService {
    http: reqwest::Client,
    endpoint: String,
    request_timeout: Duration,
}

impl HttpClaimService {
    /// Build a client posting to `{base_url}/claim-quest`.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::HttpClientBuild` if the client cannot be built.
    pub fn new(base_url: &str, timeouts: ClaimTimeouts) -> Result<Self, ClaimError> {
        let request_timeout = Duration::from_secs(timeouts.request_secs);
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ClaimError::HttpClientBuild(e.to_string()))?;
        let endpoint = format!("{}{CLAIM_PATH}", base_url.trim_end_matches('/'));
        Ok(Self { http, endpoint, request_timeout })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ClaimService for HttpClaimService {
    async fn claim(&self, request: &ClaimRequest) -> Result<ClaimReceipt, ClaimError> {
        debug!(endpoint = %self.endpoint, quest_id = %request.quest_id, "posting claim");

        let response = self.http.post(&self.endpoint).json(request).send().await.map_err(|e| {
            if e.is_timeout() {
                ClaimError::Timeout { limit: self.request_timeout }
            } else {
                ClaimError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| ClaimError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ClaimError::Status { status: status.as_u16(), body: text });
        }

        parse_claim_body(&text)
    }
}
