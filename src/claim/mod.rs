//! Claim service: wire contract and client seam.
//!
//! DESIGN
//! ======
//! The remote service is a black box reached by one `POST /claim-quest`.
//! `ClaimService` is the seam the workflow talks to; `http` is the real
//! client. Body parsing lives in `parse_claim_body` so every response shape
//! can be tested without a network.

pub mod http;
pub mod workflow;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entity::Position;

pub use workflow::{ClaimStatus, ClaimWorkflow};


/// Path of the claim endpoint relative to the service base URL.
pub const CLAIM_PATH: &str = "/claim-quest";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    /// The request never produced a response.
    #[error("claim request failed: {0}")]
    Transport(String),

    /// The service answered with a non-2xx status.
    #[error("claim service returned status {status}")]
    Status { status: u16, body: String },

    /// A 2xx body did not match the expected shape.
    #[error("claim response parse failed: {0}")]
    Parse(String),

    /// The service answered 2xx but reported the claim as unsuccessful.
    #[error("claim rejected by service: {}", .0.as_deref().unwrap_or("no reason given"))]
    Rejected(Option<String>),

    /// No answer within the configured bound.
    #[error("claim timed out after {limit:?}")]
    Timeout { limit: Duration },

    /// The HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ClaimError {
    /// Stable short code for logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "E_CLAIM_TRANSPORT",
            Self::Status { .. } => "E_CLAIM_STATUS",
            Self::Parse(_) => "E_CLAIM_PARSE",
            Self::Rejected(_) => "E_CLAIM_REJECTED",
            Self::Timeout { .. } => "E_CLAIM_TIMEOUT",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub longitude: f64,
    pub latitude: f64,
}

impl From<Position> for Location {
    fn from(p: Position) -> Self {
        let (longitude, latitude) = p.lng_lat();
        Self { longitude, latitude }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub quest_id: String,
    pub location: Location,
    pub user_seed: String,
    pub secret_name: String,
}

/// Session-scoped identifying fields bound into every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claimant {
    pub quest_id: String,
    pub user_seed: String,
    pub secret_name: String,
}

impl Claimant {
    #[must_use]
    pub fn request_at(&self, position: Position) -> ClaimRequest {
        ClaimRequest {
            quest_id: self.quest_id.clone(),
            location: position.into(),
            user_seed: self.user_seed.clone(),
            secret_name: self.secret_name.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimBody {
    success: bool,
    #[serde(default)]
    data: Option<ClaimData>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimData {
    transaction_hash: String,
}

/// A successful claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReceipt {
    /// Explorer URL of the transaction.
    pub transaction_url: String,
    /// Trailing path segment of `transaction_url`.
    pub reference: String,
}

impl ClaimReceipt {
    #[must_use]
    pub fn new(transaction_url: String) -> Self {
        let reference = transaction_reference(&transaction_url).to_string();
        Self { transaction_url, reference }
    }
}

/// Last non-empty path segment of a transaction URL.
#[must_use]
pub fn transaction_reference(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}

// =============================================================================
// PARSING
// =============================================================================

/// Interpret a 2xx response body.
///
/// # Errors
///
/// `ClaimError::Rejected` when the body reports `success: false`, or
/// `ClaimError::Parse` when it is malformed.
pub fn parse_claim_body(json: &str) -> Result<ClaimReceipt, ClaimError> {
    let body: ClaimBody = serde_json::from_str(json).map_err(|e| ClaimError::Parse(e.to_string()))?;
    if !body.success {
        return Err(ClaimError::Rejected(body.message.or(body.error)));
    }
    let data = body.data.ok_or_else(|| ClaimError::Parse("missing data.transactionHash".into()))?;
    Ok(ClaimReceipt::new(data.transaction_hash))
}

// =============================================================================
// SERVICE
// =============================================================================

#[async_trait]
pub trait ClaimService: Send + Sync {
    /// Submit one claim. Implementations must not retry.
    ///
    /// # Errors
    ///
    /// Any transport, status or body failure as a `ClaimError`.
    async fn claim(&self, request: &ClaimRequest) -> Result<ClaimReceipt, ClaimError>;
}
