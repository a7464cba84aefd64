//! Claim workflow controller.
//!
//! DESIGN
//! ======
//! A small state machine over at most one `ClaimSession`:
//!
//! ```text
//! idle ──select──▶ selected ──submit──▶ submitting ──▶ succeeded ──(auto)──▶ idle
//!                     ▲                      │
//!                     └──────retry───── failed
//! any ──close──▶ idle
//! ```
//!
//! Submission is split in two so the host can keep dispatching events while
//! the request is in flight: `begin_submit` flips to `submitting`
//! synchronously and hands back a `PendingClaim`; `complete` applies the
//! outcome. Each pending claim carries a `ClaimTicket` (session id plus
//! attempt number) and `complete` drops outcomes whose ticket no longer
//! matches, so a late response cannot revive a closed session.
//!
//! A success closes the session at once; its receipt stays readable through
//! `last_receipt` until the next `select` or `close`.

use std::time::Duration;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{ClaimError, ClaimReceipt, ClaimRequest, ClaimService, Claimant};
use crate::entity::{EntityId, MapEntity, Position};
use crate::notify::{DEFAULT_DURATION_MS, Notification, Notifier, Variant};

#[cfg(test)]
#[path = "workflow_test.rs"]
mod workflow_test;

pub const SUCCESS_TITLE: &str = "Quest Claimed Successfully! 🎉";
pub const FAILURE_TITLE: &str = "Error Claiming Quest";
pub const FAILURE_MESSAGE: &str = "Something went wrong while claiming your quest. Please try again.";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStatus {
    Idle,
    Selected,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("cannot {op} while {from:?}")]
    InvalidTransition { op: &'static str, from: ClaimStatus },

    #[error("{0} cannot be claimed")]
    NotClaimable(EntityId),
}

/// Identifies one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimTicket {
    session: Uuid,
    attempt: u32,
}

/// A submission that has been started but not yet resolved.
#[derive(Debug, Clone)]
pub struct PendingClaim {
    pub ticket: ClaimTicket,
    pub request: ClaimRequest,
}

/// What `complete` did with an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Claimed; the session has been closed.
    Succeeded(ClaimReceipt),
    /// The attempt failed; the session stays open in `failed`.
    Failed(ClaimError),
    /// The outcome belonged to a closed or superseded attempt.
    Stale,
}

struct ClaimSession {
    id: Uuid,
    entity: MapEntity,
    status: ClaimStatus,
    attempt: u32,
    last_error: Option<String>,
}

// =============================================================================
// WORKFLOW
// =============================================================================

pub struct ClaimWorkflow {
    session: Option<ClaimSession>,
    claimant: Claimant,
    notifier: Box<dyn Notifier>,
    timeout: Duration,
    requests_issued: u64,
    /// Receipt of the last successful claim. Outlives the auto-close and is
    /// cleared by the next `select` or `close`.
    last_receipt: Option<ClaimReceipt>,
}

impl ClaimWorkflow {
    #[must_use]
    pub fn new(claimant: Claimant, notifier: Box<dyn Notifier>, timeout: Duration) -> Self {
        Self { session: None, claimant, notifier, timeout, requests_issued: 0, last_receipt: None }
    }

    #[must_use]
    pub fn status(&self) -> ClaimStatus {
        self.session.as_ref().map_or(ClaimStatus::Idle, |s| s.status)
    }

    #[must_use]
    pub fn selected(&self) -> Option<&MapEntity> {
        self.session.as_ref().map(|s| &s.entity)
    }

    /// User-facing message of the last failed attempt.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.session.as_ref()?.last_error.as_deref()
    }

    #[must_use]
    pub fn last_receipt(&self) -> Option<&ClaimReceipt> {
        self.last_receipt.as_ref()
    }

    /// Whether the claim control should be enabled.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.status == ClaimStatus::Selected && s.entity.is_claimable())
    }

    /// Total outbound requests started by this workflow.
    #[must_use]
    pub fn requests_issued(&self) -> u64 {
        self.requests_issued
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // --- Transitions ---

    /// Open the detail view for `entity`, starting a new session.
    ///
    /// # Errors
    ///
    /// Rejected while a claim is in flight.
    pub fn select(&mut self, entity: MapEntity) -> Result<(), WorkflowError> {
        let from = self.status();
        if from == ClaimStatus::Submitting {
            return Err(WorkflowError::InvalidTransition { op: "select", from });
        }
        debug!(entity = %entity.entity_id(), ?from, "claim target selected");
        self.last_receipt = None;
        self.session = Some(ClaimSession {
            id: Uuid::new_v4(),
            entity,
            status: ClaimStatus::Selected,
            attempt: 0,
            last_error: None,
        });
        Ok(())
    }

    /// Back to `idle` from any state. An in-flight response is ignored.
    pub fn close(&mut self) {
        self.last_receipt = None;
        if let Some(session) = self.session.take() {
            debug!(session = %session.id, status = ?session.status, "claim session closed");
        }
    }

    /// `failed → selected`, keeping the selection.
    ///
    /// # Errors
    ///
    /// Valid only from `failed`.
    pub fn retry(&mut self) -> Result<(), WorkflowError> {
        let from = self.status();
        let Some(session) = self.session.as_mut().filter(|s| s.status == ClaimStatus::Failed) else {
            return Err(WorkflowError::InvalidTransition { op: "retry", from });
        };
        session.status = ClaimStatus::Selected;
        session.last_error = None;
        Ok(())
    }

    /// Move to `submitting` and build the one request for this attempt.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless `selected` (in particular while already
    /// submitting, so no second request is built), or `NotClaimable` when the
    /// selection is not a token.
    pub fn begin_submit(&mut self, viewer: Position) -> Result<PendingClaim, WorkflowError> {
        let from = self.status();
        let Some(session) = self.session.as_mut().filter(|s| s.status == ClaimStatus::Selected) else {
            return Err(WorkflowError::InvalidTransition { op: "submit", from });
        };
        if !session.entity.is_claimable() {
            return Err(WorkflowError::NotClaimable(session.entity.entity_id()));
        }

        session.status = ClaimStatus::Submitting;
        session.attempt += 1;
        self.requests_issued += 1;

        let ticket = ClaimTicket { session: session.id, attempt: session.attempt };
        info!(session = %session.id, attempt = session.attempt, entity = %session.entity.entity_id(), "claim submitted");
        Ok(PendingClaim { ticket, request: self.claimant.request_at(viewer) })
    }

    /// Apply the outcome of the attempt identified by `ticket`.
    pub fn complete(&mut self, ticket: ClaimTicket, outcome: Result<ClaimReceipt, ClaimError>) -> Resolution {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|s| s.id == ticket.session && s.attempt == ticket.attempt && s.status == ClaimStatus::Submitting)
        else {
            warn!(session = %ticket.session, attempt = ticket.attempt, "dropping stale claim response");
            return Resolution::Stale;
        };

        match outcome {
            Ok(receipt) => {
                session.status = ClaimStatus::Succeeded;
                info!(session = %session.id, reference = %receipt.reference, "quest claimed");
                self.notifier.notify(Notification {
                    variant: Variant::Default,
                    title: SUCCESS_TITLE.into(),
                    description: format!("Transaction Hash: {} ({})", receipt.reference, receipt.transaction_url),
                    duration_ms: DEFAULT_DURATION_MS,
                });
                self.close();
                self.last_receipt = Some(receipt.clone());
                Resolution::Succeeded(receipt)
            }
            Err(e) => {
                session.status = ClaimStatus::Failed;
                session.last_error = Some(FAILURE_MESSAGE.into());
                error!(session = %session.id, code = e.error_code(), error = %e, "claim failed");
                self.notifier.notify(Notification {
                    variant: Variant::Destructive,
                    title: FAILURE_TITLE.into(),
                    description: FAILURE_MESSAGE.into(),
                    duration_ms: DEFAULT_DURATION_MS,
                });
                Resolution::Failed(e)
            }
        }
    }

    /// Submit and await the outcome in one call.
    ///
    /// # Errors
    ///
    /// As for `begin_submit`; service failures become `Resolution::Failed`.
    pub async fn submit(&mut self, viewer: Position, service: &dyn ClaimService) -> Result<Resolution, WorkflowError> {
        let pending = self.begin_submit(viewer)?;
        let outcome = run_claim(service, &pending.request, self.timeout).await;
        Ok(self.complete(pending.ticket, outcome))
    }
}

/// Call the service once, bounded by `limit`.
///
/// # Errors
///
/// The service's error, or `ClaimError::Timeout` when `limit` elapses.
pub async fn run_claim(
    service: &dyn ClaimService,
    request: &ClaimRequest,
    limit: Duration,
) -> Result<ClaimReceipt, ClaimError> {
    match tokio::time::timeout(limit, service.claim(request)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ClaimError::Timeout { limit }),
    }
}
