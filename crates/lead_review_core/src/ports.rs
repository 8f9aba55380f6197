//! crates/lead_review_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the review workflow's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete HTTP client that talks to the upstream
//! recommendation service.

use async_trait::async_trait;

use crate::domain::{Identity, Lead, LeadPage, LeadQuery, PasswordChange, Product};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
///
/// The variants mirror the distinctions the workflow actually has to act on:
/// a transport-level 401 terminates the session, an application-level
/// `"failure"` envelope is recoverable, and a decision against an
/// already-decided lead is rejected outright.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Bearer token missing, expired, or rejected. The session must be torn down.
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A terminal decision was attempted on a lead that is no longer pending.
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// The upstream answered 2xx but flagged the operation as failed.
    #[error("{0}")]
    Failure(String),
    /// Network or decode error; the operation may be retried.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Access to the lead collection held by the upstream recommendation service.
///
/// Every call takes the caller's bearer token explicitly; there is no ambient
/// session state behind this boundary.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Fetches one page of leads. Search matching and ordering are
    /// server-side; the page number is 1-based.
    async fn list_leads(&self, token: &str, query: &LeadQuery) -> PortResult<LeadPage>;

    /// Fetches a single lead. Fails with `NotFound` when the id does not
    /// resolve to a lead visible to the caller.
    async fn get_lead(&self, token: &str, lead_id: i64) -> PortResult<Lead>;

    /// Submits the terminal decision for a lead. `Some(products)` accepts
    /// that subset; `None` rejects the whole recommendation set. The
    /// upstream service is the authority on re-decision: a non-pending
    /// lead yields `InvalidState` regardless of what the caller believes.
    async fn submit_decision(
        &self,
        token: &str,
        lead_id: i64,
        approved: Option<Vec<Product>>,
    ) -> PortResult<()>;
}

/// Credential and password operations forwarded to the upstream auth endpoints.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Exchanges credentials for an authenticated identity.
    async fn sign_in(&self, email: &str, password: &str) -> PortResult<Identity>;

    /// Second login step: verifies the one-time code sent to the operator.
    async fn verify_otp(&self, email: &str, otp: &str) -> PortResult<Identity>;

    /// Changes the password for the given user. Returns the upstream's
    /// human-readable confirmation message.
    async fn change_password(
        &self,
        token: &str,
        user_id: i64,
        change: &PasswordChange,
    ) -> PortResult<String>;

    /// Requests a password-reset mail for the given address.
    async fn send_password_reset(&self, email: &str) -> PortResult<String>;

    /// Checks that a reset token is still valid before the reset form is shown.
    async fn verify_reset_token(&self, reset_token: &str) -> PortResult<()>;

    /// Completes a password reset using a token from the reset mail.
    async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> PortResult<String>;
}
