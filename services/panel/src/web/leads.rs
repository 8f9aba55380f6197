//! services/panel/src/web/leads.rs
//!
//! Lead endpoints: the paginated list, the single-lead detail view, and the
//! terminal decision. The decision handler replays the operator's selection
//! through the review state machine before anything goes upstream, so every
//! guard (pending-only, approve/reject exclusivity, index bounds) holds on
//! the server even if the browser misbehaves. The upstream service remains
//! the final authority on re-decision.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

use crate::web::envelope::{failure_response, ApiEnvelope};
use crate::web::middleware::{authorized_failure, CurrentSession};
use crate::web::state::AppState;
use lead_review_core::domain::{LeadQuery, LeadStatus, StatusFilter};
use lead_review_core::ports::{LeadRepository, PortError};
use lead_review_core::review::{DecisionKind, LeadReview, ReviewError};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::login_handler,
        crate::web::auth::verify_otp_handler,
        crate::web::auth::logout_handler,
        crate::web::auth::change_password_handler,
        crate::web::auth::forgot_password_handler,
        crate::web::auth::verify_reset_token_handler,
        crate::web::auth::reset_password_handler,
        list_leads_handler,
        get_lead_handler,
        decide_lead_handler,
    ),
    components(schemas(
        crate::web::auth::LoginRequest,
        crate::web::auth::OtpRequest,
        crate::web::auth::ForgotPasswordRequest,
        crate::web::auth::ResetPasswordRequest,
        crate::web::auth::VerifyResetTokenRequest,
        crate::web::auth::ChangePasswordRequest,
        crate::web::auth::AuthResponse,
        ListLeadsRequest,
        GetLeadRequest,
        DecisionRequest,
    )),
    tags(
        (name = "Lead Review Panel", description = "API endpoints for reviewing AI-generated product recommendations.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct ListLeadsRequest {
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub search: String,
    /// One of `all`, `Pending`, `Accepted`, `Rejected`. Defaults to `all`.
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetLeadRequest {
    pub lead_id: i64,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub lead_id: i64,
    /// Offsets into the lead's recommended products, as fetched. `null`
    /// rejects the whole recommendation set; a non-empty list approves
    /// that subset. An empty list is invalid.
    pub approved_product_indices: Option<Vec<usize>>,
}

fn parse_status_filter(raw: Option<&str>) -> Result<StatusFilter, Response> {
    match raw.unwrap_or("all") {
        "all" => Ok(StatusFilter::All),
        "Pending" => Ok(StatusFilter::Pending),
        "Accepted" => Ok(StatusFilter::Accepted),
        "Rejected" => Ok(StatusFilter::Rejected),
        other => Err(failure_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("'{}' is not a valid status filter", other),
        )),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /lead/list - One page of the lead collection
#[utoipa::path(
    post,
    path = "/lead/list",
    request_body = ListLeadsRequest,
    responses(
        (status = 200, description = "One page of leads with the total count"),
        (status = 401, description = "Session expired"),
        (status = 422, description = "Invalid paging or filter")
    )
)]
pub async fn list_leads_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    Json(req): Json<ListLeadsRequest>,
) -> Result<Response, Response> {
    if req.page == 0 {
        return Err(failure_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Page numbers start at 1",
        ));
    }
    let query = LeadQuery {
        page: req.page,
        limit: req.limit,
        search: req.search,
        status: parse_status_filter(req.status.as_deref())?,
    };
    let page = match state
        .leads
        .list_leads(&current.identity.token, &query)
        .await
    {
        Ok(page) => page,
        Err(e) => return Err(authorized_failure(&state.sessions, current.session_id, e).await),
    };
    Ok(Json(ApiEnvelope::success(page)).into_response())
}

/// POST /lead/get - A single lead with its recommendation detail
#[utoipa::path(
    post,
    path = "/lead/get",
    request_body = GetLeadRequest,
    responses(
        (status = 200, description = "The lead record"),
        (status = 401, description = "Session expired"),
        (status = 404, description = "No such lead")
    )
)]
pub async fn get_lead_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    Json(req): Json<GetLeadRequest>,
) -> Result<Response, Response> {
    let lead = match state
        .leads
        .get_lead(&current.identity.token, req.lead_id)
        .await
    {
        Ok(lead) => lead,
        Err(e) => return Err(authorized_failure(&state.sessions, current.session_id, e).await),
    };
    Ok(Json(ApiEnvelope::success(lead)).into_response())
}

/// POST /lead/decision - Approve a subset or reject the whole recommendation
#[utoipa::path(
    post,
    path = "/lead/decision",
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Decision stored; the list view must be refetched"),
        (status = 401, description = "Session expired"),
        (status = 409, description = "The lead has already been decided"),
        (status = 422, description = "Selection invalid for this lead")
    )
)]
pub async fn decide_lead_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    Json(req): Json<DecisionRequest>,
) -> Result<Response, Response> {
    let status = match run_decision(
        state.leads.as_ref(),
        &current.identity.token,
        req.lead_id,
        req.approved_product_indices.as_deref(),
    )
    .await
    {
        Ok(status) => status,
        Err(DecisionError::Review(e)) => return Err(review_error_response(e)),
        Err(DecisionError::Port(e)) => {
            return Err(authorized_failure(&state.sessions, current.session_id, e).await)
        }
    };
    let message = match status {
        LeadStatus::Accepted => "Selected products approved",
        LeadStatus::Rejected => "Product recommendation rejected",
        LeadStatus::Pending => "Lead is still pending",
    };
    Ok(Json(ApiEnvelope::success_with_message(status, message)).into_response())
}

//=========================================================================================
// Decision Flow
//=========================================================================================

#[derive(Debug)]
pub(crate) enum DecisionError {
    Review(ReviewError),
    Port(PortError),
}

impl From<ReviewError> for DecisionError {
    fn from(e: ReviewError) -> Self {
        DecisionError::Review(e)
    }
}

/// Drives one terminal decision: fetch the lead, replay the selection through
/// the state machine, submit the resolved payload, and settle the machine
/// with the outcome. The machine's single-flight lock guarantees at most one
/// decision call leaves here per invocation; failure or success, it never
/// ends in `Submitting`.
pub(crate) async fn run_decision(
    repo: &dyn LeadRepository,
    token: &str,
    lead_id: i64,
    indices: Option<&[usize]>,
) -> Result<LeadStatus, DecisionError> {
    let lead = repo
        .get_lead(token, lead_id)
        .await
        .map_err(DecisionError::Port)?;
    let mut review = LeadReview::new(&lead);
    review.begin_selection()?;

    let kind = match indices {
        Some(indices) => {
            if indices.is_empty() {
                return Err(ReviewError::EmptySelection.into());
            }
            // A repeated offset names the same product once; replaying the
            // repeat through `toggle` would drop it from the selection.
            let indices: BTreeSet<usize> = indices.iter().copied().collect();
            for index in indices {
                review.toggle(index)?;
            }
            DecisionKind::Approve
        }
        None => DecisionKind::RejectAll,
    };

    let payload = review.begin_submit(kind)?;
    match repo
        .submit_decision(token, payload.lead_id, payload.approved)
        .await
    {
        Ok(()) => Ok(review.finish_submit(true)?),
        Err(e) => {
            // Selection survives so the operator can retry after the error.
            review.finish_submit(false)?;
            Err(DecisionError::Port(e))
        }
    }
}

fn review_error_response(err: ReviewError) -> Response {
    match err {
        ReviewError::NotPending(_) => failure_response(
            StatusCode::CONFLICT,
            "This lead has already been decided. Reload to see its latest state.",
        ),
        ReviewError::EmptySelection
        | ReviewError::SelectionNotEmpty
        | ReviewError::IndexOutOfRange { .. } => {
            failure_response(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        other => {
            error!("Unexpected review transition failure: {}", other);
            failure_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use lead_review_core::domain::{Identity, Lead, LeadPage, PasswordChange, Product};
    use lead_review_core::ports::{AuthGateway, PortResult};
    use std::sync::Mutex;

    use crate::config::Config;
    use crate::web::sessions::SessionStore;
    use crate::web::state::AppState;

    /// Stands in for the upstream service: one lead, a submission log, and
    /// programmable failures. A successful submission mutates the lead the
    /// way the upstream does, so fetch-after-decide behaves realistically.
    struct FakeLeads {
        lead: Mutex<Lead>,
        submissions: Mutex<Vec<(i64, Option<Vec<Product>>)>>,
        list_error: Mutex<Option<PortError>>,
        get_error: Mutex<Option<PortError>>,
        submit_error: Mutex<Option<PortError>>,
    }

    impl FakeLeads {
        fn new(lead: Lead) -> Self {
            Self {
                lead: Mutex::new(lead),
                submissions: Mutex::new(Vec::new()),
                list_error: Mutex::new(None),
                get_error: Mutex::new(None),
                submit_error: Mutex::new(None),
            }
        }

        fn submissions(&self) -> Vec<(i64, Option<Vec<Product>>)> {
            self.submissions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LeadRepository for FakeLeads {
        async fn list_leads(&self, _token: &str, _query: &LeadQuery) -> PortResult<LeadPage> {
            if let Some(err) = self.list_error.lock().unwrap().take() {
                return Err(err);
            }
            let lead = self.lead.lock().unwrap().clone();
            Ok(LeadPage {
                leads: vec![lead],
                total_leads: 1,
            })
        }

        async fn get_lead(&self, _token: &str, lead_id: i64) -> PortResult<Lead> {
            if let Some(err) = self.get_error.lock().unwrap().take() {
                return Err(err);
            }
            let lead = self.lead.lock().unwrap().clone();
            if lead.lead_id == lead_id {
                Ok(lead)
            } else {
                Err(PortError::NotFound(format!("Lead {} was not found", lead_id)))
            }
        }

        async fn submit_decision(
            &self,
            _token: &str,
            lead_id: i64,
            approved: Option<Vec<Product>>,
        ) -> PortResult<()> {
            if let Some(err) = self.submit_error.lock().unwrap().take() {
                return Err(err);
            }
            self.submissions
                .lock()
                .unwrap()
                .push((lead_id, approved.clone()));
            let mut lead = self.lead.lock().unwrap();
            match approved {
                Some(products) => {
                    lead.status = LeadStatus::Accepted;
                    lead.approved_product = Some(products);
                }
                None => lead.status = LeadStatus::Rejected,
            }
            lead.recommended_product = None;
            Ok(())
        }
    }

    fn product(name: &str) -> Product {
        Product {
            image: format!("v1/{name}.jpg"),
            price: "12.50".to_string(),
            name: name.to_string(),
            additional_information: String::new(),
        }
    }

    fn pending_lead(names: &[&str]) -> Lead {
        Lead {
            lead_id: 42,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            mobile_number: None,
            status: LeadStatus::Pending,
            product_query: None,
            form_data: None,
            recommended_product: Some(names.iter().map(|n| product(n)).collect()),
            approved_product: None,
        }
    }

    #[tokio::test]
    async fn approve_subset_round_trips_through_the_repository() {
        let repo = FakeLeads::new(pending_lead(&["a", "b", "c", "d", "e"]));

        let status = run_decision(&repo, "token", 42, Some(&[1, 3])).await.unwrap();
        assert_eq!(status, LeadStatus::Accepted);

        // Exactly one submission, carrying the products at offsets 1 and 3
        // in their original relative order.
        let submissions = repo.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(
            submissions[0],
            (42, Some(vec![product("b"), product("d")]))
        );

        // Fetching again shows the terminal state.
        let lead = repo.get_lead("token", 42).await.unwrap();
        assert_eq!(lead.status, LeadStatus::Accepted);
        assert_eq!(
            lead.approved_product,
            Some(vec![product("b"), product("d")])
        );
    }

    #[tokio::test]
    async fn repeated_indices_approve_each_named_product_once() {
        // `[0, 0, 1]` names products a and b; the repeat of 0 must not
        // cancel a out of the selection.
        let repo = FakeLeads::new(pending_lead(&["a", "b", "c"]));

        let status = run_decision(&repo, "token", 42, Some(&[0, 0, 1])).await.unwrap();
        assert_eq!(status, LeadStatus::Accepted);
        assert_eq!(
            repo.submissions(),
            vec![(42, Some(vec![product("a"), product("b")]))]
        );

        // A single offset repeated is still a one-product approval, not an
        // empty selection.
        let repo = FakeLeads::new(pending_lead(&["a", "b", "c"]));
        let status = run_decision(&repo, "token", 42, Some(&[1, 1])).await.unwrap();
        assert_eq!(status, LeadStatus::Accepted);
        assert_eq!(repo.submissions(), vec![(42, Some(vec![product("b")]))]);
    }

    #[tokio::test]
    async fn reject_all_submits_no_products() {
        let repo = FakeLeads::new(pending_lead(&["a", "b", "c"]));

        let status = run_decision(&repo, "token", 42, None).await.unwrap();
        assert_eq!(status, LeadStatus::Rejected);
        assert_eq!(repo.submissions(), vec![(42, None)]);
    }

    #[tokio::test]
    async fn an_already_decided_lead_is_refused_without_a_submission() {
        let mut lead = pending_lead(&["a"]);
        lead.status = LeadStatus::Accepted;
        let repo = FakeLeads::new(lead);

        let err = run_decision(&repo, "token", 42, Some(&[0])).await.unwrap_err();
        assert!(matches!(
            err,
            DecisionError::Review(ReviewError::NotPending(42))
        ));
        assert!(repo.submissions().is_empty());
    }

    #[tokio::test]
    async fn an_empty_selection_cannot_approve() {
        let repo = FakeLeads::new(pending_lead(&["a", "b"]));

        let err = run_decision(&repo, "token", 42, Some(&[])).await.unwrap_err();
        assert!(matches!(
            err,
            DecisionError::Review(ReviewError::EmptySelection)
        ));
        assert!(repo.submissions().is_empty());
    }

    #[tokio::test]
    async fn out_of_range_indices_are_refused() {
        let repo = FakeLeads::new(pending_lead(&["a", "b"]));

        let err = run_decision(&repo, "token", 42, Some(&[5])).await.unwrap_err();
        assert!(matches!(
            err,
            DecisionError::Review(ReviewError::IndexOutOfRange { index: 5, len: 2 })
        ));
        assert!(repo.submissions().is_empty());
    }

    #[tokio::test]
    async fn upstream_invalid_state_wins_over_the_local_view() {
        // The fetched lead still looks pending, but another client decided
        // it in between; the upstream refusal is final.
        let repo = FakeLeads::new(pending_lead(&["a", "b"]));
        *repo.submit_error.lock().unwrap() =
            Some(PortError::InvalidState("Already decided".to_string()));

        let err = run_decision(&repo, "token", 42, Some(&[0])).await.unwrap_err();
        assert!(matches!(
            err,
            DecisionError::Port(PortError::InvalidState(_))
        ));
        // No state was mutated by the failed attempt.
        let lead = repo.get_lead("token", 42).await.unwrap();
        assert_eq!(lead.status, LeadStatus::Pending);
    }

    #[tokio::test]
    async fn an_expired_token_surfaces_unauthorized_before_any_decision() {
        let repo = FakeLeads::new(pending_lead(&["a"]));
        *repo.get_error.lock().unwrap() = Some(PortError::Unauthorized);

        let err = run_decision(&repo, "stale-token", 42, None).await.unwrap_err();
        assert!(matches!(err, DecisionError::Port(PortError::Unauthorized)));
        assert!(repo.submissions().is_empty());
    }

    /// Auth port stand-in for handler tests that never touch it.
    struct NoAuth;

    #[async_trait]
    impl AuthGateway for NoAuth {
        async fn sign_in(&self, _email: &str, _password: &str) -> PortResult<Identity> {
            Err(PortError::Transport("not wired in this test".to_string()))
        }

        async fn verify_otp(&self, _email: &str, _otp: &str) -> PortResult<Identity> {
            Err(PortError::Transport("not wired in this test".to_string()))
        }

        async fn change_password(
            &self,
            _token: &str,
            _user_id: i64,
            _change: &PasswordChange,
        ) -> PortResult<String> {
            Err(PortError::Transport("not wired in this test".to_string()))
        }

        async fn send_password_reset(&self, _email: &str) -> PortResult<String> {
            Err(PortError::Transport("not wired in this test".to_string()))
        }

        async fn verify_reset_token(&self, _reset_token: &str) -> PortResult<()> {
            Err(PortError::Transport("not wired in this test".to_string()))
        }

        async fn reset_password(
            &self,
            _reset_token: &str,
            _new_password: &str,
            _confirm_password: &str,
        ) -> PortResult<String> {
            Err(PortError::Transport("not wired in this test".to_string()))
        }
    }

    fn identity() -> Identity {
        Identity {
            user_id: 1,
            name: "Operator".to_string(),
            email: "op@example.com".to_string(),
            token: "stale-token".to_string(),
            refresh_token: "refresh".to_string(),
            token_expiry: Utc::now() + Duration::hours(1),
            refresh_token_expiry: Utc::now() + Duration::days(1),
        }
    }

    fn test_config() -> Config {
        Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            api_url: "http://upstream.test".to_string(),
            log_level: tracing::Level::INFO,
            session_ttl_minutes: 60,
            allowed_origin: "http://localhost:3001".to_string(),
        }
    }

    #[tokio::test]
    async fn an_expired_token_during_list_ends_the_session() {
        let repo = Arc::new(FakeLeads::new(pending_lead(&["a"])));
        *repo.list_error.lock().unwrap() = Some(PortError::Unauthorized);

        let sessions = SessionStore::new(60);
        let session_id = sessions.create(identity()).await;
        let state = Arc::new(AppState {
            leads: repo,
            auth: Arc::new(NoAuth),
            sessions: sessions.clone(),
            config: Arc::new(test_config()),
        });

        let response = list_leads_handler(
            State(state),
            Extension(CurrentSession {
                session_id,
                identity: identity(),
            }),
            Json(ListLeadsRequest {
                page: 1,
                limit: 10,
                search: String::new(),
                status: None,
            }),
        )
        .await
        .unwrap_err();

        // The 401 carries a cleared cookie and the session itself is gone.
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(sessions.lookup(session_id).await.is_none());
    }
}
