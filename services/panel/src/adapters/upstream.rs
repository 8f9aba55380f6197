//! services/panel/src/adapters/upstream.rs
//!
//! This module contains the upstream adapter, which is the concrete
//! implementation of the `LeadRepository` and `AuthGateway` ports. It talks to
//! the recommendation service's REST API: JSON bodies, bearer authorization,
//! and the `ResponseStatus`/`Message`/`ResponseData` envelope on every reply.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::error;

use lead_review_core::domain::{Identity, Lead, LeadPage, LeadQuery, PasswordChange, Product};
use lead_review_core::ports::{AuthGateway, LeadRepository, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter for the upstream recommendation service.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    /// Creates a new `UpstreamClient` against the given base URL.
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Posts a JSON body and decodes the enveloped reply. All upstream
    /// endpoints are POST; `token` is attached as a bearer credential when
    /// the endpoint requires one.
    async fn post<T, B>(&self, path: &str, token: Option<&str>, body: &B) -> PortResult<Envelope<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.http.post(&url).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| {
            error!("Request to {} failed: {}", url, e);
            PortError::Transport(e.to_string())
        })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PortError::Transport(e.to_string()))?;
        decode_envelope(status, &text)
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

/// The reply envelope every upstream endpoint uses. A `"failure"` status is
/// an application-level error even when the HTTP status is 2xx.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "ResponseStatus")]
    response_status: String,
    #[serde(rename = "Message", default)]
    message: Option<String>,
    #[serde(rename = "ResponseData")]
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "The request could not be completed".to_string())
    }
}

/// Decodes one upstream exchange into the port error taxonomy. A transport
/// 401 is terminal for the session; everything else is either recoverable
/// or a lookup/state refusal.
fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &str) -> PortResult<Envelope<T>> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(PortError::Unauthorized);
    }
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("Message").and_then(|m| m.as_str()).map(String::from));
    if status == StatusCode::NOT_FOUND {
        return Err(PortError::NotFound(
            message.unwrap_or_else(|| "Not found".to_string()),
        ));
    }
    if status == StatusCode::CONFLICT {
        return Err(PortError::InvalidState(
            message.unwrap_or_else(|| "The lead has already been decided".to_string()),
        ));
    }
    if !status.is_success() {
        return Err(PortError::Failure(
            message.unwrap_or_else(|| format!("Upstream returned {}", status)),
        ));
    }
    let envelope: Envelope<T> = serde_json::from_str(body).map_err(|e| {
        PortError::Transport(format!("Could not decode upstream response: {}", e))
    })?;
    if envelope.response_status == "failure" {
        return Err(PortError::Failure(envelope.message()));
    }
    Ok(envelope)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LeadIdBody {
    lead_id: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DecisionBody {
    lead_id: i64,
    /// Omitted entirely for a reject-all, matching the upstream contract.
    #[serde(skip_serializing_if = "Option::is_none")]
    approved_product: Option<Vec<Product>>,
}

#[derive(Serialize)]
struct CredentialsBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct OtpBody<'a> {
    email: &'a str,
    otp: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordBody<'a> {
    user_id: i64,
    current_password: &'a str,
    new_password: &'a str,
    confirm_password: &'a str,
}

#[derive(Serialize)]
struct ForgotPasswordBody<'a> {
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordBody<'a> {
    token: &'a str,
    request_type: &'a str,
    new_password: &'a str,
    confirm_password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResetTokenBody<'a> {
    token: &'a str,
    request_type: &'a str,
}

/// The token payload returned by sign-in and OTP verification.
#[derive(Debug, Deserialize)]
struct SignInData {
    #[serde(rename = "UserId")]
    user_id: i64,
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "Token")]
    token: String,
    #[serde(rename = "RefreshToken")]
    refresh_token: String,
    #[serde(rename = "TokenExpiry")]
    token_expiry: i64,
    #[serde(rename = "RefreshTokenExpiry")]
    refresh_token_expiry: i64,
}

impl SignInData {
    /// Expiries arrive as unix timestamps in seconds.
    fn into_identity(self, email: &str) -> PortResult<Identity> {
        let token_expiry = timestamp(self.token_expiry)?;
        let refresh_token_expiry = timestamp(self.refresh_token_expiry)?;
        Ok(Identity {
            user_id: self.user_id,
            name: self.username,
            email: email.to_string(),
            token: self.token,
            refresh_token: self.refresh_token,
            token_expiry,
            refresh_token_expiry,
        })
    }
}

fn timestamp(seconds: i64) -> PortResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .ok_or_else(|| PortError::Transport(format!("Invalid expiry timestamp {}", seconds)))
}

fn data_or_transport<T>(envelope: Envelope<T>) -> PortResult<T> {
    envelope
        .data
        .ok_or_else(|| PortError::Transport("Response carried no ResponseData".to_string()))
}

//=========================================================================================
// `LeadRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl LeadRepository for UpstreamClient {
    async fn list_leads(&self, token: &str, query: &LeadQuery) -> PortResult<LeadPage> {
        let envelope = self
            .post::<LeadPage, _>("lead/list", Some(token), query)
            .await?;
        data_or_transport(envelope)
    }

    async fn get_lead(&self, token: &str, lead_id: i64) -> PortResult<Lead> {
        let envelope = self
            .post::<Lead, _>("lead/getById", Some(token), &LeadIdBody { lead_id })
            .await?;
        envelope
            .data
            .ok_or_else(|| PortError::NotFound(format!("Lead {} was not found", lead_id)))
    }

    async fn submit_decision(
        &self,
        token: &str,
        lead_id: i64,
        approved: Option<Vec<Product>>,
    ) -> PortResult<()> {
        let body = DecisionBody {
            lead_id,
            approved_product: approved,
        };
        self.post::<serde_json::Value, _>("lead/saveApproveProduct", Some(token), &body)
            .await?;
        Ok(())
    }
}

//=========================================================================================
// `AuthGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthGateway for UpstreamClient {
    async fn sign_in(&self, email: &str, password: &str) -> PortResult<Identity> {
        let envelope = self
            .post::<SignInData, _>("auth/signin", None, &CredentialsBody { email, password })
            .await?;
        data_or_transport(envelope)?.into_identity(email)
    }

    async fn verify_otp(&self, email: &str, otp: &str) -> PortResult<Identity> {
        let envelope = self
            .post::<SignInData, _>("auth/verifyOtp", None, &OtpBody { email, otp })
            .await?;
        data_or_transport(envelope)?.into_identity(email)
    }

    async fn change_password(
        &self,
        token: &str,
        user_id: i64,
        change: &PasswordChange,
    ) -> PortResult<String> {
        let body = ChangePasswordBody {
            user_id,
            current_password: &change.current_password,
            new_password: &change.new_password,
            confirm_password: &change.confirm_password,
        };
        let envelope = self
            .post::<serde_json::Value, _>("auth/changePassword", Some(token), &body)
            .await?;
        Ok(envelope.message())
    }

    async fn send_password_reset(&self, email: &str) -> PortResult<String> {
        let envelope = self
            .post::<serde_json::Value, _>("auth/forgotPassword", None, &ForgotPasswordBody { email })
            .await?;
        Ok(envelope.message())
    }

    async fn verify_reset_token(&self, reset_token: &str) -> PortResult<()> {
        let body = VerifyResetTokenBody {
            token: reset_token,
            request_type: "forgotpassword",
        };
        self.post::<serde_json::Value, _>("auth/verifyResetToken", None, &body)
            .await?;
        Ok(())
    }

    async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> PortResult<String> {
        let body = ResetPasswordBody {
            token: reset_token,
            request_type: "forgotpassword",
            new_password,
            confirm_password,
        };
        let envelope = self
            .post::<serde_json::Value, _>("auth/resetPassword", None, &body)
            .await?;
        Ok(envelope.message())
    }
}
