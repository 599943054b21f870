//! HTTP client for the content API's identity endpoints.
//!
//! This module provides the `ApiClient` struct, the production `AuthApi`
//! implementation used by the admin dashboard.

use std::time::Duration;

use anyhow::Result;
use reqwest::{header, Client, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::UserProfile;

use super::{ApiError, AuthApi, LoginResponse, SessionCheck};

// ============================================================================
// Constants
// ============================================================================

/// Endpoint exchanging credentials for a token
const LOGIN_PATH: &str = "/auth/login";

/// Endpoint confirming a bearer token is still valid
const SESSION_PATH: &str = "/auth/session";

/// Endpoint invalidating a bearer token
const LOGOUT_PATH: &str = "/auth/logout";

/// HTTP request timeout in seconds.
/// Startup verification blocks the first route decision, so fail reasonably fast.
const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// API client for the content API.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Interpret a 2xx login body.
    ///
    /// Accepts `{token, user}` at the top level or wrapped in `data`. An
    /// `error` member means the service refused even though the status was 2xx.
    fn parse_login_body(body: &str) -> Result<LoginResponse, ApiError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse login response: {}", e)))?;

        if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
            let message = error
                .as_str()
                .or_else(|| error.get("message").and_then(Value::as_str))
                .map(str::to_string)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "Login failed".to_string());
            return Err(ApiError::Rejected(message));
        }

        let payload = value
            .get("data")
            .filter(|data| data.is_object())
            .unwrap_or(&value);

        let token = payload
            .get("token")
            .and_then(Value::as_str)
            .map(str::to_string);

        let user = payload.get("user").filter(|u| !u.is_null()).and_then(|user| {
            serde_json::from_value::<UserProfile>(user.clone())
                .map_err(|e| warn!(error = %e, "Discarding unparseable user in login response"))
                .ok()
        });

        Ok(LoginResponse { token, user })
    }

    /// Classify the session endpoint's answer: 2xx keeps the token, 401/403
    /// reject it, anything else is a failure to verify.
    fn session_check(status: StatusCode, body: &str) -> Result<SessionCheck, ApiError> {
        match status.as_u16() {
            200..=299 => Ok(SessionCheck::Valid),
            401 | 403 => {
                debug!(%status, "Session rejected by server");
                Ok(SessionCheck::Rejected)
            }
            _ => Err(ApiError::from_status(status, body)),
        }
    }
}

impl AuthApi for ApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let url = self.url(LOGIN_PATH);
        debug!(%url, "Sending login request");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::from_rejection(status, &body));
        }

        Self::parse_login_body(&body)
    }

    async fn get_session(&self, token: &str) -> Result<SessionCheck, ApiError> {
        let url = self.url(SESSION_PATH);
        debug!(%url, "Verifying session token");

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::session_check(status, &body)
    }

    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        let url = self.url(LOGOUT_PATH);

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .bearer_auth(token)
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }
}
