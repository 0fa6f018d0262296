// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email/password authentication against Firebase Auth (Identity Toolkit).
//!
//! Handles:
//! - Sign up and sign in with email + password
//! - Keeping the current session in memory
//! - ID token refresh when close to expiry
//! - Sign out

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::time_utils::Clock;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Email and password as typed by the user.
#[derive(Debug, Clone, Validate)]
pub struct Credentials {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }

    fn check(&self) -> Result<()> {
        self.validate().map_err(|e| {
            let field = e
                .field_errors()
                .keys()
                .next()
                .map(|k| k.to_string())
                .unwrap_or_default();
            match field.as_str() {
                "email" => AppError::Auth("Please enter a valid email address".to_string()),
                "password" => {
                    AppError::Auth("Password must be at least 6 characters".to_string())
                }
                _ => AppError::Auth(e.to_string()),
            }
        })
    }
}

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user_id: String,
    pub email: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    /// Whether the ID token expires within the refresh margin.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)
    }
}

/// Identity Toolkit REST client.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    api_key: String,
    identity_url: String,
    token_url: String,
}

impl IdentityClient {
    pub fn new(api_key: String) -> Self {
        // Point at the Auth emulator when it is running.
        match std::env::var("FIREBASE_AUTH_EMULATOR_HOST") {
            Ok(host) => Self::with_base_urls(
                api_key,
                format!("http://{}/identitytoolkit.googleapis.com/v1", host),
                format!("http://{}/securetoken.googleapis.com/v1", host),
            ),
            Err(_) => Self::with_base_urls(
                api_key,
                "https://identitytoolkit.googleapis.com/v1".to_string(),
                "https://securetoken.googleapis.com/v1".to_string(),
            ),
        }
    }

    pub fn with_base_urls(api_key: String, identity_url: String, token_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            identity_url,
            token_url,
        }
    }

    pub async fn sign_up(&self, credentials: &Credentials) -> Result<SignInResponse> {
        self.password_request("accounts:signUp", credentials).await
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<SignInResponse> {
        self.password_request("accounts:signInWithPassword", credentials)
            .await
    }

    /// Exchange a refresh token for a fresh ID token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenRefreshResponse> {
        let response = self
            .http
            .post(format!("{}/token", self.token_url))
            .query(&[("key", self.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AppError::RemoteUnavailable(format!("Token refresh failed: {}", e)))?;

        check_response_json(response).await
    }

    async fn password_request(
        &self,
        endpoint: &str,
        credentials: &Credentials,
    ) -> Result<SignInResponse> {
        let body = serde_json::json!({
            "email": credentials.email,
            "password": credentials.password,
            "returnSecureToken": true,
        });

        let response = self
            .http
            .post(format!("{}/{}", self.identity_url, endpoint))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::RemoteUnavailable(e.to_string()))?;

        check_response_json(response).await
    }
}

/// Map Identity Toolkit error bodies to `Auth`, everything else to
/// `RemoteUnavailable`.
async fn check_response_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 400 {
            let code = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or_default();
            return Err(AppError::Auth(describe_auth_error(&code)));
        }

        return Err(AppError::RemoteUnavailable(format!(
            "HTTP {}: {}",
            status, body
        )));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::RemoteUnavailable(format!("JSON parse error: {}", e)))
}

fn describe_auth_error(code: &str) -> String {
    // Codes can carry a suffix, e.g. "WEAK_PASSWORD : Password should be ..."
    let code = code.split(':').next().unwrap_or_default().trim();
    match code {
        "EMAIL_EXISTS" => "An account with this email already exists".to_string(),
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "Invalid email or password".to_string()
        }
        "USER_DISABLED" => "This account has been disabled".to_string(),
        "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" => {
            "Your session has expired, please sign in again".to_string()
        }
        "WEAK_PASSWORD" => "Password must be at least 6 characters".to_string(),
        "" => "Authentication failed".to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub local_id: String,
    pub email: String,
    pub id_token: String,
    pub refresh_token: String,
    /// Seconds, as a decimal string
    pub expires_in: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: String,
    pub user_id: String,
}

/// Signed-in state for one app session.
///
/// Cloning shares the same session.
#[derive(Clone)]
pub struct AuthClient {
    client: IdentityClient,
    clock: Arc<dyn Clock>,
    session: Arc<RwLock<Option<AuthSession>>>,
    /// Serializes token refresh so concurrent callers refresh once.
    refresh_lock: Arc<Mutex<()>>,
}

impl AuthClient {
    pub fn new(client: IdentityClient, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            clock,
            session: Arc::new(RwLock::new(None)),
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// An already signed-in session, e.g. restored from secure storage.
    pub fn with_session(client: IdentityClient, clock: Arc<dyn Clock>, session: AuthSession) -> Self {
        let auth = Self::new(client, clock);
        auth.store(Some(session));
        auth
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession> {
        let credentials = Credentials::new(email, password);
        credentials.check()?;
        let response = self.client.sign_up(&credentials).await.inspect_err(|e| {
            tracing::warn!(error = %e, "Sign up failed");
        })?;
        let session = self.session_from(response)?;
        tracing::info!(user_id = %session.user_id, "Signed up");
        self.store(Some(session.clone()));
        Ok(session)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let credentials = Credentials::new(email, password);
        credentials.check()?;
        let response = self.client.sign_in(&credentials).await.inspect_err(|e| {
            tracing::warn!(error = %e, "Sign in failed");
        })?;
        let session = self.session_from(response)?;
        tracing::info!(user_id = %session.user_id, "Signed in");
        self.store(Some(session.clone()));
        Ok(session)
    }

    /// The current session, if signed in.
    pub fn current_session(&self) -> Option<AuthSession> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn user_id(&self) -> Result<String> {
        self.current_session()
            .map(|s| s.user_id)
            .ok_or(AppError::Unauthorized)
    }

    /// A valid ID token, refreshed first if it expires within five minutes.
    pub async fn id_token(&self) -> Result<String> {
        let session = self.current_session().ok_or(AppError::Unauthorized)?;
        if !session.needs_refresh(self.clock.now()) {
            return Ok(session.id_token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let session = self.current_session().ok_or(AppError::Unauthorized)?;
        if !session.needs_refresh(self.clock.now()) {
            return Ok(session.id_token);
        }

        tracing::debug!(user_id = %session.user_id, "Refreshing ID token");
        let refreshed = self
            .client
            .refresh(&session.refresh_token)
            .await
            .inspect_err(|e| {
                tracing::warn!(user_id = %session.user_id, error = %e, "Token refresh failed");
            })?;

        let updated = AuthSession {
            user_id: refreshed.user_id,
            email: session.email,
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
            expires_at: self.expiry_from(&refreshed.expires_in)?,
        };
        let token = updated.id_token.clone();
        self.store(Some(updated));
        Ok(token)
    }

    /// Forget the current session.
    pub fn sign_out(&self) {
        if let Some(session) = self.current_session() {
            tracing::info!(user_id = %session.user_id, "Signed out");
        }
        self.store(None);
    }

    fn store(&self, session: Option<AuthSession>) {
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = session;
    }

    fn session_from(&self, response: SignInResponse) -> Result<AuthSession> {
        Ok(AuthSession {
            expires_at: self.expiry_from(&response.expires_in)?,
            user_id: response.local_id,
            email: response.email,
            id_token: response.id_token,
            refresh_token: response.refresh_token,
        })
    }

    fn expiry_from(&self, expires_in: &str) -> Result<DateTime<Utc>> {
        let secs: i64 = expires_in.trim().parse().map_err(|_| {
            AppError::RemoteUnavailable(format!("Invalid expiresIn {:?}", expires_in))
        })?;
        Ok(self.clock.now() + Duration::seconds(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_utils::FixedClock;

    fn session(expires_at: DateTime<Utc>) -> AuthSession {
        AuthSession {
            user_id: "u1".to_string(),
            email: "a@example.com".to_string(),
            id_token: "id-token".to_string(),
            refresh_token: "refresh-token".to_string(),
            expires_at,
        }
    }

    #[test]
    fn refresh_margin_is_five_minutes() {
        let now = Utc::now();
        assert!(!session(now + Duration::minutes(6)).needs_refresh(now));
        assert!(session(now + Duration::minutes(4)).needs_refresh(now));
        assert!(session(now - Duration::minutes(1)).needs_refresh(now));
    }

    #[test]
    fn credentials_are_validated() {
        assert!(Credentials::new("a@example.com", "secret1").check().is_ok());
        let err = Credentials::new("not-an-email", "secret1").check().unwrap_err();
        assert!(matches!(err, AppError::Auth(msg) if msg.contains("email")));
        let err = Credentials::new("a@example.com", "abc").check().unwrap_err();
        assert!(matches!(err, AppError::Auth(msg) if msg.contains("6 characters")));
    }

    #[test]
    fn auth_error_codes_are_described() {
        assert_eq!(
            describe_auth_error("INVALID_LOGIN_CREDENTIALS"),
            "Invalid email or password"
        );
        assert_eq!(
            describe_auth_error("WEAK_PASSWORD : Password should be at least 6 characters"),
            "Password must be at least 6 characters"
        );
    }

    #[tokio::test]
    async fn fresh_token_is_returned_without_network() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let client = IdentityClient::with_base_urls(
            "key".to_string(),
            "http://127.0.0.1:9".to_string(),
            "http://127.0.0.1:9".to_string(),
        );
        let auth = AuthClient::with_session(client, clock.clone(), session(clock.now() + Duration::hours(1)));
        assert_eq!(auth.id_token().await.unwrap(), "id-token");
        assert_eq!(auth.user_id().unwrap(), "u1");

        auth.sign_out();
        assert!(matches!(auth.id_token().await, Err(AppError::Unauthorized)));
    }
}
