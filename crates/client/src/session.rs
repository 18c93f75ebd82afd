//! Session manager: owns the token pair and the cached user profile.
//!
//! State machine:
//!
//! ```text
//! Anonymous --login/signup--> Authenticated --token ages--> ExpiredRefreshable
//!     ^                            |                               |
//!     +-------- logout ------------+        refresh ok -> Authenticated
//!     +------------------------------------ refresh failed --------+
//! ```
//!
//! The in-memory [`Session`] is the process view; the store mirrors it so the
//! session survives restarts. A write the store rejects is logged and the
//! session carries on in memory.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};

use findesk_auth::{
    LoginRequest, RefreshRequest, Role, SignupRequest, TokenResponse, UserProfile,
    is_token_expired,
};
use findesk_core::{ApiResponse, Email};

use crate::config::{ClientConfig, endpoints};
use crate::error::{ClientError, ClientResult};
use crate::navigation::{Navigator, Redirect};
use crate::org_context::OrgContextManager;
use crate::storage::{KeyValueStore, keys};
use crate::transport::{
    AUTHORIZATION, ApiRequest, ORGANIZATION_ID, RawResponse, Transport,
};

/// Snapshot of the authenticated identity.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user_profile: Option<UserProfile>,
}

impl Session {
    /// A profile and an access token are both present.
    pub fn is_authenticated(&self) -> bool {
        self.user_profile.is_some() && self.access_token.is_some()
    }

    /// Fail-closed: no token or an undecodable token counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        is_token_expired(self.access_token.as_deref(), now)
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> SessionStatus {
        if !self.is_authenticated() {
            return SessionStatus::Anonymous;
        }
        if !self.is_expired_at(now) {
            SessionStatus::Authenticated
        } else if self.refresh_token.is_some() {
            SessionStatus::ExpiredRefreshable
        } else {
            SessionStatus::Anonymous
        }
    }
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("user_profile", &self.user_profile)
            .finish()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Anonymous,
    Authenticated,
    /// Access token expired, refresh token available.
    ExpiredRefreshable,
}

/// Why a token-minting call did not yield tokens.
enum TokenFailure {
    /// The server refused the request (4xx or `success: false`).
    Rejected(String),
    Error(ClientError),
}

pub struct SessionManager {
    transport: Arc<dyn Transport>,
    store: Arc<dyn KeyValueStore>,
    orgs: Arc<OrgContextManager>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    profile_retry_delay: Duration,
    state: watch::Sender<Session>,
    /// Serializes refreshes so concurrent callers share one refresh call.
    refresh_gate: Mutex<()>,
}

impl SessionManager {
    /// Create the manager and hydrate it from the store.
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn KeyValueStore>,
        orgs: Arc<OrgContextManager>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (state, _) = watch::channel(Session::default());
        let manager = Self {
            transport,
            store,
            orgs,
            navigator,
            login_path: config.login_path.clone(),
            profile_retry_delay: config.profile_retry_delay,
            state,
            refresh_gate: Mutex::new(()),
        };
        manager.rehydrate();
        manager
    }

    // ── Credentials ─────────────────────────────────────────────────────────

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<Session> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ClientError::InvalidCredentials(
                "email and password are required".to_string(),
            ));
        }

        let body = to_json(&LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        })?;
        let response = self
            .transport
            .send(ApiRequest::post(endpoints::LOGIN, body))
            .await?;

        let tokens = token_outcome(&response).map_err(|failure| match failure {
            TokenFailure::Rejected(msg) => ClientError::InvalidCredentials(msg),
            TokenFailure::Error(err) => err,
        })?;

        tracing::info!("login accepted");
        self.establish(tokens).await
    }

    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        department: Option<&str>,
    ) -> ClientResult<Session> {
        let email = Email::parse(email)?;
        if password.is_empty() {
            return Err(ClientError::Validation("password is required".to_string()));
        }
        if full_name.trim().is_empty() {
            return Err(ClientError::Validation("full name is required".to_string()));
        }

        let body = to_json(&SignupRequest {
            email: email.to_string(),
            password: password.to_string(),
            full_name: full_name.trim().to_string(),
            department: department
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        })?;
        let response = self
            .transport
            .send(ApiRequest::post(endpoints::SIGNUP, body))
            .await?;

        let tokens = token_outcome(&response).map_err(|failure| match failure {
            TokenFailure::Rejected(msg) => ClientError::Validation(msg),
            TokenFailure::Error(err) => err,
        })?;

        tracing::info!("signup accepted");
        self.establish(tokens).await
    }

    /// Mint a new token pair from the stored refresh token.
    ///
    /// Never retries. Any failure, including a missing refresh token, ends the
    /// session before the error is returned.
    pub async fn refresh(&self) -> ClientResult<Session> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// Refresh on behalf of a request that was rejected while carrying
    /// `stale_token`.
    ///
    /// Callers queue behind any in-flight refresh. If the token changed while
    /// waiting, the new session is returned without another refresh call; if
    /// the session ended while waiting, this fails without touching it again.
    pub async fn refresh_if_stale(&self, stale_token: Option<&str>) -> ClientResult<Session> {
        let _gate = self.refresh_gate.lock().await;

        let current = self.snapshot();
        if let Some(token) = current.access_token.as_deref() {
            if Some(token) != stale_token {
                tracing::debug!("token already refreshed by a concurrent caller");
                return Ok(current);
            }
        }
        if current.refresh_token.is_none() {
            return Err(ClientError::RefreshFailed(
                "session ended while waiting for refresh".to_string(),
            ));
        }

        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> ClientResult<Session> {
        let Some(refresh_token) = self.refresh_token() else {
            return Err(self.refresh_failed("no refresh token stored".to_string()));
        };

        let body = to_json(&RefreshRequest { refresh_token })?;
        let response = match self
            .transport
            .send(ApiRequest::post(endpoints::REFRESH, body))
            .await
        {
            Ok(response) => response,
            Err(err) => return Err(self.refresh_failed(err.to_string())),
        };

        match token_outcome(&response) {
            Ok(tokens) => {
                self.store_tokens(&tokens);
                tracing::info!("access token refreshed");
                Ok(self.snapshot())
            }
            Err(TokenFailure::Rejected(msg)) => Err(self.refresh_failed(msg)),
            Err(TokenFailure::Error(err)) => Err(self.refresh_failed(err.to_string())),
        }
    }

    fn refresh_failed(&self, reason: String) -> ClientError {
        tracing::warn!(%reason, "token refresh failed; ending session");
        self.force_logout();
        ClientError::RefreshFailed(reason)
    }

    /// Clear the session and send the user to the login entry point.
    ///
    /// Idempotent; calling it while logged out only re-clears empty storage.
    pub fn logout(&self) {
        self.clear();
        tracing::info!("logged out");
        self.navigator.navigate(Redirect::to(self.login_path.clone()));
    }

    /// Logout forced by a lost session; the redirect remembers where the user was.
    pub(crate) fn force_logout(&self) {
        self.clear();
        tracing::info!("session ended");
        let redirect = match self.navigator.current_location() {
            Some(location) => Redirect::with_return_url(self.login_path.clone(), location),
            None => Redirect::to(self.login_path.clone()),
        };
        self.navigator.navigate(redirect);
    }

    fn clear(&self) {
        for key in [keys::ACCESS_TOKEN, keys::REFRESH_TOKEN, keys::USER] {
            if let Err(err) = self.store.remove(key) {
                tracing::warn!(key, "failed to remove persisted session key: {err}");
            }
        }
        self.state.send_replace(Session::default());
        self.orgs.clear();
    }

    // ── Profile ─────────────────────────────────────────────────────────────

    /// `GET /auth/me` with the current token, bypassing refresh recovery.
    pub async fn fetch_profile(&self) -> ClientResult<UserProfile> {
        let mut request = ApiRequest::get(endpoints::ME);
        if let Some(token) = self.access_token() {
            request.set_header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(org_id) = self.orgs.organization_id() {
            request.set_header(ORGANIZATION_ID, org_id.to_string());
        }

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(ClientError::from_response(&response));
        }

        let envelope: ApiResponse<Option<UserProfile>> = response
            .json()
            .map_err(|e| ClientError::Decode(format!("profile: {e}")))?;
        if !envelope.success {
            return Err(ClientError::Api {
                status: response.status,
                message: envelope.failure_message(),
            });
        }
        envelope
            .data
            .ok_or_else(|| ClientError::Decode("profile response carried no data".to_string()))
    }

    async fn establish(&self, tokens: TokenResponse) -> ClientResult<Session> {
        // Tokens are in memory (and persisted when possible) before the
        // profile request is built, so it always carries the new token.
        self.store_tokens(&tokens);
        self.load_profile().await;
        Ok(self.snapshot())
    }

    /// Fetch and merge the profile, retrying once after a fixed delay. Gives up
    /// silently: the session stays unauthenticated until a profile exists.
    async fn load_profile(&self) {
        let first = match self.fetch_profile().await {
            Ok(profile) => return self.apply_profile(profile),
            Err(err) => err,
        };

        tracing::warn!(
            retry_in_ms = self.profile_retry_delay.as_millis() as u64,
            "profile fetch failed, retrying once: {first}"
        );
        tokio::time::sleep(self.profile_retry_delay).await;

        match self.fetch_profile().await {
            Ok(profile) => self.apply_profile(profile),
            Err(err) => tracing::warn!("profile unavailable after retry: {err}"),
        }
    }

    fn apply_profile(&self, profile: UserProfile) {
        match serde_json::to_string(&profile) {
            Ok(json) => {
                if let Err(err) = self.store.set(keys::USER, &json) {
                    tracing::warn!("profile kept in memory only: {err}");
                }
            }
            Err(err) => tracing::warn!("failed to serialize profile: {err}"),
        }

        tracing::info!(user_id = %profile.id, "profile loaded");
        let organizations = profile.organizations.clone();
        self.state
            .send_modify(|session| session.user_profile = Some(profile));
        self.orgs.initialize(organizations);
    }

    fn store_tokens(&self, tokens: &TokenResponse) {
        for (key, value) in [
            (keys::ACCESS_TOKEN, &tokens.access_token),
            (keys::REFRESH_TOKEN, &tokens.refresh_token),
        ] {
            if let Err(err) = self.store.set(key, value) {
                tracing::warn!(key, "token kept in memory only: {err}");
            }
        }
        self.state.send_modify(|session| {
            session.access_token = Some(tokens.access_token.clone());
            session.refresh_token = Some(tokens.refresh_token.clone());
        });
    }

    // ── Persistence ─────────────────────────────────────────────────────────

    /// Reload the session from the store, picking up writes made elsewhere
    /// (another process sharing the store). A corrupt profile is discarded.
    pub fn rehydrate(&self) {
        let user_profile = self.store.get(keys::USER).and_then(|raw| {
            match serde_json::from_str::<UserProfile>(&raw) {
                Ok(profile) => Some(profile),
                Err(err) => {
                    tracing::warn!("discarding corrupt persisted profile: {err}");
                    if let Err(err) = self.store.remove(keys::USER) {
                        tracing::warn!("failed to remove corrupt profile: {err}");
                    }
                    None
                }
            }
        });

        let session = Session {
            access_token: self.store.get(keys::ACCESS_TOKEN),
            refresh_token: self.store.get(keys::REFRESH_TOKEN),
            user_profile,
        };

        let organizations = session
            .user_profile
            .as_ref()
            .map(|p| p.organizations.clone())
            .unwrap_or_default();

        tracing::debug!(authenticated = session.is_authenticated(), "session hydrated");
        self.state.send_replace(session);
        self.orgs.initialize(organizations);
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.borrow().refresh_token.clone()
    }

    pub fn user_profile(&self) -> Option<UserProfile> {
        self.state.borrow().user_profile.clone()
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Change notifications; the receiver starts at the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Offline check of the access token's `exp` claim.
    pub fn is_token_expired(&self) -> bool {
        self.state.borrow().is_expired_at(Utc::now())
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status_at(Utc::now())
    }

    /// Whether the cached profile's role is one of `roles` (`guest` without a profile).
    pub fn has_role(&self, roles: &[&str]) -> bool {
        self.role().is_one_of(roles)
    }

    pub fn role(&self) -> Role {
        self.state
            .borrow()
            .user_profile
            .as_ref()
            .map(UserProfile::effective_role)
            .unwrap_or_else(Role::guest)
    }

    pub fn has_admin_capability(&self) -> bool {
        self.state
            .borrow()
            .user_profile
            .as_ref()
            .is_some_and(UserProfile::has_admin_capability)
    }
}

impl core::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionManager")
            .field("session", &*self.state.borrow())
            .field("login_path", &self.login_path)
            .finish_non_exhaustive()
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> ClientResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| ClientError::Decode(e.to_string()))
}

fn token_outcome(response: &RawResponse) -> Result<TokenResponse, TokenFailure> {
    if response.status.is_client_error() {
        return Err(TokenFailure::Rejected(response.error_message()));
    }
    if !response.is_success() {
        return Err(TokenFailure::Error(ClientError::from_response(response)));
    }

    let envelope: ApiResponse<Option<TokenResponse>> = response
        .json()
        .map_err(|e| TokenFailure::Error(ClientError::Decode(format!("token response: {e}"))))?;
    if !envelope.success {
        return Err(TokenFailure::Rejected(envelope.failure_message()));
    }

    match envelope.data {
        Some(tokens) if !tokens.access_token.is_empty() => Ok(tokens),
        _ => Err(TokenFailure::Error(ClientError::Decode(
            "token response carried no access token".to_string(),
        ))),
    }
}
