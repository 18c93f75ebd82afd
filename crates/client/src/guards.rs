//! Route guards: allow/redirect decisions over the session state.

use std::sync::Arc;

use chrono::Utc;

use crate::config::ClientConfig;
use crate::navigation::Redirect;
use crate::session::{SessionManager, SessionStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Redirect),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[derive(Debug, Clone)]
pub struct RouteGuards {
    session: Arc<SessionManager>,
    login_path: String,
    home_path: String,
}

impl RouteGuards {
    pub fn new(session: Arc<SessionManager>, config: &ClientConfig) -> Self {
        Self {
            session,
            login_path: config.login_path.clone(),
            home_path: config.home_path.clone(),
        }
    }

    /// Authenticated routes. A session whose only problem is an expired token
    /// is refreshed in place; anything else (no profile, no refresh token) is
    /// sent to login with `requested` as the return target.
    pub async fn authenticated(&self, requested: &str) -> GuardDecision {
        let session = self.session.snapshot();
        match session.status_at(Utc::now()) {
            SessionStatus::Authenticated => return GuardDecision::Allow,
            SessionStatus::ExpiredRefreshable => {
                match self
                    .session
                    .refresh_if_stale(session.access_token.as_deref())
                    .await
                {
                    Ok(refreshed) if refreshed.is_authenticated() => return GuardDecision::Allow,
                    Ok(_) => tracing::info!(requested, "refreshed session has no profile"),
                    Err(err) => tracing::info!(requested, "guard refresh failed: {err}"),
                }
            }
            SessionStatus::Anonymous => {}
        }

        GuardDecision::Redirect(Redirect::with_return_url(
            self.login_path.clone(),
            requested,
        ))
    }

    /// Login/signup pages: a live session is sent home.
    pub fn guest(&self) -> GuardDecision {
        let session = self.session.snapshot();
        if !session.is_authenticated() || session.is_expired_at(Utc::now()) {
            GuardDecision::Allow
        } else {
            GuardDecision::Redirect(Redirect::to(self.home_path.clone()))
        }
    }

    pub fn admin(&self) -> GuardDecision {
        if !self.session.is_authenticated() {
            return GuardDecision::Redirect(Redirect::to(self.login_path.clone()));
        }
        if !self.session.has_admin_capability() {
            tracing::info!("admin route denied");
            return GuardDecision::Redirect(Redirect::to(self.home_path.clone()));
        }
        GuardDecision::Allow
    }

    /// Routes restricted to session-level roles.
    pub fn roles(&self, allowed: &[&str]) -> GuardDecision {
        if !self.session.is_authenticated() {
            return GuardDecision::Redirect(Redirect::to(self.login_path.clone()));
        }
        if !self.session.has_role(allowed) {
            tracing::info!(?allowed, "role check failed");
            return GuardDecision::Redirect(Redirect::to(self.home_path.clone()));
        }
        GuardDecision::Allow
    }
}
