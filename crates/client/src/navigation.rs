//! Navigation requests emitted by the session manager and the route guards.
//!
//! The client core never drives a router directly; it hands a [`Redirect`] to
//! whatever [`Navigator`] the application plugs in.

use std::sync::Mutex;

use tokio::sync::mpsc;

/// A navigation target, optionally carrying the location to resume after
/// re-authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub path: String,
    pub return_url: Option<String>,
}

impl Redirect {
    pub fn to(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            return_url: None,
        }
    }

    pub fn with_return_url(path: impl Into<String>, return_url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            return_url: Some(return_url.into()),
        }
    }

    /// Router location, e.g. `/login?returnUrl=%2Ftreasury%2Fcash`.
    pub fn location(&self) -> String {
        match &self.return_url {
            Some(url) => format!("{}?returnUrl={}", self.path, urlencoding::encode(url)),
            None => self.path.clone(),
        }
    }
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, redirect: Redirect);

    /// Location currently displayed, used as the return target when the
    /// session is lost underneath it.
    fn current_location(&self) -> Option<String> {
        None
    }
}

/// Discards navigation requests (headless use).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, redirect: Redirect) {
        tracing::debug!(location = %redirect.location(), "navigation requested (ignored)");
    }
}

/// Forwards navigation requests to the UI layer over a channel and tracks the
/// location the UI reports back.
#[derive(Debug)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<Redirect>,
    location: Mutex<Option<String>>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Redirect>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                location: Mutex::new(None),
            },
            rx,
        )
    }

    /// Called by the UI after each completed navigation.
    pub fn set_location(&self, location: impl Into<String>) {
        *self.location.lock().unwrap_or_else(|p| p.into_inner()) = Some(location.into());
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, redirect: Redirect) {
        if self.tx.send(redirect).is_err() {
            tracing::debug!("navigation receiver dropped");
        }
    }

    fn current_location(&self) -> Option<String> {
        self.location.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}
