//! Client error taxonomy.

use reqwest::StatusCode;
use thiserror::Error;

use findesk_core::DomainError;

use crate::transport::{RawResponse, TransportError};

pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced to callers of the session manager and the request pipeline.
///
/// An expired token is not an error (it drives the refresh path) and a failed
/// role check is a guard redirect, so neither appears here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Login/signup rejected by the server. The message is meant for display.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Input rejected locally or by the signup endpoint.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The refresh endpoint rejected or errored; the session has been cleared.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// Transport failure; never retried here.
    #[error("network error: {0}")]
    Network(String),

    /// Any other non-2xx response, including a 401 that survived recovery.
    #[error("API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    /// A 2xx response whose body did not match the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ClientError {
    /// Map a non-2xx response into an `Api` error carrying the server's message.
    pub fn from_response(response: &RawResponse) -> Self {
        Self::Api {
            status: response.status,
            message: response.error_message(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

impl From<TransportError> for ClientError {
    fn from(value: TransportError) -> Self {
        Self::Network(value.to_string())
    }
}

impl From<DomainError> for ClientError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
        }
    }
}
