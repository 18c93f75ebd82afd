//! Email address value object.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A syntactically plausible email address, trimmed.
///
/// This only rejects obviously malformed input before it reaches the network;
/// the server remains the authority on whether an address is acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("email is required"));
        }

        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(DomainError::validation("email must contain '@'"));
        };

        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(DomainError::validation(format!("invalid email '{trimmed}'")));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("email must not contain whitespace"));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Email {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
