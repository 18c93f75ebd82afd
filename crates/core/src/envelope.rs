//! Wire envelopes shared by every platform API response.
//!
//! Single resources come back as `{ success, data, message?, errors? }`;
//! list endpoints use the paginated variant which carries `total`, `page`
//! and `page_size` next to `data`.

use serde::{Deserialize, Serialize};

/// Standard response wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    /// Best human-readable description of a failed envelope.
    pub fn failure_message(&self) -> String {
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            return message.to_string();
        }
        match self.errors.as_deref() {
            Some(errors) if !errors.is_empty() => errors.join("; "),
            _ => "request was not successful".to_string(),
        }
    }
}

/// Paginated list wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> PaginatedResponse<T> {
    /// Whether more pages exist after this one.
    pub fn has_more(&self) -> bool {
        u64::from(self.page) * u64::from(self.page_size) < self.total
    }
}
