//! `findesk-core`: shared building blocks for the findesk client.
//!
//! Strongly-typed identifiers, the domain validation error, and the wire
//! envelopes every platform API response is wrapped in. No IO lives here.

pub mod email;
pub mod envelope;
pub mod error;
pub mod id;

pub use email::Email;
pub use envelope::{ApiResponse, PaginatedResponse};
pub use error::{DomainError, DomainResult};
pub use id::{CustomerId, OrganizationId, UserId};
