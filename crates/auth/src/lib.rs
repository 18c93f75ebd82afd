//! `findesk-auth`: authentication models shared by the client.
//!
//! Token claims decoding, roles, the cached user profile, and the auth
//! endpoint DTOs. Decoupled from HTTP and storage.

pub mod claims;
pub mod profile;
pub mod roles;
pub mod tokens;

pub use claims::{AccessClaims, TokenDecodeError, decode_unverified, is_token_expired};
pub use profile::{OrganizationMembership, UserProfile};
pub use roles::Role;
pub use tokens::{LoginRequest, RefreshRequest, SignupRequest, TokenResponse};
