//! Cached user profile and organization memberships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use findesk_core::{CustomerId, OrganizationId, UserId};

use crate::Role;

/// A user's membership in one organization.
///
/// Loaded once per session from the profile and never mutated client-side;
/// `role` is the user's role inside that organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationMembership {
    pub id: OrganizationId,
    pub name: String,
    pub code: String,
    pub role: Role,
    #[serde(default)]
    pub is_default: bool,
}

/// Denormalized view of the authenticated user, as returned by `/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,

    #[serde(alias = "display_name")]
    pub full_name: String,

    #[serde(default)]
    pub role: Option<Role>,

    #[serde(default)]
    pub department: Option<String>,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub customer_id: Option<CustomerId>,

    #[serde(default)]
    pub avatar_url: Option<String>,

    #[serde(default)]
    pub is_customer_admin: bool,

    #[serde(default)]
    pub organizations: Vec<OrganizationMembership>,
}

impl UserProfile {
    /// Session-level role; `guest` when the platform did not send one.
    pub fn effective_role(&self) -> Role {
        self.role.clone().unwrap_or_else(Role::guest)
    }

    /// Admin capability: the `admin` role or customer-wide administration.
    pub fn has_admin_capability(&self) -> bool {
        self.is_customer_admin || self.role.as_ref().is_some_and(Role::is_admin)
    }
}
