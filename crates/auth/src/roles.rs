use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC.
///
/// Roles are opaque strings on the wire; the client only attaches meaning to
/// `admin` (admin capability) and the fallbacks it substitutes when no role is
/// known (`guest` for the session, `viewer` inside an organization).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: &'static str = "admin";
    pub const VIEWER: &'static str = "viewer";
    pub const GUEST: &'static str = "guest";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn admin() -> Self {
        Self::new(Self::ADMIN)
    }

    /// Low-privilege role assumed when no organization is selected.
    pub fn viewer() -> Self {
        Self::new(Self::VIEWER)
    }

    /// Role assumed when no profile is cached.
    pub fn guest() -> Self {
        Self::new(Self::GUEST)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.as_str() == Self::ADMIN
    }

    /// Membership test against a list of role names.
    pub fn is_one_of(&self, roles: &[&str]) -> bool {
        roles.iter().any(|r| *r == self.as_str())
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
