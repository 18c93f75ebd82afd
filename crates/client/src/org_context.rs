//! Organization context: the organizations the user belongs to and the single
//! active one propagated on every request.

use std::sync::Arc;

use tokio::sync::watch;

use findesk_auth::{OrganizationMembership, Role};
use findesk_core::OrganizationId;

use crate::storage::{KeyValueStore, keys};

/// Snapshot of the organization context.
///
/// `selected`, when present, is an element of `organizations` (by id).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgContext {
    pub organizations: Vec<OrganizationMembership>,
    pub selected: Option<OrganizationMembership>,
}

/// Owns the organization list and selection, and the `selected_org_key`.
#[derive(Debug)]
pub struct OrgContextManager {
    store: Arc<dyn KeyValueStore>,
    state: watch::Sender<OrgContext>,
}

impl OrgContextManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let (state, _) = watch::channel(OrgContext::default());
        Self { store, state }
    }

    /// Replace the organization list and pick the active organization.
    ///
    /// The persisted selection is advisory: it wins only if its id is still in
    /// `orgs`, and then the fresh membership (not the stored copy) is selected.
    /// Otherwise the default membership, else the first one.
    pub fn initialize(&self, orgs: Vec<OrganizationMembership>) {
        if orgs.is_empty() {
            self.state.send_replace(OrgContext::default());
            return;
        }

        let restored = self
            .load_stored()
            .and_then(|stored| orgs.iter().find(|o| o.id == stored.id).cloned());

        let selected = restored.unwrap_or_else(|| {
            orgs.iter()
                .find(|o| o.is_default)
                .unwrap_or(&orgs[0])
                .clone()
        });

        tracing::info!(
            organization_id = %selected.id,
            organizations = orgs.len(),
            "organization context initialized"
        );

        self.persist(&selected);
        self.state.send_replace(OrgContext {
            organizations: orgs,
            selected: Some(selected),
        });
    }

    /// Select the organization with `id`. Returns `false`, leaving the current
    /// selection untouched, when the user is not a member of it.
    pub fn switch_org(&self, id: OrganizationId) -> bool {
        let Some(org) = self
            .state
            .borrow()
            .organizations
            .iter()
            .find(|o| o.id == id)
            .cloned()
        else {
            tracing::warn!(organization_id = %id, "switch rejected: not a member");
            return false;
        };

        tracing::info!(organization_id = %org.id, code = %org.code, "switched organization");
        self.persist(&org);
        self.state.send_modify(|ctx| ctx.selected = Some(org));
        true
    }

    /// Forget everything, including the persisted selection.
    pub fn clear(&self) {
        self.state.send_replace(OrgContext::default());
        if let Err(err) = self.store.remove(keys::SELECTED_ORG) {
            tracing::warn!("failed to remove persisted organization: {err}");
        }
    }

    pub fn snapshot(&self) -> OrgContext {
        self.state.borrow().clone()
    }

    /// Change notifications; the receiver starts at the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<OrgContext> {
        self.state.subscribe()
    }

    pub fn selected(&self) -> Option<OrganizationMembership> {
        self.state.borrow().selected.clone()
    }

    pub fn organizations(&self) -> Vec<OrganizationMembership> {
        self.state.borrow().organizations.clone()
    }

    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.state.borrow().selected.as_ref().map(|o| o.id)
    }

    pub fn organization_name(&self) -> Option<String> {
        self.state.borrow().selected.as_ref().map(|o| o.name.clone())
    }

    pub fn organization_code(&self) -> Option<String> {
        self.state.borrow().selected.as_ref().map(|o| o.code.clone())
    }

    /// Role inside the selected organization; `viewer` when none is selected.
    pub fn role_in_org(&self) -> Role {
        self.state
            .borrow()
            .selected
            .as_ref()
            .map(|o| o.role.clone())
            .unwrap_or_else(Role::viewer)
    }

    pub fn has_multiple_orgs(&self) -> bool {
        self.state.borrow().organizations.len() > 1
    }

    pub fn has_role(&self, roles: &[&str]) -> bool {
        self.role_in_org().is_one_of(roles)
    }

    fn persist(&self, org: &OrganizationMembership) {
        let json = match serde_json::to_string(org) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!("failed to serialize organization selection: {err}");
                return;
            }
        };
        if let Err(err) = self.store.set(keys::SELECTED_ORG, &json) {
            tracing::warn!("organization selection kept in memory only: {err}");
        }
    }

    fn load_stored(&self) -> Option<OrganizationMembership> {
        let raw = self.store.get(keys::SELECTED_ORG)?;
        match serde_json::from_str(&raw) {
            Ok(org) => Some(org),
            Err(err) => {
                tracing::warn!("ignoring corrupt persisted organization: {err}");
                None
            }
        }
    }
}
