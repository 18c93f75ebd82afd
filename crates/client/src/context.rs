//! Per-application wiring of the session, organization context, pipeline and
//! guards.

use std::sync::Arc;

use anyhow::Context;

use crate::config::ClientConfig;
use crate::guards::RouteGuards;
use crate::navigation::Navigator;
use crate::org_context::OrgContextManager;
use crate::pipeline::RequestPipeline;
use crate::session::SessionManager;
use crate::storage::{FileStore, KeyValueStore};
use crate::transport::{ReqwestTransport, Transport};

/// One instance per application; everything that needs the session gets it
/// from here.
#[derive(Debug, Clone)]
pub struct ClientContext {
    config: Arc<ClientConfig>,
    store: Arc<dyn KeyValueStore>,
    session: Arc<SessionManager>,
    orgs: Arc<OrgContextManager>,
    pipeline: RequestPipeline,
    guards: RouteGuards,
}

impl ClientContext {
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn Transport>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let orgs = Arc::new(OrgContextManager::new(store.clone()));
        let session = Arc::new(SessionManager::new(
            &config,
            transport.clone(),
            store.clone(),
            orgs.clone(),
            navigator,
        ));
        let pipeline = RequestPipeline::new(transport, session.clone(), orgs.clone());
        let guards = RouteGuards::new(session.clone(), &config);

        Self {
            config: Arc::new(config),
            store,
            session,
            orgs,
            pipeline,
            guards,
        }
    }

    /// Production wiring: the JSON file store and the reqwest transport.
    pub fn from_config(config: ClientConfig, navigator: Arc<dyn Navigator>) -> anyhow::Result<Self> {
        let store = match &config.storage_path {
            Some(path) => FileStore::open(path)
                .with_context(|| format!("failed to open store at {}", path.display()))?,
            None => FileStore::open_default()?,
        };
        tracing::info!(store = %store.path().display(), api = %config.api_base_url, "client context ready");

        let transport = ReqwestTransport::new(config.api_base_url.clone(), config.request_timeout)
            .context("failed to build HTTP client")?;

        Ok(Self::new(
            config,
            Arc::new(store),
            Arc::new(transport),
            navigator,
        ))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn orgs(&self) -> &Arc<OrgContextManager> {
        &self.orgs
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    pub fn guards(&self) -> &RouteGuards {
        &self.guards
    }
}
