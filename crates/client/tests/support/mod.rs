//! Shared fixtures for the client integration tests: a scripted transport that
//! records every request, minted JWTs and platform payloads.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;

use findesk_client::storage::keys;
use findesk_client::{
    ApiRequest, ChannelNavigator, ClientConfig, ClientContext, KeyValueStore, MemoryStore,
    RawResponse, Redirect, Transport, TransportError,
};

pub const ORG_ACME: &str = "0191d1b2-7a3c-7f00-8000-000000000001";
pub const ORG_GLOBEX: &str = "0191d1b2-7a3c-7f00-8000-000000000002";

type Handler = dyn Fn(&ApiRequest) -> Result<RawResponse, TransportError> + Send + Sync;

pub struct ScriptedTransport {
    handler: Box<Handler>,
    delays: Vec<(String, Duration)>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<RawResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            delays: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Hold responses for `path` for `delay` before answering.
    pub fn with_delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.push((path.to_string(), delay));
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some((_, delay)) = self.delays.iter().find(|(p, _)| *p == request.path) {
            tokio::time::sleep(*delay).await;
        }
        (self.handler)(&request)
    }
}

/// HS256 access token expiring `ttl_secs` from now (negative for expired).
/// `label` keeps tokens minted in the same second distinct.
pub fn mint(label: &str, ttl_secs: i64) -> String {
    let now = Utc::now().timestamp();
    jsonwebtoken::encode(
        &Header::default(),
        &json!({
            "sub": "0191d1b2-7a3c-7f00-8000-0000000000aa",
            "email": "controller@example.com",
            "type": "access",
            "jti": label,
            "iat": now - 60,
            "exp": now + ttl_secs,
        }),
        &EncodingKey::from_secret(b"integration-secret"),
    )
    .unwrap()
}

pub fn ok(data: Value) -> Result<RawResponse, TransportError> {
    Ok(RawResponse::json_body(
        StatusCode::OK,
        &json!({ "success": true, "data": data }),
    ))
}

pub fn status(code: StatusCode, body: Value) -> Result<RawResponse, TransportError> {
    Ok(RawResponse::json_body(code, &body))
}

pub fn tokens(access: &str, refresh: &str) -> Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "bearer",
        "expires_in": 900,
    })
}

pub fn profile(role: Option<&str>, is_customer_admin: bool) -> Value {
    json!({
        "id": "0191d1b2-7a3c-7f00-8000-0000000000aa",
        "customer_id": "0191d1b2-7a3c-7f00-8000-0000000000cc",
        "email": "controller@example.com",
        "display_name": "Dana Controller",
        "role": role,
        "status": "active",
        "is_customer_admin": is_customer_admin,
        "organizations": [
            { "id": ORG_ACME, "name": "Acme Holdings", "code": "ACME", "role": "analyst", "is_default": false },
            { "id": ORG_GLOBEX, "name": "Globex Corp", "code": "GLOBEX", "role": "admin", "is_default": true }
        ]
    })
}

pub fn config() -> ClientConfig {
    ClientConfig {
        profile_retry_delay: Duration::from_millis(10),
        ..ClientConfig::default()
    }
}

/// Store pre-populated as if a previous run had logged in.
pub fn seeded_store(access: &str, refresh: Option<&str>, user: Option<Value>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.set(keys::ACCESS_TOKEN, access).unwrap();
    if let Some(refresh) = refresh {
        store.set(keys::REFRESH_TOKEN, refresh).unwrap();
    }
    if let Some(user) = user {
        store.set(keys::USER, &user.to_string()).unwrap();
    }
    store
}

pub struct Harness {
    pub ctx: ClientContext,
    pub store: Arc<MemoryStore>,
    pub transport: Arc<ScriptedTransport>,
    pub navigator: Arc<ChannelNavigator>,
    pub redirects: UnboundedReceiver<Redirect>,
}

impl Harness {
    pub fn new(store: Arc<MemoryStore>, transport: ScriptedTransport) -> Self {
        let transport = Arc::new(transport);
        let (navigator, redirects) = ChannelNavigator::new();
        let navigator = Arc::new(navigator);
        let ctx = ClientContext::new(config(), store.clone(), transport.clone(), navigator.clone());
        Self {
            ctx,
            store,
            transport,
            navigator,
            redirects,
        }
    }

    pub fn fresh(transport: ScriptedTransport) -> Self {
        Self::new(Arc::new(MemoryStore::new()), transport)
    }

    /// Redirects emitted so far.
    pub fn drain_redirects(&mut self) -> Vec<Redirect> {
        let mut out = Vec::new();
        while let Ok(redirect) = self.redirects.try_recv() {
            out.push(redirect);
        }
        out
    }

    pub fn persisted_keys(&self) -> Vec<&'static str> {
        [
            keys::ACCESS_TOKEN,
            keys::REFRESH_TOKEN,
            keys::USER,
            keys::SELECTED_ORG,
        ]
        .into_iter()
        .filter(|k| self.store.get(k).is_some())
        .collect()
    }
}
