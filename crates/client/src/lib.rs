//! Findesk client core.
//!
//! Authenticated-session and tenant-context layer for the financial platform:
//! - `session`: token pair, cached profile, single-flight refresh
//! - `org_context`: organization list and the active organization
//! - `pipeline`: bearer/organization headers and 401 recovery for every call
//! - `guards`: allow/redirect decisions for navigation
//!
//! State is durable through a [`KeyValueStore`] and observable through
//! `tokio::sync::watch` receivers. A [`ClientContext`] wires everything for
//! one application instance.

pub mod config;
pub mod context;
pub mod error;
pub mod guards;
pub mod navigation;
pub mod org_context;
pub mod pipeline;
pub mod session;
pub mod storage;
pub mod transport;

pub use config::ClientConfig;
pub use context::ClientContext;
pub use error::{ClientError, ClientResult};
pub use guards::{GuardDecision, RouteGuards};
pub use navigation::{ChannelNavigator, Navigator, NoopNavigator, Redirect};
pub use org_context::{OrgContext, OrgContextManager};
pub use pipeline::RequestPipeline;
pub use session::{Session, SessionManager, SessionStatus};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use transport::{ApiRequest, RawResponse, ReqwestTransport, Transport, TransportError};
