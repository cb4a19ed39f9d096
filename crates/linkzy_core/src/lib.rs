//! Core logic for Linkzy, a shared space for two linked partners.
//! Pair scoping, live collections and feature views live here; UI shells
//! only render what these types expose.

pub mod auth;
pub mod binding;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod session;
pub mod store;
pub mod view;

pub use auth::{AuthError, AuthProvider, AuthResult, LocalAuthProvider};
pub use binding::{BindingStatus, LiveCollection, SharedStore};
pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::identity::{Identity, UserId, UserIdError};
pub use model::pair::{derive_pair_key, derive_scope, PairKey};
pub use model::record::{FeatureRecord, FeatureSchema, RecordId, SchemaError};
pub use service::account_service::AccountService;
pub use service::pair_service::{PairError, PairService};
pub use session::{AppSession, SharedSession, Theme};
pub use store::{
    BlobStore, DirectoryStore, FsBlobStore, RealtimeStore, SqliteLiveStore, StoreError,
    StoreResult, Subscription,
};
pub use view::{FeatureViews, ViewError, ViewResult, ViewState};

/// Minimal health-check API for shells and probes.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
