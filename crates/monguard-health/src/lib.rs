//! monguard-health — periodic driver for mon reconciliation.
//!
//! # Architecture
//!
//! ```text
//! HealthChecker
//!   ├── CheckerSettings (interval, out-of-quorum timeout)
//!   │     resolved once: per-cluster > OperatorOverrides (env) > defaults
//!   └── loop every interval until shutdown
//!         ├── MonCluster::check_health()
//!         └── MonCluster::remove_orphan_resources()
//! ```
//!
//! The cluster sits behind a `tokio::sync::Mutex` held for the whole pass,
//! so passes never overlap with each other or with other callers.

pub mod checker;
pub mod settings;

pub use checker::HealthChecker;
pub use settings::{
    CheckerSettings, DEFAULT_INTERVAL, DEFAULT_TIMEOUT, INTERVAL_ENV, OperatorOverrides,
    TIMEOUT_ENV, parse_duration,
};
