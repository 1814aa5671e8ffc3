//! monguard-state — cluster state for the monitor quorum reconciler.
//!
//! Holds the in-memory source of truth for a monitor group (desired spec,
//! internal and external member records, placement, the id allocation
//! cursor) and the persisted endpoint record shared with the rest of the
//! storage cluster.
//!
//! # Architecture
//!
//! ```text
//! ClusterState
//!   ├── ClusterSpec (desired count, stretch zones, external ids, network)
//!   ├── ClusterInfo (internal + external MemberRecords, None until bootstrapped)
//!   ├── placement: id → PlacementRecord
//!   ├── max_id (allocation cursor, never reused)
//!   └── pending_failover: id → PendingFailover
//!
//! ConfigStore (trait)
//!   └── RedbConfigStore — EndpointRecord JSON keyed by namespace
//! ```

pub mod cluster;
pub mod endpoints;
pub mod error;
pub mod id;
pub mod quorum;
pub mod store;
pub mod tables;
pub mod types;

pub use cluster::{ClusterInfo, ClusterState, PendingFailover};
pub use endpoints::{EndpointRecord, format_endpoints, join_ids, parse_endpoints, split_ids};
pub use error::{StateError, StateResult};
pub use id::{index_to_name, name_to_index};
pub use quorum::{QuorumMember, QuorumStatus, remove_members_from_quorum_status};
pub use store::{ConfigStore, RedbConfigStore};
pub use types::*;
