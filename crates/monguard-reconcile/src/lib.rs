//! monguard-reconcile — the monitor quorum reconciler.
//!
//! `MonCluster::check_health` runs one bounded pass that brings the live
//! monitor group back toward its desired shape without ever dropping it
//! below a majority.
//!
//! # Pass
//!
//! ```text
//! quorum status ─► filter pending failovers ─► classify members
//!   ├── refresh endpoints, track out-of-quorum flags
//!   ├── mirror declared external members
//!   ├── replace members missing from the status, resume failovers
//!   ├── scale: add all missing │ remove one extra │ failover / evict
//!   └── persist endpoint record
//! ```
//!
//! Collaborators (quorum source, scheduler, workload manager, config
//! store, clock) are trait objects; `local` has in-memory versions.

pub mod backend;
pub mod cluster;
pub mod error;
pub mod failover;
pub mod health;
pub mod local;
pub mod orphans;
pub mod scale;

pub use backend::{
    Clock, MON_RESOURCE_PREFIX, MonWorkload, PlacementScheduler, QuorumStatusSource,
    ScheduleRequest, ScheduledNode, SystemClock, WorkloadManager, member_id_from_resource,
    resource_name,
};
pub use cluster::{Backends, DEFAULT_OUT_TIMEOUT, MonCluster};
pub use error::{ReconcileError, ReconcileResult};
pub use health::{Classification, MemberHealth, SnapshotEntry, SnapshotOwner, classify};
pub use orphans::OrphanReport;
pub use scale::quorum_floor;
