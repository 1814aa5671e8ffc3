//! monguard placement policy.
//!
//! Pure decision logic over the placement of monitor members. Nothing in
//! this crate talks to the orchestrator; the reconciler feeds it the
//! current placement and acts on the answer.
//!
//! # Components
//!
//! - **`policy`** — which member is extra (crowded nodes, stretch zone balance),
//!   and which zone a new member must land in
//! - **`collocation`** — live members sharing a node
//! - **`scorer`** — node ranking for the local scheduler

pub mod collocation;
pub mod error;
pub mod policy;
pub mod scorer;

pub use collocation::{LiveMember, find_collocated};
pub use error::PlacementError;
pub use policy::{determine_extra_member, zone_for_new_member};
pub use scorer::{NodeCandidate, NodeScore, PlacementRequirements, occupancy, rank_nodes, score_node};
