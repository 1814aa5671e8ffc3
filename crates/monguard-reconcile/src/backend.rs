//! Collaborator seams.
//!
//! The engine never talks to the orchestrator directly. Everything it needs
//! from the outside world goes through these traits; `local` ships in-memory
//! implementations of each.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;

use monguard_placement::LiveMember;
use monguard_state::{MemberId, NodeId, QuorumStatus};

/// Prefix shared by every per-member workload and volume claim.
pub const MON_RESOURCE_PREFIX: &str = "mon-";

/// Resource name of a member's workload (`mon-a`).
pub fn resource_name(id: &str) -> String {
    format!("{MON_RESOURCE_PREFIX}{id}")
}

/// Member id a resource belongs to, if it carries the member prefix.
pub fn member_id_from_resource(name: &str) -> Option<&str> {
    name.strip_prefix(MON_RESOURCE_PREFIX)
        .filter(|id| !id.is_empty())
}

/// Reports what the monitor group believes its membership to be.
#[async_trait]
pub trait QuorumStatusSource: Send + Sync {
    async fn quorum_status(&self) -> anyhow::Result<QuorumStatus>;
}

/// A candidate member waiting for a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRequest {
    pub member_id: MemberId,
    pub resource_name: String,
    /// Zone the member must land in (stretch clusters).
    pub zone: Option<String>,
    pub allow_multiple_per_node: bool,
    /// Members already placed per node.
    pub occupancy: HashMap<NodeId, u32>,
}

/// Where the scheduler put a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledNode {
    pub node: NodeId,
    pub zone: Option<String>,
    /// Node address, used as the member endpoint under host networking.
    pub address: Option<String>,
}

#[async_trait]
pub trait PlacementScheduler: Send + Sync {
    async fn schedule(&self, request: &ScheduleRequest) -> anyhow::Result<ScheduledNode>;
}

/// Everything needed to run one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonWorkload {
    pub resource_name: String,
    pub member_id: MemberId,
    pub node: NodeId,
    pub host_network: bool,
    /// This member's own `host:port`.
    pub endpoint: String,
    /// Endpoint table of the whole group the member starts with.
    pub endpoint_table: String,
}

/// Per-member workload objects on the orchestrator.
#[async_trait]
pub trait WorkloadManager: Send + Sync {
    async fn create(&self, workload: &MonWorkload) -> anyhow::Result<()>;

    /// Roll an existing workload to a new definition.
    ///
    /// Returns `false` when no workload with that name exists.
    async fn update(&self, workload: &MonWorkload) -> anyhow::Result<bool>;

    async fn delete(&self, resource_name: &str) -> anyhow::Result<()>;

    /// Scale a workload to one replica (`true`) or zero.
    async fn set_running(&self, resource_name: &str, running: bool) -> anyhow::Result<()>;

    /// Names of every member workload.
    async fn list(&self) -> anyhow::Result<Vec<String>>;

    async fn list_volume_claims(&self) -> anyhow::Result<Vec<String>>;

    async fn delete_volume_claim(&self, name: &str) -> anyhow::Result<()>;

    /// Running members and the node each one is on.
    async fn live_members(&self) -> anyhow::Result<Vec<LiveMember>>;
}

/// Time source for out-of-quorum bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_names_round_trip() {
        assert_eq!(resource_name("f"), "mon-f");
        assert_eq!(member_id_from_resource("mon-f"), Some("f"));
        assert_eq!(member_id_from_resource("mon-"), None);
        assert_eq!(member_id_from_resource("osd-0"), None);
    }
}
