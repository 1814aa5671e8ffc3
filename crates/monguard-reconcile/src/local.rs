//! In-process implementations of the collaborator traits.
//!
//! These back the test suite and the daemon's `simulate` command: the
//! workload manager keeps its objects in memory, the scheduler ranks a
//! static node inventory, and the quorum source either replays a fixed
//! snapshot or derives one from the running workloads.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use tracing::debug;

use monguard_placement::{LiveMember, NodeCandidate, PlacementError, PlacementRequirements, rank_nodes};
use monguard_state::{NodeId, QuorumMember, QuorumStatus};

use crate::backend::{
    Clock, MonWorkload, PlacementScheduler, QuorumStatusSource, ScheduleRequest, ScheduledNode,
    WorkloadManager, resource_name,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── Workloads ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadEntry {
    pub workload: MonWorkload,
    pub running: bool,
}

#[derive(Debug, Default)]
struct WorkloadsInner {
    workloads: BTreeMap<String, WorkloadEntry>,
    claims: BTreeSet<String>,
    updates: Vec<String>,
}

/// Workload manager that keeps every object in memory.
#[derive(Debug, Default)]
pub struct InMemoryWorkloads {
    inner: Mutex<WorkloadsInner>,
    /// Create a volume claim alongside every workload.
    volume_claims: bool,
}

impl InMemoryWorkloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volume_claims() -> Self {
        Self {
            volume_claims: true,
            ..Self::default()
        }
    }

    /// Register a running member workload on a node, as if created earlier.
    pub fn insert_running(&self, id: &str, node: &str) {
        let name = resource_name(id);
        let workload = MonWorkload {
            resource_name: name.clone(),
            member_id: id.to_string(),
            node: node.to_string(),
            host_network: false,
            endpoint: String::new(),
            endpoint_table: String::new(),
        };
        let mut inner = lock(&self.inner);
        if self.volume_claims {
            inner.claims.insert(name.clone());
        }
        inner.workloads.insert(name, WorkloadEntry { workload, running: true });
    }

    pub fn insert_volume_claim(&self, name: &str) {
        lock(&self.inner).claims.insert(name.to_string());
    }

    pub fn get(&self, resource_name: &str) -> Option<WorkloadEntry> {
        lock(&self.inner).workloads.get(resource_name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.inner).workloads.keys().cloned().collect()
    }

    pub fn volume_claims(&self) -> Vec<String> {
        lock(&self.inner).claims.iter().cloned().collect()
    }

    /// Names of updated workloads, in update order, since the last call.
    pub fn take_updates(&self) -> Vec<String> {
        std::mem::take(&mut lock(&self.inner).updates)
    }

    /// Running workloads.
    pub fn running(&self) -> Vec<MonWorkload> {
        lock(&self.inner)
            .workloads
            .values()
            .filter(|e| e.running)
            .map(|e| e.workload.clone())
            .collect()
    }
}

#[async_trait]
impl WorkloadManager for InMemoryWorkloads {
    async fn create(&self, workload: &MonWorkload) -> anyhow::Result<()> {
        let mut inner = lock(&self.inner);
        if inner.workloads.contains_key(&workload.resource_name) {
            bail!("workload {} already exists", workload.resource_name);
        }
        if self.volume_claims {
            inner.claims.insert(workload.resource_name.clone());
        }
        inner.workloads.insert(
            workload.resource_name.clone(),
            WorkloadEntry { workload: workload.clone(), running: true },
        );
        debug!(resource = %workload.resource_name, node = %workload.node, "workload created");
        Ok(())
    }

    async fn update(&self, workload: &MonWorkload) -> anyhow::Result<bool> {
        let mut inner = lock(&self.inner);
        let Some(entry) = inner.workloads.get_mut(&workload.resource_name) else {
            return Ok(false);
        };
        entry.workload = workload.clone();
        inner.updates.push(workload.resource_name.clone());
        Ok(true)
    }

    async fn delete(&self, resource_name: &str) -> anyhow::Result<()> {
        if lock(&self.inner).workloads.remove(resource_name).is_some() {
            debug!(resource = %resource_name, "workload deleted");
        }
        Ok(())
    }

    async fn set_running(&self, resource_name: &str, running: bool) -> anyhow::Result<()> {
        let mut inner = lock(&self.inner);
        let entry = inner
            .workloads
            .get_mut(resource_name)
            .ok_or_else(|| anyhow!("workload {resource_name} not found"))?;
        entry.running = running;
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.names())
    }

    async fn list_volume_claims(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.volume_claims())
    }

    async fn delete_volume_claim(&self, name: &str) -> anyhow::Result<()> {
        lock(&self.inner).claims.remove(name);
        Ok(())
    }

    async fn live_members(&self) -> anyhow::Result<Vec<LiveMember>> {
        Ok(self
            .running()
            .into_iter()
            .map(|w| LiveMember::new(w.member_id, w.node))
            .collect())
    }
}

// ── Scheduling ─────────────────────────────────────────────────────

/// Scheduler that ranks a fixed node inventory.
#[derive(Debug, Clone, Default)]
pub struct InventoryScheduler {
    nodes: Vec<NodeCandidate>,
}

impl InventoryScheduler {
    pub fn new(nodes: Vec<NodeCandidate>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl PlacementScheduler for InventoryScheduler {
    async fn schedule(&self, request: &ScheduleRequest) -> anyhow::Result<ScheduledNode> {
        let requirements = PlacementRequirements {
            zone: request.zone.clone(),
            allow_multiple_per_node: request.allow_multiple_per_node,
        };
        let ranked = rank_nodes(&self.nodes, &requirements, &request.occupancy);
        let best = ranked.first().ok_or_else(|| PlacementError::NoEligibleNode {
            member: request.member_id.clone(),
            zone: request.zone.clone(),
        })?;
        let node = self
            .nodes
            .iter()
            .find(|n| n.node_id == best.node_id)
            .ok_or_else(|| anyhow!("ranked node {} missing from inventory", best.node_id))?;

        Ok(ScheduledNode {
            node: node.node_id.clone(),
            zone: node.zone.clone(),
            address: node.address.clone(),
        })
    }
}

/// Scheduler that puts every member on the same node.
#[derive(Debug, Clone)]
pub struct PinnedScheduler {
    node: NodeId,
}

impl PinnedScheduler {
    pub fn new(node: impl Into<NodeId>) -> Self {
        Self { node: node.into() }
    }
}

#[async_trait]
impl PlacementScheduler for PinnedScheduler {
    async fn schedule(&self, request: &ScheduleRequest) -> anyhow::Result<ScheduledNode> {
        Ok(ScheduledNode {
            node: self.node.clone(),
            zone: request.zone.clone(),
            address: None,
        })
    }
}

// ── Quorum ─────────────────────────────────────────────────────────

/// Quorum source replaying a settable snapshot. `None` means unreachable.
#[derive(Debug, Default)]
pub struct StaticQuorum {
    status: Mutex<Option<QuorumStatus>>,
}

impl StaticQuorum {
    pub fn new(status: QuorumStatus) -> Self {
        Self {
            status: Mutex::new(Some(status)),
        }
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn set(&self, status: QuorumStatus) {
        *lock(&self.status) = Some(status);
    }

    pub fn set_unreachable(&self) {
        *lock(&self.status) = None;
    }
}

#[async_trait]
impl QuorumStatusSource for StaticQuorum {
    async fn quorum_status(&self) -> anyhow::Result<QuorumStatus> {
        lock(&self.status)
            .clone()
            .ok_or_else(|| anyhow!("mon quorum status unavailable"))
    }
}

/// Quorum source derived from in-memory workloads.
///
/// Every workload is listed; running ones are in quorum.
pub struct WorkloadQuorum {
    workloads: Arc<InMemoryWorkloads>,
}

impl WorkloadQuorum {
    pub fn new(workloads: Arc<InMemoryWorkloads>) -> Self {
        Self { workloads }
    }
}

#[async_trait]
impl QuorumStatusSource for WorkloadQuorum {
    async fn quorum_status(&self) -> anyhow::Result<QuorumStatus> {
        let inner = lock(&self.workloads.inner);
        let mut status = QuorumStatus::default();
        for (rank, entry) in inner.workloads.values().enumerate() {
            let rank = rank as i32;
            if entry.running {
                status.quorum.push(rank);
            }
            status.mons.push(QuorumMember {
                name: entry.workload.member_id.clone(),
                rank,
                public_addr: entry.workload.endpoint.clone(),
            });
        }
        Ok(status)
    }
}

// ── Clock ──────────────────────────────────────────────────────────

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *lock(&self.now) += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *lock(&self.now)
    }
}
