//! In-memory cluster state owned by the reconciler.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use tracing::debug;

use crate::id::{index_to_name, name_to_index};
use crate::types::*;

/// A member currently being replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingFailover {
    /// Network mode the outgoing member runs with.
    pub host_network: bool,
}

/// Identity and membership of a bootstrapped cluster.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterInfo {
    pub fsid: String,
    /// Members this system created and manages.
    pub internal: BTreeMap<MemberId, MemberRecord>,
    /// Spec-declared external members currently present in quorum.
    pub external: BTreeMap<MemberId, MemberRecord>,
}

impl ClusterInfo {
    pub fn new(fsid: impl Into<String>) -> Self {
        Self {
            fsid: fsid.into(),
            ..Default::default()
        }
    }
}

/// The reconciler's source of truth.
#[derive(Debug, Clone)]
pub struct ClusterState {
    pub spec: ClusterSpec,
    /// `None` until the cluster has been bootstrapped.
    pub info: Option<ClusterInfo>,
    pub placement: BTreeMap<MemberId, PlacementRecord>,
    /// Highest allocated id index; `-1` when nothing has been allocated.
    pub max_id: i32,
    pub pending_failover: BTreeMap<MemberId, PendingFailover>,
    /// When each member was first seen out of quorum.
    pub out_of_quorum_since: HashMap<MemberId, Instant>,
}

impl ClusterState {
    pub fn new(spec: ClusterSpec) -> Self {
        Self {
            spec,
            info: None,
            placement: BTreeMap::new(),
            max_id: -1,
            pending_failover: BTreeMap::new(),
            out_of_quorum_since: HashMap::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.info.is_some()
    }

    /// Allocate the next member id. The cursor never moves backwards.
    pub fn allocate_id(&mut self) -> MemberId {
        self.max_id += 1;
        let id = index_to_name(self.max_id as usize);
        debug!(member = %id, max_id = self.max_id, "allocated member id");
        id
    }

    /// Advance the cursor past an id observed elsewhere (restore, bootstrap).
    pub fn observe_id(&mut self, id: &str) {
        if let Some(index) = name_to_index(id) {
            let index = i32::try_from(index).unwrap_or(i32::MAX);
            if index > self.max_id {
                self.max_id = index;
            }
        }
    }

    pub fn internal_count(&self) -> usize {
        self.info.as_ref().map_or(0, |i| i.internal.len())
    }

    /// Ids that must not be treated as missing or orphaned right now.
    pub fn pending_ids(&self) -> Vec<MemberId> {
        self.pending_failover.keys().cloned().collect()
    }

    /// Drop every trace of an internal member.
    pub fn forget_internal(&mut self, id: &str) -> Option<MemberRecord> {
        self.placement.remove(id);
        self.out_of_quorum_since.remove(id);
        self.info.as_mut().and_then(|info| info.internal.remove(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ClusterSpec {
        ClusterSpec {
            namespace: "storage".into(),
            mon: MonSpec {
                count: 3,
                allow_multiple_per_node: false,
                stretch: None,
                external_mon_ids: Vec::new(),
            },
            network: NetworkMode::Default,
            health_check: HealthCheckSpec::default(),
        }
    }

    #[test]
    fn new_state_is_uninitialized() {
        let state = ClusterState::new(spec());
        assert!(!state.is_initialized());
        assert_eq!(state.internal_count(), 0);
        assert_eq!(state.max_id, -1);
    }

    #[test]
    fn allocation_is_monotonic() {
        let mut state = ClusterState::new(spec());
        assert_eq!(state.allocate_id(), "a");
        assert_eq!(state.allocate_id(), "b");
        state.max_id = 4;
        assert_eq!(state.allocate_id(), "f");
    }

    #[test]
    fn observe_only_moves_forward() {
        let mut state = ClusterState::new(spec());
        state.observe_id("c");
        assert_eq!(state.max_id, 2);
        state.observe_id("a");
        assert_eq!(state.max_id, 2);
        state.observe_id("ext-mon-id");
        assert_eq!(state.max_id, 2);
        assert_eq!(state.allocate_id(), "d");
    }

    #[test]
    fn forget_internal_drops_placement() {
        let mut state = ClusterState::new(spec());
        let mut info = ClusterInfo::new("fsid");
        info.internal.insert("a".into(), MemberRecord::new("a", "10.0.0.1:6789"));
        state.info = Some(info);
        state.placement.insert("a".into(), PlacementRecord::on_node("node1"));

        let removed = state.forget_internal("a");
        assert_eq!(removed.map(|m| m.id), Some("a".to_string()));
        assert!(state.placement.is_empty());
        assert_eq!(state.internal_count(), 0);
    }
}
