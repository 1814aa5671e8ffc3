//! `MonCluster` — the reconciler's handle on one monitor group.
//!
//! Owns the `ClusterState` and the collaborators. The pass itself lives in
//! `health`, structural changes in `scale` and `failover`; this module
//! covers bootstrap, restore, persistence and quorum-state tracking.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use monguard_state::{
    ClusterInfo, ClusterSpec, ClusterState, ConfigStore, EndpointRecord, MemberId, MemberRecord,
    format_endpoints, join_ids,
};

use crate::backend::{
    Clock, MonWorkload, PlacementScheduler, QuorumStatusSource, SystemClock, WorkloadManager,
    resource_name,
};
use crate::error::{ReconcileError, ReconcileResult};

/// How long a member may stay out of quorum before it is failed over.
pub const DEFAULT_OUT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// The collaborators a cluster reconciles through.
#[derive(Clone)]
pub struct Backends {
    pub quorum: Arc<dyn QuorumStatusSource>,
    pub scheduler: Arc<dyn PlacementScheduler>,
    pub workloads: Arc<dyn WorkloadManager>,
    pub store: Arc<dyn ConfigStore>,
}

pub struct MonCluster {
    pub(crate) state: ClusterState,
    pub(crate) backends: Backends,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) out_timeout: Duration,
}

impl MonCluster {
    pub fn new(spec: ClusterSpec, backends: Backends) -> Self {
        Self {
            state: ClusterState::new(spec),
            backends,
            clock: Arc::new(SystemClock),
            out_timeout: DEFAULT_OUT_TIMEOUT,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn set_out_timeout(&mut self, timeout: Duration) {
        self.out_timeout = timeout;
    }

    pub fn out_timeout(&self) -> Duration {
        self.out_timeout
    }

    pub fn state(&self) -> &ClusterState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ClusterState {
        &mut self.state
    }

    pub fn spec(&self) -> &ClusterSpec {
        &self.state.spec
    }

    pub fn namespace(&self) -> &str {
        &self.state.spec.namespace
    }

    /// Seed cluster info for a freshly bootstrapped group.
    ///
    /// The allocation cursor moves past every seeded id.
    pub fn initialize(&mut self, fsid: impl Into<String>, members: impl IntoIterator<Item = MemberRecord>) {
        let mut info = ClusterInfo::new(fsid);
        for member in members {
            self.state.observe_id(&member.id);
            info.internal.insert(member.id.clone(), member);
        }
        info!(
            namespace = %self.state.spec.namespace,
            members = info.internal.len(),
            max_id = self.state.max_id,
            "cluster initialized"
        );
        self.state.info = Some(info);
    }

    /// Rebuild cluster info from the persisted endpoint record.
    ///
    /// Returns `false` (and leaves the state untouched) when nothing was
    /// persisted for this namespace yet.
    pub fn load_from_store(&mut self, fsid: impl Into<String>) -> ReconcileResult<bool> {
        let Some(record) = self.backends.store.load(&self.state.spec.namespace)? else {
            debug!(namespace = %self.state.spec.namespace, "no persisted endpoint record");
            return Ok(false);
        };

        let external_ids = record.external_ids();
        let mut info = ClusterInfo::new(fsid);
        for (id, member) in record.endpoints() {
            if external_ids.contains(&id) {
                info.external.insert(id, member);
            } else {
                self.state.observe_id(&id);
                info.internal.insert(id, member);
            }
        }

        let mut placement = record.placement()?;
        placement.retain(|id, _| info.internal.contains_key(id));
        self.state.placement = placement;
        self.state.max_id = self.state.max_id.max(record.max_id);

        let now = self.clock.now();
        for member in info.internal.values().filter(|m| m.out_of_quorum) {
            self.state.out_of_quorum_since.insert(member.id.clone(), now);
        }

        info!(
            namespace = %self.state.spec.namespace,
            internal = info.internal.len(),
            external = info.external.len(),
            max_id = self.state.max_id,
            "cluster state restored"
        );
        self.state.info = Some(info);
        Ok(true)
    }

    pub(crate) fn info(&self) -> ReconcileResult<&ClusterInfo> {
        self.state
            .info
            .as_ref()
            .ok_or_else(|| ReconcileError::Precondition("cluster info is not initialized".into()))
    }

    pub(crate) fn info_mut(&mut self) -> ReconcileResult<&mut ClusterInfo> {
        self.state
            .info
            .as_mut()
            .ok_or_else(|| ReconcileError::Precondition("cluster info is not initialized".into()))
    }

    /// Ids of every member (internal or external) flagged out of quorum.
    pub fn out_of_quorum_ids(&self) -> Vec<MemberId> {
        let Some(info) = self.state.info.as_ref() else {
            return Vec::new();
        };
        info.internal
            .values()
            .chain(info.external.values())
            .filter(|m| m.out_of_quorum)
            .map(|m| m.id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Endpoint table of the whole group, internal members first.
    pub fn endpoint_table(&self) -> String {
        match self.state.info.as_ref() {
            Some(info) => format_endpoints(info.internal.values().chain(info.external.values())),
            None => String::new(),
        }
    }

    /// Persist the full derived state to the config store.
    pub fn save_mon_config(&self) -> ReconcileResult<()> {
        let info = self.info()?;
        let mut record = EndpointRecord {
            data: self.endpoint_table(),
            external_mons: join_ids(info.external.keys()),
            out_of_quorum: join_ids(&self.out_of_quorum_ids()),
            max_id: self.state.max_id,
            ..Default::default()
        };
        record.set_placement(&self.state.placement)?;

        self.backends.store.save(&self.state.spec.namespace, &record)?;
        debug!(
            namespace = %self.state.spec.namespace,
            endpoints = %record.data,
            out_of_quorum = %record.out_of_quorum,
            "mon config saved"
        );
        Ok(())
    }

    /// Write the full internal member set to the store, all in quorum.
    pub fn persist_expected_members(&mut self) -> ReconcileResult<()> {
        let info = self.info_mut()?;
        for member in info.internal.values_mut() {
            member.out_of_quorum = false;
        }
        let ids: Vec<MemberId> = info.internal.keys().cloned().collect();
        for id in &ids {
            self.state.out_of_quorum_since.remove(id);
        }

        let record = EndpointRecord {
            data: format_endpoints(self.info()?.internal.values()),
            max_id: self.state.max_id,
            ..Default::default()
        };
        self.backends.store.save(&self.state.spec.namespace, &record)?;
        info!(namespace = %self.state.spec.namespace, endpoints = %record.data, "expected members persisted");
        Ok(())
    }

    /// Record whether a member is in quorum.
    ///
    /// Writes the aggregate out-of-quorum list only when the member's flag
    /// actually flips, and returns whether it did. Unknown ids are ignored.
    /// Without a stored record the full derived record is written instead.
    pub fn track_member_quorum_state(&mut self, id: &str, in_quorum: bool) -> ReconcileResult<bool> {
        let out_of_quorum = !in_quorum;
        {
            let info = self.info_mut()?;
            let Some(member) = info.internal.get_mut(id).or(info.external.get_mut(id)) else {
                debug!(member = %id, "ignoring quorum state of unknown member");
                return Ok(false);
            };
            if member.out_of_quorum == out_of_quorum {
                return Ok(false);
            }
            member.out_of_quorum = out_of_quorum;
        }

        if out_of_quorum {
            let now = self.clock.now();
            self.state.out_of_quorum_since.entry(id.to_string()).or_insert(now);
        } else {
            self.state.out_of_quorum_since.remove(id);
        }

        let out_of_quorum = join_ids(&self.out_of_quorum_ids());
        let namespace = &self.state.spec.namespace;
        match self.backends.store.load(namespace)? {
            Some(mut record) => {
                record.out_of_quorum = out_of_quorum.clone();
                self.backends.store.save(namespace, &record)?;
            }
            // Nothing seeded yet: a bare list would persist an empty table.
            None => self.save_mon_config()?,
        }

        info!(member = %id, in_quorum, %out_of_quorum, "member quorum state changed");
        Ok(true)
    }

    /// Workload definition for an internal member as it stands now.
    pub(crate) fn workload_for(&self, id: &str) -> ReconcileResult<MonWorkload> {
        let member = self
            .info()?
            .internal
            .get(id)
            .ok_or_else(|| ReconcileError::Precondition(format!("member {id} is not managed")))?;
        let placement = self.state.placement.get(id);
        Ok(MonWorkload {
            resource_name: resource_name(id),
            member_id: id.to_string(),
            node: placement.map(|p| p.node.clone()).unwrap_or_default(),
            host_network: placement.map_or(self.state.spec.network.is_host(), |p| p.host_network),
            endpoint: member.endpoint.clone(),
            endpoint_table: self.endpoint_table(),
        })
    }
}
