//! Failover, replacement of lost members, and eviction-on-collocation.

use tracing::{debug, info, warn};

use monguard_placement::find_collocated;
use monguard_state::{MemberId, PendingFailover};

use crate::backend::resource_name;
use crate::cluster::MonCluster;
use crate::error::{ReconcileError, ReconcileResult};

impl MonCluster {
    /// Replace a member with a freshly allocated one.
    ///
    /// The old id is marked pending until the replacement exists, so a
    /// failure part way through is resumed on the next pass. The old
    /// workload is never deleted here; orphan cleanup takes care of it.
    pub async fn failover_member(&mut self, id: &str) -> ReconcileResult<MemberId> {
        let host_network = self
            .state
            .placement
            .get(id)
            .map_or(self.state.spec.network.is_host(), |p| p.host_network);
        self.state
            .pending_failover
            .entry(id.to_string())
            .or_insert(PendingFailover { host_network });

        if self.stop_member_during_failover(id) {
            let name = resource_name(id);
            match self.backends.workloads.set_running(&name, false).await {
                Ok(()) => debug!(member = %id, "stopped mon for failover"),
                Err(e) => warn!(member = %id, error = %e, "failed to stop mon during failover"),
            }
        }

        let new_id = self.next_member_id()?;
        self.start_member(&new_id).await?;

        self.state.forget_internal(id);
        self.state.pending_failover.remove(id);
        self.save_mon_config()?;
        info!(old = %id, new = %new_id, "mon failed over");
        Ok(new_id)
    }

    /// Whether the outgoing member must be stopped before its replacement
    /// starts.
    ///
    /// Only a member that stays on host networking can keep running; any
    /// other member (or one switching network mode) must stop first.
    pub fn stop_member_during_failover(&self, id: &str) -> bool {
        let host_network = self.state.spec.network.is_host();
        match self.state.pending_failover.get(id) {
            Some(pending) if pending.host_network != host_network => true,
            _ => !host_network,
        }
    }

    /// Swap a member missing from the quorum status for a new one.
    pub(crate) async fn replace_member(&mut self, id: &str) -> ReconcileResult<MemberId> {
        warn!(member = %id, "mon not found in quorum status, replacing");
        let new_id = self.next_member_id()?;
        self.start_member(&new_id).await?;
        self.state.forget_internal(id);
        self.save_mon_config()?;
        info!(old = %id, new = %new_id, "mon replaced");
        Ok(new_id)
    }

    /// Fail over the member that has been out of quorum the longest, once
    /// it has been out for longer than the timeout.
    ///
    /// Skipped when the remaining in-quorum members would not hold a
    /// majority. Returns whether a failover happened.
    pub async fn failover_out_of_quorum_member(&mut self) -> ReconcileResult<bool> {
        let now = self.clock.now();
        let info = self.info()?;

        let mut expired: Vec<(&MemberId, std::time::Duration)> = info
            .internal
            .values()
            .filter(|m| m.out_of_quorum)
            .filter_map(|m| {
                let since = self.state.out_of_quorum_since.get(&m.id)?;
                let elapsed = now.saturating_duration_since(*since);
                (elapsed > self.out_timeout).then_some((&m.id, elapsed))
            })
            .collect();
        expired.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let Some((id, elapsed)) = expired.first() else {
            return Ok(false);
        };

        let total = info.internal.len();
        let in_quorum = info.internal.values().filter(|m| !m.out_of_quorum).count();
        if in_quorum < total / 2 + 1 {
            warn!(
                member = %id,
                in_quorum,
                total,
                "mon out of quorum past timeout but too few members in quorum to fail over"
            );
            return Ok(false);
        }

        let id = (*id).clone();
        warn!(member = %id, elapsed_secs = elapsed.as_secs(), "mon out of quorum past timeout, failing over");
        self.failover_member(&id).await?;
        Ok(true)
    }

    /// Fail over one member sharing a node with another running member.
    ///
    /// Only internal members count. No-op when collocation is allowed. Returns whether a member was
    /// failed over.
    pub async fn evict_if_collocated(&mut self) -> ReconcileResult<bool> {
        if self.state.spec.mon.allow_multiple_per_node {
            return Ok(false);
        }

        let mut live = self
            .backends
            .workloads
            .live_members()
            .await
            .map_err(ReconcileError::workload("mon workloads"))?;
        // Leftovers of replaced members are orphans, not members to evict.
        let internal = &self.info()?.internal;
        live.retain(|m| internal.contains_key(&m.id));
        let Some(id) = find_collocated(&live) else {
            debug!(live = live.len(), "no collocated mons");
            return Ok(false);
        };

        info!(member = %id, "mon shares a node with another mon, evicting");
        self.failover_member(&id).await?;
        Ok(true)
    }
}
