//! Scaling: eager growth, cautious shrink.
//!
//! Growth adds every missing member in one pass. Shrinking removes at most
//! one member per pass and never drops below a majority of the group as it
//! was when the pass started.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use monguard_placement::{determine_extra_member, occupancy, zone_for_new_member};
use monguard_state::{DEFAULT_MON_PORT, MemberId, MemberRecord, PlacementRecord};

use crate::backend::{MonWorkload, ScheduleRequest, resource_name};
use crate::cluster::MonCluster;
use crate::error::{ReconcileError, ReconcileResult};

/// Smallest member count that still holds a majority of `count`.
pub fn quorum_floor(count: usize) -> usize {
    count / 2 + 1
}

impl MonCluster {
    pub(crate) async fn scale(&mut self, desired: usize) -> ReconcileResult<()> {
        let count = self.state.internal_count();
        match count.cmp(&desired) {
            Ordering::Less => {
                info!(count, desired, "scaling up mons");
                while self.state.internal_count() < desired {
                    self.add_member().await?;
                }
            }
            Ordering::Greater => {
                self.remove_extra_member().await?;
            }
            Ordering::Equal => {
                if !self.failover_out_of_quorum_member().await? {
                    self.evict_if_collocated().await?;
                }
            }
        }
        Ok(())
    }

    /// Allocate, schedule and start one new member.
    ///
    /// The new member is persisted right away and the refreshed endpoint
    /// table is pushed to every other member's workload.
    pub async fn add_member(&mut self) -> ReconcileResult<MemberId> {
        let id = self.next_member_id()?;
        self.start_member(&id).await?;
        self.save_mon_config()?;
        self.push_endpoint_table(&id).await?;
        info!(member = %id, count = self.state.internal_count(), "mon added");
        Ok(id)
    }

    /// Allocate the next id, skipping any id in use by an external member.
    pub(crate) fn next_member_id(&mut self) -> ReconcileResult<MemberId> {
        loop {
            let id = self.state.allocate_id();
            let taken = self.state.spec.is_external_declared(&id)
                || self.info()?.external.contains_key(&id);
            if !taken {
                return Ok(id);
            }
            warn!(member = %id, "id belongs to an external mon, skipping");
        }
    }

    /// Schedule and create the workload for an allocated id, then record it
    /// as internal.
    ///
    /// Nothing is recorded until the workload exists, so a failure (or a
    /// dropped pass) leaves only the consumed id behind.
    pub(crate) async fn start_member(&mut self, id: &str) -> ReconcileResult<()> {
        let spec = &self.state.spec;
        let zone = spec
            .mon
            .stretch
            .as_ref()
            .and_then(|stretch| zone_for_new_member(&self.state.placement, stretch));
        let request = ScheduleRequest {
            member_id: id.to_string(),
            resource_name: resource_name(id),
            zone,
            allow_multiple_per_node: spec.mon.allow_multiple_per_node,
            occupancy: occupancy(&self.state.placement),
        };

        let scheduled = self
            .backends
            .scheduler
            .schedule(&request)
            .await
            .map_err(|source| ReconcileError::Scheduling { id: id.to_string(), source })?;

        let host_network = spec.network.is_host();
        let address = if host_network { scheduled.address.clone() } else { None };
        let endpoint = format!("{}:{}", address.as_deref().unwrap_or(""), DEFAULT_MON_PORT);
        let member = MemberRecord::new(id, endpoint.as_str());

        let mut table = self.info()?.internal.clone();
        table.insert(id.to_string(), member.clone());
        let workload = MonWorkload {
            resource_name: request.resource_name.clone(),
            member_id: id.to_string(),
            node: scheduled.node.clone(),
            host_network,
            endpoint,
            endpoint_table: monguard_state::format_endpoints(
                table.values().chain(self.info()?.external.values()),
            ),
        };

        self.backends
            .workloads
            .create(&workload)
            .await
            .map_err(ReconcileError::workload(&request.resource_name))?;

        let placement = PlacementRecord {
            node: scheduled.node,
            zone: scheduled.zone.or(request.zone),
            address,
            host_network,
        };
        info!(member = %id, node = %placement.node, zone = ?placement.zone, "mon scheduled");
        self.state.placement.insert(id.to_string(), placement);
        self.info_mut()?.internal.insert(id.to_string(), member);
        Ok(())
    }

    /// Roll the current endpoint table out to every member except `skip`.
    pub(crate) async fn push_endpoint_table(&self, skip: &str) -> ReconcileResult<()> {
        let ids: Vec<MemberId> = self
            .info()?
            .internal
            .keys()
            .filter(|id| id.as_str() != skip)
            .cloned()
            .collect();
        for id in ids {
            let workload = self.workload_for(&id)?;
            let updated = self
                .backends
                .workloads
                .update(&workload)
                .await
                .map_err(ReconcileError::workload(&workload.resource_name))?;
            if updated {
                debug!(member = %id, "endpoint table pushed");
            } else {
                debug!(member = %id, "no workload to update");
            }
        }
        Ok(())
    }

    /// Remove one member if the group is over its desired size.
    ///
    /// Refuses when the remaining count would lose the majority of the
    /// current count, or while any member is out of quorum.
    pub async fn remove_extra_member(&mut self) -> ReconcileResult<Option<MemberId>> {
        let info = self.info()?;
        let count = info.internal.len();
        let floor = quorum_floor(count);
        if count.saturating_sub(1) < floor {
            info!(count, floor, "not removing a mon: would lose quorum majority");
            return Ok(None);
        }

        let out: Vec<&MemberId> = info
            .internal
            .values()
            .filter(|m| m.out_of_quorum)
            .map(|m| &m.id)
            .collect();
        if !out.is_empty() {
            info!(out_of_quorum = ?out, "not removing a mon while members are out of quorum");
            return Ok(None);
        }

        let placement: BTreeMap<MemberId, PlacementRecord> = self
            .state
            .placement
            .iter()
            .filter(|(id, _)| info.internal.contains_key(*id))
            .map(|(id, p)| (id.clone(), p.clone()))
            .collect();
        let stretch = self.state.spec.mon.stretch.as_ref();
        let extra = determine_extra_member(&placement, stretch).or_else(|| {
            // Members without a placement record (bootstrapped, restored
            // from an older record) are still fair game outside stretch.
            if stretch.is_none() {
                info.internal.keys().next_back().cloned()
            } else {
                None
            }
        });

        let Some(id) = extra else {
            warn!(count, "mon group over count but no member is extra");
            return Ok(None);
        };
        self.remove_member(&id).await?;
        Ok(Some(id))
    }

    /// Delete a member's workload and forget it.
    pub async fn remove_member(&mut self, id: &str) -> ReconcileResult<()> {
        let name = resource_name(id);
        self.backends
            .workloads
            .delete(&name)
            .await
            .map_err(ReconcileError::workload(&name))?;
        self.state.forget_internal(id);
        self.save_mon_config()?;
        info!(member = %id, count = self.state.internal_count(), "mon removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_keeps_majority() {
        assert_eq!(quorum_floor(1), 1);
        assert_eq!(quorum_floor(2), 2);
        assert_eq!(quorum_floor(3), 2);
        assert_eq!(quorum_floor(4), 3);
        assert_eq!(quorum_floor(5), 3);
    }
}
