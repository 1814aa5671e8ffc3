//! One reconciliation pass: query, classify, refresh, replace, scale, persist.

use std::collections::BTreeMap;

use anyhow::anyhow;
use tracing::{debug, info, warn};

use monguard_state::{
    ClusterInfo, ClusterSpec, MemberId, MemberRecord, PendingFailover, QuorumMember, QuorumStatus,
    remove_members_from_quorum_status,
};

use crate::cluster::MonCluster;
use crate::error::{ReconcileError, ReconcileResult};

/// Health of an internal member against a quorum snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberHealth {
    InQuorum,
    OutOfQuorum,
    /// Absent from the snapshot's member list.
    NotFound,
    /// Being replaced; filtered out of the snapshot.
    FailingOver,
}

/// Who a snapshot entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOwner {
    Internal,
    /// Declared external in the spec.
    External,
    /// Neither managed nor declared; ignored.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub member: QuorumMember,
    pub in_quorum: bool,
    pub owner: SnapshotOwner,
}

/// Result of classifying a snapshot against the cluster state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub internal: BTreeMap<MemberId, MemberHealth>,
    pub snapshot: Vec<SnapshotEntry>,
}

impl Classification {
    pub fn with_health(&self, health: MemberHealth) -> Vec<MemberId> {
        self.internal
            .iter()
            .filter(|(_, h)| **h == health)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn entry(&self, id: &str) -> Option<&SnapshotEntry> {
        self.snapshot.iter().find(|e| e.member.name == id)
    }
}

/// Classify internal members and snapshot entries in one pass.
///
/// `status` must already have pending-failover ids filtered out.
pub fn classify(
    info: &ClusterInfo,
    spec: &ClusterSpec,
    pending: &BTreeMap<MemberId, PendingFailover>,
    status: &QuorumStatus,
) -> Classification {
    let internal = info
        .internal
        .keys()
        .map(|id| {
            let health = if pending.contains_key(id) {
                MemberHealth::FailingOver
            } else {
                match status.member(id) {
                    Some(m) if status.is_in_quorum(m) => MemberHealth::InQuorum,
                    Some(_) => MemberHealth::OutOfQuorum,
                    None => MemberHealth::NotFound,
                }
            };
            (id.clone(), health)
        })
        .collect();

    let snapshot = status
        .mons
        .iter()
        .map(|member| {
            let owner = if info.internal.contains_key(&member.name) {
                SnapshotOwner::Internal
            } else if spec.is_external_declared(&member.name) {
                SnapshotOwner::External
            } else {
                SnapshotOwner::Unknown
            };
            SnapshotEntry {
                member: member.clone(),
                in_quorum: status.is_in_quorum(member),
                owner,
            }
        })
        .collect();

    Classification { internal, snapshot }
}

/// Strip the nonce suffix from a reported address (`10.0.0.1:6789/0`).
fn endpoint_from_addr(addr: &str) -> &str {
    addr.split('/').next().unwrap_or(addr)
}

impl MonCluster {
    /// Run one reconciliation pass.
    ///
    /// Progress made before an error is kept (and already persisted for
    /// every structural change), so the next pass picks up where this one
    /// stopped.
    pub async fn check_health(&mut self) -> ReconcileResult<()> {
        let desired = self.desired_count()?;

        let status = self
            .backends
            .quorum
            .quorum_status()
            .await
            .map_err(ReconcileError::RemoteQuery)?;
        if status.mons.is_empty() {
            return Err(ReconcileError::RemoteQuery(anyhow!("quorum status lists no members")));
        }

        let pending = self.state.pending_ids();
        let status = remove_members_from_quorum_status(&status, &pending);
        let report = classify(self.info()?, &self.state.spec, &self.state.pending_failover, &status);
        debug!(
            namespace = %self.state.spec.namespace,
            members = ?report.internal,
            quorum = ?status.quorum,
            "checking mon health"
        );

        self.refresh_internal_members(&report)?;
        if self.reconcile_external_members(&report)? {
            info!(external = ?self.info()?.external.keys().collect::<Vec<_>>(), "external members changed");
        }

        self.replace_lost_members(&report).await?;
        self.scale(desired).await?;

        self.save_mon_config()
    }

    fn desired_count(&self) -> ReconcileResult<usize> {
        self.info()?;
        let count = self.state.spec.mon.count;
        if count <= 0 {
            return Err(ReconcileError::Precondition(format!(
                "desired mon count must be positive, got {count}"
            )));
        }
        Ok(count as usize)
    }

    fn refresh_internal_members(&mut self, report: &Classification) -> ReconcileResult<()> {
        for (id, health) in &report.internal {
            let in_quorum = match health {
                MemberHealth::InQuorum => true,
                MemberHealth::OutOfQuorum => false,
                MemberHealth::NotFound | MemberHealth::FailingOver => continue,
            };

            if let Some(entry) = report.entry(id)
                && !entry.member.public_addr.is_empty()
            {
                let endpoint = endpoint_from_addr(&entry.member.public_addr);
                if let Some(member) = self.info_mut()?.internal.get_mut(id)
                    && member.endpoint != endpoint
                {
                    debug!(member = %id, old = %member.endpoint, new = %endpoint, "refreshing endpoint");
                    member.endpoint = endpoint.to_string();
                }
            }

            self.track_member_quorum_state(id, in_quorum)?;
            if !in_quorum {
                let now = self.clock.now();
                self.state.out_of_quorum_since.entry(id.clone()).or_insert(now);
            }
        }
        Ok(())
    }

    /// Mirror spec-declared external members present in the snapshot.
    ///
    /// Returns whether the external set changed.
    fn reconcile_external_members(&mut self, report: &Classification) -> ReconcileResult<bool> {
        let mut present: BTreeMap<MemberId, MemberRecord> = BTreeMap::new();
        for entry in &report.snapshot {
            match entry.owner {
                SnapshotOwner::External => {
                    let mut record = MemberRecord::new(
                        entry.member.name.as_str(),
                        endpoint_from_addr(&entry.member.public_addr),
                    );
                    record.out_of_quorum = !entry.in_quorum;
                    present.insert(entry.member.name.clone(), record);
                }
                SnapshotOwner::Unknown => {
                    debug!(member = %entry.member.name, "ignoring unmanaged member in quorum status");
                }
                SnapshotOwner::Internal => {}
            }
        }

        let info = self.info_mut()?;
        let mut changed = false;

        info.external.retain(|id, _| {
            let keep = present.contains_key(id);
            if !keep {
                info!(member = %id, "external member left quorum status, dropping");
                changed = true;
            }
            keep
        });

        for (id, record) in present {
            if info.external.get(&id) != Some(&record) {
                if !info.external.contains_key(&id) {
                    info!(member = %id, endpoint = %record.endpoint, "adopting external member");
                }
                info.external.insert(id, record);
                changed = true;
            }
        }

        Ok(changed)
    }

    async fn replace_lost_members(&mut self, report: &Classification) -> ReconcileResult<()> {
        let lost = report.with_health(MemberHealth::NotFound);
        if !lost.is_empty() && lost.len() == report.internal.len() {
            warn!(
                members = ?lost,
                "no managed member appears in quorum status, not replacing any"
            );
        } else {
            for id in lost {
                self.replace_member(&id).await?;
            }
        }

        for id in self.state.pending_ids() {
            info!(member = %id, "resuming failover");
            self.failover_member(&id).await?;
        }
        Ok(())
    }
}
