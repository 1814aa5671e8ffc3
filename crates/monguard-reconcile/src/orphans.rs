//! Orphan cleanup: member workloads and volume claims nobody owns anymore.

use std::collections::BTreeSet;

use tracing::{debug, info};

use monguard_state::MemberId;

use crate::backend::member_id_from_resource;
use crate::cluster::MonCluster;
use crate::error::{ReconcileError, ReconcileResult};

/// Resources deleted by one cleanup run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrphanReport {
    pub workloads: Vec<String>,
    pub volume_claims: Vec<String>,
}

impl OrphanReport {
    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty() && self.volume_claims.is_empty()
    }
}

impl MonCluster {
    /// Delete every member workload and volume claim whose id is neither
    /// internal nor pending failover.
    ///
    /// Does nothing while no internal member is known.
    pub async fn remove_orphan_resources(&self) -> ReconcileResult<OrphanReport> {
        let info = self.info()?;
        if info.internal.is_empty() {
            debug!("no internal mons known, skipping orphan cleanup");
            return Ok(OrphanReport::default());
        }

        let owned: BTreeSet<&str> = info
            .internal
            .keys()
            .chain(self.state.pending_failover.keys())
            .map(MemberId::as_str)
            .collect();
        let is_orphan =
            |name: &str| member_id_from_resource(name).is_some_and(|id| !owned.contains(id));

        let workloads = &self.backends.workloads;
        let mut report = OrphanReport::default();

        let names = workloads
            .list()
            .await
            .map_err(ReconcileError::workload("mon workloads"))?;
        for name in names.into_iter().filter(|n| is_orphan(n)) {
            workloads
                .delete(&name)
                .await
                .map_err(ReconcileError::workload(&name))?;
            info!(resource = %name, "removed orphaned mon workload");
            report.workloads.push(name);
        }

        let claims = workloads
            .list_volume_claims()
            .await
            .map_err(ReconcileError::workload("mon volume claims"))?;
        for name in claims.into_iter().filter(|n| is_orphan(n)) {
            workloads
                .delete_volume_claim(&name)
                .await
                .map_err(ReconcileError::workload(&name))?;
            info!(resource = %name, "removed orphaned mon volume claim");
            report.volume_claims.push(name);
        }

        Ok(report)
    }
}
