//! HealthChecker — runs the reconciliation pass on a fixed interval.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use monguard_reconcile::{MonCluster, ReconcileResult};

use crate::settings::{CheckerSettings, OperatorOverrides};

pub struct HealthChecker {
    cluster: Arc<Mutex<MonCluster>>,
    settings: CheckerSettings,
}

impl HealthChecker {
    pub fn new(cluster: Arc<Mutex<MonCluster>>, settings: CheckerSettings) -> Self {
        Self { cluster, settings }
    }

    /// Resolve settings against the cluster's own overrides and hand the
    /// timeout to the cluster as its out-of-quorum grace period.
    pub async fn for_cluster(cluster: Arc<Mutex<MonCluster>>, operator: &OperatorOverrides) -> Self {
        let settings = {
            let mut guard = cluster.lock().await;
            let settings = CheckerSettings::resolve(&guard.spec().health_check, operator);
            guard.set_out_timeout(settings.timeout);
            settings
        };
        Self::new(cluster, settings)
    }

    pub fn settings(&self) -> CheckerSettings {
        self.settings
    }

    /// One pass followed by orphan cleanup.
    ///
    /// Cleanup only runs after a successful pass.
    pub async fn run_once(&self) -> ReconcileResult<()> {
        let mut cluster = self.cluster.lock().await;
        cluster.check_health().await?;

        let removed = cluster.remove_orphan_resources().await?;
        if !removed.is_empty() {
            info!(
                workloads = ?removed.workloads,
                volume_claims = ?removed.volume_claims,
                "orphaned mon resources removed"
            );
        }
        Ok(())
    }

    /// Loop until `shutdown` fires. A pass in flight at that moment is
    /// dropped at its next await point.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval = ?self.settings.interval,
            timeout = ?self.settings.timeout,
            "mon health checker started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                _ = shutdown.changed() => break,
            }

            tokio::select! {
                result = self.run_once() => {
                    if let Err(e) = result {
                        warn!(error = %e, "mon health check failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        debug!("mon health checker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use monguard_reconcile::Backends;
    use monguard_reconcile::local::{InMemoryWorkloads, PinnedScheduler, StaticQuorum};
    use monguard_state::*;

    fn spec(count: i32, health_check: HealthCheckSpec) -> ClusterSpec {
        ClusterSpec {
            namespace: "storage".into(),
            mon: MonSpec {
                count,
                allow_multiple_per_node: true,
                stretch: None,
                external_mon_ids: Vec::new(),
            },
            network: NetworkMode::Default,
            health_check,
        }
    }

    fn cluster(
        spec: ClusterSpec,
        quorum: Arc<StaticQuorum>,
        workloads: Arc<InMemoryWorkloads>,
    ) -> Arc<Mutex<MonCluster>> {
        let backends = Backends {
            quorum,
            scheduler: Arc::new(PinnedScheduler::new("node0")),
            workloads,
            store: Arc::new(RedbConfigStore::open_in_memory().unwrap()),
        };
        let mut cluster = MonCluster::new(spec, backends);
        cluster.initialize("fsid", [MemberRecord::new("a", "10.0.0.1:6789")]);
        Arc::new(Mutex::new(cluster))
    }

    #[tokio::test]
    async fn for_cluster_applies_timeout() {
        let health_check = HealthCheckSpec {
            interval: Some("1m".into()),
            timeout: None,
        };
        let cluster = cluster(
            spec(3, health_check),
            Arc::new(StaticQuorum::unreachable()),
            Arc::new(InMemoryWorkloads::new()),
        );
        let operator = OperatorOverrides {
            interval: Some("10s".into()),
            timeout: Some("2m".into()),
        };

        let checker = HealthChecker::for_cluster(cluster.clone(), &operator).await;
        assert_eq!(checker.settings().interval, Duration::from_secs(60));
        assert_eq!(checker.settings().timeout, Duration::from_secs(120));
        assert_eq!(cluster.lock().await.out_timeout(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn run_once_reconciles_then_cleans_orphans() {
        let workloads = Arc::new(InMemoryWorkloads::new());
        workloads.insert_running("zz", "node9");
        let quorum = Arc::new(StaticQuorum::new(QuorumStatus::all_in_quorum([(
            "a",
            "10.0.0.1:6789",
        )])));
        let cluster = cluster(spec(3, HealthCheckSpec::default()), quorum, workloads.clone());
        let checker = HealthChecker::new(cluster.clone(), CheckerSettings::default());

        checker.run_once().await.unwrap();

        assert_eq!(cluster.lock().await.state().internal_count(), 3);
        assert_eq!(workloads.names(), vec!["mon-b", "mon-c"]);
    }

    #[tokio::test]
    async fn failed_pass_skips_cleanup() {
        let workloads = Arc::new(InMemoryWorkloads::new());
        workloads.insert_running("zz", "node9");
        let cluster = cluster(
            spec(3, HealthCheckSpec::default()),
            Arc::new(StaticQuorum::unreachable()),
            workloads.clone(),
        );
        let checker = HealthChecker::new(cluster, CheckerSettings::default());

        assert!(checker.run_once().await.is_err());
        assert_eq!(workloads.names(), vec!["mon-zz"]);
    }

    #[tokio::test(start_paused = true)]
    async fn runs_on_interval_until_shutdown() {
        let workloads = Arc::new(InMemoryWorkloads::new());
        let quorum = Arc::new(StaticQuorum::new(QuorumStatus::all_in_quorum([(
            "a",
            "10.0.0.1:6789",
        )])));
        let cluster = cluster(spec(2, HealthCheckSpec::default()), quorum, workloads.clone());
        let checker = HealthChecker::new(
            cluster.clone(),
            CheckerSettings {
                interval: Duration::from_secs(45),
                timeout: Duration::from_secs(600),
            },
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { checker.run(rx).await });

        // Before the first interval elapses nothing has happened.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(cluster.lock().await.state().internal_count(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(cluster.lock().await.state().internal_count(), 2);

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(workloads.names(), vec!["mon-b"]);
    }
}
