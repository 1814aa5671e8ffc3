//! Interval and timeout resolution for the health checker.

use std::time::Duration;

use tracing::{debug, warn};

use monguard_reconcile::DEFAULT_OUT_TIMEOUT;
use monguard_state::HealthCheckSpec;

/// Time between two reconciliation passes.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(45);

/// How long a member may stay out of quorum before failover.
pub const DEFAULT_TIMEOUT: Duration = DEFAULT_OUT_TIMEOUT;

pub const INTERVAL_ENV: &str = "MONGUARD_MON_HEALTHCHECK_INTERVAL";
pub const TIMEOUT_ENV: &str = "MONGUARD_MON_OUT_TIMEOUT";

/// Operator-wide overrides, usually read from the environment once at
/// startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorOverrides {
    pub interval: Option<String>,
    pub timeout: Option<String>,
}

impl OperatorOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build overrides from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            interval: get(INTERVAL_ENV),
            timeout: get(TIMEOUT_ENV),
        }
    }
}

/// Resolved checker tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckerSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for CheckerSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl CheckerSettings {
    /// Per-cluster values win over operator-wide ones, which win over the
    /// defaults. Unparseable values fall through to the next level.
    pub fn resolve(cluster: &HealthCheckSpec, operator: &OperatorOverrides) -> Self {
        let settings = Self {
            interval: resolve_one(
                "interval",
                cluster.interval.as_deref(),
                operator.interval.as_deref(),
                DEFAULT_INTERVAL,
            ),
            timeout: resolve_one(
                "timeout",
                cluster.timeout.as_deref(),
                operator.timeout.as_deref(),
                DEFAULT_TIMEOUT,
            ),
        };
        debug!(interval = ?settings.interval, timeout = ?settings.timeout, "health check settings resolved");
        settings
    }
}

fn resolve_one(
    name: &str,
    cluster: Option<&str>,
    operator: Option<&str>,
    default: Duration,
) -> Duration {
    for (source, value) in [("cluster", cluster), ("operator", operator)] {
        let Some(value) = value else { continue };
        match parse_duration(value) {
            Some(duration) => return duration,
            None => warn!(setting = name, source, %value, "invalid duration, ignoring"),
        }
    }
    default
}

/// Parse a duration string: "45s", "500ms", "10m", "1h", or plain seconds.
///
/// Zero is rejected.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let duration = if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().and_then(|m| m.checked_mul(60)).map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        hours.parse::<u64>().ok().and_then(|h| h.checked_mul(3600)).map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }?;
    (!duration.is_zero()).then_some(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(interval: Option<&str>, timeout: Option<&str>) -> HealthCheckSpec {
        HealthCheckSpec {
            interval: interval.map(str::to_string),
            timeout: timeout.map(str::to_string),
        }
    }

    fn operator(interval: Option<&str>, timeout: Option<&str>) -> OperatorOverrides {
        OperatorOverrides {
            interval: interval.map(str::to_string),
            timeout: timeout.map(str::to_string),
        }
    }

    #[test]
    fn defaults_without_overrides() {
        let settings = CheckerSettings::resolve(&HealthCheckSpec::default(), &OperatorOverrides::default());
        assert_eq!(settings.interval, Duration::from_secs(45));
        assert_eq!(settings.timeout, Duration::from_secs(600));
        assert_eq!(settings, CheckerSettings::default());
    }

    #[test]
    fn operator_overrides_defaults() {
        let settings = CheckerSettings::resolve(
            &HealthCheckSpec::default(),
            &operator(Some("10s"), Some("10s")),
        );
        assert_eq!(settings.interval, Duration::from_secs(10));
        assert_eq!(settings.timeout, Duration::from_secs(10));
    }

    #[test]
    fn cluster_overrides_operator() {
        let settings = CheckerSettings::resolve(
            &cluster(Some("1m"), Some("1m")),
            &operator(Some("10s"), Some("10s")),
        );
        assert_eq!(settings.interval, Duration::from_secs(60));
        assert_eq!(settings.timeout, Duration::from_secs(60));
    }

    #[test]
    fn invalid_values_fall_through() {
        let settings = CheckerSettings::resolve(
            &cluster(Some("soon"), Some("0s")),
            &operator(Some("30s"), Some("later")),
        );
        assert_eq!(settings.interval, Duration::from_secs(30));
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn overrides_from_lookup() {
        let overrides = OperatorOverrides::from_lookup(|key| match key {
            INTERVAL_ENV => Some("10s".to_string()),
            TIMEOUT_ENV => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(overrides.interval.as_deref(), Some("10s"));
        assert_eq!(overrides.timeout, None);
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("45s"), Some(Duration::from_secs(45)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("10m"), Some(Duration::from_secs(600)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
    }

    #[test]
    fn parse_duration_rejects_garbage_and_zero() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("ten seconds"), None);
        assert_eq!(parse_duration("-5s"), None);
        assert_eq!(parse_duration("0"), None);
        assert_eq!(parse_duration("0ms"), None);
    }

    #[test]
    fn parse_duration_rejects_overflowing_units() {
        assert_eq!(parse_duration("999999999999999999h"), None);
        assert_eq!(parse_duration(&format!("{}m", u64::MAX)), None);
    }

    #[test]
    fn overflowing_operator_timeout_falls_back_to_default() {
        let settings = CheckerSettings::resolve(
            &HealthCheckSpec::default(),
            &operator(None, Some("999999999999999999h")),
        );
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT);
    }
}
