//! Domain types for the monitor group.
//!
//! The desired spec types deserialize from the daemon's TOML config; the
//! member and placement records are serialized into the endpoint store.

use serde::{Deserialize, Serialize};

/// Short letter token identifying a monitor (`a`, `b`, … `aa`).
pub type MemberId = String;

/// Name of an orchestrator node.
pub type NodeId = String;

/// Default monitor port used when building a new member's endpoint.
pub const DEFAULT_MON_PORT: u16 = 6789;

// ── Desired spec ───────────────────────────────────────────────────

/// Pod networking mode for monitor workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    /// Standard pod networking.
    #[default]
    Default,
    /// Host networking: the member binds the node's address.
    Host,
}

impl NetworkMode {
    pub fn is_host(self) -> bool {
        self == NetworkMode::Host
    }
}

/// A named failure domain in a stretch cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StretchZone {
    pub name: String,
    /// The arbiter zone holds exactly one member.
    #[serde(default)]
    pub arbiter: bool,
}

/// Stretch topology: members split across zones, one of them the arbiter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StretchSpec {
    pub zones: Vec<StretchZone>,
}

impl StretchSpec {
    /// Name of the arbiter zone, if one is flagged.
    pub fn arbiter(&self) -> Option<&str> {
        self.zones
            .iter()
            .find(|z| z.arbiter)
            .map(|z| z.name.as_str())
    }

    /// Names of the non-arbiter zones, in declaration order.
    pub fn data_zones(&self) -> impl Iterator<Item = &str> {
        self.zones
            .iter()
            .filter(|z| !z.arbiter)
            .map(|z| z.name.as_str())
    }

    pub fn contains(&self, zone: &str) -> bool {
        self.zones.iter().any(|z| z.name == zone)
    }
}

/// Desired shape of the monitor group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonSpec {
    /// Target member count. Zero or negative is rejected by the reconciler.
    pub count: i32,
    #[serde(default)]
    pub allow_multiple_per_node: bool,
    #[serde(default)]
    pub stretch: Option<StretchSpec>,
    /// Members managed outside this system; mirrored, never created.
    #[serde(default)]
    pub external_mon_ids: Vec<MemberId>,
}

/// Per-cluster overrides for the health checker (duration strings).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub timeout: Option<String>,
}

/// Desired state of one storage cluster's monitor group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub namespace: String,
    pub mon: MonSpec,
    #[serde(default)]
    pub network: NetworkMode,
    #[serde(default)]
    pub health_check: HealthCheckSpec,
}

impl ClusterSpec {
    pub fn is_stretch(&self) -> bool {
        self.mon.stretch.is_some()
    }

    pub fn is_external_declared(&self, id: &str) -> bool {
        self.mon.external_mon_ids.iter().any(|e| e == id)
    }
}

// ── Records ────────────────────────────────────────────────────────

/// A monitor known to the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: MemberId,
    /// `host:port`; the host may be empty until the member reports one.
    pub endpoint: String,
    #[serde(default)]
    pub out_of_quorum: bool,
}

impl MemberRecord {
    pub fn new(id: impl Into<MemberId>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
            out_of_quorum: false,
        }
    }
}

/// Where an internal member was scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub node: NodeId,
    #[serde(default)]
    pub zone: Option<String>,
    /// Address override (host networking binds the node address).
    #[serde(default)]
    pub address: Option<String>,
    /// Network mode the member was created with.
    #[serde(default)]
    pub host_network: bool,
}

impl PlacementRecord {
    pub fn on_node(node: impl Into<NodeId>) -> Self {
        Self {
            node: node.into(),
            ..Default::default()
        }
    }

    pub fn in_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stretch_spec_finds_arbiter() {
        let stretch = StretchSpec {
            zones: vec![
                StretchZone { name: "x".into(), arbiter: true },
                StretchZone { name: "y".into(), arbiter: false },
                StretchZone { name: "z".into(), arbiter: false },
            ],
        };
        assert_eq!(stretch.arbiter(), Some("x"));
        assert_eq!(stretch.data_zones().collect::<Vec<_>>(), vec!["y", "z"]);
        assert!(stretch.contains("z"));
        assert!(!stretch.contains("w"));
    }

    #[test]
    fn spec_parses_with_defaults() {
        let json = r#"{"namespace":"storage","mon":{"count":3}}"#;
        let spec: ClusterSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.mon.count, 3);
        assert!(!spec.mon.allow_multiple_per_node);
        assert_eq!(spec.network, NetworkMode::Default);
        assert!(spec.health_check.interval.is_none());
        assert!(!spec.is_stretch());
    }

    #[test]
    fn network_mode_uses_snake_case() {
        let mode: NetworkMode = serde_json::from_str(r#""host""#).unwrap();
        assert!(mode.is_host());
    }
}
