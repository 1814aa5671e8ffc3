//! Node scoring for new members.
//!
//! Used by the local scheduler. Candidates are filtered by hard
//! constraints (draining, zone, one member per node) and ranked so that
//! members spread across the least occupied nodes.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use monguard_state::{MemberId, NodeId, PlacementRecord};

/// A node that may host a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCandidate {
    #[serde(rename = "id")]
    pub node_id: NodeId,
    #[serde(default)]
    pub zone: Option<String>,
    /// Node address, bound by members on host networking.
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub is_draining: bool,
}

/// Constraints for placing one member.
#[derive(Debug, Clone, Default)]
pub struct PlacementRequirements {
    /// Required zone (stretch clusters).
    pub zone: Option<String>,
    pub allow_multiple_per_node: bool,
}

/// Scored candidate.
#[derive(Debug, Clone)]
pub struct NodeScore {
    pub node_id: NodeId,
    /// Higher is better. Range: 0.0..=100.0.
    pub score: f64,
    /// Members already on this node.
    pub members: u32,
}

/// Members per node in the current placement.
pub fn occupancy(placement: &BTreeMap<MemberId, PlacementRecord>) -> HashMap<NodeId, u32> {
    let mut counts = HashMap::new();
    for record in placement.values() {
        *counts.entry(record.node.clone()).or_insert(0) += 1;
    }
    counts
}

/// Score a single node, or `None` if it cannot take the member.
pub fn score_node(
    node: &NodeCandidate,
    req: &PlacementRequirements,
    occupancy: &HashMap<NodeId, u32>,
) -> Option<NodeScore> {
    if node.is_draining {
        return None;
    }

    if let Some(zone) = &req.zone
        && node.zone.as_ref() != Some(zone)
    {
        return None;
    }

    let members = occupancy.get(&node.node_id).copied().unwrap_or(0);
    if members > 0 && !req.allow_multiple_per_node {
        return None;
    }

    Some(NodeScore {
        node_id: node.node_id.clone(),
        score: 100.0 / f64::from(members + 1),
        members,
    })
}

/// Rank eligible nodes, best first. Ties break on node id.
pub fn rank_nodes(
    nodes: &[NodeCandidate],
    req: &PlacementRequirements,
    occupancy: &HashMap<NodeId, u32>,
) -> Vec<NodeScore> {
    let mut scored: Vec<NodeScore> = nodes
        .iter()
        .filter_map(|n| score_node(n, req, occupancy))
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, zone: Option<&str>) -> NodeCandidate {
        NodeCandidate {
            node_id: id.to_string(),
            zone: zone.map(str::to_string),
            address: None,
            is_draining: false,
        }
    }

    fn occupied(entries: &[(&str, u32)]) -> HashMap<NodeId, u32> {
        entries.iter().map(|(n, c)| (n.to_string(), *c)).collect()
    }

    #[test]
    fn occupied_nodes_rejected_without_collocation() {
        let nodes = [node("n1", None), node("n2", None)];
        let req = PlacementRequirements::default();
        let ranked = rank_nodes(&nodes, &req, &occupied(&[("n1", 1)]));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].node_id, "n2");
    }

    #[test]
    fn collocation_prefers_emptier_nodes() {
        let nodes = [node("n1", None), node("n2", None)];
        let req = PlacementRequirements {
            zone: None,
            allow_multiple_per_node: true,
        };
        let ranked = rank_nodes(&nodes, &req, &occupied(&[("n1", 2), ("n2", 1)]));
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].node_id, "n2");
        assert_eq!(ranked[1].members, 2);
    }

    #[test]
    fn zone_is_a_hard_constraint() {
        let nodes = [node("n1", Some("x")), node("n2", Some("y"))];
        let req = PlacementRequirements {
            zone: Some("y".into()),
            allow_multiple_per_node: false,
        };
        let ranked = rank_nodes(&nodes, &req, &HashMap::new());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].node_id, "n2");
    }

    #[test]
    fn draining_nodes_rejected() {
        let mut n = node("n1", None);
        n.is_draining = true;
        assert!(score_node(&n, &PlacementRequirements::default(), &HashMap::new()).is_none());
    }

    #[test]
    fn occupancy_counts_members_per_node() {
        let mut placement = BTreeMap::new();
        placement.insert("a".to_string(), PlacementRecord::on_node("n1"));
        placement.insert("b".to_string(), PlacementRecord::on_node("n1"));
        placement.insert("c".to_string(), PlacementRecord::on_node("n2"));
        let counts = occupancy(&placement);
        assert_eq!(counts["n1"], 2);
        assert_eq!(counts["n2"], 1);
    }
}
