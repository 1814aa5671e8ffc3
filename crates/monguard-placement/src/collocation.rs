//! Detection of live members sharing a node.

use std::collections::BTreeMap;

use tracing::debug;

use monguard_state::{MemberId, NodeId};

/// A running member as reported by the workload manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveMember {
    pub id: MemberId,
    pub node: NodeId,
}

impl LiveMember {
    pub fn new(id: impl Into<MemberId>, node: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            node: node.into(),
        }
    }
}

/// Return one member from the most crowded node, if any node runs more than one.
pub fn find_collocated(live: &[LiveMember]) -> Option<MemberId> {
    let mut by_node: BTreeMap<&str, Vec<&MemberId>> = BTreeMap::new();
    for member in live {
        by_node.entry(member.node.as_str()).or_default().push(&member.id);
    }

    let (node, mut members) = by_node
        .into_iter()
        .filter(|(_, m)| m.len() > 1)
        .max_by_key(|(_, m)| m.len())?;
    members.sort();
    debug!(%node, count = members.len(), "members collocated on node");
    members.last().map(|id| (*id).clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_with_zero_or_one_member() {
        assert_eq!(find_collocated(&[]), None);
        assert_eq!(find_collocated(&[LiveMember::new("a", "node1")]), None);
    }

    #[test]
    fn nothing_when_nodes_are_distinct() {
        let live = [LiveMember::new("a", "node1"), LiveMember::new("b", "node2")];
        assert_eq!(find_collocated(&live), None);
    }

    #[test]
    fn picks_from_shared_node() {
        let live = [
            LiveMember::new("a", "node1"),
            LiveMember::new("b", "node2"),
            LiveMember::new("c", "node1"),
        ];
        let picked = find_collocated(&live).unwrap();
        assert!(picked == "a" || picked == "c");
    }
}
