//! Quorum status snapshots as reported by the monitor group.

use serde::{Deserialize, Serialize};

/// One entry of the group's member list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuorumMember {
    pub name: String,
    pub rank: i32,
    #[serde(default)]
    pub public_addr: String,
}

/// What the monitor group believes its membership to be.
///
/// Members listed in `mons` whose rank is absent from `quorum` are known
/// to the group but currently unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuorumStatus {
    pub quorum: Vec<i32>,
    pub mons: Vec<QuorumMember>,
}

impl QuorumStatus {
    /// Build a snapshot where every given member is in quorum, ranked in order.
    pub fn all_in_quorum<'a>(members: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut status = QuorumStatus::default();
        for (rank, (name, addr)) in members.into_iter().enumerate() {
            let rank = rank as i32;
            status.quorum.push(rank);
            status.mons.push(QuorumMember {
                name: name.to_string(),
                rank,
                public_addr: addr.to_string(),
            });
        }
        status
    }

    pub fn member(&self, name: &str) -> Option<&QuorumMember> {
        self.mons.iter().find(|m| m.name == name)
    }

    pub fn is_in_quorum(&self, member: &QuorumMember) -> bool {
        self.quorum.contains(&member.rank)
    }
}

/// Strip the named members from a snapshot.
///
/// Removes each matching entry from the member list and its rank from the
/// quorum list. Every other rank and entry is left untouched, so removing
/// an id that is not present returns the snapshot unchanged.
pub fn remove_members_from_quorum_status<S: AsRef<str>>(
    status: &QuorumStatus,
    ids: &[S],
) -> QuorumStatus {
    let removed = |name: &str| ids.iter().any(|id| id.as_ref() == name);

    let removed_ranks: Vec<i32> = status
        .mons
        .iter()
        .filter(|m| removed(&m.name))
        .map(|m| m.rank)
        .collect();

    QuorumStatus {
        quorum: status
            .quorum
            .iter()
            .copied()
            .filter(|rank| !removed_ranks.contains(rank))
            .collect(),
        mons: status
            .mons
            .iter()
            .filter(|m| !removed(&m.name))
            .cloned()
            .collect(),
    }
}
