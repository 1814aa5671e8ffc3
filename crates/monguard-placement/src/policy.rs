//! Extra-member selection and stretch zone targeting.
//!
//! When the group is over its desired size the reconciler asks which
//! member should go. Crowded nodes are drained first, then stretch zone
//! balance is restored: the arbiter zone holds exactly one member and the
//! data zones hold equal counts.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use monguard_state::{MemberId, NodeId, PlacementRecord, StretchSpec};

/// Pick the member that should be removed, if any.
///
/// Without a stretch configuration and with every member on its own node,
/// any member is acceptable and the one with the greatest id is returned.
/// A balanced stretch layout returns `None`.
pub fn determine_extra_member(
    placement: &BTreeMap<MemberId, PlacementRecord>,
    stretch: Option<&StretchSpec>,
) -> Option<MemberId> {
    if let Some((node, members)) = most_crowded_node(placement) {
        debug!(%node, members = members.len(), "removing member from crowded node");
        return members.last().map(|id| (*id).clone());
    }

    match stretch {
        Some(stretch) => extra_in_stretch(placement, stretch),
        None => placement.keys().next_back().cloned(),
    }
}

/// Zone a new member must be scheduled into, for stretch clusters.
///
/// The arbiter zone is filled first; after that the data zone with the
/// fewest members wins, ties going to declaration order.
pub fn zone_for_new_member(
    placement: &BTreeMap<MemberId, PlacementRecord>,
    stretch: &StretchSpec,
) -> Option<String> {
    let counts = zone_members(placement, stretch);

    if let Some(arbiter) = stretch.arbiter()
        && counts.get(arbiter).is_none_or(Vec::is_empty)
    {
        return Some(arbiter.to_string());
    }

    stretch
        .data_zones()
        .min_by_key(|zone| counts.get(*zone).map_or(0, Vec::len))
        .map(str::to_string)
}

fn most_crowded_node(
    placement: &BTreeMap<MemberId, PlacementRecord>,
) -> Option<(NodeId, Vec<&MemberId>)> {
    let mut by_node: BTreeMap<&str, Vec<&MemberId>> = BTreeMap::new();
    for (id, record) in placement {
        by_node.entry(record.node.as_str()).or_default().push(id);
    }

    by_node
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .max_by_key(|(_, members)| members.len())
        .map(|(node, members)| (node.to_string(), members))
}

fn zone_members<'a>(
    placement: &'a BTreeMap<MemberId, PlacementRecord>,
    stretch: &StretchSpec,
) -> BTreeMap<String, Vec<&'a MemberId>> {
    let mut zones: BTreeMap<String, Vec<&MemberId>> = stretch
        .zones
        .iter()
        .map(|z| (z.name.clone(), Vec::new()))
        .collect();
    for (id, record) in placement {
        if let Some(zone) = record.zone.as_deref()
            && let Some(members) = zones.get_mut(zone)
        {
            members.push(id);
        }
    }
    zones
}

fn extra_in_stretch(
    placement: &BTreeMap<MemberId, PlacementRecord>,
    stretch: &StretchSpec,
) -> Option<MemberId> {
    // Outside every declared zone: misplaced, always extra.
    if let Some((id, record)) = placement
        .iter()
        .find(|(_, r)| r.zone.as_deref().is_none_or(|z| !stretch.contains(z)))
    {
        warn!(member = %id, zone = ?record.zone, "member placed outside the stretch zones");
        return Some(id.clone());
    }

    let zones = zone_members(placement, stretch);

    if let Some(arbiter) = stretch.arbiter()
        && let Some(members) = zones.get(arbiter)
        && members.len() > 1
    {
        debug!(zone = %arbiter, members = members.len(), "arbiter zone over count");
        return members.last().map(|id| (*id).clone());
    }

    let data: Vec<(&str, &Vec<&MemberId>)> = stretch
        .data_zones()
        .filter_map(|zone| zones.get(zone).map(|m| (zone, m)))
        .collect();
    let min = data.iter().map(|(_, m)| m.len()).min()?;
    let (zone, members) = data.iter().max_by_key(|(_, m)| m.len())?;
    if members.len() > min {
        debug!(%zone, members = members.len(), min, "data zone over count");
        return members.last().map(|id| (*id).clone());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use monguard_state::StretchZone;

    fn placement(entries: &[(&str, &str, Option<&str>)]) -> BTreeMap<MemberId, PlacementRecord> {
        entries
            .iter()
            .map(|(id, node, zone)| {
                let mut record = PlacementRecord::on_node(*node);
                record.zone = zone.map(str::to_string);
                (id.to_string(), record)
            })
            .collect()
    }

    fn stretch_xyz() -> StretchSpec {
        StretchSpec {
            zones: vec![
                StretchZone { name: "x".into(), arbiter: true },
                StretchZone { name: "y".into(), arbiter: false },
                StretchZone { name: "z".into(), arbiter: false },
            ],
        }
    }

    #[test]
    fn crowded_node_member_is_extra() {
        let p = placement(&[
            ("a", "node1", None),
            ("b", "node2", None),
            ("c", "node1", None),
            ("d", "node1", None),
        ]);
        let removed = determine_extra_member(&p, None).unwrap();
        assert!(["a", "c", "d"].contains(&removed.as_str()), "removed {removed}");
    }

    #[test]
    fn crowded_node_wins_over_stretch_balance() {
        let p = placement(&[
            ("a", "node1", Some("x")),
            ("b", "node2", Some("y")),
            ("c", "node2", Some("z")),
        ]);
        let removed = determine_extra_member(&p, Some(&stretch_xyz())).unwrap();
        assert!(["b", "c"].contains(&removed.as_str()));
    }

    #[test]
    fn distinct_nodes_without_stretch_returns_some_member() {
        let p = placement(&[
            ("a", "node1", None),
            ("b", "node2", None),
            ("c", "node3", None),
            ("d", "node4", None),
        ]);
        assert!(determine_extra_member(&p, None).is_some());
    }

    #[test]
    fn empty_placement_has_nothing_to_remove() {
        assert_eq!(determine_extra_member(&BTreeMap::new(), None), None);
    }

    #[test]
    fn balanced_stretch_returns_none() {
        let p = placement(&[
            ("a", "node1", Some("x")),
            ("b", "node2", Some("y")),
            ("c", "node3", Some("y")),
            ("d", "node4", Some("z")),
            ("e", "node5", Some("z")),
        ]);
        assert_eq!(determine_extra_member(&p, Some(&stretch_xyz())), None);
    }

    #[test]
    fn arbiter_over_count_loses_a_member() {
        let p = placement(&[
            ("a", "node1", Some("x")),
            ("b", "node2", Some("y")),
            ("c", "node3", Some("y")),
            ("d", "node4", Some("x")),
            ("e", "node5", Some("z")),
        ]);
        let removed = determine_extra_member(&p, Some(&stretch_xyz())).unwrap();
        assert!(["a", "d"].contains(&removed.as_str()), "removed {removed}");
    }

    #[test]
    fn uneven_data_zones_lose_a_member() {
        let p = placement(&[
            ("a", "node1", Some("x")),
            ("b", "node2", Some("y")),
            ("c", "node3", Some("y")),
            ("d", "node4", Some("y")),
            ("e", "node5", Some("z")),
        ]);
        let removed = determine_extra_member(&p, Some(&stretch_xyz())).unwrap();
        assert!(["b", "c", "d"].contains(&removed.as_str()), "removed {removed}");
    }

    #[test]
    fn member_outside_declared_zones_is_extra() {
        let p = placement(&[
            ("a", "node1", Some("x")),
            ("b", "node2", Some("y")),
            ("c", "node3", Some("z")),
            ("d", "node4", Some("w")),
        ]);
        assert_eq!(determine_extra_member(&p, Some(&stretch_xyz())), Some("d".to_string()));
    }

    #[test]
    fn new_member_fills_arbiter_first() {
        let p = placement(&[("b", "node2", Some("y")), ("c", "node3", Some("z"))]);
        assert_eq!(zone_for_new_member(&p, &stretch_xyz()), Some("x".to_string()));
    }

    #[test]
    fn new_member_goes_to_smallest_data_zone() {
        let p = placement(&[
            ("a", "node1", Some("x")),
            ("b", "node2", Some("y")),
            ("c", "node3", Some("y")),
            ("d", "node4", Some("z")),
        ]);
        assert_eq!(zone_for_new_member(&p, &stretch_xyz()), Some("z".to_string()));
    }
}
