//! The persisted endpoint record shared with the rest of the cluster.
//!
//! Field formats are consumed by other components and must stay stable:
//! `data` is `id=host:port` pairs joined by commas, the id lists are
//! comma-joined and empty when there is nothing to list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{StateError, StateResult};
use crate::types::{MemberId, MemberRecord, PlacementRecord};

/// Config store record for one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRecord {
    /// Endpoint table: `a=10.0.0.1:6789,b=10.0.0.2:6789`.
    pub data: String,
    /// External member ids.
    pub external_mons: String,
    /// Ids currently out of quorum.
    pub out_of_quorum: String,
    /// Allocation cursor.
    pub max_id: i32,
    /// JSON placement mapping (id → PlacementRecord).
    pub mapping: String,
}

impl Default for EndpointRecord {
    fn default() -> Self {
        Self {
            data: String::new(),
            external_mons: String::new(),
            out_of_quorum: String::new(),
            max_id: -1,
            mapping: "{}".to_string(),
        }
    }
}

impl EndpointRecord {
    pub fn endpoints(&self) -> BTreeMap<MemberId, MemberRecord> {
        let mut members = parse_endpoints(&self.data);
        for id in split_ids(&self.out_of_quorum) {
            if let Some(m) = members.get_mut(&id) {
                m.out_of_quorum = true;
            }
        }
        members
    }

    pub fn external_ids(&self) -> Vec<MemberId> {
        split_ids(&self.external_mons)
    }

    pub fn out_of_quorum_ids(&self) -> Vec<MemberId> {
        split_ids(&self.out_of_quorum)
    }

    pub fn placement(&self) -> StateResult<BTreeMap<MemberId, PlacementRecord>> {
        if self.mapping.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&self.mapping).map_err(|e| StateError::Deserialize(e.to_string()))
    }

    pub fn set_placement(&mut self, placement: &BTreeMap<MemberId, PlacementRecord>) -> StateResult<()> {
        self.mapping =
            serde_json::to_string(placement).map_err(|e| StateError::Serialize(e.to_string()))?;
        Ok(())
    }
}

/// Render members as `id=endpoint` pairs.
pub fn format_endpoints<'a>(members: impl IntoIterator<Item = &'a MemberRecord>) -> String {
    members
        .into_iter()
        .map(|m| format!("{}={}", m.id, m.endpoint))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse an endpoint table. Malformed pairs are skipped.
pub fn parse_endpoints(data: &str) -> BTreeMap<MemberId, MemberRecord> {
    let mut members = BTreeMap::new();
    for pair in data.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some((id, endpoint)) if !id.is_empty() => {
                members.insert(id.to_string(), MemberRecord::new(id, endpoint));
            }
            _ => warn!(%pair, "skipping malformed endpoint entry"),
        }
    }
    members
}

pub fn join_ids<'a>(ids: impl IntoIterator<Item = &'a MemberId>) -> String {
    ids.into_iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

pub fn split_ids(list: &str) -> Vec<MemberId> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_and_parse_endpoint_table() {
        let members = [
            MemberRecord::new("a", "1.2.3.1:3300"),
            MemberRecord::new("f", ":6789"),
        ];
        let data = format_endpoints(&members);
        assert_eq!(data, "a=1.2.3.1:3300,f=:6789");

        let parsed = parse_endpoints(&data);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["f"].endpoint, ":6789");
    }

    #[test]
    fn parse_skips_garbage() {
        let parsed = parse_endpoints("a=1.2.3.4:6789,,junk,=nothing, b=1.2.3.5:6789 ");
        assert_eq!(parsed.keys().cloned().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn empty_lists_are_empty_strings() {
        let none: Vec<MemberId> = Vec::new();
        assert_eq!(join_ids(&none), "");
        assert!(split_ids("").is_empty());
        assert_eq!(split_ids("a,c"), vec!["a", "c"]);
    }

    #[test]
    fn out_of_quorum_flags_applied_to_endpoints() {
        let record = EndpointRecord {
            data: "a=1.2.3.1:6789,b=1.2.3.2:6789".into(),
            out_of_quorum: "b".into(),
            ..Default::default()
        };
        let members = record.endpoints();
        assert!(!members["a"].out_of_quorum);
        assert!(members["b"].out_of_quorum);
    }

    #[test]
    fn placement_mapping_round_trips_through_json() {
        let mut placement = BTreeMap::new();
        placement.insert("a".to_string(), PlacementRecord::on_node("node1").in_zone("x"));
        let mut record = EndpointRecord::default();
        record.set_placement(&placement).unwrap();
        assert_eq!(record.placement().unwrap(), placement);
    }
}
