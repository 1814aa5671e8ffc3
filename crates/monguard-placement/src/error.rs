//! Placement error types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("no eligible node for member {member} (zone: {})", .zone.as_deref().unwrap_or("any"))]
    NoEligibleNode { member: String, zone: Option<String> },
}
