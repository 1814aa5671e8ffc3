//! redb table definitions for the endpoint store.

use redb::TableDefinition;

/// JSON-encoded `EndpointRecord` keyed by cluster namespace.
pub const MON_ENDPOINTS: TableDefinition<&str, &[u8]> = TableDefinition::new("mon_endpoints");
