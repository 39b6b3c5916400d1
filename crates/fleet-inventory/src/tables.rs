//! redb table definitions for the fleet inventory.

use redb::TableDefinition;

/// Instance records keyed by instance name.
pub const INSTANCES: TableDefinition<&str, &[u8]> = TableDefinition::new("instances");
