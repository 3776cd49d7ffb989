//! SQL schema for the relational backend.
//!
//! Table names are configurable per deployment (several registries can
//! share one database); statements are built against a [`TableNames`]
//! instance rather than literals.

use rusqlite::Connection;

use crate::error::StorageError;

/// Configurable table names for one registry instance.
#[derive(Debug, Clone)]
pub struct TableNames {
    pub objects: String,
    pub locations: String,
    pub annotations: String,
    pub mappings: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            objects: "vrs_objects".to_string(),
            locations: "locations".to_string(),
            annotations: "annotations".to_string(),
            mappings: "variation_mappings".to_string(),
        }
    }
}

impl TableNames {
    /// Derive all table names from a base object-table name.
    pub fn with_objects_table(objects: &str) -> Self {
        Self {
            objects: objects.to_string(),
            ..Self::default()
        }
    }
}

/// Create tables and indexes if they do not exist.
pub fn create_schema(conn: &Connection, tables: &TableNames) -> Result<(), StorageError> {
    let TableNames {
        objects,
        locations,
        annotations,
        mappings,
    } = tables;

    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {objects} (
             vrs_id TEXT PRIMARY KEY,
             vrs_object TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS {locations} (
             vrs_id TEXT PRIMARY KEY,
             accession TEXT NOT NULL,
             loc_start INTEGER NOT NULL,
             loc_end INTEGER NOT NULL,
             state_length INTEGER NOT NULL
         );
         CREATE INDEX IF NOT EXISTS {locations}_range_idx
             ON {locations} (accession, loc_start, loc_end);
         CREATE TABLE IF NOT EXISTS {annotations} (
             object_id TEXT NOT NULL,
             annotation_type TEXT NOT NULL,
             annotation TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS {annotations}_object_idx
             ON {annotations} (object_id, annotation_type);
         CREATE TABLE IF NOT EXISTS {mappings} (
             source_id TEXT NOT NULL,
             dest_id TEXT NOT NULL,
             mapping_type TEXT NOT NULL,
             UNIQUE (source_id, dest_id, mapping_type)
         );"
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let tables = TableNames::default();
        create_schema(&conn, &tables).unwrap();
        create_schema(&conn, &tables).unwrap();
    }

    #[test]
    fn test_custom_object_table_name() {
        let conn = Connection::open_in_memory().unwrap();
        let tables = TableNames::with_objects_table("my_objects");
        create_schema(&conn, &tables).unwrap();
        conn.execute(
            "INSERT INTO my_objects (vrs_id, vrs_object) VALUES ('a', '{}')",
            [],
        )
        .unwrap();
    }
}
