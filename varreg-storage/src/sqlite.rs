//! SQLite-backed storage.
//!
//! One object table holds every VRS object as JSON text keyed by
//! identifier; a derived `locations` table, populated on the Allele write
//! path, is the overlap-search index. Annotations and mappings get their
//! own tables. Transactional single-object writes use conflict-ignoring
//! upserts; batched writes go through the bounded queue in [`crate::batch`]
//! and are applied by a background writer thread using the configured
//! merge strategy.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use varreg_vrs::VrsObject;

use crate::batch::{BatchQueue, LocationRow, ObjectRow};
use crate::error::StorageError;
use crate::schema::{create_schema, TableNames};
use crate::traits::Storage;
use crate::types::{Annotation, VariationKind, VariationMapping};

/// Statement shape used when applying a batch.
///
/// `Merge` is the strongest duplicate prevention; `InsertNotin` avoids the
/// conflict clause at the cost of an anti-join that grows with the table;
/// `Insert` is unconditional and leaves deduplication to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    Merge,
    InsertNotin,
    Insert,
}

impl MergeMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "merge" => Some(Self::Merge),
            "insert_notin" => Some(Self::InsertNotin),
            "insert" => Some(Self::Insert),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::InsertNotin => "insert_notin",
            Self::Insert => "insert",
        }
    }
}

/// Tunables for a [`SqliteStorage`] instance.
#[derive(Debug, Clone)]
pub struct SqliteStorageOptions {
    pub tables: TableNames,
    /// Rows buffered before a batch is handed to the writer.
    pub batch_limit: usize,
    /// Bound of the pending-batch queue.
    pub max_pending_batches: usize,
    /// How long a producer may block on a full queue.
    pub backpressure_timeout: Duration,
    pub merge_mode: MergeMode,
}

impl Default for SqliteStorageOptions {
    fn default() -> Self {
        Self {
            tables: TableNames::default(),
            batch_limit: 100_000,
            max_pending_batches: 50,
            backpressure_timeout: Duration::from_secs(30),
            merge_mode: MergeMode::Merge,
        }
    }
}

struct ActiveBatch {
    buffer: Vec<ObjectRow>,
    queue: Arc<BatchQueue>,
    writer: Option<JoinHandle<()>>,
}

pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    opts: SqliteStorageOptions,
    batch: Mutex<Option<ActiveBatch>>,
}

fn lock_error() -> StorageError {
    StorageError::Unavailable("storage lock poisoned".to_string())
}

impl SqliteStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with_options(path, SqliteStorageOptions::default())
    }

    pub fn open_with_options(
        path: impl AsRef<Path>,
        opts: SqliteStorageOptions,
    ) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn, opts)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::in_memory_with_options(SqliteStorageOptions::default())
    }

    pub fn in_memory_with_options(opts: SqliteStorageOptions) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?, opts)
    }

    fn from_connection(conn: Connection, opts: SqliteStorageOptions) -> Result<Self, StorageError> {
        create_schema(&conn, &opts.tables)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            opts,
            batch: Mutex::new(None),
        })
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| lock_error())
    }
}

/// Flatten a VRS object into its object-table row plus, for Alleles, the
/// derived location-index row.
fn object_row(object: &VrsObject) -> ObjectRow {
    match object {
        VrsObject::Allele(a) => ObjectRow {
            vrs_id: a.id(),
            vrs_object: a.to_stored_json().to_string(),
            location: Some(LocationRow {
                accession: a.location.sequence_reference.refget_accession.clone(),
                start: a.location.start,
                end: a.location.end,
                state_length: a.state.sequence.len() as u64,
            }),
        },
        VrsObject::SequenceLocation(l) => ObjectRow {
            vrs_id: l.id(),
            vrs_object: l.to_wire_json().to_string(),
            location: None,
        },
        VrsObject::SequenceReference(r) => ObjectRow {
            vrs_id: r.id(),
            vrs_object: r.to_wire_json().to_string(),
            location: None,
        },
    }
}

fn object_insert_sql(tables: &TableNames, mode: MergeMode) -> String {
    let t = &tables.objects;
    match mode {
        MergeMode::Merge => format!(
            "INSERT INTO {t} (vrs_id, vrs_object) VALUES (?1, ?2) \
             ON CONFLICT(vrs_id) DO NOTHING"
        ),
        MergeMode::InsertNotin => format!(
            "INSERT INTO {t} (vrs_id, vrs_object) \
             SELECT ?1, ?2 WHERE ?1 NOT IN (SELECT vrs_id FROM {t})"
        ),
        MergeMode::Insert => format!("INSERT INTO {t} (vrs_id, vrs_object) VALUES (?1, ?2)"),
    }
}

fn location_insert_sql(tables: &TableNames, mode: MergeMode) -> String {
    let t = &tables.locations;
    match mode {
        MergeMode::Merge => format!(
            "INSERT INTO {t} (vrs_id, accession, loc_start, loc_end, state_length) \
             VALUES (?1, ?2, ?3, ?4, ?5) ON CONFLICT(vrs_id) DO NOTHING"
        ),
        MergeMode::InsertNotin => format!(
            "INSERT INTO {t} (vrs_id, accession, loc_start, loc_end, state_length) \
             SELECT ?1, ?2, ?3, ?4, ?5 WHERE ?1 NOT IN (SELECT vrs_id FROM {t})"
        ),
        MergeMode::Insert => format!(
            "INSERT INTO {t} (vrs_id, accession, loc_start, loc_end, state_length) \
             VALUES (?1, ?2, ?3, ?4, ?5)"
        ),
    }
}

fn insert_rows(
    conn: &Connection,
    tables: &TableNames,
    mode: MergeMode,
    rows: &[ObjectRow],
) -> Result<(), StorageError> {
    let mut obj_stmt = conn.prepare_cached(&object_insert_sql(tables, mode))?;
    let mut loc_stmt = conn.prepare_cached(&location_insert_sql(tables, mode))?;
    for row in rows {
        obj_stmt.execute(params![row.vrs_id, row.vrs_object])?;
        if let Some(loc) = &row.location {
            loc_stmt.execute(params![
                row.vrs_id,
                loc.accession,
                loc.start as i64,
                loc.end as i64,
                loc.state_length as i64,
            ])?;
        }
    }
    Ok(())
}

/// Apply one batch in a single transaction.
fn write_batch(
    conn: &Mutex<Connection>,
    tables: &TableNames,
    mode: MergeMode,
    rows: &[ObjectRow],
) -> Result<(), StorageError> {
    let mut conn = conn.lock().map_err(|_| lock_error())?;
    let tx = conn.transaction()?;
    insert_rows(&tx, tables, mode, rows)?;
    tx.commit()?;
    Ok(())
}

fn spawn_writer(
    conn: Arc<Mutex<Connection>>,
    tables: TableNames,
    mode: MergeMode,
    queue: Arc<BatchQueue>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while let Some(rows) = queue.pop() {
            // Once failed, later batches are dropped; the recorded error
            // keeps surfacing to producers until the scope exits.
            if queue.error().is_some() || rows.is_empty() {
                queue.complete(Ok(()));
                continue;
            }
            let result = write_batch(&conn, &tables, mode, &rows);
            if let Err(e) = &result {
                tracing::error!(error = %e, rows = rows.len(), "batch write failed");
            }
            queue.complete(result.map_err(|e| e.to_string()));
        }
    })
}

impl Storage for SqliteStorage {
    fn put_vrs(&self, object: &VrsObject) -> Result<(), StorageError> {
        let row = object_row(object);

        let mut batch_guard = self.batch.lock().map_err(|_| lock_error())?;
        if let Some(active) = batch_guard.as_mut() {
            if let Some(err) = active.queue.error() {
                return Err(StorageError::BatchAborted(err));
            }
            active.buffer.push(row);
            if active.buffer.len() >= self.opts.batch_limit {
                let rows = std::mem::take(&mut active.buffer);
                active.queue.push(rows, self.opts.backpressure_timeout)?;
            }
            return Ok(());
        }
        drop(batch_guard);

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        insert_rows(&tx, &self.opts.tables, MergeMode::Merge, std::slice::from_ref(&row))?;
        tx.commit()?;
        Ok(())
    }

    fn get_vrs(&self, vrs_id: &str) -> Result<Option<Value>, StorageError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT vrs_object FROM {} WHERE vrs_id = ?1",
            self.opts.tables.objects
        ))?;
        let text: Option<String> = stmt
            .query_row(params![vrs_id], |row| row.get(0))
            .optional()?;
        match text {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn put_mapping(&self, mapping: &VariationMapping) -> Result<(), StorageError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "INSERT OR IGNORE INTO {} (source_id, dest_id, mapping_type) VALUES (?1, ?2, ?3)",
            self.opts.tables.mappings
        ))?;
        stmt.execute(params![
            mapping.source_id,
            mapping.dest_id,
            mapping.mapping_type
        ])?;
        Ok(())
    }

    fn get_mappings(
        &self,
        source_id: &str,
        mapping_type: Option<&str>,
    ) -> Result<Vec<VariationMapping>, StorageError> {
        let conn = self.lock_conn()?;
        let table = &self.opts.tables.mappings;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<VariationMapping> {
            Ok(VariationMapping {
                source_id: row.get(0)?,
                dest_id: row.get(1)?,
                mapping_type: row.get(2)?,
            })
        };
        let mut results = Vec::new();
        match mapping_type {
            Some(mt) => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT source_id, dest_id, mapping_type FROM {table} \
                     WHERE source_id = ?1 AND mapping_type = ?2 ORDER BY dest_id"
                ))?;
                let rows = stmt.query_map(params![source_id, mt], map_row)?;
                for row in rows {
                    results.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT source_id, dest_id, mapping_type FROM {table} \
                     WHERE source_id = ?1 ORDER BY mapping_type, dest_id"
                ))?;
                let rows = stmt.query_map(params![source_id], map_row)?;
                for row in rows {
                    results.push(row?);
                }
            }
        }
        Ok(results)
    }

    fn put_annotation(&self, annotation: &Annotation) -> Result<(), StorageError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "INSERT INTO {} (object_id, annotation_type, annotation) VALUES (?1, ?2, ?3)",
            self.opts.tables.annotations
        ))?;
        stmt.execute(params![
            annotation.object_id,
            annotation.annotation_type,
            annotation.annotation.to_string()
        ])?;
        Ok(())
    }

    fn get_annotations(
        &self,
        object_id: &str,
        annotation_type: Option<&str>,
    ) -> Result<Vec<Annotation>, StorageError> {
        let conn = self.lock_conn()?;
        let table = &self.opts.tables.annotations;
        let mut raw: Vec<(String, String, String)> = Vec::new();
        match annotation_type {
            Some(at) => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT object_id, annotation_type, annotation FROM {table} \
                     WHERE object_id = ?1 AND annotation_type = ?2"
                ))?;
                let rows = stmt.query_map(params![object_id, at], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?;
                for row in rows {
                    raw.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT object_id, annotation_type, annotation FROM {table} \
                     WHERE object_id = ?1"
                ))?;
                let rows = stmt.query_map(params![object_id], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?;
                for row in rows {
                    raw.push(row?);
                }
            }
        }
        raw.into_iter()
            .map(|(object_id, annotation_type, text)| {
                Ok(Annotation {
                    object_id,
                    annotation_type,
                    annotation: serde_json::from_str(&text)?,
                })
            })
            .collect()
    }

    fn search(&self, accession: &str, start: u64, end: u64) -> Result<Vec<Value>, StorageError> {
        if end <= start {
            return Err(StorageError::InvalidRange { start, end });
        }
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT o.vrs_object FROM {objects} o \
             JOIN {locations} l ON o.vrs_id = l.vrs_id \
             WHERE l.accession = ?1 AND l.loc_start < ?3 AND l.loc_end > ?2 \
             ORDER BY o.vrs_id",
            objects = self.opts.tables.objects,
            locations = self.opts.tables.locations,
        ))?;
        let rows = stmt.query_map(params![accession, start as i64, end as i64], |row| {
            row.get::<_, String>(0)
        })?;
        let mut results = Vec::new();
        for row in rows {
            results.push(serde_json::from_str(&row?)?);
        }
        Ok(results)
    }

    fn begin_batch(&self) -> Result<(), StorageError> {
        let mut guard = self.batch.lock().map_err(|_| lock_error())?;
        if guard.is_some() {
            return Err(StorageError::InvalidBatchState("batch scope already active"));
        }
        let queue = BatchQueue::new(self.opts.max_pending_batches);
        let writer = spawn_writer(
            Arc::clone(&self.conn),
            self.opts.tables.clone(),
            self.opts.merge_mode,
            Arc::clone(&queue),
        );
        *guard = Some(ActiveBatch {
            buffer: Vec::new(),
            queue,
            writer: Some(writer),
        });
        Ok(())
    }

    fn end_batch(&self, flush: bool) -> Result<(), StorageError> {
        let mut guard = self.batch.lock().map_err(|_| lock_error())?;
        let mut active = guard
            .take()
            .ok_or(StorageError::InvalidBatchState("no active batch scope"))?;
        drop(guard);

        let mut result: Result<(), StorageError> = Ok(());

        // Without flush the scope is a discard: the unqueued buffer drops
        // and pending batches are cleared below. In-flight work completes.
        let remaining = std::mem::take(&mut active.buffer);
        if flush {
            if !remaining.is_empty() {
                if let Err(e) = active
                    .queue
                    .push(remaining, self.opts.backpressure_timeout)
                {
                    result = Err(e);
                }
            }
            if result.is_ok() {
                if let Err(e) = active.queue.wait_drained() {
                    result = Err(e);
                }
            }
        }

        active.queue.close(!flush || result.is_err());
        if let Some(handle) = active.writer.take() {
            if handle.join().is_err() {
                result = result.and(Err(StorageError::Unavailable(
                    "batch writer thread panicked".to_string(),
                )));
            }
        }

        if let Some(err) = active.queue.take_error() {
            if result.is_ok() {
                result = Err(StorageError::BatchAborted(err));
            }
        }
        result
    }

    fn wait_for_writes(&self) -> Result<(), StorageError> {
        let queue = {
            let guard = self.batch.lock().map_err(|_| lock_error())?;
            guard.as_ref().map(|active| Arc::clone(&active.queue))
        };
        match queue {
            Some(queue) => queue.wait_drained(),
            None => Ok(()),
        }
    }

    fn object_count(&self) -> Result<u64, StorageError> {
        let conn = self.lock_conn()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.opts.tables.objects),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn variation_count(&self, kind: VariationKind) -> Result<u64, StorageError> {
        let table = &self.opts.tables.locations;
        let sql = match kind {
            VariationKind::All => format!("SELECT COUNT(*) FROM {table}"),
            VariationKind::Substitution => format!(
                "SELECT COUNT(*) FROM {table} \
                 WHERE loc_end - loc_start = state_length AND state_length > 0"
            ),
            VariationKind::Insertion => format!(
                "SELECT COUNT(*) FROM {table} WHERE state_length > loc_end - loc_start"
            ),
            VariationKind::Deletion => format!(
                "SELECT COUNT(*) FROM {table} WHERE state_length < loc_end - loc_start"
            ),
        };
        let conn = self.lock_conn()?;
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn close(&self) -> Result<(), StorageError> {
        let active = {
            let guard = self.batch.lock().map_err(|_| lock_error())?;
            guard.is_some()
        };
        if active {
            self.end_batch(true)?;
        }
        Ok(())
    }
}

impl Drop for SqliteStorage {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(error = %e, "storage teardown failed");
        }
    }
}
