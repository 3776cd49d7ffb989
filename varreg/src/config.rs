//! Environment configuration.
//!
//! All knobs live under the `VARREG_` prefix. The storage URI selects the
//! backend: empty means stateless, `sqlite::memory:` an in-memory
//! database, `sqlite://<path>` a database file.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use varreg_storage::{
    MergeMode, NoObjectStore, SqliteStorage, SqliteStorageOptions, Storage, StorageError,
    TableNames,
};

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Backend selector; empty selects the stateless NoObjectStore.
    pub storage_uri: String,
    pub table_name: String,
    pub location_table_name: String,
    pub annotation_table_name: String,
    pub mapping_table_name: String,
    pub batch_limit: usize,
    pub max_pending_batches: usize,
    pub flush_on_batchctx_exit: bool,
    pub merge_mode: MergeMode,
    /// Shared working directory for async VCF runs; unset disables async.
    pub async_work_dir: Option<PathBuf>,
    pub soft_time_limit: Duration,
    pub hard_time_limit: Duration,
    /// TTL of completed/failed run results.
    pub result_expires: Duration,
    /// Status code reported for failed async runs.
    pub failure_status_code: u16,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            storage_uri: String::new(),
            table_name: "vrs_objects".to_string(),
            location_table_name: "locations".to_string(),
            annotation_table_name: "annotations".to_string(),
            mapping_table_name: "variation_mappings".to_string(),
            batch_limit: 100_000,
            max_pending_batches: 50,
            flush_on_batchctx_exit: true,
            merge_mode: MergeMode::Merge,
            async_work_dir: None,
            soft_time_limit: Duration::from_secs(3600),
            hard_time_limit: Duration::from_secs(3900),
            result_expires: Duration::from_secs(7200),
            failure_status_code: 500,
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env_string(name)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    match env_string(name) {
        Some(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        None => default,
    }
}

impl RegistryConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            storage_uri: env_string("VARREG_STORAGE_URI").unwrap_or_default(),
            table_name: env_string("VARREG_SQL_STORE_TABLE_NAME")
                .unwrap_or(defaults.table_name),
            location_table_name: env_string("VARREG_SQL_STORE_LOCATION_TABLE_NAME")
                .unwrap_or(defaults.location_table_name),
            annotation_table_name: env_string("VARREG_SQL_STORE_ANNOTATION_TABLE_NAME")
                .unwrap_or(defaults.annotation_table_name),
            mapping_table_name: env_string("VARREG_SQL_STORE_MAPPING_TABLE_NAME")
                .unwrap_or(defaults.mapping_table_name),
            batch_limit: env_parse("VARREG_SQL_STORE_BATCH_LIMIT", defaults.batch_limit),
            max_pending_batches: env_parse(
                "VARREG_SQL_STORE_MAX_PENDING_BATCHES",
                defaults.max_pending_batches,
            ),
            flush_on_batchctx_exit: env_bool(
                "VARREG_SQL_STORE_FLUSH_ON_BATCHCTX_EXIT",
                defaults.flush_on_batchctx_exit,
            ),
            merge_mode: env_string("VARREG_SQL_STORE_BATCH_ADD_MODE")
                .and_then(|s| MergeMode::parse(&s))
                .unwrap_or(defaults.merge_mode),
            async_work_dir: env_string("VARREG_VCF_ASYNC_WORK_DIR").map(PathBuf::from),
            soft_time_limit: Duration::from_secs(env_parse(
                "VARREG_QUEUE_SOFT_TIME_LIMIT",
                defaults.soft_time_limit.as_secs(),
            )),
            hard_time_limit: Duration::from_secs(env_parse(
                "VARREG_QUEUE_HARD_TIME_LIMIT",
                defaults.hard_time_limit.as_secs(),
            )),
            result_expires: Duration::from_secs(env_parse(
                "VARREG_QUEUE_RESULT_EXPIRES",
                defaults.result_expires.as_secs(),
            )),
            failure_status_code: env_parse(
                "VARREG_QUEUE_FAILURE_STATUS_CODE",
                defaults.failure_status_code,
            ),
        }
    }

    /// Whether asynchronous VCF runs can be accepted.
    pub fn queueing_enabled(&self) -> bool {
        self.async_work_dir.is_some()
    }

    fn storage_options(&self) -> SqliteStorageOptions {
        SqliteStorageOptions {
            tables: TableNames {
                objects: self.table_name.clone(),
                locations: self.location_table_name.clone(),
                annotations: self.annotation_table_name.clone(),
                mappings: self.mapping_table_name.clone(),
            },
            batch_limit: self.batch_limit,
            max_pending_batches: self.max_pending_batches,
            merge_mode: self.merge_mode,
            ..SqliteStorageOptions::default()
        }
    }
}

/// Build the storage backend selected by the configuration.
pub fn create_storage(config: &RegistryConfig) -> Result<Arc<dyn Storage>, StorageError> {
    let uri = config.storage_uri.trim();
    if uri.is_empty() {
        return Ok(Arc::new(NoObjectStore::new()));
    }
    if uri == "sqlite::memory:" {
        return Ok(Arc::new(SqliteStorage::in_memory_with_options(
            config.storage_options(),
        )?));
    }
    if let Some(path) = uri.strip_prefix("sqlite://") {
        return Ok(Arc::new(SqliteStorage::open_with_options(
            path,
            config.storage_options(),
        )?));
    }
    Err(StorageError::Unavailable(format!(
        "unsupported storage URI: {uri}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.batch_limit, 100_000);
        assert_eq!(config.max_pending_batches, 50);
        assert!(config.flush_on_batchctx_exit);
        assert_eq!(config.merge_mode, MergeMode::Merge);
        assert!(!config.queueing_enabled());
    }

    #[test]
    fn test_empty_uri_selects_stateless() {
        let storage = create_storage(&RegistryConfig::default()).unwrap();
        assert_eq!(storage.object_count().unwrap(), 0);
    }

    #[test]
    fn test_memory_uri_selects_sqlite() {
        let config = RegistryConfig {
            storage_uri: "sqlite::memory:".to_string(),
            ..RegistryConfig::default()
        };
        let storage = create_storage(&config).unwrap();
        assert_eq!(storage.object_count().unwrap(), 0);
    }

    #[test]
    fn test_file_uri_opens_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");
        let config = RegistryConfig {
            storage_uri: format!("sqlite://{}", path.display()),
            ..RegistryConfig::default()
        };
        let storage = create_storage(&config).unwrap();
        assert_eq!(storage.object_count().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_unknown_uri_rejected() {
        let config = RegistryConfig {
            storage_uri: "postgres://host/db".to_string(),
            ..RegistryConfig::default()
        };
        assert!(create_storage(&config).is_err());
    }
}
