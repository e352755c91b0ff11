use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::bail;
use crate::config::StoreConfig;
use crate::dr_error;
use crate::error::{DrError, DrResult, ErrorKind};
use crate::status::database::DbReplicationStatus;
use crate::status::record::{ReplicationState, ReplicationStatus, NO_EVENT_ID};
use crate::store::base::StatusStore;

const STORE_DIR_NAME: &str = "hive-replication-status-store";
const LATEST_FILE: &str = "latest.json";

/// All principals, all operations. Required on the base directory and the
/// store root so every job user can read and write statuses.
const STORE_DIR_MODE: u32 = 0o777;
/// Owner and group full access, others read and traverse only. Applied to
/// per-(database, job) status directories.
const STATUS_DIR_MODE: u32 = 0o775;

/// Durable [`StatusStore`] persisting one aggregate per (database, job) key
/// as versioned JSON snapshots:
///
/// ```text
/// <base>/hive-replication-status-store/<database>/<job>/latest.json
/// <base>/hive-replication-status-store/<database>/<job>/<timestampMillis>.json
/// ```
///
/// The base directory is a provisioning precondition: it must already exist
/// with mode 0777. Writers race under read-modify-write semantics; callers
/// must ensure a single concurrent writer per (database, job) key.
#[derive(Debug, Clone)]
pub struct FsStatusStore {
    store_root: PathBuf,
    retained_snapshots: usize,
    max_snapshot_age: Duration,
}

impl FsStatusStore {
    /// Opens the store under `config.base_path`, creating the store root if
    /// needed. Fails with [`ErrorKind::ConfigError`] if the base directory is
    /// missing or either directory does not carry mode 0777.
    pub fn new(config: &StoreConfig) -> DrResult<Self> {
        let base = config.base_path.as_path();
        if !base.is_dir() {
            bail!(
                ErrorKind::ConfigError,
                "Status store base directory does not exist, provision it with mode 0777",
                base.display()
            );
        }
        check_dir_mode(base, STORE_DIR_MODE)?;

        let store_root = base.join(STORE_DIR_NAME);
        if store_root.is_dir() {
            check_dir_mode(&store_root, STORE_DIR_MODE)?;
        } else {
            create_dir_with_mode(&store_root, STORE_DIR_MODE)?;
        }

        Ok(Self {
            store_root,
            retained_snapshots: config.retained_snapshots,
            max_snapshot_age: config.max_snapshot_age(),
        })
    }

    /// Directory holding the snapshots for one (database, job) key.
    pub fn status_dir(&self, database: &str, job_name: &str) -> PathBuf {
        self.store_root.join(database).join(job_name)
    }

    /// Deletes the oldest excess historical snapshots in `status_dir`.
    ///
    /// Historical files (everything except `latest.json`) are ordered by name;
    /// names are epoch-millisecond timestamps, so lexical order is
    /// chronological. The newest `retained` files are always kept, and excess
    /// files are only deleted once older than `max_age`, so recent history
    /// survives even when the count briefly exceeds the target.
    pub fn rotate_snapshots(
        &self,
        status_dir: &Path,
        retained: usize,
        max_age: Duration,
    ) -> DrResult<()> {
        let mut historical = Vec::new();
        for entry in fs::read_dir(status_dir).map_err(|e| io_error("list", status_dir, e))? {
            let entry = entry.map_err(|e| io_error("list", status_dir, e))?;
            if entry.file_name() != LATEST_FILE {
                historical.push(entry.path());
            }
        }
        if historical.len() <= retained {
            return Ok(());
        }

        historical.sort();
        let excess = historical.len() - retained;
        let now = SystemTime::now();
        for path in &historical[..excess] {
            let age = now
                .duration_since(modified_time(path)?)
                .unwrap_or_default();
            if age > max_age {
                fs::remove_file(path).map_err(|e| io_error("delete", path, e))?;
                debug!(path = %path.display(), "deleted rotated status snapshot");
            }
        }

        Ok(())
    }

    /// Loads the persisted aggregate for the key, or creates a fresh INIT
    /// aggregate, provisions its status directory, and persists it.
    fn load_or_init(
        &self,
        source: &str,
        target: &str,
        job_name: &str,
        database: &str,
    ) -> DrResult<DbReplicationStatus> {
        let dir = self.status_dir(database, job_name);
        if let Some(aggregate) = self.read_snapshot(&dir)? {
            return Ok(aggregate);
        }

        let aggregate = DbReplicationStatus::new(ReplicationStatus::db_level(
            source,
            target,
            job_name,
            database,
            ReplicationState::Init,
            NO_EVENT_ID,
        ))?;
        self.create_status_dir(database, job_name)?;
        self.write_snapshot(&aggregate)?;
        debug!(database, job = job_name, "initialized replication status for new database");

        Ok(aggregate)
    }

    fn create_status_dir(&self, database: &str, job_name: &str) -> DrResult<()> {
        let db_dir = self.store_root.join(database);
        if !db_dir.is_dir() {
            create_dir_with_mode(&db_dir, STATUS_DIR_MODE)?;
        }
        let job_dir = db_dir.join(job_name);
        if !job_dir.is_dir() {
            create_dir_with_mode(&job_dir, STATUS_DIR_MODE)?;
        }

        Ok(())
    }

    fn read_snapshot(&self, status_dir: &Path) -> DrResult<Option<DbReplicationStatus>> {
        let latest = status_dir.join(LATEST_FILE);
        if !latest.is_file() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&latest).map_err(|e| io_error("read", &latest, e))?;

        Ok(Some(DbReplicationStatus::from_json_str(&contents)?))
    }

    /// Writes a new `latest.json` for the aggregate's key, renaming any
    /// existing latest snapshot to its modification timestamp first. The
    /// rename-then-write sequence is the only atomicity unit.
    fn write_snapshot(&self, aggregate: &DbReplicationStatus) -> DrResult<()> {
        let status = aggregate.db_status();
        let dir = self.status_dir(&status.database, &status.job_name);
        let latest = dir.join(LATEST_FILE);

        if latest.is_file() {
            let mut millis = modified_time(&latest)?
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis();
            let mut historical = dir.join(format!("{millis}.json"));
            // Two snapshots written within the same millisecond must not
            // overwrite already-rotated history.
            while historical.exists() {
                millis += 1;
                historical = dir.join(format!("{millis}.json"));
            }
            fs::rename(&latest, &historical).map_err(|e| io_error("rename", &latest, e))?;
        }

        fs::write(&latest, aggregate.to_json_string()?)
            .map_err(|e| io_error("write", &latest, e))?;

        self.rotate_snapshots(&dir, self.retained_snapshots, self.max_snapshot_age)
    }
}

impl StatusStore for FsStatusStore {
    fn submit_batch(&self, job_name: &str, outcomes: &[ReplicationStatus]) -> DrResult<()> {
        for outcome in outcomes {
            if outcome.job_name != job_name {
                bail!(
                    ErrorKind::ValidationError,
                    "Batch outcome does not belong to the submitted job",
                    format!(
                        "job {job_name} received status for {}.{} of job {}",
                        outcome.database,
                        outcome.table().unwrap_or_default(),
                        outcome.job_name
                    )
                );
            }
        }

        let mut touched: HashMap<String, DbReplicationStatus> = HashMap::new();
        for outcome in outcomes {
            let aggregate = match touched.entry(outcome.database.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(self.load_or_init(
                    &outcome.source_uri,
                    &outcome.target_uri,
                    job_name,
                    &outcome.database,
                )?),
            };
            if outcome.is_table_level() {
                aggregate.update_table_status(outcome.clone())?;
            } else {
                aggregate.update_db_status(outcome.clone())?;
            }
        }

        for aggregate in touched.values_mut() {
            aggregate.recompute_db_status();
            self.write_snapshot(aggregate)?;
        }
        info!(
            job = job_name,
            outcomes = outcomes.len(),
            databases = touched.len(),
            "persisted replication status batch"
        );

        Ok(())
    }

    fn get_status(
        &self,
        source: &str,
        target: &str,
        job_name: &str,
        database: &str,
        table: Option<&str>,
    ) -> DrResult<ReplicationStatus> {
        let aggregate = self.load_or_init(source, target, job_name, database)?;
        match table {
            Some(table) if !table.is_empty() => match aggregate.table_status(table) {
                Some(status) => Ok(status.clone()),
                // Unknown table: synthetic result, never persisted.
                None => ReplicationStatus::table_level(
                    source,
                    target,
                    job_name,
                    database,
                    table,
                    ReplicationState::Init,
                    NO_EVENT_ID,
                ),
            },
            _ => Ok(aggregate.db_status().clone()),
        }
    }

    fn list_table_statuses(
        &self,
        source: &str,
        target: &str,
        job_name: &str,
        database: &str,
    ) -> DrResult<Vec<ReplicationStatus>> {
        Ok(self
            .load_or_init(source, target, job_name, database)?
            .table_statuses())
    }

    fn check_conflict(
        &self,
        _source: &str,
        _target: &str,
        _job_name: &str,
        _database: &str,
        _table: &str,
    ) -> DrResult<()> {
        // Extension point: overlapping-job detection has no defined semantics yet.
        Ok(())
    }
}

fn check_dir_mode(path: &Path, expected: u32) -> DrResult<()> {
    let metadata = fs::metadata(path).map_err(|e| {
        dr_error!(
            ErrorKind::ConfigError,
            "Cannot inspect status store directory",
            format!("{}: {e}", path.display())
        )
    })?;
    let mode = metadata.permissions().mode() & 0o777;
    if mode != expected {
        bail!(
            ErrorKind::ConfigError,
            "Status store directory has wrong permissions",
            format!("{} has mode {mode:o}, expected {expected:o}", path.display())
        );
    }

    Ok(())
}

// create_dir followed by an explicit chmod: the process umask would strip
// bits from a mode passed at creation time.
fn create_dir_with_mode(path: &Path, mode: u32) -> DrResult<()> {
    fs::create_dir(path).map_err(|e| io_error("create", path, e))?;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| io_error("chmod", path, e))?;

    Ok(())
}

fn modified_time(path: &Path) -> DrResult<SystemTime> {
    let metadata = fs::metadata(path).map_err(|e| io_error("stat", path, e))?;

    metadata.modified().map_err(|e| io_error("stat", path, e))
}

fn io_error(operation: &'static str, path: &Path, err: std::io::Error) -> DrError {
    dr_error!(
        ErrorKind::IoError,
        "Status store I/O operation failed",
        format!("{operation} {}: {err}", path.display())
    )
}
