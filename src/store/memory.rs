use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::bail;
use crate::error::{DrResult, ErrorKind};
use crate::status::database::DbReplicationStatus;
use crate::status::record::{ReplicationState, ReplicationStatus, NO_EVENT_ID};
use crate::store::base::StatusStore;

/// (database, job name) key of one aggregate.
type StatusKey = (String, String);

#[derive(Debug, Default)]
struct Inner {
    aggregates: HashMap<StatusKey, DbReplicationStatus>,
}

/// In-memory [`StatusStore`] with the same batch and merge semantics as the
/// durable store, minus persistence and rotation. Useful for tests and for
/// embedding a store without a provisioned status directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatusStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load_or_init<'a>(
    inner: &'a mut Inner,
    source: &str,
    target: &str,
    job_name: &str,
    database: &str,
) -> DrResult<&'a mut DbReplicationStatus> {
    match inner
        .aggregates
        .entry((database.to_owned(), job_name.to_owned()))
    {
        Entry::Occupied(entry) => Ok(entry.into_mut()),
        Entry::Vacant(entry) => {
            debug!(database, job = job_name, "initialized replication status for new database");
            Ok(entry.insert(DbReplicationStatus::new(ReplicationStatus::db_level(
                source,
                target,
                job_name,
                database,
                ReplicationState::Init,
                NO_EVENT_ID,
            ))?))
        }
    }
}

impl StatusStore for MemoryStatusStore {
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

        let mut inner = self.lock();
        let mut touched = HashSet::new();
        for outcome in outcomes {
            let aggregate = load_or_init(
                &mut inner,
                &outcome.source_uri,
                &outcome.target_uri,
                job_name,
                &outcome.database,
            )?;
            if outcome.is_table_level() {
                aggregate.update_table_status(outcome.clone())?;
            } else {
                aggregate.update_db_status(outcome.clone())?;
            }
            touched.insert(outcome.database.clone());
        }

        for database in touched {
            if let Some(aggregate) = inner.aggregates.get_mut(&(database, job_name.to_owned())) {
                aggregate.recompute_db_status();
            }
        }

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
        let mut inner = self.lock();
        let aggregate = load_or_init(&mut inner, source, target, job_name, database)?;
        match table {
            Some(table) if !table.is_empty() => match aggregate.table_status(table) {
                Some(status) => Ok(status.clone()),
                // Unknown table: synthetic result, never stored.
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
        let mut inner = self.lock();

        Ok(load_or_init(&mut inner, source, target, job_name, database)?.table_statuses())
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
