use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bail;
use crate::error::{DrResult, ErrorKind};
use crate::status::record::{ReplicationState, ReplicationStatus};

/// Aggregate replication status of one database within one DR job: the
/// database-level record plus the status of every table observed so far.
///
/// Both invariants are enforced on construction and on every mutation:
/// the database-level record carries no table name, and every table entry
/// belongs to the aggregate's database.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct DbReplicationStatus {
    db_status: ReplicationStatus,
    #[serde(rename = "table_status")]
    table_statuses: HashMap<String, ReplicationStatus>,
}

/// Wire form of the persisted snapshot, validated into a
/// [`DbReplicationStatus`] after parsing.
#[derive(Deserialize)]
struct RawDbReplicationStatus {
    db_status: ReplicationStatus,
    table_status: HashMap<String, ReplicationStatus>,
}

impl DbReplicationStatus {
    /// Creates an aggregate with no table entries from a database-level record.
    pub fn new(db_status: ReplicationStatus) -> DrResult<Self> {
        if db_status.is_table_level() {
            bail!(
                ErrorKind::ValidationError,
                "Database status cannot be built from a table-level record",
                format!(
                    "table {}.{} in job {}",
                    db_status.database,
                    db_status.table().unwrap_or_default(),
                    db_status.job_name
                )
            );
        }

        Ok(Self {
            db_status,
            table_statuses: HashMap::new(),
        })
    }

    /// Creates an aggregate from a database-level record and existing table
    /// entries. Fails if any entry belongs to a different database.
    pub fn with_tables(
        db_status: ReplicationStatus,
        table_statuses: HashMap<String, ReplicationStatus>,
    ) -> DrResult<Self> {
        let mut aggregate = Self::new(db_status)?;
        for status in table_statuses.values() {
            aggregate.check_same_database(status)?;
        }
        aggregate.table_statuses = table_statuses;

        Ok(aggregate)
    }

    /// Parses a persisted snapshot, validating that every table entry belongs
    /// to the declared database.
    pub fn from_json_str(json: &str) -> DrResult<Self> {
        let raw: RawDbReplicationStatus = serde_json::from_str(json)?;
        Self::with_tables(raw.db_status, raw.table_status)
    }

    /// Renders the aggregate as the persisted snapshot JSON.
    pub fn to_json_string(&self) -> DrResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn database(&self) -> &str {
        &self.db_status.database
    }

    pub fn db_status(&self) -> &ReplicationStatus {
        &self.db_status
    }

    /// Returns the current status of one table, if it has ever been reported.
    pub fn table_status(&self, table: &str) -> Option<&ReplicationStatus> {
        self.table_statuses.get(table)
    }

    /// Returns an owned snapshot of all table statuses. Later mutation of the
    /// aggregate does not affect an already-obtained snapshot.
    pub fn table_statuses(&self) -> Vec<ReplicationStatus> {
        self.table_statuses.values().cloned().collect()
    }

    /// Replaces the database-level record. Fails if `status` is table-level
    /// or belongs to a different database.
    pub fn update_db_status(&mut self, status: ReplicationStatus) -> DrResult<()> {
        if status.is_table_level() {
            bail!(
                ErrorKind::ValidationError,
                "Cannot update database status with a table-level record",
                format!(
                    "table {}.{}",
                    status.database,
                    status.table().unwrap_or_default()
                )
            );
        }
        self.check_same_database(&status)?;
        self.db_status = status;

        Ok(())
    }

    /// Inserts or replaces one table's status. Fails if `status` has no table
    /// name or belongs to a different database.
    pub fn update_table_status(&mut self, status: ReplicationStatus) -> DrResult<()> {
        let Some(table) = status.table().map(str::to_owned) else {
            bail!(
                ErrorKind::ValidationError,
                "Cannot update table status from a record without a table name",
                format!("database {} in job {}", status.database, status.job_name)
            );
        };
        self.check_same_database(&status)?;
        self.table_statuses.insert(table, status);

        Ok(())
    }

    /// Derives the database-level verdict from the current table entries.
    ///
    /// The database is only as caught up as its slowest table: if every table
    /// is SUCCESS the verdict is SUCCESS at the largest successful event id
    /// seen (never below the current database event id). If any table is
    /// FAILURE the verdict is FAILURE at the *smallest* failed event id, so a
    /// retry does not skip past unreplicated data. INIT tables affect neither
    /// counter.
    pub fn recompute_db_status(&mut self) {
        let mut success_event_id = self.db_status.event_id;
        let mut failed_event_id: Option<i64> = None;

        for status in self.table_statuses.values() {
            match status.status {
                ReplicationState::Success => {
                    success_event_id = success_event_id.max(status.event_id);
                }
                ReplicationState::Failure => {
                    failed_event_id =
                        Some(failed_event_id.map_or(status.event_id, |id| id.min(status.event_id)));
                }
                ReplicationState::Init => {}
            }
        }

        if let Some(failed_event_id) = failed_event_id {
            self.db_status.status = ReplicationState::Failure;
            self.db_status.event_id = failed_event_id;
        } else {
            self.db_status.status = ReplicationState::Success;
            self.db_status.event_id = success_event_id;
        }

        debug!(
            database = %self.db_status.database,
            status = %self.db_status.status,
            event_id = self.db_status.event_id,
            "recomputed database status from table statuses"
        );
    }

    fn check_same_database(&self, status: &ReplicationStatus) -> DrResult<()> {
        if status.database != self.db_status.database {
            bail!(
                ErrorKind::ValidationError,
                "Status belongs to another database",
                format!(
                    "cannot apply status for {}.{} to database {}",
                    status.database,
                    status.table().unwrap_or_default(),
                    self.db_status.database
                )
            );
        }

        Ok(())
    }
}
