use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::bail;
use crate::error::{DrResult, ErrorKind};

/// Sentinel event id meaning no replication progress has been recorded yet.
pub const NO_EVENT_ID: i64 = -1;

/// Outcome of replicating one unit within a DR job.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplicationState {
    /// Set when a (database, job) pair is first observed, before any run
    /// has reported an outcome.
    Init,
    /// The unit is consistent with the source up to its event id.
    Success,
    /// The last run failed to replicate this unit past its event id.
    Failure,
}

impl fmt::Display for ReplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "INIT"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Failure => write!(f, "FAILURE"),
        }
    }
}

/// Replication outcome for one unit: a database as a whole (`table` is
/// `None`) or one table within it.
///
/// The `event_id` marks how far into the source's change stream the unit has
/// been replicated; it only has meaning relative to other event ids of the
/// same source.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationStatus {
    pub source_uri: String,
    pub target_uri: String,
    pub job_name: String,
    pub database: String,
    /// `None` means this is a database-level record. An empty string on the
    /// wire normalizes to `None`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub table: Option<String>,
    pub status: ReplicationState,
    pub event_id: i64,
}

impl ReplicationStatus {
    /// Creates a database-level record.
    pub fn db_level(
        source_uri: impl Into<String>,
        target_uri: impl Into<String>,
        job_name: impl Into<String>,
        database: impl Into<String>,
        status: ReplicationState,
        event_id: i64,
    ) -> Self {
        Self {
            source_uri: source_uri.into(),
            target_uri: target_uri.into(),
            job_name: job_name.into(),
            database: database.into(),
            table: None,
            status,
            event_id,
        }
    }

    /// Creates a table-level record. The table name must be non-empty.
    pub fn table_level(
        source_uri: impl Into<String>,
        target_uri: impl Into<String>,
        job_name: impl Into<String>,
        database: impl Into<String>,
        table: impl Into<String>,
        status: ReplicationState,
        event_id: i64,
    ) -> DrResult<Self> {
        let table = table.into();
        if table.is_empty() {
            bail!(
                ErrorKind::ValidationError,
                "Table-level status requires a non-empty table name"
            );
        }

        Ok(Self {
            table: Some(table),
            ..Self::db_level(source_uri, target_uri, job_name, database, status, event_id)
        })
    }

    /// Returns the table name if this is a table-level record.
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref().filter(|t| !t.is_empty())
    }

    pub fn is_table_level(&self) -> bool {
        self.table().is_some()
    }

    /// Parses a record from its JSON representation.
    pub fn from_json_str(json: &str) -> DrResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Renders the record as JSON that round-trips through [`Self::from_json_str`].
    pub fn to_json_string(&self) -> DrResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let table = Option::<String>::deserialize(deserializer)?;
    Ok(table.filter(|t| !t.is_empty()))
}
