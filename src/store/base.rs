use crate::error::DrResult;
use crate::status::record::ReplicationStatus;

/// Contract for storing and querying the replication status of databases and
/// tables copied by DR jobs.
///
/// Implementations keep one aggregate per (database, job name) key. All
/// operations are synchronous blocking calls; no backend runs internal
/// threads or schedulers. Nothing protects a key from concurrent writers:
/// the discipline is a single concurrent writer per key, any number of
/// readers. Disjoint keys are independent.
pub trait StatusStore {
    /// Applies a batch of outcomes produced by one run of `job_name`.
    ///
    /// Fails fast, before any mutation, if any outcome names a different job.
    /// Outcomes are grouped by database; each touched database's verdict is
    /// recomputed from its table statuses after all outcomes are applied.
    /// Persistence is atomic per database only: a batch touching several
    /// databases can be interrupted with some persisted and others not.
    fn submit_batch(&self, job_name: &str, outcomes: &[ReplicationStatus]) -> DrResult<()>;

    /// Returns the current status at database granularity (`table` is `None`
    /// or empty) or table granularity.
    ///
    /// A table that has never been reported yields a synthetic INIT record
    /// with event id -1; the synthetic record is never persisted.
    fn get_status(
        &self,
        source: &str,
        target: &str,
        job_name: &str,
        database: &str,
        table: Option<&str>,
    ) -> DrResult<ReplicationStatus>;

    /// Returns all known table-level statuses for the (database, job) key.
    fn list_table_statuses(
        &self,
        source: &str,
        target: &str,
        job_name: &str,
        database: &str,
    ) -> DrResult<Vec<ReplicationStatus>>;

    /// Reserved for detecting overlapping replication jobs writing to the
    /// same database or table. No semantics are defined yet; implementations
    /// treat it as a no-op extension point.
    fn check_conflict(
        &self,
        source: &str,
        target: &str,
        job_name: &str,
        database: &str,
        table: &str,
    ) -> DrResult<()>;
}
