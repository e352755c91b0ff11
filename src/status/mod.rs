//! Replication status records and the per-database aggregate.
//!
//! Defines the leaf [`record::ReplicationStatus`] produced by a DR job run for
//! each replicated unit, and the [`database::DbReplicationStatus`] aggregate
//! that merges per-table outcomes into a database-level verdict.

pub mod database;
pub mod record;
