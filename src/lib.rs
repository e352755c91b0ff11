//! Replication status tracking for Hive disaster-recovery jobs.
//!
//! A DR job copies Hive databases and tables from a source cluster to a target
//! cluster and reports one outcome record per replicated unit. This crate
//! reconciles those per-table outcomes into a per-database verdict and persists
//! the result as versioned JSON snapshots, so a recovery operator can always
//! answer: what is the last successfully replicated point, and is the database
//! currently consistent?
//!
//! The [`store::StatusStore`] trait defines the contract; [`store::FsStatusStore`]
//! is the durable filesystem-backed implementation and
//! [`store::MemoryStatusStore`] an in-memory one for tests and embedding.

pub mod config;
pub mod error;
mod macros;
pub mod status;
pub mod store;
