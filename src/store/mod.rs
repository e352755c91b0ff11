//! Backends for persisting replication status.
//!
//! The [`StatusStore`] trait defines the contract a job driver or status
//! reporting tool programs against. [`FsStatusStore`] persists aggregates as
//! versioned JSON snapshots in a permission-checked directory tree on the
//! target cluster; [`MemoryStatusStore`] keeps them in memory for tests and
//! embedding.

pub mod base;
pub mod fs;
pub mod memory;

pub use base::StatusStore;
pub use fs::FsStatusStore;
pub use memory::MemoryStatusStore;
