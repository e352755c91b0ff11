use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use tempfile::{tempdir, TempDir};

use hive_dr_status::config::StoreConfig;
use hive_dr_status::error::ErrorKind;
use hive_dr_status::status::record::{ReplicationState, ReplicationStatus, NO_EVENT_ID};
use hive_dr_status::store::{FsStatusStore, StatusStore};

const SOURCE: &str = "hive://source:9083";
const TARGET: &str = "hive://target:9083";
const JOB: &str = "J1";

/// Provisions a base directory the way an operator would: pre-created with
/// mode 0777 before the store is first opened.
fn provisioned_base() -> (TempDir, StoreConfig) {
    let base = tempdir().unwrap();
    fs::set_permissions(base.path(), fs::Permissions::from_mode(0o777)).unwrap();
    let config = StoreConfig::new(base.path());
    (base, config)
}

fn table_outcome(
    database: &str,
    table: &str,
    status: ReplicationState,
    event_id: i64,
) -> ReplicationStatus {
    ReplicationStatus::table_level(SOURCE, TARGET, JOB, database, table, status, event_id).unwrap()
}

fn db_status(store: &FsStatusStore, database: &str) -> ReplicationStatus {
    store.get_status(SOURCE, TARGET, JOB, database, None).unwrap()
}

fn historical_snapshots(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .filter(|name| name != "latest.json")
        .collect();
    names.sort();
    names
}

#[test]
fn test_database_verdict_follows_table_outcomes() {
    let (_base, config) = provisioned_base();
    let store = FsStatusStore::new(&config).unwrap();

    // Two successful tables: database catches up to the largest event id.
    store
        .submit_batch(
            JOB,
            &[
                table_outcome("sales", "t1", ReplicationState::Success, 5),
                table_outcome("sales", "t2", ReplicationState::Success, 8),
            ],
        )
        .unwrap();
    let status = db_status(&store, "sales");
    assert_eq!(status.status, ReplicationState::Success);
    assert_eq!(status.event_id, 8);

    // One table fails: the database fails at that table's event id.
    store
        .submit_batch(
            JOB,
            &[table_outcome("sales", "t2", ReplicationState::Failure, 10)],
        )
        .unwrap();
    let status = db_status(&store, "sales");
    assert_eq!(status.status, ReplicationState::Failure);
    assert_eq!(status.event_id, 10);

    // A second failed table with a smaller event id drags the verdict back so
    // a retry cannot skip unrecovered data.
    store
        .submit_batch(
            JOB,
            &[table_outcome("sales", "t3", ReplicationState::Failure, 3)],
        )
        .unwrap();
    let status = db_status(&store, "sales");
    assert_eq!(status.status, ReplicationState::Failure);
    assert_eq!(status.event_id, 3);

    let tables = store
        .list_table_statuses(SOURCE, TARGET, JOB, "sales")
        .unwrap();
    assert_eq!(tables.len(), 3);
}

#[test]
fn test_status_survives_reopening_the_store() {
    let (_base, config) = provisioned_base();
    let store = FsStatusStore::new(&config).unwrap();
    store
        .submit_batch(
            JOB,
            &[table_outcome("sales", "t1", ReplicationState::Success, 5)],
        )
        .unwrap();
    drop(store);

    let reopened = FsStatusStore::new(&config).unwrap();
    let status = reopened
        .get_status(SOURCE, TARGET, JOB, "sales", Some("t1"))
        .unwrap();
    assert_eq!(status.status, ReplicationState::Success);
    assert_eq!(status.event_id, 5);
}

#[test]
fn test_db_level_outcome_updates_database_record() {
    let (_base, config) = provisioned_base();
    let store = FsStatusStore::new(&config).unwrap();
    store
        .submit_batch(
            JOB,
            &[ReplicationStatus::db_level(
                SOURCE,
                TARGET,
                JOB,
                "sales",
                ReplicationState::Success,
                100,
            )],
        )
        .unwrap();

    let status = db_status(&store, "sales");
    assert_eq!(status.status, ReplicationState::Success);
    assert_eq!(status.event_id, 100);
}

#[test]
fn test_batch_groups_by_database() {
    let (_base, config) = provisioned_base();
    let store = FsStatusStore::new(&config).unwrap();
    store
        .submit_batch(
            JOB,
            &[
                table_outcome("sales", "t1", ReplicationState::Success, 5),
                table_outcome("marketing", "t1", ReplicationState::Failure, 2),
            ],
        )
        .unwrap();

    assert_eq!(db_status(&store, "sales").status, ReplicationState::Success);
    let marketing = db_status(&store, "marketing");
    assert_eq!(marketing.status, ReplicationState::Failure);
    assert_eq!(marketing.event_id, 2);
}

#[test]
fn test_batch_rejects_foreign_job_before_any_write() {
    let (base, config) = provisioned_base();
    let store = FsStatusStore::new(&config).unwrap();

    let mut foreign = table_outcome("sales", "t1", ReplicationState::Success, 5);
    foreign.job_name = "J2".to_owned();
    let err = store
        .submit_batch(
            JOB,
            &[table_outcome("sales", "t2", ReplicationState::Success, 8), foreign],
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    // Validation happens before any mutation: no status directory was created.
    assert!(!base
        .path()
        .join("hive-replication-status-store")
        .join("sales")
        .exists());
}

#[test]
fn test_unknown_table_yields_synthetic_init_and_persists_nothing() {
    let (_base, config) = provisioned_base();
    let store = FsStatusStore::new(&config).unwrap();

    let status = store
        .get_status(SOURCE, TARGET, JOB, "sales", Some("ghost"))
        .unwrap();
    assert_eq!(status.status, ReplicationState::Init);
    assert_eq!(status.event_id, NO_EVENT_ID);
    assert_eq!(status.table.as_deref(), Some("ghost"));

    // The synthetic record is not in the persisted snapshot.
    let latest = store.status_dir("sales", JOB).join("latest.json");
    let persisted = fs::read_to_string(latest).unwrap();
    assert!(!persisted.contains("ghost"));
    assert!(store
        .list_table_statuses(SOURCE, TARGET, JOB, "sales")
        .unwrap()
        .is_empty());
}

#[test]
fn test_empty_table_query_returns_database_status() {
    let (_base, config) = provisioned_base();
    let store = FsStatusStore::new(&config).unwrap();
    store
        .submit_batch(
            JOB,
            &[table_outcome("sales", "t1", ReplicationState::Success, 5)],
        )
        .unwrap();

    let status = store
        .get_status(SOURCE, TARGET, JOB, "sales", Some(""))
        .unwrap();
    assert_eq!(status.table, None);
    assert_eq!(status.event_id, 5);
}

#[test]
fn test_missing_base_directory_fails_construction() {
    let base = tempdir().unwrap();
    let config = StoreConfig::new(base.path().join("nowhere"));
    let err = FsStatusStore::new(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigError);
}

#[test]
fn test_wrong_base_permissions_fail_construction() {
    let base = tempdir().unwrap();
    fs::set_permissions(base.path(), fs::Permissions::from_mode(0o755)).unwrap();
    let config = StoreConfig::new(base.path());
    let err = FsStatusStore::new(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert!(err.detail().unwrap().contains("755"));
}

#[test]
fn test_status_directory_layout_and_versioning() {
    let (base, config) = provisioned_base();
    let store = FsStatusStore::new(&config).unwrap();
    store
        .submit_batch(
            JOB,
            &[table_outcome("sales", "t1", ReplicationState::Success, 5)],
        )
        .unwrap();
    // Distinct mtimes so the rename target names differ.
    sleep(Duration::from_millis(5));
    store
        .submit_batch(
            JOB,
            &[table_outcome("sales", "t1", ReplicationState::Success, 6)],
        )
        .unwrap();

    let dir = base
        .path()
        .join("hive-replication-status-store")
        .join("sales")
        .join(JOB);
    assert!(dir.join("latest.json").is_file());
    let historical = historical_snapshots(&dir);
    // Initial INIT snapshot plus the superseded first batch snapshot.
    assert_eq!(historical.len(), 2);
    for name in &historical {
        assert!(name.ends_with(".json"));
        assert!(name.trim_end_matches(".json").parse::<u64>().is_ok());
    }

    let mode = fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o775);
}

#[test]
fn test_rotation_keeps_newest_n_historical_files() {
    let (_base, config) = provisioned_base();
    let store = FsStatusStore::new(&config).unwrap();
    store
        .submit_batch(
            JOB,
            &[table_outcome("sales", "t1", ReplicationState::Success, 5)],
        )
        .unwrap();
    let dir = store.status_dir("sales", JOB);
    for name in ["1000.json", "1001.json", "1002.json", "1003.json", "1004.json"] {
        fs::write(dir.join(name), "{}").unwrap();
    }
    // Make every candidate older than a zero grace period.
    sleep(Duration::from_millis(5));

    // The directory now holds the five backdated names plus the initial
    // snapshot the batch write rotated out, six historical files in total. The original
    // implementation's arithmetic was off by one against its own "keep N
    // files" intent; the store retains exactly the newest N.
    store
        .rotate_snapshots(&dir, 3, Duration::ZERO)
        .unwrap();

    let remaining = historical_snapshots(&dir);
    assert_eq!(remaining.len(), 3);
    for deleted in ["1000.json", "1001.json", "1002.json"] {
        assert!(!remaining.iter().any(|name| name == deleted));
    }
    for kept in ["1003.json", "1004.json"] {
        assert!(remaining.iter().any(|name| name == kept));
    }
}

#[test]
fn test_rotation_spares_files_within_grace_period() {
    let (_base, config) = provisioned_base();
    let store = FsStatusStore::new(&config).unwrap();
    store
        .submit_batch(
            JOB,
            &[table_outcome("sales", "t1", ReplicationState::Success, 5)],
        )
        .unwrap();
    let dir = store.status_dir("sales", JOB);
    for name in ["1000.json", "1001.json", "1002.json"] {
        fs::write(dir.join(name), "{}").unwrap();
    }

    // Four historical files against a target of one, but everything is
    // younger than the max age, so nothing is deleted.
    store
        .rotate_snapshots(&dir, 1, Duration::from_secs(3600))
        .unwrap();

    assert_eq!(historical_snapshots(&dir).len(), 4);
}
