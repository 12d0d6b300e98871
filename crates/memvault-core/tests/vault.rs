//! End-to-end coverage of the vault: ingestion, search, rebuilds, crash
//! artifacts, and legacy migration.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use memvault_core::{
    ActionKind, FetchMode, Fetched, LifecycleStatus, Record, RecordId, Vault, VaultConfig,
    VaultError,
};

fn open_vault(root: &Path) -> Vault {
    Vault::open(root, VaultConfig::default()).unwrap()
}

fn make_record(id: &str, title: &str, raw: &str) -> Record {
    let mut record = Record::from_payload(title, raw);
    record.id = RecordId::new(id).unwrap();
    record.keywords = vec!["canvas".into()];
    record.decision = LifecycleStatus::Kept;
    record
}

#[test]
fn scenario_a_store_query_fetch_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open_vault(dir.path());

    for id in ["a1", "a2", "a3"] {
        let record = make_record(id, &format!("chat {id}"), &format!("User: about {id}"));
        vault.store(&record).unwrap();
    }

    let ids: Vec<String> = vault.query("a2").map(|id| id.to_string()).collect();
    assert_eq!(ids, vec!["a2"]);

    let fetched = vault
        .fetch(&RecordId::new("a2").unwrap(), FetchMode::Raw)
        .unwrap();
    match fetched {
        Fetched::Raw(record) => assert_eq!(record.title, "chat a2"),
        Fetched::Text(_) => panic!("asked for raw"),
    }

    let entry = vault.lookup(&RecordId::new("a2").unwrap()).unwrap();
    assert_eq!(entry.status, LifecycleStatus::Kept);
    assert_eq!(entry.status.to_string(), "kept");
}

#[test]
fn scenario_b_concurrent_stores_on_distinct_ids() {
    let dir = tempfile::tempdir().unwrap();
    let vault = Arc::new(open_vault(dir.path()));

    let handles: Vec<_> = ["left", "right"]
        .into_iter()
        .map(|id| {
            let vault = Arc::clone(&vault);
            std::thread::spawn(move || {
                let record = make_record(id, id, &format!("content of {id}").repeat(50));
                vault.store(&record).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for id in ["left", "right"] {
        let record = vault.fetch_raw(&RecordId::new(id).unwrap()).unwrap();
        assert_eq!(record.raw, format!("content of {id}").repeat(50));
    }
}

#[test]
fn scenario_c_truncated_log_tail_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open_vault(dir.path());

    for i in 0..5 {
        vault
            .store(&make_record(&format!("r{i}"), "t", &format!("content {i}")))
            .unwrap();
    }
    let complete = vault.events().unwrap();
    assert_eq!(complete.len(), 5);

    // Crash mid-write of a sixth event.
    let log_path = dir.path().join("logs/events.log");
    let mut data = fs::read(&log_path).unwrap();
    data.extend_from_slice(b"{\"timestamp\":\"2025-0");
    fs::write(&log_path, data).unwrap();

    let events = vault.events().unwrap();
    assert_eq!(events.len(), 5);
    assert!(events
        .iter()
        .all(|e| e.action == ActionKind::RecordStored));
}

#[test]
fn duplicate_store_is_a_logged_noop() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open_vault(dir.path());
    let record = make_record("dup", "title", "identical content");

    assert!(!vault.store(&record).unwrap().duplicate);
    assert!(vault.store(&record).unwrap().duplicate);

    let events = vault.events().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].action, ActionKind::RecordSkippedDuplicate);
}

#[test]
fn batch_isolates_per_record_failures() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open_vault(dir.path());

    let good = make_record("good1", "t", "fine");
    let dup = good.clone();
    let also_good = make_record("good2", "t", "also fine");
    let outcome = vault.store_batch(&[good, dup, also_good]);

    assert_eq!(outcome.stored.len(), 2);
    assert_eq!(outcome.skipped.len(), 1);
    assert!(outcome.failed.is_empty());
}

#[test]
fn rebuild_manifest_is_idempotent_and_flags_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open_vault(dir.path());
    let good = make_record("good", "t", "good content");
    let bad = make_record("bad", "t", "bad content");
    vault.store(&good).unwrap();
    vault.store(&bad).unwrap();

    // Idempotence while idle.
    vault.rebuild_manifest().unwrap();
    let first = fs::read(dir.path().join("manifest.json")).unwrap();
    vault.rebuild_manifest().unwrap();
    let second = fs::read(dir.path().join("manifest.json")).unwrap();
    assert_eq!(first, second);

    // Partial-failure isolation.
    fs::write(dir.path().join("records/bad.mvz"), b"garbage").unwrap();
    let report = vault.rebuild_manifest().unwrap();
    assert_eq!(report.flagged, vec![RecordId::new("bad").unwrap()]);

    assert!(vault.fetch_raw(&good.id).is_ok());
    assert_eq!(
        vault.lookup(&bad.id).unwrap().status,
        LifecycleStatus::Flagged
    );
}

#[test]
fn rebuild_index_heals_a_wrecked_search_document() {
    let dir = tempfile::tempdir().unwrap();
    {
        let vault = open_vault(dir.path());
        vault.store(&make_record("r1", "canvas notes", "x")).unwrap();
        vault.store(&make_record("r2", "other", "y")).unwrap();
    }
    fs::write(dir.path().join("index/search.json"), b"corrupt").unwrap();

    // Reopening with a corrupt index must not fail; ingestion still works.
    let vault = open_vault(dir.path());
    vault.store(&make_record("r3", "late", "z")).unwrap();

    let indexed = vault.rebuild_index().unwrap();
    assert_eq!(indexed, 3);
    let ids: Vec<String> = vault.query("canvas").map(|id| id.to_string()).collect();
    // r1 by title, r1/r2/r3 all carry the "canvas" keyword fixture.
    assert!(ids.contains(&"r1".to_string()));
    assert_eq!(ids.len(), 3);
}

#[test]
fn orphan_containers_are_reported_and_adopted() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open_vault(dir.path());
    vault.store(&make_record("kept", "t", "x")).unwrap();

    // Simulate a crash between container write and manifest upsert.
    let orphan = make_record("orphan", "t", "y");
    vault.records().store(&orphan).unwrap();

    assert_eq!(vault.orphans().unwrap(), vec![orphan.id.clone()]);
    vault.rebuild_manifest().unwrap();
    assert!(vault.orphans().unwrap().is_empty());
    assert!(vault.lookup(&orphan.id).is_ok());
}

#[test]
fn migrate_converts_archives_and_logs() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open_vault(dir.path());

    let legacy_path = dir.path().join("legacy_monolith.json");
    fs::write(
        &legacy_path,
        serde_json::to_vec_pretty(&serde_json::json!({
            "old1": { "title": "first", "content": "User: one", "decision": "keep" },
            "old2": { "title": "second", "text": "User: two" },
        }))
        .unwrap(),
    )
    .unwrap();

    let report = vault.migrate(&legacy_path).unwrap();
    assert_eq!(report.migrated, 2);
    assert_eq!(report.skipped, 0);

    // Monolith moved into the archive area.
    assert!(!legacy_path.exists());
    assert!(report.archived_monolith.exists());

    let record = vault.fetch_raw(&RecordId::new("old1").unwrap()).unwrap();
    assert_eq!(record.raw, "User: one");
    assert_eq!(record.decision, LifecycleStatus::Kept);

    let events = vault.events().unwrap();
    let actions: Vec<ActionKind> = events.iter().map(|e| e.action).collect();
    assert_eq!(
        actions
            .iter()
            .filter(|a| **a == ActionKind::RecordMigrated)
            .count(),
        2
    );
    assert_eq!(*actions.last().unwrap(), ActionKind::MigrationCompleted);
    let summary = &events.last().unwrap().context;
    assert_eq!(summary["migrated"], 2);
}

#[test]
fn failed_verification_leaves_the_monolith_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open_vault(dir.path());

    // A pre-existing entry whose container is wrecked fails verification.
    let doomed = make_record("doomed", "t", "will be corrupted");
    vault.store(&doomed).unwrap();
    fs::write(dir.path().join("records/doomed.mvz"), b"garbage").unwrap();

    let legacy_path = dir.path().join("legacy_monolith.json");
    let monolith = serde_json::to_vec_pretty(&serde_json::json!({
        "old1": { "title": "first", "raw": "User: one" },
    }))
    .unwrap();
    fs::write(&legacy_path, &monolith).unwrap();

    let err = vault.migrate(&legacy_path).unwrap_err();
    match err {
        VaultError::MigrationVerification { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, doomed.id);
        }
        other => panic!("expected MigrationVerification, got {other:?}"),
    }
    // Byte-identical for safe retry.
    assert_eq!(fs::read(&legacy_path).unwrap(), monolith);
}

#[test]
fn halted_migration_resumes_by_skipping_manifested_ids() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open_vault(dir.path());

    // "old1" was already migrated before the halt.
    let mut pre = make_record("old1", "first", "User: one");
    pre.decision = LifecycleStatus::Pending;
    vault.store(&pre).unwrap();

    let legacy_path = dir.path().join("legacy_monolith.json");
    fs::write(
        &legacy_path,
        serde_json::to_vec_pretty(&serde_json::json!({
            "old1": { "title": "first", "raw": "User: one" },
            "old2": { "title": "second", "raw": "User: two" },
        }))
        .unwrap(),
    )
    .unwrap();

    let report = vault.migrate(&legacy_path).unwrap();
    assert_eq!(report.migrated, 1);
    assert_eq!(report.skipped, 1);
    assert!(vault.fetch_raw(&RecordId::new("old2").unwrap()).is_ok());
}
