use dataset_catalog_rs::{CatalogStore, NameResolver, PartitionConfigProvider};
use std::fs::{self, File};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

const FIRST: &str = r#"{
  "partitions": { "employee_roster": { "load_id_column": "as_of_month_sk" } },
  "tables": { "LOGICAL_SALES": { "physical_name": "PROD_SALES_TABLE_V2" } }
}"#;

const SECOND: &str = r#"{
  "partitions": { "daily_sales": { "load_id_column": "load_date" } }
}"#;

fn bump_mtime(path: &std::path::Path, seconds: u64) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(seconds))
        .unwrap();
}

#[test]
fn missing_file_is_an_empty_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let store = CatalogStore::open(dir.path().join("catalog.json"));

    let snapshot = store.snapshot();
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.physical_table("orders"), "orders");
    assert!(store.reload().is_err());
}

#[test]
fn loads_catalog_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    fs::write(&path, FIRST).unwrap();

    let store = CatalogStore::open(&path);
    let snapshot = store.snapshot();
    assert!(snapshot.partition_config("EMPLOYEE_ROSTER").is_some());
    assert_eq!(snapshot.physical_table("logical_sales"), "PROD_SALES_TABLE_V2");
}

#[test]
fn refreshes_when_modification_time_advances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    fs::write(&path, FIRST).unwrap();
    let store = CatalogStore::open(&path);
    let before = store.snapshot();

    fs::write(&path, SECOND).unwrap();
    bump_mtime(&path, 10);

    let after = store.snapshot();
    assert!(after.partition_config("daily_sales").is_some());
    assert!(after.partition_config("employee_roster").is_none());

    // Snapshots taken earlier are unaffected by the swap.
    assert!(before.partition_config("employee_roster").is_some());
}

#[test]
fn keeps_previous_snapshot_when_file_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    fs::write(&path, FIRST).unwrap();
    let store = CatalogStore::open(&path);

    fs::write(&path, "{ not json").unwrap();
    bump_mtime(&path, 10);

    let snapshot = store.snapshot();
    assert!(snapshot.partition_config("employee_roster").is_some());
    assert!(store.reload().is_err());
}

#[test]
fn reload_forces_reread() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    fs::write(&path, FIRST).unwrap();
    let store = CatalogStore::open(&path);

    fs::write(&path, SECOND).unwrap();
    let reloaded = store.reload().unwrap();
    assert!(reloaded.partition_config("daily_sales").is_some());
    assert!(Arc::ptr_eq(&reloaded, &store.snapshot()));
}

#[test]
fn concurrent_readers_always_see_a_complete_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    fs::write(&path, FIRST).unwrap();
    let store = Arc::new(CatalogStore::open(&path));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let snapshot = store.snapshot();
                    let first = snapshot.partition_config("employee_roster").is_some();
                    let second = snapshot.partition_config("daily_sales").is_some();
                    assert!(first != second);
                }
            })
        })
        .collect();

    for round in 0..20u64 {
        let body = if round % 2 == 0 { SECOND } else { FIRST };
        fs::write(&path, body).unwrap();
        bump_mtime(&path, 10 + round);
        let _ = store.reload();
    }

    for reader in readers {
        reader.join().unwrap();
    }
}
