//! Integration Tests for the Filesystem Driver
//!
//! Exercises the public driver interface end to end against temporary directories.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration, Utc};
use fscache::cache::KeyHasher;
use fscache::{CacheDriver, CacheEntry, CacheError, Config, FileSystemDriver, Value};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

// == Helper Functions ==

fn create_test_driver(config: impl FnOnce(Config) -> Config) -> (TempDir, FileSystemDriver) {
    let dir = tempfile::tempdir().unwrap();
    let driver = FileSystemDriver::new(config(Config::new(dir.path()))).unwrap();
    (dir, driver)
}

fn name_map(name: &str) -> Value {
    let mut map = BTreeMap::new();
    map.insert("name".to_string(), Value::from(name));
    Value::Map(map)
}

// == Scenarios ==

#[test]
fn test_eviction_recomputes_identical_path() {
    let (_dir, driver) = create_test_driver(|c| c.with_dir_split(2).with_mem_key_limit(1));

    assert!(assert_ok!(driver.store(&["users", "42"], &name_map("a"), None)));
    let entry = assert_ok!(driver.get(&["users", "42"]));
    assert_eq!(entry, Some(CacheEntry::new(name_map("a"), None)));

    let original = assert_ok!(driver.build_path(&["users", "42"]));

    // Second key overflows the single-slot path cache
    assert!(assert_ok!(driver.store(&["users", "43"], &Value::Int(43), None)));
    let before = driver.path_cache_stats();
    assert_eq!(before.entries, 0);

    let recomputed = assert_ok!(driver.build_path(&["users", "42"]));
    let after = driver.path_cache_stats();

    assert_eq!(after.misses, before.misses + 1, "lookup should miss after eviction");
    assert_eq!(recomputed, original);
}

#[test]
fn test_expired_entry_readable_until_purged() {
    let (_dir, driver) = create_test_driver(|c| c);
    let expired = Utc::now() - Duration::seconds(1);

    driver.store(&["stale"], &Value::from("old"), Some(expired)).unwrap();

    // Expiration is descriptive on read
    let entry = driver.get(&["stale"]).unwrap().unwrap();
    assert_eq!(entry.value, Value::from("old"));
    assert_eq!(entry.expiration, Some(expired));

    assert!(driver.purge());
    assert_eq!(driver.get(&["stale"]).unwrap(), None);
}

#[test]
fn test_clear_all_forgets_every_key() {
    let (_dir, driver) = create_test_driver(|c| c);
    let keys: [&[&str]; 3] = [&["a"], &["a", "b"], &["@ns", "c", "d"]];

    for key in keys {
        driver.store(key, &Value::Bool(true), None).unwrap();
    }
    assert!(driver.clear(&[]).unwrap());

    for key in keys {
        assert_eq!(driver.get(key).unwrap(), None);
    }
}

#[test]
fn test_store_then_get_roundtrips_every_shape() {
    let (_dir, driver) = create_test_driver(|c| c);
    let expiration = Some(Utc::now() + Duration::minutes(5));

    let values = vec![
        Value::Null,
        Value::Bool(false),
        Value::Int(-17),
        Value::Float(3.25),
        Value::from("quote \" backslash \\ tab \t"),
        Value::Binary(vec![0, 159, 146, 150, 255]),
        name_map("a"),
        Value::Object(serde_json::json!({"list": [1, 2, 3]})),
    ];

    for (i, value) in values.into_iter().enumerate() {
        let key = format!("shape-{}", i);
        assert!(driver.store(&[key.as_str()], &value, expiration).unwrap());
        let entry = driver.get(&[key.as_str()]).unwrap().unwrap();
        assert_eq!(entry, CacheEntry::new(value, expiration));
    }
}

#[test]
fn test_far_future_expiration_survives_store_and_purge() {
    let (_dir, driver) = create_test_driver(|c| c);
    let forever = Some(DateTime::<Utc>::MAX_UTC);

    assert!(assert_ok!(driver.store(&["forever"], &Value::Int(1), forever)));
    assert_eq!(
        driver.get(&["forever"]).unwrap(),
        Some(CacheEntry::new(Value::Int(1), forever))
    );

    let report = driver.purge_with_report();
    assert_eq!(report.files_kept, 1);
    assert!(driver.get(&["forever"]).unwrap().is_some());
}

#[test]
fn test_too_deep_object_is_refused_not_lost() {
    let (_dir, driver) = create_test_driver(|c| c);
    let mut tree = serde_json::json!(1);
    for _ in 0..200 {
        tree = serde_json::json!([tree]);
    }

    let err = assert_err!(driver.store(&["deep"], &Value::Object(tree), None));
    assert!(matches!(err, CacheError::Codec(_)));
    assert_eq!(driver.get(&["deep"]).unwrap(), None);
}

#[test]
fn test_partial_write_reads_as_missing() {
    let (_dir, driver) = create_test_driver(|c| c);

    driver.store(&["torn"], &Value::from("complete"), None).unwrap();
    let path = driver.build_path(&["torn"]).unwrap();

    let full = fs::read(&path).unwrap();
    fs::write(&path, &full[..full.len() / 2]).unwrap();

    assert_eq!(driver.get(&["torn"]).unwrap(), None);
}

#[test]
fn test_literal_segment_shares_directory_with_hashed_shard() {
    let (dir, driver) = create_test_driver(|c| c.with_dir_split(2));

    // The hashed key's first shard directory
    let hashed_path = driver.build_path(&["users"]).unwrap();
    let shard = hashed_path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap()
        .to_string();
    let literal = format!("@{}", shard);

    driver.store(&["users"], &Value::Int(1), None).unwrap();
    driver.store(&[literal.as_str()], &Value::Int(2), None).unwrap();

    // File names differ, so both entries coexist
    assert_eq!(
        driver.build_path(&[literal.as_str()]).unwrap(),
        dir.path().join(format!("{}.fsc", shard))
    );
    assert_eq!(driver.get(&["users"]).unwrap().unwrap().value, Value::Int(1));
    assert_eq!(driver.get(&[literal.as_str()]).unwrap().unwrap().value, Value::Int(2));

    // The literal key's child directory is the hashed key's shard, so
    // clearing the literal key takes the hashed entry with it
    driver.clear(&[literal.as_str()]).unwrap();
    assert_eq!(driver.get(&["users"]).unwrap(), None);
}

#[test]
fn test_invalid_literal_segment_rejected() {
    let (_dir, driver) = create_test_driver(|c| c);

    let err = assert_err!(driver.store(&["@..", "x"], &Value::Int(1), None));
    assert!(matches!(err, CacheError::InvalidKey(_)));
    assert!(matches!(driver.get(&["@a/b"]), Err(CacheError::InvalidKey(_))));
}

#[test]
fn test_custom_hasher_and_split() {
    let hasher = KeyHasher::new(|s| {
        let sum: usize = s.bytes().map(usize::from).sum();
        format!("{:x}", s.len() * 4096 + sum)
    });
    let (dir, driver) = create_test_driver(|c| c.with_dir_split(3).with_key_hasher(hasher));

    driver.store(&["abc"], &Value::Int(1), None).unwrap();
    let path = driver.build_path(&["abc"]).unwrap();
    let depth = path.strip_prefix(dir.path()).unwrap().components().count();

    assert_eq!(depth, 3);
    assert_eq!(driver.get(&["abc"]).unwrap().unwrap().value, Value::Int(1));
}

#[test]
fn test_concurrent_writers_same_and_different_keys() {
    let (_dir, driver) = create_test_driver(|c| c);
    let driver = Arc::new(driver);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let driver = driver.clone();
            thread::spawn(move || {
                for round in 0..20 {
                    let own = format!("writer-{}", i);
                    assert!(driver.store(&["shared"], &Value::Int(i), None).unwrap());
                    assert!(driver.store(&[own.as_str()], &Value::Int(round), None).unwrap());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    match driver.get(&["shared"]).unwrap().unwrap().value {
        Value::Int(i) => assert!((0..8).contains(&i)),
        other => panic!("unexpected value {:?}", other),
    }
    for i in 0..8 {
        let own = format!("writer-{}", i);
        assert_eq!(driver.get(&[own.as_str()]).unwrap().unwrap().value, Value::Int(19));
    }
}

#[test]
fn test_driver_as_trait_object() {
    let (_dir, driver) = create_test_driver(|c| c);
    let driver: Box<dyn CacheDriver> = Box::new(driver);

    assert!(driver.is_available());
    assert!(driver.store(&["dyn"], &Value::Int(5), None).unwrap());
    assert_eq!(driver.get(&["dyn"]).unwrap().unwrap().value, Value::Int(5));
    assert!(driver.clear(&["dyn"]).unwrap());
    assert_eq!(driver.get(&["dyn"]).unwrap(), None);
}
