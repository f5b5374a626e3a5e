//! Recovery Tests
//!
//! Reopening a database file replays committed transactions: items, index
//! flags and derived index contents come back. A torn tail is discarded; a
//! checksum mismatch inside the log is fatal.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::Arc;

use oakdb::{HashingEmbedder, Metric, Oak, OakConfig, Window};
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn create_temp_data_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

fn db_path(dir: &TempDir) -> String {
    dir.path().join("oak.db").to_string_lossy().into_owned()
}

// =============================================================================
// Replay
// =============================================================================

#[test]
fn test_reopen_restores_items_and_timestamps() {
    let dir = create_temp_data_dir();
    let path = db_path(&dir);

    let created = {
        let mut oak = Oak::open(&path).unwrap();
        let base = oak.base("users").unwrap();
        base.add(json!({"name": "Ada"}), Some("ada"), false).unwrap();
        base.add(json!({"name": "Bob"}), Some("bob"), false).unwrap();
        base.delete("bob").unwrap();
        base.get("ada").unwrap().created
    };

    let mut oak = Oak::open(&path).unwrap();
    assert_eq!(oak.base_names(), vec!["users".to_string()]);
    let base = oak.base("users").unwrap();
    let got = base.get("ada").unwrap();
    assert_eq!(got.data, Some(json!({"name": "Ada"})));
    assert_eq!(got.created, created);
    assert!(!base.get("bob").unwrap().is_found());
}

#[test]
fn test_timestamps_keep_increasing_after_reopen() {
    let dir = create_temp_data_dir();
    let path = db_path(&dir);

    let first = {
        let mut oak = Oak::open(&path).unwrap();
        oak.base("log").unwrap().add(json!(1), Some("a"), false).unwrap().created.unwrap()
    };

    let mut oak = Oak::open(&path).unwrap();
    let base = oak.base("log").unwrap();
    let second = base.add(json!(2), Some("b"), false).unwrap().created.unwrap();
    assert!(second > first);

    let older = base
        .fetch(&json!({"_created__lt": second}), None, Window::default())
        .unwrap();
    assert_eq!(older.keys(), vec!["a"]);
}

#[test]
fn test_reopen_restores_search_index() {
    let dir = create_temp_data_dir();
    let path = db_path(&dir);

    {
        let mut oak = Oak::open(&path).unwrap();
        let base = oak.base("notes").unwrap();
        base.add(json!({"text": "brown fox"}), Some("n1"), false).unwrap();
        base.enable_search().unwrap();
        base.add(json!({"text": "brown dog"}), Some("n2"), false).unwrap();
    }

    let mut oak = Oak::open(&path).unwrap();
    let base = oak.base("notes").unwrap();
    assert!(base.search_enabled());
    let result = base.search("brown", &json!(null), None, Window::default()).unwrap();
    assert_eq!(result.total, 2);
}

#[test]
fn test_disabled_flag_survives_reopen() {
    let dir = create_temp_data_dir();
    let path = db_path(&dir);

    {
        let mut oak = Oak::open(&path).unwrap();
        let base = oak.base("notes").unwrap();
        base.enable_search().unwrap();
        base.disable_search(true).unwrap();
    }

    let mut oak = Oak::open(&path).unwrap();
    assert!(!oak.base("notes").unwrap().search_enabled());
}

#[test]
fn test_reopen_restores_vector_index() {
    let dir = create_temp_data_dir();
    let path = db_path(&dir);
    let mut config = OakConfig::new(path.clone());
    config.hashing_embedder_dims = Some(32);

    {
        let mut oak = Oak::open_with_config(config.clone()).unwrap();
        let base = oak.base("notes").unwrap();
        base.add(json!({"text": "red apple"}), Some("n1"), false).unwrap();
        base.add(json!({"text": "steel bridge"}), Some("n2"), false).unwrap();
        base.enable_vector().unwrap();
    }

    let mut oak = Oak::open(&path).unwrap();
    oak.set_embedder(Arc::new(HashingEmbedder::new(32).unwrap()));
    let base = oak.base("notes").unwrap();
    assert!(base.vector_enabled());
    let result = base
        .similar("red apple", &json!(null), Metric::Cosine, Some("distance__asc"), Window::new(1, 1))
        .unwrap();
    assert_eq!(result.keys(), vec!["n1"]);
}

// =============================================================================
// Damaged Files
// =============================================================================

#[test]
fn test_torn_tail_is_discarded() {
    let dir = create_temp_data_dir();
    let path = db_path(&dir);

    {
        let mut oak = Oak::open(&path).unwrap();
        oak.base("users").unwrap().add(json!({"n": 1}), Some("a"), false).unwrap();
    }

    // A frame header promising more bytes than the file holds
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&500u32.to_le_bytes()).unwrap();
        file.write_all(&[0xAB; 10]).unwrap();
    }

    {
        let mut oak = Oak::open(&path).unwrap();
        let base = oak.base("users").unwrap();
        assert!(base.get("a").unwrap().is_found());
        base.add(json!({"n": 2}), Some("b"), false).unwrap();
    }

    let mut oak = Oak::open(&path).unwrap();
    let base = oak.base("users").unwrap();
    assert_eq!(base.len(), 2);
}

#[test]
fn test_checksum_mismatch_is_fatal() {
    let dir = create_temp_data_dir();
    let path = db_path(&dir);

    {
        let mut oak = Oak::open(&path).unwrap();
        oak.base("users").unwrap().add(json!({"n": 1}), Some("a"), false).unwrap();
    }

    let mut contents = fs::read(&path).unwrap();
    let last = contents.len() - 1;
    contents[last] ^= 0xFF;
    fs::write(&path, contents).unwrap();

    let err = Oak::open(&path).err().expect("corrupted log must not open");
    assert_eq!(err.code(), "OAK_STORAGE_FAILURE");
    assert!(err.is_fatal());
}

#[test]
fn test_bad_header_is_fatal() {
    let dir = create_temp_data_dir();
    let path = db_path(&dir);
    fs::write(&path, b"NOTOAK00 and then some").unwrap();

    let err = Oak::open(&path).err().expect("foreign file must not open");
    assert!(err.is_fatal());
}
