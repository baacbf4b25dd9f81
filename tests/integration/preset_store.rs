//! Integration tests for the durable preset store

use crate::integration::test_utils::temp_store;
use lorakit::error::ApiError;
use lorakit::generation::{GenerationParameters, ImageData};
use lorakit::metadata::{embed, snapshot_from_metadata};
use lorakit::{AdapterEntry, PresetSnapshot, PresetStore};
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

fn finite_weight() -> impl Strategy<Value = f64> {
    use prop::num::f64::{NEGATIVE, NORMAL, POSITIVE, SUBNORMAL, ZERO};
    prop_oneof![
        -4.0f64..4.0,
        POSITIVE | NEGATIVE | NORMAL | SUBNORMAL | ZERO,
    ]
}

fn entry_strategy() -> impl Strategy<Value = AdapterEntry> {
    ("[a-zA-Z0-9_.-]{1,24}", finite_weight(), any::<bool>()).prop_map(|(id, weight, enabled)| {
        AdapterEntry {
            adapter_id: id,
            weight,
            enabled,
        }
    })
}

fn unique_entries() -> impl Strategy<Value = Vec<AdapterEntry>> {
    prop::collection::vec(entry_strategy(), 0..8).prop_map(|entries| {
        let mut seen = std::collections::HashSet::new();
        entries
            .into_iter()
            .filter(|e| seen.insert(e.adapter_id.clone()))
            .collect()
    })
}

#[test]
fn test_save_load_round_trip_property() {
    let (store, _dir) = temp_store();
    let mut runner = proptest::test_runner::TestRunner::new(ProptestConfig::with_cases(64));

    runner
        .run(
            &("[^\\x00]{1,80}", unique_entries()),
            |(name, entries)| {
                prop_assume!(!name.trim().is_empty());
                store.save(&name, entries.clone()).unwrap();
                let loaded = store.load(&name).unwrap();
                prop_assert_eq!(loaded.name, name);
                prop_assert_eq!(loaded.entries, entries);
                Ok(())
            },
        )
        .unwrap();
}

#[test]
fn test_metadata_snapshot_round_trip_property() {
    let mut runner = proptest::test_runner::TestRunner::new(ProptestConfig::with_cases(128));

    runner
        .run(&(".{1,40}", unique_entries()), |(name, entries)| {
            let snapshot = PresetSnapshot { name, entries };
            let artifact = embed(
                ImageData::new(1, 1, vec![0, 0, 0]),
                &GenerationParameters::new(),
                Some(&snapshot),
                "2026.10.0",
            );
            let rebuilt = snapshot_from_metadata(&artifact.metadata).unwrap();
            for (a, b) in rebuilt.entries.iter().zip(&snapshot.entries) {
                prop_assert_eq!(a.weight.to_bits(), b.weight.to_bits());
            }
            prop_assert_eq!(rebuilt, snapshot);
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("presets");
    {
        let store = PresetStore::open(&root).unwrap();
        store
            .save("portrait", vec![AdapterEntry::new("styleA", 0.8)])
            .unwrap();
    }
    let reopened = PresetStore::open(&root).unwrap();
    assert_eq!(reopened.list().unwrap(), vec!["portrait"]);
    assert_eq!(
        reopened.load("portrait").unwrap().entries,
        vec![AdapterEntry::new("styleA", 0.8)]
    );
}

#[test]
fn test_delete_twice_fails() {
    let (store, _dir) = temp_store();
    store.save("gone", vec![]).unwrap();
    store.delete("gone").unwrap();
    assert!(matches!(store.delete("gone"), Err(ApiError::NotFound(_))));
    assert!(matches!(store.delete("never"), Err(ApiError::NotFound(_))));
}

#[test]
fn test_list_order_is_stable_and_sorted() {
    let (store, _dir) = temp_store();
    store.save("b", vec![]).unwrap();
    store.save("a", vec![]).unwrap();
    for _ in 0..3 {
        assert_eq!(store.list().unwrap(), vec!["a", "b"]);
    }
}

#[test]
fn test_invalid_input_leaves_store_untouched() {
    let (store, _dir) = temp_store();
    store
        .save("keep", vec![AdapterEntry::new("styleA", 0.8)])
        .unwrap();

    assert!(matches!(store.save("  ", vec![]), Err(ApiError::Validation(_))));
    let duplicate = vec![AdapterEntry::new("x", 0.1), AdapterEntry::new("x", 0.2)];
    assert!(matches!(
        store.save("keep", duplicate),
        Err(ApiError::Validation(_))
    ));
    assert!(matches!(
        store.save("keep", vec![AdapterEntry::new("x", f64::NAN)]),
        Err(ApiError::Validation(_))
    ));

    assert_eq!(store.list().unwrap(), vec!["keep"]);
    assert_eq!(
        store.load("keep").unwrap().entries,
        vec![AdapterEntry::new("styleA", 0.8)]
    );
}

#[test]
fn test_concurrent_saves_leave_one_complete_record() {
    let (store, _dir) = temp_store();
    let store = Arc::new(store);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let entries: Vec<AdapterEntry> = (0..=i)
                    .map(|j| AdapterEntry::new(format!("writer{}_{}", i, j), 0.5))
                    .collect();
                store.save("shared", entries).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let preset = store.load("shared").unwrap();
    let writer = preset.entries[0]
        .adapter_id
        .trim_start_matches("writer")
        .split('_')
        .next()
        .unwrap()
        .to_string();
    assert!(preset
        .entries
        .iter()
        .all(|e| e.adapter_id.starts_with(&format!("writer{}_", writer))));
    assert_eq!(store.list().unwrap(), vec!["shared"]);
}
