//! Integration tests for hash crate

use kiln_hash::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

#[test]
fn test_hash_from_hex_errors() {
    // Too short
    assert!(Hash::from_hex("1234").is_err());

    // Too long
    assert!(Hash::from_hex(&"a".repeat(66)).is_err());

    // Invalid hex
    assert!(Hash::from_hex("xyz123").is_err());
}

#[test]
fn test_hex_round_trip() {
    let hash = Hash::from_data(b"kiln");
    assert_eq!(Hash::from_hex(&hash.to_hex()).unwrap(), hash);
}

#[test]
fn test_distinct_documents_distinct_hashes() {
    let mut doc = BTreeMap::new();
    doc.insert("name", "zlib");
    doc.insert("version", "1.3.1");
    let first = Hash::from_canonical(&doc).unwrap();

    doc.insert("version", "1.3.0");
    let second = Hash::from_canonical(&doc).unwrap();

    assert_ne!(first, second);
}

proptest! {
    #[test]
    fn canonical_hash_is_deterministic(entries in prop::collection::btree_map("[a-z]{1,8}", "[a-zA-Z0-9]{0,8}", 0..8)) {
        let reversed: Vec<(String, String)> = entries.clone().into_iter().rev().collect();
        let rebuilt: BTreeMap<String, String> = reversed.into_iter().collect();
        prop_assert_eq!(
            Hash::from_canonical(&entries).unwrap(),
            Hash::from_canonical(&rebuilt).unwrap()
        );
    }
}
