/*!
 * Placement property tests
 * The placement function is pure; these tests exercise it directly
 */

use sha2::{Digest, Sha256};
use shardkv::placement::{placement, primary_index};
use shardkv::registry::MembershipSnapshot;

fn snapshot_of(addresses: &[&str]) -> MembershipSnapshot {
    MembershipSnapshot::from_entries(
        addresses
            .iter()
            .enumerate()
            .map(|(i, addr)| (format!("w{}", i), addr.to_string()))
            .collect(),
    )
}

#[test]
fn test_repeated_evaluation_is_identical() {
    let snapshot = snapshot_of(&["http://a", "http://b", "http://c", "http://d", "http://e"]);
    for key in ["q1", "q2", "r1", "", "日本語", "a key with spaces"] {
        let first = placement(key, &snapshot, 3).unwrap();
        for _ in 0..5 {
            assert_eq!(placement(key, &snapshot, 3).unwrap(), first);
        }
    }
}

// 256 is divisible by 4, so the digest-as-big-endian-integer mod 4 collapses
// to the last digest byte mod 4. This checks the byte-wise reduction against
// independent arithmetic.
#[test]
fn test_primary_index_mod_four_matches_last_byte() {
    for key in ["foo", "bar", "q1", "r1", "x"] {
        let digest = Sha256::digest(key.as_bytes());
        let expected = (digest[31] % 4) as usize;
        assert_eq!(primary_index(key, 4), expected, "key {}", key);
    }
}

// 256 ≡ 1 (mod 3), so the integer mod 3 equals the byte sum mod 3.
#[test]
fn test_primary_index_mod_three_matches_byte_sum() {
    for key in ["foo", "bar", "baz", "another-key"] {
        let digest = Sha256::digest(key.as_bytes());
        let byte_sum: u32 = digest.iter().map(|b| u32::from(*b)).sum();
        let expected = (byte_sum % 3) as usize;
        assert_eq!(primary_index(key, 3), expected, "key {}", key);
    }
}

#[test]
fn test_replica_list_is_ring_prefix() {
    let addresses = ["http://a", "http://b", "http://c", "http://d"];
    let snapshot = snapshot_of(&addresses);
    for key in ["foo", "q1", "r1", "some-longer-key"] {
        let start = primary_index(key, addresses.len());
        let replicas = placement(key, &snapshot, 3).unwrap();
        let expected: Vec<String> = (0..3)
            .map(|i| addresses[(start + i) % addresses.len()].to_string())
            .collect();
        assert_eq!(replicas, expected, "key {}", key);
    }
}

#[test]
fn test_replica_count_capped_by_membership() {
    let snapshot = snapshot_of(&["http://a"]);
    assert_eq!(placement("k", &snapshot, 3).unwrap(), vec!["http://a"]);

    let snapshot = snapshot_of(&["http://a", "http://b"]);
    let replicas = placement("k", &snapshot, 3).unwrap();
    assert_eq!(replicas.len(), 2);
}

#[test]
fn test_empty_snapshot_is_rejected() {
    let snapshot = MembershipSnapshot::from_entries(vec![]);
    assert!(placement("k", &snapshot, 3).is_err());
}

// Membership-change sweep: growing the ring must keep every structural
// invariant, and at least one key has to move. The modulo ring makes no
// minimal-movement promise, so no upper bound on churn is asserted.
#[test]
fn test_membership_growth_sweep() {
    let before = snapshot_of(&[
        "http://a", "http://b", "http://c", "http://d", "http://e", "http://f",
    ]);
    let after = snapshot_of(&[
        "http://a", "http://b", "http://c", "http://d", "http://e", "http://f", "http://g",
    ]);

    let mut moved = 0usize;
    for i in 0..200 {
        let key = format!("sweep-key-{}", i);
        let old = placement(&key, &before, 3).unwrap();
        let new = placement(&key, &after, 3).unwrap();
        assert_eq!(old.len(), 3);
        assert_eq!(new.len(), 3);
        for replicas in [&old, &new] {
            let mut unique = replicas.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), 3);
        }
        if old != new {
            moved += 1;
        }
    }
    assert!(moved > 0);
}
