//! Seeded randomized fuzz harness: several simulated replicas perform random inserts/deletes
//! against independent `Text`s sharing no state up front, periodically exchange bunch metas and
//! content, and get checked against the position-comparison, round-trip, and length invariants
//! after every step.

use positions::{new_order, BunchId, BunchMeta, OrderConfig, OrderHandle, SearchDir, Text};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::collections::BTreeMap;

struct Replica {
    order: OrderHandle,
    text: Text,
}

fn make_replica(name: &str) -> Replica {
    let order = new_order(OrderConfig { replica_id: Some(BunchId::new(name).unwrap()), new_bunch_id: None });
    let text = Text::new(order.clone());
    Replica { order, text }
}

/// Invariants 5 & 6: index<->position round-trip for every currently-present slot.
fn check_round_trip(text: &Text) {
    let len = text.len();
    for i in 0..len {
        let pos = text.position_at(i).unwrap();
        assert_eq!(text.index_of_position(&pos, SearchDir::None).unwrap(), i, "invariant 5 failed at index {i}");
        let back = text.position_at(text.index_of_position(&pos, SearchDir::None).unwrap()).unwrap();
        assert_eq!(back, pos, "invariant 6 failed at index {i}");
    }
    // Invariant 9: length equals content actually returned by a full scan.
    assert_eq!(len, text.to_string().encode_utf16().count(), "invariant 9 failed");
}

/// Union every replica's known bunch metas and deliver the union to every replica. Simulates
/// eventual, order-independent meta exchange (`add_metas` tolerates metas it already knows).
fn sync_metas(replicas: &[Replica]) {
    let mut union: BTreeMap<BunchId, BunchMeta> = BTreeMap::new();
    for replica in replicas {
        for (bunch_id, saved) in replica.order.borrow().save() {
            union.entry(bunch_id.clone()).or_insert(BunchMeta {
                bunch_id,
                parent_id: saved.parent_id,
                offset: saved.offset,
            });
        }
    }
    let metas: Vec<BunchMeta> = union.into_values().collect();
    for replica in replicas {
        replica.order.borrow_mut().add_metas(metas.clone()).unwrap();
    }
}

#[test]
fn fuzz_multi_replica_invariants() {
    let mut rng = SmallRng::seed_from_u64(0xC0FFEE_u64);
    let mut replicas: Vec<Replica> = ["r0", "r1", "r2"].iter().map(|n| make_replica(n)).collect();
    let alphabet: Vec<char> = "abcdefghijklmnopqrstuvwxyz".chars().collect();

    for _step in 0..400 {
        let r = rng.gen_range(0..replicas.len());
        let len = replicas[r].text.len();
        let do_insert = len == 0 || rng.gen_bool(0.75);
        if do_insert {
            let idx = rng.gen_range(0..=len);
            let ch = alphabet[rng.gen_range(0..alphabet.len())];
            replicas[r].text.insert_at(idx, ch).unwrap();
        } else {
            let idx = rng.gen_range(0..len);
            replicas[r].text.delete(idx, 1).unwrap();
        }
        check_round_trip(&replicas[r].text);

        if rng.gen_bool(0.1) {
            sync_metas(&replicas);
        }
    }

    // Final full sync, then check invariants 1 & 2 (comparison is a consistent total order,
    // and every position sits strictly between MIN and MAX) across everything every replica
    // currently has a position for.
    sync_metas(&replicas);

    let mut all_positions = Vec::new();
    for replica in &replicas {
        for i in 0..replica.text.len() {
            all_positions.push(replica.text.position_at(i).unwrap());
        }
    }

    let reference = replicas[0].order.clone();
    let order = reference.borrow();
    let min = order.min_position();
    let max = order.max_position();
    for p in &all_positions {
        assert_eq!(order.compare(p, p).unwrap(), Ordering::Equal, "invariant 1 (reflexivity) failed");
        assert_eq!(order.compare(&min, p).unwrap(), Ordering::Less, "invariant 2 (MIN < p) failed");
        assert_eq!(order.compare(p, &max).unwrap(), Ordering::Less, "invariant 2 (p < MAX) failed");
    }
    for a in &all_positions {
        for b in &all_positions {
            let ab = order.compare(a, b).unwrap();
            let ba = order.compare(b, a).unwrap();
            assert_eq!(ab.reverse(), ba, "invariant 1 (antisymmetry) failed for {a:?}/{b:?}");
        }
    }
}
