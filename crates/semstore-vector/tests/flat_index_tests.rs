use std::collections::HashSet;

use semstore_core::traits::VectorIndex;
use semstore_core::SlotRange;
use semstore_vector::FlatIndex;
use tempfile::TempDir;

fn unit(dim: usize, hot: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[hot] = 1.0;
    v
}

#[test]
fn add_assigns_contiguous_monotonic_ranges() {
    let mut index = FlatIndex::in_memory(4);
    let a = index.add(&[unit(4, 0), unit(4, 1)]).unwrap();
    let b = index.add(&[unit(4, 2)]).unwrap();
    assert_eq!(a, SlotRange::new(0, 2));
    assert_eq!(b, SlotRange::new(2, 3));
    assert_eq!(index.len(), 3);
}

#[test]
fn add_rejects_wrong_dimension() {
    let mut index = FlatIndex::in_memory(4);
    let err = index.add(&[vec![1.0, 2.0]]).unwrap_err();
    assert!(err.to_string().contains("Dimension mismatch"), "got: {err}");
    assert!(index.is_empty(), "nothing is written on a rejected batch");
}

#[test]
fn search_ranks_by_distance_and_respects_k() {
    let mut index = FlatIndex::in_memory(3);
    index.add(&[vec![0.0, 0.0, 1.0], vec![1.0, 0.0, 0.0], vec![0.9, 0.1, 0.0]]).unwrap();
    let hits = index.search(&[1.0, 0.0, 0.0], 2, &HashSet::new()).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].0, 1);
    assert_eq!(hits[1].0, 2);
    assert!(hits[0].1 <= hits[1].1);

    let all = index.search(&[1.0, 0.0, 0.0], 50, &HashSet::new()).unwrap();
    assert_eq!(all.len(), 3, "k beyond size returns everything");
}

#[test]
fn search_ties_keep_slot_order() {
    let mut index = FlatIndex::in_memory(2);
    index.add(&[vec![0.0, 1.0], vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
    let hits = index.search(&[1.0, 1.0], 3, &HashSet::new()).unwrap();
    let slots: Vec<u64> = hits.iter().map(|h| h.0).collect();
    assert_eq!(slots, vec![0, 1, 2]);
}

#[test]
fn excluded_slots_are_skipped_but_k_is_still_filled() {
    let mut index = FlatIndex::in_memory(2);
    index.add(&[vec![1.0, 0.0], vec![0.9, 0.1], vec![0.0, 1.0]]).unwrap();
    let excluded: HashSet<u64> = [0].into_iter().collect();
    let hits = index.search(&[1.0, 0.0], 2, &excluded).unwrap();
    let slots: Vec<u64> = hits.iter().map(|h| h.0).collect();
    assert_eq!(slots, vec![1, 2]);
}

#[test]
fn removed_slots_are_never_reassigned() {
    let mut index = FlatIndex::in_memory(2);
    index.add(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
    assert_eq!(index.remove(&[1, 7]).unwrap(), 1);
    let next = index.add(&[vec![0.5, 0.5]]).unwrap();
    assert_eq!(next, SlotRange::new(2, 3));
    assert_eq!(index.slots(), vec![0, 2]);
}

#[test]
fn persist_and_reopen_round_trip() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store_text.index");
    {
        let mut index = FlatIndex::open(&path, 2).unwrap();
        index.add(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.3, 0.7]]).unwrap();
        index.remove(&[2]).unwrap();
        index.persist().unwrap();
    }
    assert!(path.exists());
    let reopened = FlatIndex::open(&path, 2).unwrap();
    assert_eq!(reopened.slots(), vec![0, 1]);
    assert_eq!(reopened.next_slot(), 3, "slot counter survives restarts");

    assert!(FlatIndex::open(&path, 3).is_err(), "dimension change is rejected");
}
