use boxpack_core::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::collections::HashSet;

fn assert_tiling(pack: &BoxPack) {
    for n in pack.nodes() {
        let node = pack.node(n);
        let Some([a, b]) = node.children else {
            continue;
        };
        let (ra, rb) = (pack.node(a).rect, pack.node(b).rect);
        assert!(node.rect.contains(&ra), "{:?} outside {:?}", ra, node.rect);
        assert!(node.rect.contains(&rb), "{:?} outside {:?}", rb, node.rect);
        assert!(!ra.intersects(&rb), "{:?} overlaps {:?}", ra, rb);
        assert_eq!(ra.area() + rb.area(), node.rect.area());
        assert!(node.id.is_none(), "branch carries an id");
    }
}

fn assert_exclusive_ids(pack: &BoxPack) {
    let ids: Vec<PackId> = pack
        .nodes()
        .into_iter()
        .filter_map(|n| pack.node(n).id)
        .collect();
    let unique: HashSet<PackId> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len(), "duplicate ids in tree");
    assert_eq!(ids.len(), pack.len());
}

fn occupied_rects(pack: &BoxPack) -> Vec<Rect> {
    pack.nodes()
        .into_iter()
        .map(|n| pack.node(n))
        .filter(|node| node.is_occupied())
        .map(|node| node.rect)
        .collect()
}

#[test]
fn fresh_pack_is_one_free_root() {
    let pack = BoxPack::new(Size::new(256, 128), 0);
    let nodes = pack.nodes();
    assert_eq!(nodes.len(), 1);
    let root = pack.node(pack.root());
    assert_eq!(root.rect, Rect::new(0, 0, 256, 128));
    assert!(root.is_leaf());
    assert!(!root.is_occupied());
    assert!(pack.is_empty());
}

#[test]
fn equal_slack_cuts_across_full_width() {
    let mut pack = BoxPack::new(Size::new(1024, 1024), 0);
    let expected = [
        Rect::new(0, 0, 512, 512),
        Rect::new(512, 0, 512, 512),
        Rect::new(0, 512, 512, 512),
        Rect::new(512, 512, 512, 512),
    ];
    for want in expected {
        let n = pack.insert(Size::new(512, 512)).expect("quadrant fits");
        assert_eq!(pack.node(n).rect, want);
    }
    let [top, bottom] = pack.node(pack.root()).children.expect("root split");
    assert_eq!(pack.node(top).rect, Rect::new(0, 0, 1024, 512));
    assert_eq!(pack.node(bottom).rect, Rect::new(0, 512, 1024, 512));
    assert!(pack.insert(Size::new(512, 512)).is_none());
}

#[test]
fn split_follows_larger_slack() {
    let mut pack = BoxPack::new(Size::new(100, 50), 0);
    let n = pack.insert(Size::new(10, 10)).unwrap();
    assert_eq!(pack.node(n).rect, Rect::new(0, 0, 10, 10));

    // dw = 90 > dh = 40: vertical cut first
    let [left, right] = pack.node(pack.root()).children.unwrap();
    assert_eq!(pack.node(left).rect, Rect::new(0, 0, 10, 50));
    assert_eq!(pack.node(right).rect, Rect::new(10, 0, 90, 50));

    // the 10x50 column is then cut horizontally
    let [cell, rest] = pack.node(left).children.unwrap();
    assert_eq!(pack.node(cell).rect, Rect::new(0, 0, 10, 10));
    assert_eq!(pack.node(rest).rect, Rect::new(0, 10, 10, 40));
}

#[test]
fn exact_fit_takes_root_without_split() {
    let mut pack = BoxPack::new(Size::new(64, 64), 0);
    let n = pack.insert(Size::new(64, 64)).unwrap();
    assert_eq!(n, pack.root());
    assert!(pack.node(n).is_leaf());
    assert_eq!(pack.node(n).id, Some(PackId(0)));
    assert!(pack.insert(Size::new(1, 1)).is_none());
}

#[test]
fn empty_and_oversized_requests_fail() {
    let mut pack = BoxPack::new(Size::new(64, 64), 0);
    assert!(pack.insert(Size::new(0, 10)).is_none());
    assert!(pack.insert(Size::new(10, 0)).is_none());
    assert!(pack.insert(Size::new(65, 1)).is_none());
    assert!(pack.insert(Size::new(1, 65)).is_none());
    assert_eq!(pack.nodes().len(), 1);

    // failures do not consume ids
    let n = pack.insert(Size::new(8, 8)).unwrap();
    assert_eq!(pack.node(n).id, Some(PackId(0)));
}

#[test]
fn random_inserts_keep_tree_invariants() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut pack = BoxPack::new(Size::new(512, 512), 0);
    let mut placed = Vec::new();
    for _ in 0..2000 {
        let size = Size::new(rng.gen_range(1..=48), rng.gen_range(1..=48));
        if let Some(n) = pack.insert(size) {
            let id = pack.node(n).id.expect("returned leaf is occupied");
            placed.push((id, size));
        }
    }
    assert!(!placed.is_empty());
    assert_tiling(&pack);
    assert_exclusive_ids(&pack);

    for (id, size) in &placed {
        let node = pack.get_node(*id).expect("live id resolves");
        assert!(size.fits_in(node.rect.size()));
        assert_eq!(node.rect.size(), *size);
    }

    let rects = occupied_rects(&pack);
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            assert!(!rects[i].intersects(&rects[j]));
        }
    }
}

#[test]
fn filling_the_area_eventually_fails() {
    let mut pack = BoxPack::new(Size::new(100, 100), 0);
    let mut ok = 0;
    let mut failed = false;
    for _ in 0..200 {
        match pack.insert(Size::new(10, 10)) {
            Some(_) => ok += 1,
            None => {
                failed = true;
                break;
            }
        }
    }
    assert!(failed);
    assert_eq!(ok, 100);
    assert_eq!(pack.occupied_area(), 100 * 100);
    assert_exclusive_ids(&pack);
}

#[test]
fn ids_increase_monotonically() {
    let mut pack = BoxPack::new(Size::new(64, 64), 0);
    let mut last = None;
    for _ in 0..16 {
        let n = pack.insert(Size::new(16, 16)).unwrap();
        let id = pack.node(n).id.unwrap();
        if let Some(prev) = last {
            assert!(id > prev);
        }
        last = Some(id);
    }
}

#[test]
fn lookup_of_unknown_id_misses() {
    let mut pack = BoxPack::new(Size::new(64, 64), 0);
    assert!(pack.get_node(PackId(0)).is_none());
    pack.insert(Size::new(8, 8)).unwrap();
    assert!(pack.get_node(PackId(42)).is_none());
    assert!(pack.peek(PackId(42)).is_none());
    assert!(pack.find(PackId(42)).is_none());
}

#[test]
fn get_node_stamps_but_peek_does_not() {
    let mut pack = BoxPack::new(Size::new(64, 64), 0);
    let n = pack.insert(Size::new(8, 8)).unwrap();
    let id = pack.node(n).id.unwrap();

    let before = pack.peek(id).unwrap().timestamp;
    let clock = pack.clock();
    assert_eq!(pack.peek(id).unwrap().timestamp, before);
    assert_eq!(pack.clock(), clock);

    let stamped = pack.get_node(id).unwrap().timestamp;
    assert!(stamped > before);
    assert!(pack.clock() > clock);
}

#[test]
fn remove_frees_leaf_without_coalescing() {
    let mut pack = BoxPack::new(Size::new(100, 100), 0);
    let a = pack.insert(Size::new(50, 100)).unwrap();
    let b = pack.insert(Size::new(50, 100)).unwrap();
    let id_a = pack.node(a).id.unwrap();
    let id_b = pack.node(b).id.unwrap();
    assert_eq!(pack.node(a).rect, Rect::new(0, 0, 50, 100));
    assert_eq!(pack.node(b).rect, Rect::new(50, 0, 50, 100));

    assert_eq!(pack.remove(id_a), Some(Rect::new(0, 0, 50, 100)));
    assert_eq!(pack.remove(id_b), Some(Rect::new(50, 0, 50, 100)));
    assert!(pack.remove(id_a).is_none());
    assert!(pack.is_empty());
    assert!(pack.get_node(id_a).is_none());
    assert_eq!(pack.occupied_area(), 0);

    // both halves are free but still split
    assert!(pack.insert(Size::new(100, 100)).is_none());
    assert!(pack.node(pack.root()).is_branch());

    // a request matching a freed half reuses it
    let c = pack.insert(Size::new(50, 100)).unwrap();
    assert_eq!(pack.node(c).rect, Rect::new(0, 0, 50, 100));
    assert_tiling(&pack);
    assert_exclusive_ids(&pack);
}

#[test]
fn reset_restores_single_root_and_keeps_counting_ids() {
    let mut pack = BoxPack::new(Size::new(100, 100), 0);
    for _ in 0..4 {
        pack.insert(Size::new(50, 50)).unwrap();
    }
    assert!(pack.insert(Size::new(100, 100)).is_none());

    pack.reset();
    assert_eq!(pack.nodes().len(), 1);
    assert!(pack.is_empty());
    assert!(pack.get_node(PackId(0)).is_none());

    let n = pack.insert(Size::new(100, 100)).unwrap();
    assert_eq!(pack.node(n).id, Some(PackId(4)));
}

#[test]
fn interior_excludes_border() {
    let mut pack = BoxPack::new(Size::new(100, 100), 2);
    assert_eq!(pack.border(), 2);
    let n = pack.insert(Size::new(10, 10).padded(2)).unwrap();
    assert_eq!(pack.node(n).rect, Rect::new(0, 0, 14, 14));
    assert_eq!(pack.interior(n), Rect::new(2, 2, 10, 10));
}

#[test]
fn never_policy_keeps_timestamps_inert() {
    let mut pack = BoxPack::new(Size::new(64, 64), 0);
    assert_eq!(pack.policy(), ReclaimPolicy::Never);
    for _ in 0..4 {
        pack.insert(Size::new(32, 32)).unwrap();
    }
    assert!(pack.insert(Size::new(32, 32)).is_none());
    assert_eq!(pack.len(), 4);
    for i in 0..4 {
        assert!(pack.peek(PackId(i)).is_some());
    }
}

#[test]
fn lru_reclaims_oldest_leaf() {
    let mut pack = BoxPack::with_policy(
        Size::new(1024, 1024),
        0,
        ReclaimPolicy::LeastRecentlyUsed,
    );
    for _ in 0..4 {
        pack.insert(Size::new(512, 512)).unwrap();
    }

    let n = pack.insert(Size::new(512, 512)).expect("reclaims a quadrant");
    assert_eq!(pack.node(n).rect, Rect::new(0, 0, 512, 512));
    assert_eq!(pack.node(n).id, Some(PackId(4)));
    assert!(pack.peek(PackId(0)).is_none());
    assert_eq!(pack.len(), 4);

    // touching id 1 makes id 2 the oldest
    assert!(pack.get_node(PackId(1)).is_some());
    let n = pack.insert(Size::new(512, 512)).unwrap();
    assert_eq!(pack.node(n).rect, Rect::new(0, 512, 512, 512));
    assert!(pack.peek(PackId(1)).is_some());
    assert!(pack.peek(PackId(2)).is_none());

    assert_tiling(&pack);
    assert_exclusive_ids(&pack);
}

#[test]
fn lru_collapses_whole_tree_when_no_leaf_fits() {
    let mut pack = BoxPack::with_policy(
        Size::new(100, 100),
        0,
        ReclaimPolicy::LeastRecentlyUsed,
    );
    for _ in 0..4 {
        pack.insert(Size::new(50, 50)).unwrap();
    }
    // a failed walk stamps the root before its descendants, so it is the oldest branch
    let n = pack.insert(Size::new(100, 50)).expect("collapses the root");
    assert_eq!(pack.node(n).rect, Rect::new(0, 0, 100, 50));
    assert_eq!(pack.len(), 1);
    for i in 0..4 {
        assert!(pack.peek(PackId(i)).is_none());
    }
    assert_eq!(pack.node(n).id, Some(PackId(4)));
    assert_tiling(&pack);
    assert_exclusive_ids(&pack);
}

#[test]
fn lru_still_fails_for_requests_larger_than_the_pack() {
    let mut pack = BoxPack::with_policy(Size::new(64, 64), 0, ReclaimPolicy::LeastRecentlyUsed);
    pack.insert(Size::new(32, 32)).unwrap();
    assert!(pack.insert(Size::new(65, 10)).is_none());
    assert_eq!(pack.len(), 1);
}

#[test]
fn lru_churn_keeps_invariants() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut pack = BoxPack::with_policy(
        Size::new(256, 256),
        0,
        ReclaimPolicy::LeastRecentlyUsed,
    );
    for _ in 0..5000 {
        let size = Size::new(rng.gen_range(4..=40), rng.gen_range(4..=40));
        assert!(pack.insert(size).is_some(), "lru insert never fails when size fits");
    }
    assert!(!pack.is_empty());
    assert_tiling(&pack);
    assert_exclusive_ids(&pack);
    assert_eq!(pack.stats().num_occupied, pack.len());
}
