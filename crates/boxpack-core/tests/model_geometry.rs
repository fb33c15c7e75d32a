use boxpack_core::prelude::*;

#[test]
fn contains_uses_half_open_edges() {
    let outer = Rect::new(10, 10, 20, 20);
    assert!(outer.contains(&outer));
    assert!(outer.contains(&Rect::new(10, 10, 1, 1)));
    assert!(outer.contains(&Rect::new(29, 29, 1, 1)));
    assert!(!outer.contains(&Rect::new(29, 29, 2, 1)));
    assert!(!outer.contains(&Rect::new(9, 10, 1, 1)));

    // empty rects sitting on the outer edge are not inside
    assert!(!outer.contains(&Rect::new(30, 15, 0, 5)));
    assert!(!outer.contains(&Rect::new(15, 30, 5, 0)));
    assert!(outer.contains(&Rect::new(15, 15, 0, 5)));
}

#[test]
fn contains_does_not_overflow_at_u32_max() {
    let outer = Rect::new(u32::MAX - 4, 0, 4, 4);
    assert!(outer.contains(&Rect::new(u32::MAX - 1, 0, 1, 1)));
    assert!(!outer.contains(&Rect::new(u32::MAX - 1, 0, 2, 1)));
}

#[test]
fn stats_report_wasted_area() {
    let mut pack = BoxPack::new(Size::new(64, 64), 0);
    let empty = pack.stats();
    assert_eq!(empty.wasted_area(), 64 * 64);

    pack.insert(Size::new(16, 8)).unwrap();
    pack.insert(Size::new(8, 8)).unwrap();
    let stats = pack.stats();
    assert_eq!(stats.used_area, 16 * 8 + 8 * 8);
    assert_eq!(stats.wasted_area(), 64 * 64 - stats.used_area);
    assert_eq!(stats.wasted_area() + stats.used_area, stats.total_area);
}
