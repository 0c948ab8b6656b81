//! Coverage model tests.
//!
//! Each test builds its own `CoverageDb`, so tests never share state.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use super::*;
use crate::value::values;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn ix(i: i64, x: i64) -> Args {
    Args::new().arg("i", i).arg("x", x)
}

// ============================================================================
// Cover points
// ============================================================================

mod point_tests {
    use super::*;

    #[test]
    fn test_exhaustive_point() {
        let db = CoverageDb::new();
        let c1 = CoverPoint::builder("t1.c1").vname("i").bins(0..10).build(&db).unwrap();
        let c2 = CoverPoint::builder("t1.c2").vname("x").bins(0..10).build(&db).unwrap();
        for i in 0..10 {
            let args = ix(i, (i * 7) % 3);
            c1.sample(&args).unwrap();
            c2.sample(&args).unwrap();
        }
        assert_eq!(c1.size().unwrap(), 10);
        assert_eq!(c1.coverage().unwrap(), 10);
        assert_eq!(c1.cover_percentage().unwrap(), 100.0);
        assert_eq!(c2.coverage().unwrap(), 3);
        let snap = c1.snapshot().unwrap();
        assert!((0..10).all(|i| snap.hits(i) == Some(1)));
        assert_eq!(db.size("t1").unwrap(), 20);
        assert_eq!(db.coverage("t1").unwrap(), 13);
    }

    #[test]
    fn test_string_bins_and_repeat_hits() {
        let db = CoverageDb::new();
        let p = CoverPoint::builder("t2.in_class").bins(["foo", "bar"]).build(&db).unwrap();
        let s = |v: &str| Args::new().arg("something", v);
        assert_eq!(p.coverage().unwrap(), 0);
        p.sample(&s("bar")).unwrap();
        p.sample(&s("bar")).unwrap();
        assert_eq!(p.coverage().unwrap(), 1);
        assert_eq!(p.snapshot().unwrap().hits("bar"), Some(2));
        p.sample(&s("foo")).unwrap();
        assert_eq!(p.coverage().unwrap(), 2);
    }

    #[test]
    fn test_injective_point_matches_all_divisors() {
        let db = CoverageDb::new();
        let p = CoverPoint::builder("t3.inj")
            .relation(|x, bin| match (x.as_int(), bin.as_int()) {
                (Some(x), Some(d)) => x % d == 0,
                _ => false,
            })
            .bins([1, 2, 3, 5, 7, 11, 13, 17])
            .injection(true)
            .build(&db)
            .unwrap();
        assert_eq!(p.size().unwrap(), 8);
        p.sample(&Args::new().arg("x", 17)).unwrap();
        assert_eq!(p.coverage().unwrap(), 2);
        p.sample(&Args::new().arg("x", 30)).unwrap();
        assert_eq!(p.new_hits().unwrap(), values([1, 2, 3, 5]));
        assert_eq!(p.coverage().unwrap(), 5);
        p.sample(&Args::new().arg("x", 77)).unwrap();
        assert_eq!(p.coverage().unwrap(), 7);
    }

    #[test]
    fn test_non_injective_stops_at_first_match() {
        let db = CoverageDb::new();
        let p = CoverPoint::builder("t.lt")
            .relation(|x, bin| x < bin)
            .bins([10, 20, 30])
            .build(&db)
            .unwrap();
        p.sample(&Args::new().arg("x", 5)).unwrap();
        assert_eq!(p.new_hits().unwrap(), values([10]));
        assert_eq!(p.coverage().unwrap(), 1);
    }

    #[test]
    fn test_no_match_clears_new_hits() {
        let db = CoverageDb::new();
        let p = CoverPoint::builder("t.p").bins([1, 2]).build(&db).unwrap();
        p.sample(&Args::new().arg("x", 1)).unwrap();
        p.sample(&Args::new().arg("x", 9)).unwrap();
        assert!(p.new_hits().unwrap().is_empty());
    }

    #[test]
    fn test_binless_point_counts_occurrences() {
        let db = CoverageDb::new();
        let p = CoverPoint::builder("t.seen").build(&db).unwrap();
        assert_eq!(p.size().unwrap(), 1);
        p.sample(&Args::new().arg("anything", "x")).unwrap();
        p.sample(&Args::new()).unwrap();
        assert_eq!(p.snapshot().unwrap().hits(true), Some(2));
        assert_eq!(p.coverage().unwrap(), 1);
    }

    #[test]
    fn test_multi_argument_default_is_tuple() {
        let db = CoverageDb::new();
        let p = CoverPoint::builder("t.pair")
            .bins([(0, 0), (1, 2)])
            .build(&db)
            .unwrap();
        p.sample(&Args::new().arg("a", 1).arg("b", 2)).unwrap();
        assert_eq!(p.coverage().unwrap(), 1);
    }

    #[test]
    fn test_transform() {
        let db = CoverageDb::new();
        let p = CoverPoint::builder("t.mod")
            .transform(|args| {
                let i = args.get("i").and_then(Value::as_int).unwrap_or(0);
                Value::Int(i % 6)
            })
            .bins(0..5)
            .at_least(2)
            .build(&db)
            .unwrap();
        for i in 0..10 {
            p.sample(&ix(i, 0)).unwrap();
        }
        assert_eq!(p.coverage().unwrap(), 4);
    }

    #[test]
    fn test_labels_replace_bin_keys() {
        let db = CoverageDb::new();
        let p = CoverPoint::builder("t.size")
            .bins([1, 64, 1500])
            .bins_labels(["tiny", "medium", "jumbo"])
            .build(&db)
            .unwrap();
        p.sample(&Args::new().arg("len", 64)).unwrap();
        assert_eq!(p.new_hits().unwrap(), values(["medium"]));
        assert_eq!(p.snapshot().unwrap().hits("medium"), Some(1));
        assert_eq!(p.snapshot().unwrap().hits(64), None);
    }

    #[test]
    fn test_label_length_mismatch() {
        let db = CoverageDb::new();
        let err = CoverPoint::builder("t.bad")
            .bins([1, 2, 3])
            .bins_labels(["a"])
            .build(&db)
            .unwrap_err();
        assert!(matches!(err, CovError::Configuration { .. }));
    }

    #[test]
    fn test_bins_with_same_label_rejected() {
        let db = CoverageDb::new();
        let err = CoverPoint::builder("t.mixed")
            .bins(vec![Value::Int(1), Value::from("1")])
            .build(&db)
            .unwrap_err();
        assert!(matches!(err, CovError::Configuration { .. }));
        assert!(!db.contains("t.mixed"));

        let err = CoverPoint::builder("t.relabel")
            .bins([1, 2])
            .bins_labels(["same", "same"])
            .build(&db)
            .unwrap_err();
        assert!(err.to_string().contains("same"), "{err}");
    }

    #[test]
    fn test_missing_vname_argument() {
        let db = CoverageDb::new();
        let p = CoverPoint::builder("t.v").vname("addr").bins(0..2).build(&db).unwrap();
        let err = p.sample(&Args::new().arg("data", 1)).unwrap_err();
        assert!(matches!(err, CovError::Configuration { .. }));
        assert_eq!(p.coverage().unwrap(), 0);
    }

    #[test]
    fn test_item_needs_parent() {
        let db = CoverageDb::new();
        let err = CoverPoint::builder("lonely").bins(0..2).build(&db).unwrap_err();
        assert!(matches!(err, CovError::Configuration { .. }));
        assert!(!db.contains("lonely"));
    }

    #[test]
    fn test_at_least_zero_rejected() {
        let db = CoverageDb::new();
        assert!(CoverPoint::builder("t.z").at_least(0).build(&db).is_err());
    }

    #[test]
    fn test_rebuild_returns_existing() {
        let db = CoverageDb::new();
        let a = CoverPoint::builder("t.p").bins(0..3).build(&db).unwrap();
        a.sample(&Args::new().arg("x", 0)).unwrap();
        let b = CoverPoint::builder("t.p").bins(0..50).build(&db).unwrap();
        assert_eq!(a.id(), b.id());
        assert_eq!(b.size().unwrap(), 3);
        assert_eq!(db.size("t").unwrap(), 3);
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let db = CoverageDb::new();
        let _p = CoverPoint::builder("t.p").bins(0..3).build(&db).unwrap();
        let err = CoverCheck::builder("t.p").f_fail(|_| false).build(&db).unwrap_err();
        assert!(matches!(err, CovError::Configuration { .. }));
    }

    #[test]
    fn test_weight_scales_size_and_coverage() {
        let db = CoverageDb::new();
        let p = CoverPoint::builder("t5.c1").vname("i").bins(0..10).weight(100).build(&db).unwrap();
        for i in 0..10 {
            p.sample(&ix(i, 0)).unwrap();
        }
        assert_eq!(p.size().unwrap(), 1000);
        assert_eq!(p.coverage().unwrap(), 1000);
    }
}

// ============================================================================
// Cover crosses
// ============================================================================

mod cross_tests {
    use super::*;

    fn xyz(x1: i64, x2: i64, x3: i64) -> Args {
        Args::new().arg("x1", x1).arg("x2", x2).arg("x3", x3)
    }

    fn int(args: &Args, name: &str) -> i64 {
        args.get(name).and_then(Value::as_int).unwrap_or(0)
    }

    #[test]
    fn test_cross_sizes_and_ignores() {
        let db = CoverageDb::new();
        let c1 = CoverPoint::builder("t4.c1").vname("x1").bins(0..10).build(&db).unwrap();
        let c2 = CoverPoint::builder("t4.c2")
            .transform(|a| Value::Int((int(a, "x2") as f64).sqrt() as i64))
            .bins(0..10)
            .build(&db)
            .unwrap();
        let c3 = CoverPoint::builder("t4.c3")
            .transform(|a| Value::Int(int(a, "x1") + int(a, "x2") + int(a, "x3")))
            .bins(0..10)
            .build(&db)
            .unwrap();
        let cross1 = CoverCross::builder("t4.cross1")
            .items(["t4.c1", "t4.c2", "t4.c3"])
            .build(&db)
            .unwrap();
        let cross2 = CoverCross::builder("t4.cross2")
            .items(["t4.c1", "t4.c2"])
            .ignore_bins([None, Some(1)])
            .ignore_bins([Some(2), Some(2)])
            .ignore_bins([Some(4), Some(5)])
            .build(&db)
            .unwrap();
        let mut cross3 = CoverCross::builder("t4.cross3").items(["t4.c1", "t4.c2"]);
        for i in 0..10 {
            cross3 = cross3.ignore_bins([Some(i), Some(i)]);
        }
        let cross3 = cross3.build(&db).unwrap();

        let section = CoverageSection::new()
            .with(c1.clone())
            .with(c2.clone())
            .with(c3.clone())
            .with(cross1.clone())
            .with(cross2.clone())
            .with(cross3.clone());
        for i in 0..10 {
            section.sample(&xyz(i, i * i, -i)).unwrap();
        }

        assert_eq!(c1.coverage().unwrap(), 10);
        assert_eq!(c2.coverage().unwrap(), 10);
        assert_eq!(c3.coverage().unwrap(), 4);
        assert_eq!(cross1.size().unwrap(), 1000);
        assert_eq!(cross1.coverage().unwrap(), 4);
        assert_eq!(cross2.size().unwrap(), 88);
        assert_eq!(cross2.coverage().unwrap(), 8);
        assert_eq!(cross3.size().unwrap(), 90);
        assert_eq!(cross3.coverage().unwrap(), 0);
    }

    #[test]
    fn test_cross_at_least() {
        let db = CoverageDb::new();
        let c1 = CoverPoint::builder("t5.c1").vname("i").bins(0..10).build(&db).unwrap();
        let c2 = CoverPoint::builder("t5.c2")
            .transform(|a| Value::Int(int(a, "i") % 6))
            .bins(0..5)
            .at_least(2)
            .build(&db)
            .unwrap();
        let cross = CoverCross::builder("t5.cross")
            .items(["t5.c1", "t5.c2"])
            .at_least(2)
            .build(&db)
            .unwrap();
        let section = CoverageSection::new().with(c1).with(c2).with(cross.clone());
        for i in 0..10 {
            section.sample(&ix(i, 0)).unwrap();
        }
        assert_eq!(cross.size().unwrap(), 50);
        assert_eq!(cross.coverage().unwrap(), 0);
        section.sample(&ix(0, 0)).unwrap();
        assert_eq!(cross.coverage().unwrap(), 1);
    }

    #[test]
    fn test_cross_uses_only_same_event_hits() {
        let db = CoverageDb::new();
        let a = CoverPoint::builder("t.a").vname("a").bins(0..2).build(&db).unwrap();
        let b = CoverPoint::builder("t.b").vname("b").bins(0..2).build(&db).unwrap();
        let ab = CoverCross::builder("t.ab").items(["t.a", "t.b"]).build(&db).unwrap();
        let args = Args::new().arg("a", 0).arg("b", 1);
        a.sample(&args).unwrap();
        b.sample(&args).unwrap();
        ab.sample(&args).unwrap();
        // `b` matches nothing, so this event has no combination
        a.sample(&Args::new().arg("a", 1).arg("b", 7)).unwrap();
        b.sample(&Args::new().arg("a", 1).arg("b", 7)).unwrap();
        ab.sample(&Args::new()).unwrap();
        assert_eq!(ab.coverage().unwrap(), 1);
        assert!(ab.new_hits().unwrap().is_empty());
    }

    #[test]
    fn test_cross_of_labelled_points() {
        let db = CoverageDb::new();
        let kind = CoverPoint::builder("pkt.kind")
            .vname("kind")
            .bins([0, 1])
            .bins_labels(["read", "write"])
            .build(&db)
            .unwrap();
        let len = CoverPoint::builder("pkt.len")
            .vname("len")
            .bins([4, 8, 16])
            .bins_labels(["short", "mid", "long"])
            .build(&db)
            .unwrap();
        let cross = CoverCross::builder("pkt.kind_x_len")
            .items(["pkt.kind", "pkt.len"])
            .build(&db)
            .unwrap();
        assert_eq!(cross.size().unwrap(), 6);
        let args = Args::new().arg("kind", 1).arg("len", 16);
        kind.sample(&args).unwrap();
        len.sample(&args).unwrap();
        cross.sample(&args).unwrap();
        assert_eq!(cross.new_hits().unwrap(), vec![Value::from(("write", "long"))]);
    }

    #[test]
    fn test_cross_of_cross() {
        let db = CoverageDb::new();
        let a = CoverPoint::builder("t.a").vname("a").bins(0..2).build(&db).unwrap();
        let b = CoverPoint::builder("t.b").vname("b").bins(0..2).build(&db).unwrap();
        let ab = CoverCross::builder("t.ab").items(["t.a", "t.b"]).build(&db).unwrap();
        let abc = CoverCross::builder("t.abc").items(["t.ab", "t.a"]).build(&db).unwrap();
        assert_eq!(abc.size().unwrap(), 8);
        let section = CoverageSection::new().with(a).with(b).with(ab).with(abc.clone());
        section.sample(&Args::new().arg("a", 1).arg("b", 0)).unwrap();
        assert_eq!(abc.coverage().unwrap(), 1);
    }

    #[test]
    fn test_cross_configuration_errors() {
        let db = CoverageDb::new();
        let _a = CoverPoint::builder("t.a").bins(0..2).build(&db).unwrap();
        let err = CoverCross::builder("t.x").items(["t.a", "t.nope"]).build(&db).unwrap_err();
        assert!(matches!(err, CovError::NodeNotFound { .. }));
        let err = CoverCross::builder("t.y").build(&db).unwrap_err();
        assert!(matches!(err, CovError::Configuration { .. }));
        let err = CoverCross::builder("t.z")
            .items(["t.a"])
            .ignore_bins([Some(0), None])
            .build(&db)
            .unwrap_err();
        assert!(matches!(err, CovError::Configuration { .. }));
        let err = CoverCross::builder("t.w").items(["t"]).build(&db).unwrap_err();
        assert!(matches!(err, CovError::Configuration { .. }));
    }
}

// ============================================================================
// Cover checks
// ============================================================================

mod check_tests {
    use super::*;

    fn x(v: i64) -> Args {
        Args::new().arg("x", v)
    }

    fn xv(a: &Args) -> i64 {
        a.get("x").and_then(Value::as_int).unwrap_or(0)
    }

    #[test]
    fn test_check_is_sticky_on_fail() {
        let db = CoverageDb::new();
        let chk = CoverCheck::builder("t8.check")
            .f_pass(|a| xv(a) > 0)
            .f_fail(|a| xv(a) < 0)
            .at_least(2)
            .build(&db)
            .unwrap();
        assert_eq!(chk.size().unwrap(), 1);
        chk.sample(&x(0)).unwrap();
        chk.sample(&x(1)).unwrap();
        assert_eq!(chk.coverage().unwrap(), 0);
        chk.sample(&x(5)).unwrap();
        assert_eq!(chk.coverage().unwrap(), 1);
        chk.sample(&x(-1)).unwrap();
        assert_eq!(chk.coverage().unwrap(), 0);
        for v in [4, 3, 1, -1, 9] {
            chk.sample(&x(v)).unwrap();
        }
        assert_eq!(chk.coverage().unwrap(), 0);
        assert_eq!(db.coverage("t8").unwrap(), 0);
    }

    #[test]
    fn test_undetermined_sample_is_ignored() {
        let db = CoverageDb::new();
        let chk = CoverCheck::builder("t.c")
            .f_pass(|a| xv(a) > 0)
            .f_fail(|a| xv(a) < 0)
            .build(&db)
            .unwrap();
        chk.sample(&x(0)).unwrap();
        let snap = chk.snapshot().unwrap();
        assert_eq!(snap.hits(PASS), Some(0));
        assert_eq!(snap.hits(FAIL), Some(0));
    }

    #[test]
    fn test_default_pass_and_weight() {
        let db = CoverageDb::new();
        let chk = CoverCheck::builder("t7.passing_check")
            .f_fail(|a| xv(a) > 100)
            .weight(5)
            .build(&db)
            .unwrap();
        for v in 0..50 {
            chk.sample(&x(v)).unwrap();
        }
        assert_eq!(chk.coverage().unwrap(), 5);
        assert_eq!(chk.snapshot().unwrap().hits(PASS), Some(50));
    }

    #[test]
    fn test_check_requires_fail_condition() {
        let db = CoverageDb::new();
        assert!(CoverCheck::builder("t.c").build(&db).is_err());
    }

    #[test]
    fn test_pass_and_fail_callbacks() {
        let db = CoverageDb::new();
        let chk = CoverCheck::builder("t.c")
            .f_pass(|a| xv(a) > 0)
            .f_fail(|a| xv(a) < 0)
            .at_least(2)
            .build(&db)
            .unwrap();
        let passes = Arc::new(AtomicUsize::new(0));
        let fails = Arc::new(AtomicUsize::new(0));
        let p = Arc::clone(&passes);
        let f = Arc::clone(&fails);
        db.add_bins_callback("t.c", PASS, move || {
            p.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        db.add_bins_callback("t.c", FAIL, move || {
            f.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        for v in [1, 1, 1, -1, -2] {
            chk.sample(&x(v)).unwrap();
        }
        assert_eq!(passes.load(Ordering::SeqCst), 1);
        assert_eq!(fails.load(Ordering::SeqCst), 1);
    }
}

// ============================================================================
// Callbacks
// ============================================================================

mod callback_tests {
    use super::*;

    #[test]
    fn test_threshold_and_bin_callbacks_fire_at_crossing() {
        let db = CoverageDb::new();
        let c1 = CoverPoint::builder("t6.c1").bins(0..100).build(&db).unwrap();
        let c2 = CoverPoint::builder("t6.c2")
            .transform(|a| Value::Int(a.get("i").and_then(Value::as_int).unwrap_or(0) % 50))
            .bins(0..50)
            .build(&db)
            .unwrap();

        let step = Arc::new(AtomicUsize::new(0));
        let fired = |slot: &Arc<AtomicUsize>| {
            let step = Arc::clone(&step);
            let slot = Arc::clone(slot);
            move || {
                slot.store(step.load(Ordering::SeqCst) + 1000, Ordering::SeqCst);
            }
        };
        let at_bin = Arc::new(AtomicUsize::new(0));
        let at_half = Arc::new(AtomicUsize::new(0));
        let at_forty = Arc::new(AtomicUsize::new(0));
        db.add_threshold_callback("t6.c1", 50.0, fired(&at_half)).unwrap();
        db.add_threshold_callback("t6", 40.0, fired(&at_forty)).unwrap();
        db.add_bins_callback("t6.c2", 3, fired(&at_bin)).unwrap();

        for i in 0..100 {
            let args = Args::new().arg("i", i);
            c1.sample(&args).unwrap();
            c2.sample(&args).unwrap();
            step.fetch_add(1, Ordering::SeqCst);
        }
        assert_eq!(at_bin.load(Ordering::SeqCst), 1003);
        assert_eq!(at_half.load(Ordering::SeqCst), 1049);
        assert_eq!(at_forty.load(Ordering::SeqCst), 1029);
    }

    #[test]
    fn test_threshold_fires_once() {
        let db = CoverageDb::new();
        let p = CoverPoint::builder("t.p").bins(0..4).build(&db).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        db.add_threshold_callback("t.p", 50.0, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        for v in [0, 1, 1, 2, 3, 0] {
            p.sample(&Args::new().arg("x", v)).unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_may_query_database() {
        let db = CoverageDb::new();
        let p = CoverPoint::builder("t.p").bins(0..2).build(&db).unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let (db2, s) = (db.clone(), Arc::clone(&seen));
        db.add_threshold_callback("t", 100.0, move || {
            s.store(db2.coverage("t").unwrap_or(0) as usize, Ordering::SeqCst);
        })
        .unwrap();
        p.sample(&Args::new().arg("x", 0)).unwrap();
        p.sample(&Args::new().arg("x", 1)).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_callback_on_unknown_node() {
        let db = CoverageDb::new();
        assert!(db.add_bins_callback("t.none", 1, || {}).is_err());
    }
}

// ============================================================================
// Registry behaviour
// ============================================================================

mod registry_tests {
    use super::*;

    #[test]
    fn test_empty_group_is_fully_covered() {
        let db = CoverageDb::new();
        db.register("top.empty").unwrap();
        assert_eq!(db.cover_percentage("top.empty").unwrap(), 100.0);
    }

    #[test]
    fn test_reset_invalidates_handles() {
        let db = CoverageDb::new();
        let p = CoverPoint::builder("t.p").bins(0..2).build(&db).unwrap();
        db.reset();
        let err = p.sample(&Args::new().arg("x", 0)).unwrap_err();
        assert!(matches!(err, CovError::NodeNotFound { .. }));
        let again = CoverPoint::builder("t.p").bins(0..2).build(&db).unwrap();
        assert!(p.sample(&Args::new().arg("x", 0)).is_err());
        again.sample(&Args::new().arg("x", 0)).unwrap();
        assert_eq!(db.coverage("t").unwrap(), 1);
    }

    #[test]
    fn test_report_layout() {
        let db = CoverageDb::new();
        let p = CoverPoint::builder("top.b.p").bins([1, 2]).build(&db).unwrap();
        let _q = CoverPoint::builder("top.a.q").bins([1]).build(&db).unwrap();
        p.sample(&Args::new().arg("x", 2)).unwrap();
        let report = db.report(true, None);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "top : group, coverage=1, size=3, cover_percentage=33.33");
        assert!(lines[1].starts_with("   top.a :"));
        assert!(lines[2].starts_with("      top.a.q : point"));
        assert_eq!(lines[3], "         BIN 1 : 0");
        assert!(lines[4].starts_with("   top.b :"));
        let filtered = db.report(false, Some("top.b"));
        assert_eq!(filtered.lines().count(), 2);
    }

    #[test]
    fn test_concurrent_sampling() {
        let db = CoverageDb::new();
        let p = CoverPoint::builder("t.p").bins(0..8).build(&db).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let p = p.clone();
                std::thread::spawn(move || {
                    for v in 0..100 {
                        p.sample(&Args::new().arg("x", (v + t) % 8)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let total: u64 = p.detailed_coverage().unwrap().iter().map(|(_, h)| h).sum();
        assert_eq!(total, 400);
        assert_eq!(db.coverage("t").unwrap(), 8);
    }
}

// ============================================================================
// Property tests
// ============================================================================

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn check_aggregation(db: &CoverageDb) {
        for name in db.names() {
            let node = db.node(&name).unwrap();
            if node.kind == ItemKind::Group {
                let (size, coverage) = node.children.iter().fold((0, 0), |(s, c), child| {
                    let child = db.node(child).unwrap();
                    (s + child.size, c + child.coverage)
                });
                assert_eq!(node.size, size, "{name}");
                assert_eq!(node.coverage, coverage, "{name}");
            } else if node.kind != ItemKind::Check {
                let bins = node.detailed_coverage.len() as u64;
                let covered = node
                    .detailed_coverage
                    .iter()
                    .filter(|(_, h)| *h >= node.at_least)
                    .count() as u64;
                assert_eq!(node.size, node.weight * bins, "{name}");
                assert_eq!(node.coverage, node.weight * covered, "{name}");
            }
        }
    }

    proptest! {
        /// Group totals always equal the sum of their children
        #[test]
        fn prop_aggregation_invariant(
            samples in proptest::collection::vec((0usize..3, 0i64..6, 0i64..6), 0..60),
            weights in proptest::collection::vec(1u64..4, 3),
            at_least in 1u64..3,
        ) {
            let db = CoverageDb::new();
            let names = ["top.a.p", "top.a.q", "top.b.r"];
            let points: Vec<CoverPoint> = names
                .iter()
                .zip(&weights)
                .map(|(n, w)| {
                    CoverPoint::builder(*n).vname("v").bins(0..5).weight(*w).at_least(at_least).build(&db).unwrap()
                })
                .collect();
            let cross = CoverCross::builder("top.a.pq").items(["top.a.p", "top.a.q"]).build(&db).unwrap();
            for (which, v, w) in samples {
                let args = Args::new().arg("v", v);
                points[which].sample(&args).unwrap();
                if which == 0 {
                    points[1].sample(&Args::new().arg("v", w)).unwrap();
                    cross.sample(&args).unwrap();
                }
            }
            check_aggregation(&db);
            prop_assert!(db.coverage("top").unwrap() <= db.size("top").unwrap());
        }
    }
}
