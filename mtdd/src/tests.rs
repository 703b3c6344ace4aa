/*
 * Created on Sat Mar 09 2024
 *
 * This file is a part of mtdd
 * mtdd is a free and open-source parallel multi-terminal binary decision
 * diagram (MTBDD) engine written by Sayan Nandan ("the Author") with the
 * vision to provide canonical, concurrent and scalable symbolic computation
 * without compromising on performance or correctness.
 *
 * Copyright (c) 2024, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

/*
    The engine is a process-wide singleton, so these tests share one instance
    and serialize on a lock: collections triggered by one test would
    otherwise eat the unrooted intermediates of another. Every test roots
    what it needs and drops its roots before returning.
*/

use {
    super::*,
    parking_lot::{Mutex, MutexGuard},
    std::{sync::OnceLock, thread},
};

static EXCLUSIVE: Mutex<()> = Mutex::new(());
static BOOT: OnceLock<()> = OnceLock::new();

fn exclusive() -> MutexGuard<'static, ()> {
    let guard = EXCLUSIVE.lock();
    BOOT.get_or_init(|| {
        let _ = env_logger::builder().is_test(true).try_init();
        init(MtbddConfig::new(1 << 16, 4));
    });
    guard
}

/// Follow one assignment down to a terminal handle, negations applied
fn eval(mut dd: Mtbdd, bits: &[bool]) -> Mtbdd {
    loop {
        if dd.is_sentinel() {
            return dd;
        }
        let n = crate::ops::node(dd);
        if n.is_leaf() {
            return dd;
        }
        dd = if bits[n.var() as usize] {
            crate::ops::high_of(dd, &n)
        } else {
            crate::ops::low_of(dd, &n)
        };
    }
}

#[test]
fn canonicity() {
    let _g = exclusive();
    let x = uint64(400);
    assert_eq!(
        make_node(3, Mtbdd::FALSE, x),
        make_node(3, Mtbdd::FALSE, x)
    );
}

#[test]
fn canonicity_across_threads() {
    let _g = exclusive();
    let x = incref(uint64(77));
    let built: Vec<Vec<Mtbdd>> = (0..4)
        .map(|_| {
            thread::spawn(move || {
                (0..256u32)
                    .map(|var| make_node(var, Mtbdd::FALSE, x))
                    .collect()
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|j| j.join().unwrap())
        .collect();
    for other in &built[1..] {
        assert_eq!(&built[0], other);
    }
    decref(x);
}

#[test]
fn redundant_test_collapses() {
    let _g = exclusive();
    let x = uint64(9);
    assert_eq!(make_node(5, x, x), x);
    assert_eq!(make_node(0, Mtbdd::TRUE, Mtbdd::TRUE), Mtbdd::TRUE);
    assert_eq!(make_node(1, Mtbdd::FALSE, Mtbdd::FALSE), Mtbdd::FALSE);
}

#[test]
fn complement_involution() {
    let _g = exclusive();
    let hi = uint64(3);
    let f = make_node(2, Mtbdd::FALSE, hi);
    let t = f.toggle_mark();
    assert_eq!(t.toggle_mark(), f);
    assert_eq!(get_low(t), get_low(f));
    assert_eq!(get_high(t), get_high(f).toggle_mark());
}

#[test]
fn leaf_uniqueness() {
    let _g = exclusive();
    multi_assert_eq!(make_leaf(0, 5), uint64(5) => uint64(5));
    assert_eq!(make_leaf(7, 123), make_leaf(7, 123));
    assert_ne!(make_leaf(7, 123), make_leaf(8, 123));
    assert_ne!(make_leaf(7, 123), make_leaf(7, 124));
}

#[test]
fn double_sign_encoding() {
    let _g = exclusive();
    for x in [0.0f64, 1.5, 2.25, 1e300, 4e-3] {
        assert_eq!(get_double(double(x)), x);
        if x > 0.0 {
            assert_eq!(get_double(double(-x)), -x);
            assert_eq!(double(-x), double(x).toggle_mark());
        }
    }
    // a negative zero passes the `< 0` test and stays uncomplemented
    assert!(!double(-0.0).has_mark());
    assert_eq!(get_double(double(-0.0)), 0.0);

    let d = double(-1.5);
    assert!(d.has_mark());
    assert_eq!(get_type(d), 1);
    assert_eq!(get_value(d), 1.5f64.to_bits());
    assert_eq!(get_double(d), -1.5);
}

#[test]
fn complemented_low_normalizes() {
    let _g = exclusive();
    let x = make_node(1, Mtbdd::FALSE, Mtbdd::TRUE);
    let r = make_node(0, x.toggle_mark(), Mtbdd::FALSE);
    // the mark moved off the low edge and onto the result
    assert!(r.has_mark());
    assert_eq!(get_low(r), x);
    assert_eq!(get_high(r.strip_mark()), Mtbdd::TRUE);
    // the same function built the other way around resolves identically
    assert_eq!(r, make_node(0, x, Mtbdd::TRUE).toggle_mark());
    // sentinel flavor of the same rule
    assert_eq!(
        make_node(0, Mtbdd::TRUE, Mtbdd::FALSE),
        make_node(0, Mtbdd::FALSE, Mtbdd::TRUE).toggle_mark()
    );
}

#[test]
fn conjunction_from_array() {
    let _g = exclusive();
    let d = from_array(&[0, 1, 2]);
    assert_eq!(nodecount(d), 3);
    // a right spine of positive tests
    let mut level = d;
    for var in 0..3u32 {
        assert_eq!(get_var(level), var);
        assert_eq!(get_low(level), Mtbdd::FALSE);
        level = get_high(level);
    }
    assert_eq!(level, Mtbdd::TRUE);
    assert_eq!(from_array(&[]), Mtbdd::TRUE);
}

#[test]
fn nodecount_is_repeatable() {
    let _g = exclusive();
    let d = from_array(&[0, 1, 2, 3]);
    let first = nodecount(d);
    assert_eq!(first, 4);
    // mark bits were cleared on the way out
    assert_eq!(nodecount(d), first);
    assert_eq!(nodecount(d.toggle_mark()), first);
    multi_assert_eq!(nodecount(Mtbdd::FALSE), nodecount(Mtbdd::TRUE) => 0);
}

#[test]
fn rooted_diagrams_survive_collection() {
    let _g = exclusive();
    let vars = incref(from_array(&[0, 1]));
    let term = incref(uint64(7));
    let d = incref(cube(vars, &[0, 1], term));

    collect();

    // structure intact: negated x0, positive x1, terminal 7
    assert_eq!(get_var(d), 0);
    assert_eq!(get_high(d), Mtbdd::FALSE);
    let inner = get_low(d);
    assert_eq!(get_var(inner), 1);
    assert_eq!(get_low(inner), Mtbdd::FALSE);
    let leaf = get_high(inner);
    assert_eq!(get_type(leaf), 0);
    assert_eq!(get_value(leaf), 7);
    // and the canonical rebuild is the very same handle
    assert_eq!(cube(vars, &[0, 1], term), d);

    decref(d);
    decref(term);
    decref(vars);
}

#[test]
fn counted_ref_bookkeeping() {
    let _g = exclusive();
    assert_eq!(count_refs(), 0);
    let a = uint64(5);
    incref(a);
    incref(a);
    assert_eq!(count_refs(), 2);
    decref(a);
    assert_eq!(count_refs(), 1);
    // sentinels are never counted
    incref(Mtbdd::TRUE);
    incref(Mtbdd::FALSE);
    assert_eq!(count_refs(), 1);
    decref(a);
    assert_eq!(count_refs(), 0);
}

#[test]
fn protected_cell_reassignment() {
    let _g = exclusive();
    let mut cell = uint64(1000);
    unsafe { protect(&cell) };
    assert_eq!(count_protected(), 1);

    collect();
    assert_eq!(get_value(cell), 1000);

    // reassign without re-registering; the collector reads the cell live
    cell = double(2.5);
    collect();
    assert_eq!(get_double(cell), 2.5);

    unsafe { unprotect(&cell) };
    assert_eq!(count_protected(), 0);
}

#[test]
fn union_cube_builds_and_idempotes() {
    let _g = exclusive();
    let vars = incref(from_array(&[0, 1, 2]));
    let c = incref(cube(vars, &[1, 1, 1], Mtbdd::TRUE));

    let u1 = union_cube(Mtbdd::FALSE, vars, &[1, 1, 1], Mtbdd::TRUE).unwrap();
    assert_eq!(u1, c);
    // a structural no-op the second time around
    let u2 = union_cube(u1, vars, &[1, 1, 1], Mtbdd::TRUE).unwrap();
    assert_eq!(u2, u1);

    decref(c);
    decref(vars);
}

#[test]
fn union_cube_pointwise_semantics() {
    let _g = exclusive();
    let vars = incref(from_array(&[0, 1, 2]));
    let a = incref(union_cube(Mtbdd::FALSE, vars, &[1, 1, 1], Mtbdd::TRUE).unwrap());
    let u = union_cube(a, vars, &[0, 2, 1], Mtbdd::TRUE).unwrap();

    // members: (1,1,1) plus (0,_,1)
    assert_eq!(eval(u, &[true, true, true]), Mtbdd::TRUE);
    assert_eq!(eval(u, &[false, false, true]), Mtbdd::TRUE);
    assert_eq!(eval(u, &[false, true, true]), Mtbdd::TRUE);
    assert_eq!(eval(u, &[true, true, false]), Mtbdd::FALSE);
    assert_eq!(eval(u, &[true, false, true]), Mtbdd::FALSE);
    assert_eq!(eval(u, &[false, false, false]), Mtbdd::FALSE);

    decref(a);
    decref(vars);
}

#[test]
fn union_cube_below_existing_variables() {
    let _g = exclusive();
    let vars03 = incref(from_array(&[0, 3]));
    let d = incref(cube(vars03, &[1, 1], Mtbdd::TRUE));
    let vars3 = incref(from_array(&[3]));

    // (x0 ∧ x3) ∨ x3 collapses to the plain x3 cube, canonically
    let u = union_cube(d, vars3, &[1], Mtbdd::TRUE).unwrap();
    assert_eq!(u, cube(vars3, &[1], Mtbdd::TRUE));

    decref(vars3);
    decref(d);
    decref(vars03);
}

#[test]
fn paired_pattern_cube() {
    let _g = exclusive();
    let vars = incref(from_array(&[0, 1]));
    // s = s' over an interleaved pair; the second byte is part of the pair
    let c = cube(vars, &[3, 0], Mtbdd::TRUE);
    assert_eq!(eval(c, &[false, false]), Mtbdd::TRUE);
    assert_eq!(eval(c, &[true, true]), Mtbdd::TRUE);
    assert_eq!(eval(c, &[true, false]), Mtbdd::FALSE);
    assert_eq!(eval(c, &[false, true]), Mtbdd::FALSE);
    decref(vars);
}

#[test]
fn pattern_validation() {
    let _g = exclusive();
    let vars = incref(from_array(&[0, 1]));
    assert_eq!(
        union_cube(Mtbdd::FALSE, vars, &[3, 1], Mtbdd::TRUE),
        Err(MtbddError::UnsupportedCubePattern)
    );
    assert_eq!(
        union_cube(Mtbdd::FALSE, vars, &[4, 1], Mtbdd::TRUE),
        Err(MtbddError::InvalidCubeByte)
    );
    assert_eq!(
        union_cube(Mtbdd::FALSE, vars, &[1], Mtbdd::TRUE),
        Err(MtbddError::PatternTooShort)
    );
    // the conjunction builder keeps the old collapse-to-false contract
    assert_eq!(cube(vars, &[9, 1], Mtbdd::TRUE), Mtbdd::FALSE);
    assert_eq!(cube(vars, &[1], Mtbdd::TRUE), Mtbdd::FALSE);
    decref(vars);
}

#[test]
fn table_pressure_runs_collection() {
    let _g = exclusive();
    let runs_before = stats().gc_runs;
    // nothing rooted: every cycle may throw the lot away
    crate::global::global().rt.run(|| {
        for v in 0u64..(1 << 16) + 4096 {
            make_leaf(0, (1 << 32) + v);
        }
    });
    let s = stats();
    assert!(s.gc_runs > runs_before);
    assert_eq!(s.table_marked, 0);
    assert!(s.table_live < s.table_capacity);
    // and the table takes new nodes again
    assert!(is_leaf(make_leaf(0, 424242)));
}

#[test]
fn union_fold_is_order_independent() {
    let _g = exclusive();
    use rand::{rngs::StdRng, Rng, SeedableRng};
    let mut rng = StdRng::seed_from_u64(0xD1A6);
    let vars: Vec<u32> = (0..8).collect();
    let spine = incref(from_array(&vars));
    let cubes: Vec<[u8; 8]> = (0..24)
        .map(|_| {
            let mut c = [0u8; 8];
            c.iter_mut().for_each(|b| *b = rng.gen_range(0..3));
            c
        })
        .collect();

    let fold = |order: &mut dyn Iterator<Item = usize>| -> Mtbdd {
        let mut acc = Mtbdd::FALSE;
        for i in order {
            incref(acc);
            let next = union_cube(acc, spine, &cubes[i], Mtbdd::TRUE).unwrap();
            decref(acc);
            acc = next;
        }
        acc
    };
    let forward = incref(fold(&mut (0..cubes.len())));
    let backward = fold(&mut (0..cubes.len()).rev());
    assert_eq!(forward, backward);

    decref(forward);
    decref(spine);
}

#[test]
fn concurrent_union_folds_agree() {
    let _g = exclusive();
    use rand::{rngs::StdRng, Rng, SeedableRng};
    let mut rng = StdRng::seed_from_u64(0xBDD);
    let vars: Vec<u32> = (0..10).collect();
    let spine = incref(from_array(&vars));
    let cubes: Vec<[u8; 10]> = (0..16)
        .map(|_| {
            let mut c = [0u8; 10];
            c.iter_mut().for_each(|b| *b = rng.gen_range(0..3));
            c
        })
        .collect();

    let results: Vec<Mtbdd> = (0..4)
        .map(|_| {
            let cubes = cubes.clone();
            thread::spawn(move || {
                let mut acc = Mtbdd::FALSE;
                for c in &cubes {
                    incref(acc);
                    let next = union_cube(acc, spine, c, Mtbdd::TRUE).unwrap();
                    decref(acc);
                    acc = next;
                }
                acc
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|j| j.join().unwrap())
        .collect();
    for r in &results[1..] {
        assert_eq!(results[0], *r);
    }
    decref(spine);
}

#[test]
fn dot_export() {
    let _g = exclusive();
    let x = make_node(0, Mtbdd::FALSE, Mtbdd::TRUE);

    let mut buf = Vec::new();
    fprintdot(&mut buf, x, None).unwrap();
    let s = String::from_utf8(buf).unwrap();
    assert!(s.starts_with("digraph \"DD\" {\n"));
    assert!(s.contains("root [style=invis];"));
    assert!(s.contains(&format!(
        "root -> {} [style=solid dir=both arrowtail=none];",
        x.index()
    )));
    assert!(s.contains("0 [shape=box, style=filled, label=\"F\"];"));
    assert!(s.contains(&format!("{} [label=\"0\"];", x.index())));
    assert!(s.contains("[style=dashed];"));
    // the high edge to `true` rides on a complemented edge
    assert!(s.contains("arrowtail=dot"));
    assert!(s.trim_end().ends_with('}'));

    // a complemented root carries the dot on the root edge
    let mut buf = Vec::new();
    fprintdot(&mut buf, x.toggle_mark(), None).unwrap();
    let s = String::from_utf8(buf).unwrap();
    assert!(s.contains(&format!(
        "root -> {} [style=solid dir=both arrowtail=dot];",
        x.index()
    )));

    // custom terminal labels
    let leaf = make_leaf(9, 1);
    let label = |out: &mut dyn std::io::Write, t: u32, v: u64| write!(out, "custom-{t}-{v}");
    let mut buf = Vec::new();
    fprintdot(&mut buf, leaf, Some(&label)).unwrap();
    assert!(String::from_utf8(buf).unwrap().contains("custom-9-1"));

    // the walk left no marks behind
    assert_eq!(nodecount(x), 1);
}

#[test]
fn pool_runs_external_work() {
    let _g = exclusive();
    let results: Vec<u64> = (0..8u64)
        .map(|i| thread::spawn(move || crate::global::global().rt.run(move || i * 2)))
        .collect::<Vec<_>>()
        .into_iter()
        .map(|j| j.join().unwrap())
        .collect();
    assert_eq!(results, (0..8u64).map(|i| i * 2).collect::<Vec<_>>());
}

#[test]
fn pool_spawn_sync_tree() {
    let _g = exclusive();
    // plain numbers in the result slots; fine while nothing forces a
    // collection mid-test
    fn split(lo: u64, hi: u64) -> u64 {
        if hi - lo <= 8 {
            return (lo..hi).sum();
        }
        let mid = (lo + hi) / 2;
        let w = crate::rt::Runtime::current().unwrap();
        let t = unsafe { crate::rt::spawn_scoped(w, Box::new(move || split(mid, hi))) };
        let left = split(lo, mid);
        let right = crate::rt::sync(w, &t);
        left + right
    }
    let total = crate::global::global().rt.run(|| split(0, 1000));
    assert_eq!(total, 499500);
}
