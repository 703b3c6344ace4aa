/*
 * Created on Wed Feb 21 2024
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

mod cube;
mod dot;

pub use self::{
    cube::{cube, union_cube},
    dot::{fprintdot, LeafLabelFn},
};

use crate::{
    gc,
    global::global,
    handle::Mtbdd,
    node::MtbddNode,
    rt::Runtime,
};

/// Everything that creates nodes runs on the pool: workers call straight
/// through, other threads ship the closure in as a root job
#[inline(always)]
fn with_pool<R: Send>(f: impl FnOnce() -> R + Send) -> R {
    global().rt.run(f)
}

#[inline(always)]
pub(crate) fn node(dd: Mtbdd) -> MtbddNode {
    global().table.get(dd.index())
}

// cofactors as seen through a possibly-complemented parent handle: the
// parent's negation distributes onto both children
#[inline(always)]
pub(crate) fn low_of(dd: Mtbdd, n: &MtbddNode) -> Mtbdd {
    dd.transfer_mark(Mtbdd::from_raw(n.low_index()))
}
#[inline(always)]
pub(crate) fn high_of(dd: Mtbdd, n: &MtbddNode) -> Mtbdd {
    dd.transfer_mark(Mtbdd::from_raw(n.high_edge()))
}

/// `true` for the boolean sentinels and typed terminals
pub fn is_leaf(dd: Mtbdd) -> bool {
    dd.is_sentinel() || node(dd).is_leaf()
}

/// The decision variable of an internal node
pub fn get_var(dd: Mtbdd) -> u32 {
    debug_assert!(!is_leaf(dd));
    node(dd).var()
}

/// The stored low edge. Canonical nodes keep their low edge unmarked, so
/// this never carries a complement
pub fn get_low(dd: Mtbdd) -> Mtbdd {
    debug_assert!(!dd.is_sentinel());
    Mtbdd::from_raw(node(dd).low_index())
}

/// The high edge, with the parent handle's complement transferred onto it
pub fn get_high(dd: Mtbdd) -> Mtbdd {
    debug_assert!(!dd.is_sentinel());
    let n = node(dd);
    high_of(dd, &n)
}

/// The type tag of a typed terminal (0 = u64, 1 = f64, above that the
/// application decides)
pub fn get_type(dd: Mtbdd) -> u32 {
    debug_assert!(!dd.is_sentinel());
    node(dd).leaf_type()
}

/// The raw 64-bit payload of a typed terminal
pub fn get_value(dd: Mtbdd) -> u64 {
    debug_assert!(!dd.is_sentinel());
    node(dd).leaf_value()
}

/// The value of an f64 terminal, sign recovered from the handle's
/// complement mark
pub fn get_double(dd: Mtbdd) -> f64 {
    let v = f64::from_bits(get_value(dd));
    if dd.has_mark() {
        -v
    } else {
        v
    }
}

/// Find-or-create the typed terminal `(ltype, value)`. Exhausting the unique
/// table even after a collection cycle takes the process down
pub fn make_leaf(ltype: u32, value: u64) -> Mtbdd {
    with_pool(move || raw_make_leaf(ltype, value))
}

/// Find-or-create the internal node `if var then high else low`, normalized
/// so that equal functions always resolve to the same handle
pub fn make_node(var: u32, low: Mtbdd, high: Mtbdd) -> Mtbdd {
    with_pool(move || raw_make_node(var, low, high))
}

pub fn uint64(value: u64) -> Mtbdd {
    make_leaf(0, value)
}

/// An f64 terminal. Strictly negative values store their absolute value and
/// fold the sign into the handle's complement mark, halving the leaf
/// population of sign-symmetric problems
pub fn double(value: f64) -> Mtbdd {
    with_pool(move || {
        if value < 0.0 {
            raw_make_leaf(1, (-value).to_bits()).toggle_mark()
        } else {
            raw_make_leaf(1, value.to_bits())
        }
    })
}

/// The positive cube of `vars` (ascending variable numbers) terminated by
/// `TRUE`
pub fn from_array(vars: &[u32]) -> Mtbdd {
    with_pool(move || raw_from_array(vars))
}

pub(crate) fn raw_make_leaf(ltype: u32, value: u64) -> Mtbdd {
    let e = global();
    let n = MtbddNode::new_leaf(ltype, value);
    let slot = match e.table.lookup(n.a, n.b) {
        Some((s, _)) => s,
        None => {
            let w = Runtime::current().expect("node construction outside the pool");
            gc::collect_at(w, e);
            match e.table.lookup(n.a, n.b) {
                Some((s, _)) => s,
                None => fatal!(
                    "unique table full, {} of {} buckets filled",
                    e.table.len(),
                    e.table.capacity()
                ),
            }
        }
    };
    Mtbdd::from_index(slot)
}

pub(crate) fn raw_make_node(var: u32, low: Mtbdd, high: Mtbdd) -> Mtbdd {
    debug_assert!(var < 1 << 24, "variable number out of range");
    if low == high {
        return low;
    }
    // canonical form: the stored low edge never carries a complement; fold
    // any low mark out onto the result handle
    let (low, high, mark) = if low.has_mark() {
        (low.toggle_mark(), high.toggle_mark(), true)
    } else {
        (low, high, false)
    };
    let e = global();
    let n = MtbddNode::new_internal(var, low.raw(), high.raw());
    let slot = match e.table.lookup(n.a, n.b) {
        Some((s, _)) => s,
        None => {
            let w = Runtime::current().expect("node construction outside the pool");
            // the children must survive the cycle we are about to run
            w.refs_push(low.raw());
            w.refs_push(high.raw());
            gc::collect_at(w, e);
            w.refs_pop(2);
            match e.table.lookup(n.a, n.b) {
                Some((s, _)) => s,
                None => fatal!(
                    "unique table full, {} of {} buckets filled",
                    e.table.len(),
                    e.table.capacity()
                ),
            }
        }
    };
    let r = Mtbdd::from_index(slot);
    if mark {
        r.toggle_mark()
    } else {
        r
    }
}

fn raw_from_array(vars: &[u32]) -> Mtbdd {
    match vars {
        [] => Mtbdd::TRUE,
        [v] => raw_make_node(*v, Mtbdd::FALSE, Mtbdd::TRUE),
        [v, rest @ ..] => {
            let tail = raw_from_array(rest);
            raw_make_node(*v, Mtbdd::FALSE, tail)
        }
    }
}

/// Count the nodes of a diagram: typed terminals included, the boolean
/// sentinels not. Two passes over the transient node mark, which is reserved
/// for quiescent single-threaded walks; mark bits are clear again on return
pub fn nodecount(dd: Mtbdd) -> usize {
    let count = nodecount_mark(dd);
    unmark_rec(dd);
    count
}

fn nodecount_mark(dd: Mtbdd) -> usize {
    if dd.is_sentinel() {
        return 0;
    }
    let e = global();
    let slot = dd.index();
    if e.table.node_mark(slot) {
        return 0;
    }
    e.table.set_node_mark(slot);
    let n = e.table.get(slot);
    if n.is_leaf() {
        1
    } else {
        1 + nodecount_mark(Mtbdd::from_raw(n.low_index()))
            + nodecount_mark(Mtbdd::from_raw(n.high_edge()))
    }
}

pub(crate) fn unmark_rec(dd: Mtbdd) {
    if dd.is_sentinel() {
        return;
    }
    let e = global();
    let slot = dd.index();
    if !e.table.node_mark(slot) {
        return;
    }
    e.table.clear_node_mark(slot);
    let n = e.table.get(slot);
    if n.is_leaf() {
        return;
    }
    unmark_rec(Mtbdd::from_raw(n.low_index()));
    unmark_rec(Mtbdd::from_raw(n.high_edge()));
}
