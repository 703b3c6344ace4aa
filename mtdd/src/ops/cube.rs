/*
 * Created on Sat Feb 24 2024
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
    cube builders
    ---
    A cube pattern is one byte per variable of the spine: 0 puts the variable
    in negated, 1 positive, 2 leaves it unconstrained, and 3 pairs it with
    the next variable (s = s' over interleaved encodings), eating two pattern
    bytes and two spine levels.

    These operators also set the rooting discipline every recursive operator
    has to follow: poll the collection safepoint near entry, and push any
    locally-computed handle onto the worker's in-flight stack before a sync
    (a sync may run arbitrary other work, which may run a full collection).
    Operands themselves are the caller's roots, and every recursive argument
    is a subgraph of an operand.
*/

use {
    super::{high_of, low_of, raw_make_node},
    crate::{
        error::{MtbddError, MtbddResult},
        gc,
        global::global,
        handle::Mtbdd,
        rt::{self, Runtime},
    },
    log::warn,
};

/// Walk the variable spine and the byte pattern in lockstep, rejecting
/// unknown bytes and patterns that run out early. Union operations also
/// reject the paired-variable byte: it has no defined union semantics, and
/// silently producing `FALSE` would corrupt results downstream
fn validate_pattern(vars: Mtbdd, pattern: &[u8], allow_paired: bool) -> MtbddResult<()> {
    let e = global();
    let mut vs = vars;
    let mut i = 0;
    while vs != Mtbdd::TRUE {
        if vs.is_sentinel() || e.table.get(vs.index()).is_leaf() {
            break;
        }
        let Some(&byte) = pattern.get(i) else {
            return Err(MtbddError::PatternTooShort);
        };
        let n = e.table.get(vs.index());
        match byte {
            0 | 1 | 2 => {
                vs = high_of(vs, &n);
                i += 1;
            }
            3 if allow_paired => {
                let next = high_of(vs, &n);
                if next.is_sentinel()
                    || e.table.get(next.index()).is_leaf()
                    || pattern.len() < i + 2
                {
                    return Err(MtbddError::PatternTooShort);
                }
                vs = high_of(next, &e.table.get(next.index()));
                i += 2;
            }
            3 => return Err(MtbddError::UnsupportedCubePattern),
            _ => return Err(MtbddError::InvalidCubeByte),
        }
    }
    Ok(())
}

/// Build the conjunction described by `pattern` over the variable cube
/// `vars`, with `terminal` at the end of the single satisfying path.
/// Malformed patterns collapse to `FALSE`
pub fn cube(vars: Mtbdd, pattern: &[u8], terminal: Mtbdd) -> Mtbdd {
    if let Err(e) = validate_pattern(vars, pattern, true) {
        warn!("cube: rejecting pattern ({e:?})");
        return Mtbdd::FALSE;
    }
    super::with_pool(move || raw_cube(vars, pattern, terminal))
}

pub(crate) fn raw_cube(vars: Mtbdd, pattern: &[u8], terminal: Mtbdd) -> Mtbdd {
    if vars == Mtbdd::TRUE {
        return terminal;
    }
    let e = global();
    let n = e.table.get(vars.index());
    let next = high_of(vars, &n);
    match pattern[0] {
        0 => {
            let r = raw_cube(next, &pattern[1..], terminal);
            raw_make_node(n.var(), r, Mtbdd::FALSE)
        }
        1 => {
            let r = raw_cube(next, &pattern[1..], terminal);
            raw_make_node(n.var(), Mtbdd::FALSE, r)
        }
        2 => raw_cube(next, &pattern[1..], terminal),
        3 => {
            let n2 = e.table.get(next.index());
            let var2 = n2.var();
            let rest = high_of(next, &n2);
            let r = raw_cube(rest, &pattern[2..], terminal);
            let low = raw_make_node(var2, r, Mtbdd::FALSE);
            let w = Runtime::current().expect("cube outside the pool");
            w.refs_push(low.raw());
            let high = raw_make_node(var2, Mtbdd::FALSE, r);
            w.refs_pop(1);
            raw_make_node(n.var(), low, high)
        }
        _ => Mtbdd::FALSE,
    }
}

/// Disjoin the cube `(vars, pattern, terminal)` into `dd`, pointwise at the
/// terminal: the parallel way of adding one element to a diagram-encoded
/// set. Sibling cofactors recurse as stolen work
pub fn union_cube(
    dd: Mtbdd,
    vars: Mtbdd,
    pattern: &[u8],
    terminal: Mtbdd,
) -> MtbddResult<Mtbdd> {
    validate_pattern(vars, pattern, false)?;
    Ok(super::with_pool(move || {
        raw_union_cube(dd, vars, pattern, terminal)
    }))
}

pub(crate) fn raw_union_cube(dd: Mtbdd, vars: Mtbdd, pattern: &[u8], terminal: Mtbdd) -> Mtbdd {
    if dd == terminal {
        return terminal;
    }
    if dd == Mtbdd::FALSE {
        return raw_cube(vars, pattern, terminal);
    }
    if vars == Mtbdd::TRUE {
        return terminal;
    }

    gc::gc_test();

    let e = global();
    let nv = e.table.get(vars.index());
    let v = nv.var();
    let na = e.table.get(dd.index());
    // a terminal other than `terminal` sits below every remaining variable,
    // exactly like a node whose variable is past the end of the cube
    let va = if na.is_leaf() { u32::MAX } else { na.var() };
    let w = Runtime::current().expect("union outside the pool");

    if va < v {
        let low = low_of(dd, &na);
        let high = high_of(dd, &na);
        let t = unsafe {
            // UNSAFE(@ohsayan): synced below, in this very frame
            rt::spawn_scoped(
                w,
                Box::new(move || raw_union_cube(high, vars, pattern, terminal).raw()),
            )
        };
        let new_low = raw_union_cube(low, vars, pattern, terminal);
        w.refs_push(new_low.raw());
        let new_high = Mtbdd::from_raw(rt::sync(w, &t));
        w.refs_pop(1);
        if new_low != low || new_high != high {
            raw_make_node(va, new_low, new_high)
        } else {
            dd
        }
    } else if va == v {
        let low = low_of(dd, &na);
        let high = high_of(dd, &na);
        let rest = high_of(vars, &nv);
        let sub = &pattern[1..];
        match pattern[0] {
            0 => {
                let new_low = raw_union_cube(low, rest, sub, terminal);
                if new_low != low {
                    raw_make_node(v, new_low, high)
                } else {
                    dd
                }
            }
            1 => {
                let new_high = raw_union_cube(high, rest, sub, terminal);
                if new_high != high {
                    raw_make_node(v, low, new_high)
                } else {
                    dd
                }
            }
            2 => {
                let t = unsafe {
                    // UNSAFE(@ohsayan): synced below, in this very frame
                    rt::spawn_scoped(
                        w,
                        Box::new(move || raw_union_cube(high, rest, sub, terminal).raw()),
                    )
                };
                let new_low = raw_union_cube(low, rest, sub, terminal);
                w.refs_push(new_low.raw());
                let new_high = Mtbdd::from_raw(rt::sync(w, &t));
                w.refs_pop(1);
                if new_low != low || new_high != high {
                    raw_make_node(v, new_low, new_high)
                } else {
                    dd
                }
            }
            // rejected up front; mirror the terminal sentinel anyway
            _ => Mtbdd::FALSE,
        }
    } else {
        let rest = high_of(vars, &nv);
        let sub = &pattern[1..];
        match pattern[0] {
            0 => {
                let new_low = raw_union_cube(dd, rest, sub, terminal);
                raw_make_node(v, new_low, Mtbdd::FALSE)
            }
            1 => {
                let new_high = raw_union_cube(dd, rest, sub, terminal);
                raw_make_node(v, Mtbdd::FALSE, new_high)
            }
            2 => {
                let t = unsafe {
                    // UNSAFE(@ohsayan): synced below, in this very frame
                    rt::spawn_scoped(
                        w,
                        Box::new(move || raw_union_cube(dd, rest, sub, terminal).raw()),
                    )
                };
                let new_low = raw_union_cube(dd, rest, sub, terminal);
                w.refs_push(new_low.raw());
                let new_high = Mtbdd::from_raw(rt::sync(w, &t));
                w.refs_pop(1);
                raw_make_node(v, new_low, new_high)
            }
            _ => Mtbdd::FALSE,
        }
    }
}
