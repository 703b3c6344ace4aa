/*
 * Created on Fri Mar 01 2024
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

//! # mtdd
//!
//! A parallel multi-terminal binary decision diagram (MTBDD) engine. The
//! heart of the crate is a canonical node store: every distinct function has
//! exactly one handle, so structural equality is integer equality and
//! recursive operators can be memoized for free. Around it sit the node
//! construction protocol (which reacts to table pressure by collecting
//! garbage and retrying), a two-tier rooting system (counted refs and
//! protected cells externally, per-worker in-flight stacks internally), a
//! stop-the-world parallel mark-sweep collector and the recursive operators
//! that demonstrate the rooting discipline.
//!
//! Bring the engine up once with [`init`], then build diagrams from any
//! thread; anything that creates nodes runs on the engine's work-stealing
//! pool. Handles are plain 64-bit integers ([`Mtbdd`]) and stay valid only
//! while rooted across collection cycles.

#![deny(unreachable_patterns)]

#[macro_use]
mod macros;
mod config;
mod error;
mod gc;
mod global;
mod handle;
mod node;
mod ops;
mod refs;
mod rt;
mod table;
#[cfg(test)]
mod tests;

pub use self::{
    config::MtbddConfig,
    error::{MtbddError, MtbddResult},
    gc::{collect, gc_test},
    global::{init, quit, stats, EngineStats},
    handle::Mtbdd,
    ops::{
        cube, double, fprintdot, from_array, get_double, get_high, get_low, get_type, get_value,
        get_var, is_leaf, make_leaf, make_node, nodecount, uint64, union_cube, LeafLabelFn,
    },
    refs::{count_protected, count_refs, decref, incref, protect, unprotect},
};
