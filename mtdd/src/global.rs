/*
 * Created on Sun Feb 18 2024
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

use {
    crate::{
        config::MtbddConfig,
        gc::{self, GcState},
        node::MtbddNode,
        refs::{protected, RefTable},
        rt::Runtime,
        table::NodeTable,
    },
    log::{info, warn},
    parking_lot::Mutex,
    std::{mem, sync::OnceLock},
};

pub(crate) struct Engine {
    pub table: NodeTable,
    pub refs: RefTable,
    pub rt: Runtime,
    pub gc: GcState,
    pub quit_hooks: Mutex<Vec<fn()>>,
}

static ENGINE: OnceLock<Engine> = OnceLock::new();

pub(crate) fn global() -> &'static Engine {
    ENGINE.get().expect("engine offline")
}

/// Bring the engine up: allocate the unique table, create the refs store,
/// adopt the protections store (which may predate us), register the root
/// marking hooks and spawn the worker pool. Does nothing if the engine is
/// already online
pub fn init(config: MtbddConfig) {
    // the node layout is also pinned at compile time; this is the last line
    // of defense if it ever drifts from the handle encoding
    if mem::size_of::<MtbddNode>() != 16 {
        fatal!(
            "invalid size of diagram nodes: {} bytes",
            mem::size_of::<MtbddNode>()
        );
    }
    let workers = config.workers();
    let capacity = config.table_capacity();
    let engine = Engine {
        table: NodeTable::new(capacity),
        refs: RefTable::new(),
        rt: Runtime::new(workers),
        gc: GcState::new(workers),
        quit_hooks: Mutex::new(Vec::new()),
    };
    if ENGINE.set(engine).is_err() {
        warn!("init: engine already online, ignoring");
        return;
    }
    let e = global();
    protected();
    gc::register_root_hooks(e);
    e.quit_hooks.lock().push(free_root_stores);
    e.rt.start();
    info!("mtdd: online with {workers} workers and a unique table of {capacity} buckets");
}

fn free_root_stores() {
    global().refs.clear();
    protected().clear();
}

/// Tear the root stores down. Handles must not be used past this point
pub fn quit() {
    let hooks: Vec<fn()> = global().quit_hooks.lock().drain(..).collect();
    for hook in hooks {
        hook();
    }
    info!("mtdd: offline");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// nodes currently flagged reachable; zero outside a collection cycle
    pub table_marked: usize,
    /// live nodes in the unique table
    pub table_live: usize,
    pub table_capacity: usize,
    /// collection cycles since the engine came up
    pub gc_runs: usize,
}

pub fn stats() -> EngineStats {
    let e = global();
    EngineStats {
        table_marked: e.table.count_marked(),
        table_live: e.table.len(),
        table_capacity: e.table.capacity(),
        gc_runs: e.gc.runs(),
    }
}
