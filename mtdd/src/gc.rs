/*
 * Created on Sat Feb 17 2024
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
    collector
    ---
    Stop-the-world parallel mark-sweep. A cycle begins when someone raises
    the request flag (node construction hitting a full table, or an explicit
    collect); every pool worker converges on the cycle barrier from a
    safepoint: the idle scan, a sync wait, or the polling point at the top of
    the recursive operators.

    Inside the barrier the cycle runs in lockstep phases:
      1. every registered mark hook runs on every worker (hooks that cover
         global stores act on the leader only; the in-flight hook is
         per-worker by nature), seeding the shared mark queue with roots;
      2. all workers drain the queue together, chasing children of
         first-time-marked internal nodes;
      3. the table index is zeroed, then survivors are re-published and dead
         slots freed, both split across workers by range;
      4. the leader drops the request flag and everyone leaves at once.

    A worker suspended mid-operator participates at a safepoint and resumes
    afterwards; whatever it was holding had to be rooted (in-flight stack,
    task argument of a rooted operand, or an external ref) or it is gone.
*/

use {
    crate::{
        global::{global, Engine},
        handle::Mtbdd,
        rt::{Runtime, WorkerCtx},
    },
    log::debug,
    parking_lot::{Mutex, RwLock},
    std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Barrier,
    },
};

pub(crate) type MarkHook = Box<dyn Fn(&Engine, &WorkerCtx, bool) + Send + Sync>;

pub(crate) struct GcState {
    requested: AtomicBool,
    barrier: Barrier,
    queue: Mutex<Vec<u64>>,
    pending: AtomicUsize,
    hooks: RwLock<Vec<(u8, MarkHook)>>,
    runs: AtomicUsize,
}

impl GcState {
    pub fn new(workers: usize) -> Self {
        Self {
            requested: AtomicBool::new(false),
            barrier: Barrier::new(workers),
            queue: Mutex::new(Vec::new()),
            pending: AtomicUsize::new(0),
            hooks: RwLock::new(Vec::new()),
            runs: AtomicUsize::new(0),
        }
    }
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::Relaxed)
    }
}

/// Register a marking hook; lower priorities run earlier. Only valid while
/// bringing the engine up
pub(crate) fn add_mark_hook(e: &Engine, priority: u8, hook: MarkHook) {
    let mut hooks = e.gc.hooks.write();
    let at = hooks
        .iter()
        .position(|(p, _)| *p > priority)
        .unwrap_or(hooks.len());
    hooks.insert(at, (priority, hook));
}

/// The root sources: external counted refs, protected cells and per-worker
/// in-flight state, all at the same priority
pub(crate) fn register_root_hooks(e: &Engine) {
    add_mark_hook(
        e,
        10,
        Box::new(|e: &Engine, _: &WorkerCtx, leader: bool| {
            if leader {
                e.refs.for_each(|h| mark_root(e, h));
            }
        }),
    );
    add_mark_hook(
        e,
        10,
        Box::new(|e: &Engine, _: &WorkerCtx, leader: bool| {
            if leader {
                crate::refs::protected().for_each(|addr| {
                    let h = unsafe {
                        // UNSAFE(@ohsayan): the protect contract requires the
                        // cell to be readable whenever a collection runs
                        *(addr as *const Mtbdd)
                    };
                    mark_root(e, h);
                });
            }
        }),
    );
    add_mark_hook(
        e,
        10,
        Box::new(|e: &Engine, w: &WorkerCtx, _: bool| {
            let inflight = w.inflight();
            for &h in &inflight.results {
                mark_root(e, Mtbdd::from_raw(h));
            }
            for t in &inflight.spawns {
                if !t.is_stolen() {
                    // everything from here on is still in our own deque and
                    // will run under a frame of ours; no results exist yet
                    break;
                }
                if t.is_completed() {
                    mark_root(e, Mtbdd::from_raw(t.result()));
                }
            }
        }),
    );
}

/// Cooperative safepoint. Operators that can run for a while call this near
/// entry; a no-op unless a cycle has been requested (or the caller is not a
/// pool worker at all)
pub fn gc_test() {
    if let Some(w) = Runtime::current() {
        test_at(w, global());
    }
}

#[inline(always)]
pub(crate) fn test_at(w: &WorkerCtx, e: &Engine) {
    if e.gc.requested.load(Ordering::Acquire) {
        participate(w, e);
    }
}

/// Force a full collection cycle and wait for it to finish
pub fn collect() {
    let e = global();
    e.rt.run(|| {
        let w = Runtime::current().expect("collection outside the pool");
        collect_at(w, global());
    });
}

pub(crate) fn collect_at(w: &WorkerCtx, e: &Engine) {
    e.gc.requested.store(true, Ordering::Release);
    participate(w, e);
}

fn participate(w: &WorkerCtx, e: &Engine) {
    let gc = &e.gc;
    let leader = gc.barrier.wait().is_leader();
    if leader {
        gc.runs.fetch_add(1, Ordering::Relaxed);
        debug!(
            "gc: collection cycle starting, {} of {} buckets in use",
            e.table.len(),
            e.table.capacity()
        );
    }
    {
        let hooks = gc.hooks.read();
        for (_, hook) in hooks.iter() {
            hook(e, w, leader);
        }
    }
    drain(e);
    gc.barrier.wait();
    if leader {
        debug!("gc: marked {} nodes", e.table.count_marked());
    }
    let pool = e.rt.workers().len();
    let (ilo, ihi) = slice(w.id(), pool, e.table.index_len());
    e.table.clear_index_range(ilo, ihi);
    gc.barrier.wait();
    let (dlo, dhi) = slice(w.id(), pool, e.table.capacity());
    let dead = e.table.sweep_range(dlo, dhi);
    e.table.merge_free(dead);
    gc.barrier.wait();
    if leader {
        gc.requested.store(false, Ordering::Release);
        debug!("gc: cycle done, {} nodes live", e.table.len());
    }
    gc.barrier.wait();
}

/// Seed the mark queue with a root. Safe for any handle; sentinels have no
/// backing node and are skipped
pub(crate) fn mark_root(e: &Engine, h: Mtbdd) {
    if h.is_sentinel() {
        return;
    }
    e.gc.pending.fetch_add(1, Ordering::AcqRel);
    e.gc.queue.lock().push(h.index());
}

/// Chase the mark queue until the transitive closure of every root is
/// flagged. All workers run this concurrently; the pending counter covers
/// popped-but-unprocessed nodes so nobody leaves early
fn drain(e: &Engine) {
    let mut batch = Vec::with_capacity(64);
    loop {
        batch.clear();
        {
            let mut q = e.gc.queue.lock();
            let take = q.len().min(64);
            let at = q.len() - take;
            batch.extend(q.drain(at..));
        }
        if batch.is_empty() {
            if e.gc.pending.load(Ordering::Acquire) == 0 {
                break;
            }
            std::hint::spin_loop();
            continue;
        }
        for slot in batch.iter().copied() {
            mark_node(e, slot);
        }
    }
}

fn mark_node(e: &Engine, slot: u64) {
    if e.table.mark(slot) {
        let n = e.table.get(slot);
        if !n.is_leaf() {
            // child indices without their edge marks; slot 0 is a sentinel
            let lo = n.low_index();
            let hi = n.high_index();
            let add = (lo != 0) as usize + (hi != 0) as usize;
            if add != 0 {
                e.gc.pending.fetch_add(add, Ordering::AcqRel);
                let mut q = e.gc.queue.lock();
                if lo != 0 {
                    q.push(lo);
                }
                if hi != 0 {
                    q.push(hi);
                }
            }
        }
    }
    e.gc.pending.fetch_sub(1, Ordering::AcqRel);
}

fn slice(i: usize, pool: usize, len: usize) -> (usize, usize) {
    (len * i / pool, len * (i + 1) / pool)
}
