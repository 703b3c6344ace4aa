/*
 * Created on Wed Feb 14 2024
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
    worker runtime
    ---
    A small work-stealing pool that the diagram operators are written
    against. Every operator frame follows the same shape: spawn one half,
    compute the other half locally, sync. Owners push and pop the back of
    their own deque; thieves take from the front. A task therefore runs
    either inline during its own sync, or on whichever worker stole it.

    Task results are bare 64-bit handles on purpose: the collector walks the
    result slots of stolen-and-completed tasks as roots, and it walks them
    while the spawning frame is suspended somewhere below a safepoint.

    Threads that are not workers hand the engine a root job and block; the
    closure's borrows are erased to 'static, which is sound because the
    submitting thread does not outlive the job (it cannot return before the
    completion flag flips).

    Every loop a worker can get stuck in (idle scan, sync wait) checks the
    collection flag, which is what makes stop-the-world convergence
    cooperative instead of preemptive.
*/

use {
    crate::global::{global, Engine},
    parking_lot::{Condvar, Mutex},
    std::{
        cell::{Cell, UnsafeCell},
        collections::VecDeque,
        mem,
        panic::{self, AssertUnwindSafe},
        sync::{
            atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::Duration,
    },
};

const INFLIGHT_PREALLOC: usize = 128;

const T_PENDING: u8 = 0;
const T_RUN_LOCAL: u8 = 1;
const T_RUN_STOLEN: u8 = 2;
const T_DONE_LOCAL: u8 = 3;
const T_DONE_STOLEN: u8 = 4;

type Job = Box<dyn FnOnce() -> u64 + Send + 'static>;

/// A spawned, not-yet-synced unit of work whose result is a handle
pub(crate) struct TaskCell {
    state: AtomicU8,
    result: AtomicU64,
    owner: usize,
    job: Mutex<Option<Job>>,
}

impl TaskCell {
    /// `true` once a worker other than the spawner has picked this task up
    pub fn is_stolen(&self) -> bool {
        matches!(
            self.state.load(Ordering::Acquire),
            T_RUN_STOLEN | T_DONE_STOLEN
        )
    }
    pub fn is_completed(&self) -> bool {
        matches!(
            self.state.load(Ordering::Acquire),
            T_DONE_LOCAL | T_DONE_STOLEN
        )
    }
    pub fn result(&self) -> u64 {
        self.result.load(Ordering::Relaxed)
    }
}

/// The in-flight roots of one worker: handles currently held across a
/// suspension point, and outstanding spawns whose results the collector may
/// need to chase
pub(crate) struct InFlight {
    pub results: Vec<u64>,
    pub spawns: Vec<Arc<TaskCell>>,
}

pub(crate) struct WorkerCtx {
    id: usize,
    deque: Mutex<VecDeque<Arc<TaskCell>>>,
    inflight: UnsafeCell<InFlight>,
}

// the inflight block is only ever touched from the owning thread (marking
// included: the mark callback for worker `i` runs on worker `i`)
unsafe impl Sync for WorkerCtx {}

impl WorkerCtx {
    fn new(id: usize) -> Self {
        Self {
            id,
            deque: Mutex::new(VecDeque::new()),
            inflight: UnsafeCell::new(InFlight {
                results: Vec::with_capacity(INFLIGHT_PREALLOC),
                spawns: Vec::with_capacity(INFLIGHT_PREALLOC),
            }),
        }
    }
    pub fn id(&self) -> usize {
        self.id
    }
    fn inflight_mut(&self) -> &mut InFlight {
        unsafe {
            // UNSAFE(@ohsayan): owning thread only; see the Sync impl note
            &mut *self.inflight.get()
        }
    }
    pub fn inflight(&self) -> &InFlight {
        unsafe {
            // UNSAFE(@ohsayan): owning thread only
            &*self.inflight.get()
        }
    }
    /// Root a handle across an upcoming suspension point
    pub fn refs_push(&self, h: u64) {
        self.inflight_mut().results.push(h);
    }
    /// Drop the top `n` in-flight roots
    pub fn refs_pop(&self, n: usize) {
        let r = &mut self.inflight_mut().results;
        let l = r.len() - n;
        r.truncate(l);
    }
}

struct RootJob {
    job: Box<dyn FnOnce() + Send + 'static>,
}

pub(crate) struct Runtime {
    workers: Box<[WorkerCtx]>,
    inject: Mutex<VecDeque<RootJob>>,
    online: AtomicUsize,
}

thread_local! {
    static WORKER_ID: Cell<usize> = const { Cell::new(usize::MAX) };
}

impl Runtime {
    pub fn new(workers: usize) -> Self {
        assert!(workers != 0, "at least one worker is required");
        Self {
            workers: (0..workers).map(WorkerCtx::new).collect(),
            inject: Mutex::new(VecDeque::new()),
            online: AtomicUsize::new(0),
        }
    }
    pub fn workers(&self) -> &[WorkerCtx] {
        &self.workers
    }
    /// Bring the worker threads up and wait until every one of them has
    /// registered; collection barriers assume the full pool from here on
    pub fn start(&self) {
        for id in 0..self.workers.len() {
            thread::Builder::new()
                .name(format!("mtdd-worker-{id}"))
                .spawn(move || worker_main(id))
                .expect("failed to spawn an engine worker");
        }
        while self.online.load(Ordering::Acquire) != self.workers.len() {
            thread::yield_now();
        }
    }
    /// The calling thread's worker context, if it is a pool worker
    pub fn current() -> Option<&'static WorkerCtx> {
        let id = WORKER_ID.with(|c| c.get());
        if id == usize::MAX {
            None
        } else {
            Some(&global().rt.workers[id])
        }
    }
    /// Run `f` on the pool and return its result. Pool workers run it
    /// inline; any other thread ships it in as a root job and blocks
    pub fn run<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        if Runtime::current().is_some() {
            return f();
        }
        let done = Arc::new((Mutex::new(false), Condvar::new()));
        let mut slot: Option<R> = None;
        let slot_addr = &mut slot as *mut Option<R> as usize;
        {
            let done = done.clone();
            let job: Box<dyn FnOnce() + Send + '_> = Box::new(move || {
                let r = f();
                unsafe {
                    // UNSAFE(@ohsayan): the submitting thread blocks on the
                    // flag below, so the slot outlives this write
                    *(slot_addr as *mut Option<R>) = Some(r);
                }
                let (lck, cv) = &*done;
                *lck.lock() = true;
                cv.notify_all();
            });
            let job: Box<dyn FnOnce() + Send + 'static> = unsafe {
                // UNSAFE(@ohsayan): lifetime erasure for the same reason:
                // nothing borrowed by `f` dies before the flag flips
                mem::transmute(job)
            };
            self.inject.lock().push_back(RootJob { job });
        }
        let (lck, cv) = &*done;
        let mut flag = lck.lock();
        cv.wait_while(&mut flag, |f| !*f);
        drop(flag);
        slot.take().unwrap()
    }
}

/// Queue a child computation on this worker
///
/// ## Safety
/// Borrows captured by `f` are erased; the caller must [`sync`] the task in
/// the same frame, before any of those borrows can die
pub(crate) unsafe fn spawn_scoped<'a>(
    w: &WorkerCtx,
    f: Box<dyn FnOnce() -> u64 + Send + 'a>,
) -> Arc<TaskCell> {
    let job: Job = mem::transmute(f);
    let t = Arc::new(TaskCell {
        state: AtomicU8::new(T_PENDING),
        result: AtomicU64::new(0),
        owner: w.id,
        job: Mutex::new(Some(job)),
    });
    w.deque.lock().push_back(t.clone());
    w.inflight_mut().spawns.push(t.clone());
    t
}

/// Await a spawned task. If nobody has stolen it, it runs inline right here;
/// otherwise this worker helps the pool along (and keeps hitting the
/// collection safepoint) until the thief finishes
pub(crate) fn sync(w: &WorkerCtx, t: &Arc<TaskCell>) -> u64 {
    loop {
        match t.state.load(Ordering::Acquire) {
            T_DONE_LOCAL | T_DONE_STOLEN => {
                let recorded = w.inflight_mut().spawns.pop();
                debug_assert!(recorded.map_or(false, |r| Arc::ptr_eq(&r, t)));
                return t.result();
            }
            T_PENDING => {
                let claimed = {
                    let mut dq = w.deque.lock();
                    match dq.back() {
                        Some(b) if Arc::ptr_eq(b, t) => {
                            dq.pop_back();
                            true
                        }
                        _ => false,
                    }
                };
                if claimed {
                    execute(w, t);
                } else {
                    help(w);
                }
            }
            _ => help(w),
        }
    }
}

fn execute(w: &WorkerCtx, t: &TaskCell) {
    let stolen = t.owner != w.id;
    t.state.store(
        if stolen { T_RUN_STOLEN } else { T_RUN_LOCAL },
        Ordering::Relaxed,
    );
    let job = t.job.lock().take().expect("task executed twice");
    let r = match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(r) => r,
        Err(_) => fatal!("a worker task panicked; the node store cannot be trusted, going down"),
    };
    t.result.store(r, Ordering::Relaxed);
    t.state.store(
        if stolen { T_DONE_STOLEN } else { T_DONE_LOCAL },
        Ordering::Release,
    );
}

fn run_root(j: RootJob) {
    if panic::catch_unwind(AssertUnwindSafe(j.job)).is_err() {
        fatal!("a worker task panicked; the node store cannot be trusted, going down");
    }
}

/// One round of making-ourselves-useful while waiting on a thief. Never pops
/// the local deque: anything still pending there belongs to suspended frames
/// of this very stack and runs during their own sync
fn help(w: &WorkerCtx) {
    let e = global();
    crate::gc::test_at(w, e);
    if let Some(t) = steal(e, w) {
        execute(w, &t);
        return;
    }
    let job = { e.rt.inject.lock().pop_front() };
    match job {
        Some(j) => run_root(j),
        None => thread::yield_now(),
    }
}

fn steal(e: &Engine, w: &WorkerCtx) -> Option<Arc<TaskCell>> {
    let ws = &e.rt.workers;
    for k in 1..ws.len() {
        let victim = &ws[(w.id + k) % ws.len()];
        let taken = { victim.deque.lock().pop_front() };
        if taken.is_some() {
            return taken;
        }
    }
    None
}

fn worker_main(id: usize) {
    WORKER_ID.with(|c| c.set(id));
    let e = global();
    let w = &e.rt.workers[id];
    e.rt.online.fetch_add(1, Ordering::AcqRel);
    let mut idle = 0u32;
    loop {
        crate::gc::test_at(w, e);
        if let Some(t) = steal(e, w) {
            execute(w, &t);
            idle = 0;
            continue;
        }
        let job = { e.rt.inject.lock().pop_front() };
        if let Some(j) = job {
            run_root(j);
            idle = 0;
            continue;
        }
        idle += 1;
        if idle < 64 {
            thread::yield_now();
        } else {
            thread::sleep(Duration::from_micros(50));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::WorkerCtx;

    #[test]
    fn inflight_stack() {
        let w = WorkerCtx::new(0);
        w.refs_push(10);
        w.refs_push(20);
        w.refs_push(30);
        assert_eq!(w.inflight().results, [10, 20, 30]);
        w.refs_pop(2);
        assert_eq!(w.inflight().results, [10]);
        w.refs_pop(1);
        assert!(w.inflight().results.is_empty());
    }
}
