/*
 * Created on Sat Feb 10 2024
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
    external roots
    ---
    Two independent stores keep diagrams alive across collection cycles:

    - counted refs: a multiset of handles. Holding a count on a handle pins
      that exact diagram.
    - protections: a set of *cell addresses*. The collector reads the cell at
      mark time, so the holder may keep reassigning the cell without talking
      to us again.

    The protections store is created on first use rather than at engine init
    because host-language global constructors are allowed to protect cells
    before the engine is brought up; init then adopts the existing store.
*/

use {
    crate::{global::global, handle::Mtbdd},
    parking_lot::RwLock,
    std::{
        collections::{HashMap, HashSet},
        sync::OnceLock,
    },
};

const REFS_PREALLOC: usize = 1024;
const PROTECT_PREALLOC: usize = 4096;

pub(crate) struct RefTable {
    m: RwLock<HashMap<u64, usize>>,
}

impl RefTable {
    pub fn new() -> Self {
        Self {
            m: RwLock::new(HashMap::with_capacity(REFS_PREALLOC)),
        }
    }
    pub fn up(&self, h: u64) {
        *self.m.write().entry(h).or_insert(0) += 1;
    }
    pub fn down(&self, h: u64) {
        let mut m = self.m.write();
        match m.get_mut(&h) {
            Some(c) if *c > 1 => *c -= 1,
            Some(_) => {
                m.remove(&h);
            }
            None => debug_assert!(false, "dropped a ref that was never taken"),
        }
    }
    pub fn count(&self) -> usize {
        self.m.read().values().sum()
    }
    pub fn for_each(&self, mut f: impl FnMut(Mtbdd)) {
        self.m.read().keys().for_each(|&h| f(Mtbdd::from_raw(h)));
    }
    pub fn clear(&self) {
        self.m.write().clear();
    }
}

pub(crate) struct ProtectTable {
    s: RwLock<HashSet<usize>>,
}

impl ProtectTable {
    fn new() -> Self {
        Self {
            s: RwLock::new(HashSet::with_capacity(PROTECT_PREALLOC)),
        }
    }
    pub fn up(&self, addr: usize) {
        self.s.write().insert(addr);
    }
    pub fn down(&self, addr: usize) {
        self.s.write().remove(&addr);
    }
    pub fn count(&self) -> usize {
        self.s.read().len()
    }
    pub fn for_each(&self, mut f: impl FnMut(usize)) {
        self.s.read().iter().for_each(|&a| f(a));
    }
    pub fn clear(&self) {
        self.s.write().clear();
    }
}

static PROTECTED: OnceLock<ProtectTable> = OnceLock::new();

pub(crate) fn protected() -> &'static ProtectTable {
    PROTECTED.get_or_init(ProtectTable::new)
}

/// Takes a counted reference on the given diagram, pinning it across
/// collection cycles. Counting the sentinels is a no-op
pub fn incref(dd: Mtbdd) -> Mtbdd {
    if !dd.is_sentinel() {
        global().refs.up(dd.raw());
    }
    dd
}

/// Releases one counted reference
pub fn decref(dd: Mtbdd) {
    if !dd.is_sentinel() {
        global().refs.down(dd.raw());
    }
}

pub fn count_refs() -> usize {
    global().refs.count()
}

/// Registers the address of a handle cell as a root. The collector follows
/// whatever handle the cell holds at mark time, so the holder may freely
/// reassign it. Permitted before [`init`](crate::init)
///
/// ## Safety
/// The cell must stay valid (and hold a valid handle whenever a collection
/// can run) until it is unprotected
pub unsafe fn protect(cell: *const Mtbdd) {
    protected().up(cell as usize);
}

/// Unregisters a previously protected cell address
///
/// ## Safety
/// See [`protect`]
pub unsafe fn unprotect(cell: *const Mtbdd) {
    protected().down(cell as usize);
}

pub fn count_protected() -> usize {
    protected().count()
}

#[cfg(test)]
mod tests {
    use super::{ProtectTable, RefTable};

    #[test]
    fn counted_refs() {
        let t = RefTable::new();
        t.up(5);
        t.up(5);
        t.up(9);
        assert_eq!(t.count(), 3);
        t.down(5);
        assert_eq!(t.count(), 2);
        t.down(5);
        t.down(9);
        assert_eq!(t.count(), 0);
    }

    #[test]
    fn ref_iteration_sees_distinct_handles() {
        let t = RefTable::new();
        t.up(1);
        t.up(1);
        t.up(2);
        let mut seen = vec![];
        t.for_each(|h| seen.push(h.raw()));
        seen.sort_unstable();
        assert_eq!(seen, [1, 2]);
    }

    #[test]
    fn protections() {
        let t = ProtectTable::new();
        let a = 0xF00usize;
        let b = 0xBA8usize;
        t.up(a);
        t.up(a);
        t.up(b);
        // a set, not a multiset
        assert_eq!(t.count(), 2);
        t.down(a);
        assert_eq!(t.count(), 1);
        t.clear();
        assert_eq!(t.count(), 0);
    }
}
