/*
 * Created on Sun Feb 04 2024
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

/// A handle to a diagram in the unique table. This is a tagged 64-bit integer:
/// bits 0-39 index the unique table and bit 63 is the complement mark ("negate
/// whatever this points to"). Handles compare bit-for-bit: two handles denote
/// the same function iff they are equal, which is what the canonical store
/// buys us
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Mtbdd(u64);

impl Mtbdd {
    /// the complement mark bit
    pub const COMPLEMENT: u64 = 1 << 63;
    /// the `false` sentinel; never stored in the table
    pub const FALSE: Self = Self(0);
    /// the `true` sentinel: the complement of `false`
    pub const TRUE: Self = Self(Self::COMPLEMENT);
    pub(crate) const INDEX_MASK: u64 = 0x0000_00FF_FFFF_FFFF;

    #[inline(always)]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
    #[inline(always)]
    pub const fn raw(self) -> u64 {
        self.0
    }
    #[inline(always)]
    pub(crate) const fn from_index(index: u64) -> Self {
        Self(index & Self::INDEX_MASK)
    }
    /// The unique table bucket this handle points at (complement stripped)
    #[inline(always)]
    pub(crate) const fn index(self) -> u64 {
        self.0 & Self::INDEX_MASK
    }
    #[inline(always)]
    pub const fn has_mark(self) -> bool {
        self.0 & Self::COMPLEMENT != 0
    }
    #[inline(always)]
    pub const fn strip_mark(self) -> Self {
        Self(self.0 & !Self::COMPLEMENT)
    }
    #[inline(always)]
    pub const fn toggle_mark(self) -> Self {
        Self(self.0 ^ Self::COMPLEMENT)
    }
    /// Push this handle's complement mark down onto `to`. Used when reading a
    /// child edge: the parent's negation distributes to the child
    #[inline(always)]
    pub const fn transfer_mark(self, to: Self) -> Self {
        Self(to.0 ^ (self.0 & Self::COMPLEMENT))
    }
    /// `true` for the two boolean sentinels, which have no backing node
    #[inline(always)]
    pub const fn is_sentinel(self) -> bool {
        self.0 & !Self::COMPLEMENT == 0
    }
}
