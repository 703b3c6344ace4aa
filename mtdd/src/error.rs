/*
 * Created on Sat Feb 03 2024
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

pub type MtbddResult<T> = Result<T, MtbddError>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
/// Errors returned by the cube builders. Everything else in the engine either
/// returns a diagram or takes the process down (unique table exhaustion after
/// a collection cycle is not recoverable)
pub enum MtbddError {
    /// the interleaved-equality pattern byte (3) was passed to a union
    /// operation, which has no defined semantics for it
    UnsupportedCubePattern,
    /// a pattern byte outside the known set was found
    InvalidCubeByte,
    /// the byte pattern ran out before the variable cube did
    PatternTooShort,
}
