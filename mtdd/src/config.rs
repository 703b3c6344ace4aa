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

use {serde::Deserialize, std::thread};

/// Engine settings, either built directly or deserialized from whatever
/// configuration source the host application uses. Every construction path
/// runs the same checks: deserialization goes through the raw
/// [`ConfigShape`] and is promoted with [`TryFrom`], so an invalid document
/// is a deserialization error, never a half-checked config
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "ConfigShape")]
pub struct MtbddConfig {
    table_capacity: usize,
    workers: usize,
}

/// The on-disk shape of a config document; fields may be omitted
#[derive(Deserialize)]
#[serde(default)]
struct ConfigShape {
    table_capacity: usize,
    workers: usize,
}

impl Default for ConfigShape {
    fn default() -> Self {
        let d = MtbddConfig::default();
        Self {
            table_capacity: d.table_capacity,
            workers: d.workers,
        }
    }
}

impl TryFrom<ConfigShape> for MtbddConfig {
    type Error = &'static str;
    fn try_from(shape: ConfigShape) -> Result<Self, Self::Error> {
        Self::checked(shape.table_capacity, shape.workers)
    }
}

impl MtbddConfig {
    /// 2^22 nodes (64MiB of node data plus table metadata)
    pub const DEFAULT_TABLE_CAPACITY: usize = 1 << 22;
    const MIN_TABLE_CAPACITY: usize = 1 << 10;
    // handles address table buckets with 40 bits
    const MAX_TABLE_CAPACITY: usize = 1 << 40;

    fn checked(table_capacity: usize, workers: usize) -> Result<Self, &'static str> {
        if !table_capacity.is_power_of_two()
            || table_capacity < Self::MIN_TABLE_CAPACITY
            || table_capacity > Self::MAX_TABLE_CAPACITY
        {
            return Err("bad table capacity (want a power of two between 2^10 and 2^40)");
        }
        if workers == 0 {
            return Err("at least one worker is required");
        }
        Ok(Self {
            table_capacity,
            workers,
        })
    }
    /// Returns a validated configuration
    ///
    /// ## Panics
    /// If the capacity is not a power of two in `[2^10, 2^40]` or if no
    /// workers were requested
    pub fn new(table_capacity: usize, workers: usize) -> Self {
        match Self::checked(table_capacity, workers) {
            Ok(config) => config,
            Err(e) => panic!("{e}"),
        }
    }
    pub fn table_capacity(&self) -> usize {
        self.table_capacity
    }
    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for MtbddConfig {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_TABLE_CAPACITY,
            thread::available_parallelism().map_or(4, usize::from),
        )
    }
}
