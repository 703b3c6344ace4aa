/*
 * Created on Sun Feb 25 2024
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
    super::unmark_rec,
    crate::{global::global, handle::Mtbdd},
    std::io::{self, Write},
};

/// Label printer for application-defined terminal types (tags above 1)
pub type LeafLabelFn<'a> = &'a dyn Fn(&mut dyn Write, u32, u64) -> io::Result<()>;

/// Serialize a diagram as a Graphviz digraph. Node names are table slots
/// (complement stripped); dashed edges are low, solid edges are high, and a
/// `dot` arrowtail flags a complemented edge. Uses the transient node mark,
/// so the engine must be quiescent
pub fn fprintdot<W: Write>(
    out: &mut W,
    dd: Mtbdd,
    leaf_label: Option<LeafLabelFn>,
) -> io::Result<()> {
    writeln!(out, "digraph \"DD\" {{")?;
    writeln!(out, "graph [dpi = 300];")?;
    writeln!(out, "center = true;")?;
    writeln!(out, "edge [dir = forward];")?;
    writeln!(out, "root [style=invis];")?;
    writeln!(
        out,
        "root -> {} [style=solid dir=both arrowtail={}];",
        dd.index(),
        tail(dd.has_mark())
    )?;
    let mut seen_bool = false;
    print_rec(out, dd, leaf_label, &mut seen_bool)?;
    unmark_rec(dd);
    writeln!(out, "}}")
}

fn tail(complemented: bool) -> &'static str {
    if complemented {
        "dot"
    } else {
        "none"
    }
}

fn print_rec<W: Write>(
    out: &mut W,
    dd: Mtbdd,
    leaf_label: Option<LeafLabelFn>,
    seen_bool: &mut bool,
) -> io::Result<()> {
    if dd.is_sentinel() {
        // both sentinels draw as the one `false` box; `true` is its
        // complement edge
        if !*seen_bool {
            *seen_bool = true;
            writeln!(out, "0 [shape=box, style=filled, label=\"F\"];")?;
        }
        return Ok(());
    }
    let e = global();
    let slot = dd.index();
    if e.table.node_mark(slot) {
        return Ok(());
    }
    e.table.set_node_mark(slot);
    let n = e.table.get(slot);
    if n.is_leaf() {
        write!(out, "{slot} [shape=box, style=filled, label=\"")?;
        match n.leaf_type() {
            0 => write!(out, "{}", n.leaf_value())?,
            1 => write!(out, "{:.6}", f64::from_bits(n.leaf_value()))?,
            t => match leaf_label {
                Some(label) => label(&mut *out, t, n.leaf_value())?,
                None => write!(out, "{t}:{}", n.leaf_value())?,
            },
        }
        writeln!(out, "\"];")
    } else {
        writeln!(out, "{slot} [label=\"{}\"];", n.var())?;
        print_rec(out, Mtbdd::from_raw(n.low_index()), leaf_label, seen_bool)?;
        print_rec(out, Mtbdd::from_raw(n.high_edge()), leaf_label, seen_bool)?;
        writeln!(out, "{slot} -> {} [style=dashed];", n.low_index())?;
        writeln!(
            out,
            "{slot} -> {} [style=solid dir=both arrowtail={}];",
            n.high_index(),
            tail(n.high_complemented())
        )
    }
}
