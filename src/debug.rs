//! Debug utilities for inspecting manager state.
//!
//! Everything here is read-only: dumping the node table, one BDD, or the
//! cache and collector counters never changes the meaning of any node.

use std::fmt::{self, Write};

use crate::bdd::Bdd;
use crate::cache::CacheCounters;
use crate::error::Result;
use crate::kernel::{GcStats, Kernel};
use crate::manager::BddManager;
use crate::reference::Ref;
use crate::table::UniqueStats;
use crate::types::Var;

/// One internal node as seen by a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub node_ref: Ref,
    pub variable: Var,
    pub level: u32,
    pub low: Ref,
    pub high: Ref,
    pub refcount: u32,
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>5}] {:>4}: {:>5} {:>5}",
            self.node_ref.get(),
            self.variable.id(),
            self.low.get(),
            self.high.get()
        )
    }
}

/// Counters of the unique table, the operation caches and the collector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    pub unique: UniqueStats,
    pub ops: CacheCounters,
    pub gc: GcStats,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cache statistics")?;
        writeln!(f, "----------------")?;
        writeln!(f, "Unique Access:  {}", self.unique.access)?;
        writeln!(f, "Unique Chain:   {}", self.unique.chain)?;
        writeln!(f, "Unique Hit:     {}", self.unique.hit)?;
        writeln!(f, "Unique Miss:    {}", self.unique.miss)?;
        writeln!(f, "Unique Trivial: {}", self.unique.trivial)?;
        writeln!(f, "=> Hit rate =   {:.2}", ratio(self.unique.hit, self.unique.hit + self.unique.miss))?;
        writeln!(f, "Operator Hits:  {}", self.ops.hits)?;
        writeln!(f, "Operator Miss:  {}", self.ops.misses)?;
        writeln!(f, "Operator Overwrites: {}", self.ops.overwrites)?;
        writeln!(f, "=> Hit rate =   {:.2}", ratio(self.ops.hits, self.ops.hits + self.ops.misses))?;
        writeln!(f, "Garbage collections: {}", self.gc.collections)?;
        writeln!(f, "Nodes freed:    {}", self.gc.freed)?;
        writeln!(f, "GC time:        {:.3}s", self.gc.gc_time)?;
        writeln!(f, "Table resizes:  {}", self.gc.resizes)?;
        write!(f, "Resize time:    {:.3}s", self.gc.resize_time)
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

impl Kernel {
    fn node_info(&self, r: Ref) -> NodeInfo {
        let node = self.table.node(r);
        NodeInfo {
            node_ref: r,
            variable: Var::new(self.level_to_var(node.level)),
            level: node.level,
            low: node.low,
            high: node.high,
            refcount: node.refcount,
        }
    }

    /// Every live internal node, in id order.
    pub(crate) fn live_nodes(&self) -> Vec<NodeInfo> {
        self.table
            .nodes()
            .iter()
            .enumerate()
            .skip(2)
            .filter(|(_, n)| !n.is_dead())
            .map(|(i, _)| self.node_info(Ref::new(i as u32)))
            .collect()
    }

    /// Internal nodes reachable from `root`, in id order.
    pub(crate) fn reachable_nodes(&mut self, root: Ref) -> Vec<NodeInfo> {
        let mut refs = Vec::new();
        self.mark_with(&[root], |_| {});
        for (i, node) in self.table.nodes().iter().enumerate().skip(2) {
            if node.mark {
                refs.push(Ref::new(i as u32));
            }
        }
        self.unmark_all(&[root]);
        refs.into_iter().map(|r| self.node_info(r)).collect()
    }
}

impl BddManager {
    pub fn cache_stats(&self) -> CacheStats {
        self.inspect(|k| CacheStats {
            unique: k.table.stats,
            ops: k.caches.counters(),
            gc: k.gc_stats,
        })
    }

    /// All live nodes as `[id - refs] var: low high` lines.
    pub fn dump_all(&self) -> String {
        let nodes = self.inspect(|k| k.live_nodes());
        let mut out = String::new();
        for n in nodes {
            let _ = writeln!(
                out,
                "[{:>5} - {:>2}] {:>4}: {:>5} {:>5}",
                n.node_ref.get(),
                n.refcount,
                n.variable.id(),
                n.low.get(),
                n.high.get()
            );
        }
        out
    }

    /// The nodes of one BDD, headed by its root.
    pub fn dump_table(&self, bdd: &Bdd<'_>) -> Result<String> {
        self.check_owner(bdd)?;
        let root = bdd.node();
        let nodes = self.with_kernel(|k| {
            k.check(root)?;
            Ok(k.reachable_nodes(root))
        })?;
        let mut out = String::new();
        let _ = writeln!(out, "ROOT: {}", root.get());
        for n in nodes {
            let _ = writeln!(out, "{}", n);
        }
        Ok(out)
    }

    pub fn dump_stats(&self) -> String {
        self.cache_stats().to_string()
    }

    pub fn print_all(&self) {
        print!("{}", self.dump_all());
    }

    pub fn print_table(&self, bdd: &Bdd<'_>) -> Result<()> {
        print!("{}", self.dump_table(bdd)?);
        Ok(())
    }

    pub fn print_stat(&self) {
        println!("{}", self.dump_stats());
    }
}
