//! Mark-sweep garbage collection and node table growth.

use std::time::Instant;

use log::{debug, info};

use crate::kernel::Kernel;
use crate::node::Node;
use crate::reference::Ref;
use crate::utils::{prime_gte, prime_lte};

/// Largest node table the 32-bit id space allows.
const MAX_NODE_TABLE: usize = (u32::MAX - 1) as usize;

impl Kernel {
    /// Reclaim every node unreachable from an external reference or the
    /// root stack, then clean or flush the caches.
    pub(crate) fn gc(&mut self) {
        let start = Instant::now();
        let before = self.table.free_num();

        let mut roots: Vec<Ref> = self.ref_stack().to_vec();
        roots.extend(
            self.table
                .nodes()
                .iter()
                .enumerate()
                .skip(2)
                .filter(|(_, n)| !n.is_dead() && n.refcount > 0)
                .map(|(i, _)| Ref::new(i as u32)),
        );
        self.mark_all(&roots);

        let freed = self.table.sweep();
        self.table.rehash();

        if self.config.flush_cache_on_gc {
            self.caches.reset();
        } else if freed > 0 {
            self.caches.clean(&self.table);
        }

        let elapsed = start.elapsed().as_secs_f64();
        self.gc_stats.collections += 1;
        self.gc_stats.freed += freed as u64;
        self.gc_stats.gc_time += elapsed;
        debug!(
            "Garbage collection #{}: {} nodes, {} free before, {} freed, {:.3}s ({:.3}s total)",
            self.gc_stats.collections,
            self.table.size(),
            before,
            freed,
            elapsed,
            self.gc_stats.gc_time
        );
    }

    /// Set the mark bit on every node reachable from `roots`.
    ///
    /// Returns how many nodes were newly marked.
    pub(crate) fn mark_all(&mut self, roots: &[Ref]) -> usize {
        self.mark_with(roots, |_| {})
    }

    /// Like [`mark_all`](Self::mark_all), calling `visit` on each newly
    /// marked node.
    pub(crate) fn mark_with(&mut self, roots: &[Ref], mut visit: impl FnMut(&Node)) -> usize {
        let nodes = self.table.nodes_mut();
        let mut stack: Vec<Ref> = roots.to_vec();
        let mut marked = 0;
        while let Some(r) = stack.pop() {
            if r.is_const() {
                continue;
            }
            let node = &mut nodes[r.index()];
            if node.mark || node.is_dead() {
                continue;
            }
            node.mark = true;
            marked += 1;
            visit(node);
            stack.push(node.low);
            stack.push(node.high);
        }
        marked
    }

    /// Clear the mark bit on every node reachable from `roots`.
    pub(crate) fn unmark_all(&mut self, roots: &[Ref]) {
        let nodes = self.table.nodes_mut();
        let mut stack: Vec<Ref> = roots.to_vec();
        while let Some(r) = stack.pop() {
            if r.is_const() {
                continue;
            }
            let node = &mut nodes[r.index()];
            if !node.mark {
                continue;
            }
            node.mark = false;
            stack.push(node.low);
            stack.push(node.high);
        }
    }

    /// Grow the node table by the configured factor.
    ///
    /// Does nothing when the table already reached its maximum size.
    pub(crate) fn node_resize(&mut self) {
        let old = self.table.size();
        let target = self.config.grown_size(old).min(MAX_NODE_TABLE);
        let new = prime_lte(target);
        if new <= old {
            return;
        }
        self.grow_table_to(new);
    }

    pub(crate) fn grow_table_to(&mut self, new: usize) {
        let start = Instant::now();
        let old = self.table.size();
        self.table.grow(new);
        self.resized = true;

        let elapsed = start.elapsed().as_secs_f64();
        self.gc_stats.resizes += 1;
        self.gc_stats.resize_time += elapsed;
        info!(
            "Resized node table from {} to {} in {:.3}s / {:.3}s total",
            old, new, elapsed, self.gc_stats.resize_time
        );
    }

    /// Manually grow the node table to at least `size` slots.
    ///
    /// Returns the previous size. The table never shrinks.
    pub(crate) fn set_node_table_size(&mut self, size: usize) -> usize {
        let old = self.table.size();
        let mut new = prime_gte(size).min(MAX_NODE_TABLE);
        if self.config.max_node_capacity > 0 {
            new = new.min(prime_lte(self.config.max_node_capacity));
        }
        if new > old {
            self.grow_table_to(new);
            self.check_resize();
        }
        old
    }

    /// Resize the caches after the node table grew, if a cache ratio is set.
    pub(crate) fn check_resize(&mut self) {
        if self.resized && self.config.cache_ratio > 0 {
            let size = self.table.size() / self.config.cache_ratio;
            self.caches.resize(size);
        }
        self.resized = false;
    }
}
