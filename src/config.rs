/// Tuning knobs of a [`BddManager`](crate::manager::BddManager).
///
/// # Examples
///
/// ```
/// use netbdd::config::BddConfig;
/// use netbdd::manager::BddManager;
///
/// let config = BddConfig::default()
///     .with_node_capacity(10_000)
///     .with_cache_capacity(1_000)
///     .with_cache_ratio(4);
/// let mgr = BddManager::with_config(config);
/// assert!(mgr.node_table_size() >= 10_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BddConfig {
    /// Initial number of node slots (default: 1000), rounded up to a prime.
    pub node_capacity: usize,
    /// Initial number of entries of every operation cache (default: 1000), rounded up to a prime.
    pub cache_capacity: usize,
    /// If non-zero, caches are resized to `nodes / cache_ratio` after every node table growth (default: 0).
    pub cache_ratio: usize,
    /// Percentage of free slots below which a collection is followed by growth (default: 20).
    pub min_free_nodes: usize,
    /// Growth multiplier: the table grows by `size * increase_factor`; 0 means doubling (default: 1).
    pub increase_factor: usize,
    /// Upper bound on the node table size; 0 means unbounded (default: 0).
    pub max_node_capacity: usize,
    /// Reset caches after collection instead of cleaning stale entries (default: false).
    pub flush_cache_on_gc: bool,
}

impl Default for BddConfig {
    fn default() -> Self {
        Self {
            node_capacity: 1000,
            cache_capacity: 1000,
            cache_ratio: 0,
            min_free_nodes: 20,
            increase_factor: 1,
            max_node_capacity: 0,
            flush_cache_on_gc: false,
        }
    }
}

impl BddConfig {
    pub fn with_node_capacity(mut self, node_capacity: usize) -> Self {
        self.node_capacity = node_capacity;
        self
    }

    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    pub fn with_cache_ratio(mut self, cache_ratio: usize) -> Self {
        self.cache_ratio = cache_ratio;
        self
    }

    pub fn with_min_free_nodes(mut self, min_free_nodes: usize) -> Self {
        self.min_free_nodes = min_free_nodes.min(100);
        self
    }

    pub fn with_increase_factor(mut self, increase_factor: usize) -> Self {
        self.increase_factor = increase_factor;
        self
    }

    pub fn with_max_node_capacity(mut self, max_node_capacity: usize) -> Self {
        self.max_node_capacity = max_node_capacity;
        self
    }

    pub fn with_flush_cache_on_gc(mut self, flush: bool) -> Self {
        self.flush_cache_on_gc = flush;
        self
    }

    /// Size the table should grow to from `size`, before prime rounding.
    pub(crate) fn grown_size(&self, size: usize) -> usize {
        let grown = if self.increase_factor > 0 {
            size.saturating_add(size.saturating_mul(self.increase_factor))
        } else {
            size.saturating_mul(2)
        };
        if self.max_node_capacity > 0 {
            grown.min(self.max_node_capacity)
        } else {
            grown
        }
    }
}
