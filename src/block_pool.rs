/// Block pool for fixed-width cell rows
///
/// Hands out rows of `T` carved from large pre-sized blocks, so a stage
/// holding millions of group rows performs one allocation per block instead
/// of one per group. Rows never move once allocated: a block is created with
/// its final capacity and only ever extended within it.
///
/// Used by the aggregation engines for their per-group cells and by the
/// pivoting stages for their per-group row chains.

/// Default block budget in bytes (256 KiB)
pub const DEFAULT_BLOCK_BYTES: usize = 256 * 1024;

/// Configuration for a block pool
#[derive(Debug, Clone)]
pub struct BlockPoolConfig {
    /// Target size of one block in bytes
    pub block_bytes: usize,
}

impl Default for BlockPoolConfig {
    fn default() -> Self {
        BlockPoolConfig {
            block_bytes: DEFAULT_BLOCK_BYTES,
        }
    }
}

impl BlockPoolConfig {
    /// Create a pool configuration with a custom block budget
    pub fn new(block_bytes: usize) -> Self {
        BlockPoolConfig { block_bytes }
    }

    /// Number of `T` elements one block holds (at least one)
    pub fn elements_per_block<T>(&self) -> usize {
        (self.block_bytes / std::mem::size_of::<T>().max(1)).max(1)
    }
}

/// Location of a row inside the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowHandle {
    block: u32,
    offset: u32,
    len: u32,
}

impl RowHandle {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Bump allocator of `T` rows over fixed-capacity blocks
#[derive(Debug, Clone)]
pub struct BlockPool<T> {
    blocks: Vec<Vec<T>>,
    per_block: usize,
    config: BlockPoolConfig,
    rows: usize,
}

impl<T: Clone> Default for BlockPool<T> {
    fn default() -> Self {
        Self::new(BlockPoolConfig::default())
    }
}

impl<T: Clone> BlockPool<T> {
    /// Create a new pool with the given configuration
    pub fn new(config: BlockPoolConfig) -> Self {
        let per_block = config.elements_per_block::<T>();
        BlockPool {
            blocks: Vec::new(),
            per_block,
            config,
            rows: 0,
        }
    }

    /// Allocate a row of `width` copies of `fill`
    ///
    /// Rows wider than a block get a dedicated block of their own.
    pub fn alloc_row(&mut self, width: usize, fill: T) -> RowHandle {
        let fits = self
            .blocks
            .last()
            .map(|block| block.capacity() - block.len() >= width)
            .unwrap_or(false);

        if !fits {
            let capacity = self.per_block.max(width);
            self.blocks.push(Vec::with_capacity(capacity));
            tracing::trace!(blocks = self.blocks.len(), capacity, "block pool grown");
        }

        let block_index = self.blocks.len() - 1;
        let block = &mut self.blocks[block_index];
        let offset = block.len();
        block.resize(offset + width, fill);
        self.rows += 1;

        RowHandle {
            block: block_index as u32,
            offset: offset as u32,
            len: width as u32,
        }
    }

    pub fn row(&self, handle: RowHandle) -> &[T] {
        let start = handle.offset as usize;
        &self.blocks[handle.block as usize][start..start + handle.len as usize]
    }

    pub fn row_mut(&mut self, handle: RowHandle) -> &mut [T] {
        let start = handle.offset as usize;
        &mut self.blocks[handle.block as usize][start..start + handle.len as usize]
    }

    /// Release every block at once
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.rows = 0;
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            block_bytes: self.config.block_bytes,
            elements_per_block: self.per_block,
            blocks: self.blocks.len(),
            rows: self.rows,
            elements_used: self.blocks.iter().map(Vec::len).sum(),
            elements_reserved: self.blocks.iter().map(Vec::capacity).sum(),
        }
    }
}

/// Pool statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Configured block budget in bytes
    pub block_bytes: usize,
    /// Elements per regular block
    pub elements_per_block: usize,
    /// Blocks currently held
    pub blocks: usize,
    /// Rows handed out since the last clear
    pub rows: usize,
    /// Elements occupied by rows
    pub elements_used: usize,
    /// Elements reserved across all blocks
    pub elements_reserved: usize,
}

impl PoolStats {
    /// Calculate pool utilization (percentage of reserved elements in use)
    pub fn utilization(&self) -> f64 {
        if self.elements_reserved == 0 {
            return 0.0;
        }
        (self.elements_used as f64 / self.elements_reserved as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_independent() {
        let mut pool: BlockPool<u64> = BlockPool::new(BlockPoolConfig::new(64));
        let a = pool.alloc_row(3, 0);
        let b = pool.alloc_row(3, 0);
        pool.row_mut(a).copy_from_slice(&[1, 2, 3]);
        pool.row_mut(b)[1] = 9;
        assert_eq!(pool.row(a), &[1, 2, 3]);
        assert_eq!(pool.row(b), &[0, 9, 0]);
    }

    #[test]
    fn test_new_block_when_exhausted() {
        // 64 bytes / 8 bytes = 8 elements per block
        let mut pool: BlockPool<u64> = BlockPool::new(BlockPoolConfig::new(64));
        assert_eq!(pool.stats().elements_per_block, 8);
        for _ in 0..4 {
            pool.alloc_row(3, 0);
        }
        // 3+3 fill block one, 3+3 fill block two
        let stats = pool.stats();
        assert_eq!(stats.blocks, 2);
        assert_eq!(stats.rows, 4);
        assert_eq!(stats.elements_used, 12);
    }

    #[test]
    fn test_oversized_row_gets_dedicated_block() {
        let mut pool: BlockPool<u64> = BlockPool::new(BlockPoolConfig::new(64));
        let wide = pool.alloc_row(20, 7);
        assert_eq!(pool.row(wide).len(), 20);
        assert!(pool.row(wide).iter().all(|&v| v == 7));
        assert_eq!(pool.stats().blocks, 1);
    }

    #[test]
    fn test_rows_survive_many_blocks() {
        let mut pool: BlockPool<u32> = BlockPool::new(BlockPoolConfig::new(16));
        let handles: Vec<RowHandle> = (0..100u32).map(|i| pool.alloc_row(2, i)).collect();
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(pool.row(*handle), &[i as u32, i as u32]);
        }
    }

    #[test]
    fn test_clear_releases_blocks() {
        let mut pool: BlockPool<u8> = BlockPool::default();
        pool.alloc_row(10, 1);
        pool.clear();
        let stats = pool.stats();
        assert_eq!(stats.blocks, 0);
        assert_eq!(stats.rows, 0);
        assert_eq!(stats.utilization(), 0.0);
    }

    #[test]
    fn test_zero_width_row() {
        let mut pool: BlockPool<u8> = BlockPool::default();
        let empty = pool.alloc_row(0, 0);
        assert!(empty.is_empty());
        assert!(pool.row(empty).is_empty());
    }

    #[test]
    fn test_utilization() {
        let mut pool: BlockPool<u64> = BlockPool::new(BlockPoolConfig::new(80));
        pool.alloc_row(5, 0);
        assert_eq!(pool.stats().utilization(), 50.0);
    }
}
