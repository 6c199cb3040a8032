// Buffered cells of the splitter and the row joiner
//
// Every buffered input row becomes one record: its values are written back
// to back into one shared arena, and the record notes the slot (split value
// or source) they belong to. Records of a group are chained in arrival
// order; the chain ends of every group sit in a block pool. Buffering a row
// therefore never allocates by itself: arena, record list and pool all
// grow in amortized steps.

use crate::arena::{ByteArena, TOKEN_TERMINATOR};
use crate::block_pool::{BlockPool, BlockPoolConfig, PoolStats, RowHandle};
use crate::error::{PassError, Result};

const NO_RECORD: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct Record {
    slot: u32,
    /// Arena offset of the first value
    values: u32,
    count: u32,
    next: u32,
}

#[derive(Debug, Clone, Copy)]
struct Chain {
    head: u32,
    tail: u32,
}

const EMPTY_CHAIN: Chain = Chain {
    head: NO_RECORD,
    tail: NO_RECORD,
};

/// Slot-tagged value rows, chained per group
#[derive(Debug)]
pub struct CellStore {
    values: ByteArena,
    records: Vec<Record>,
    chains: BlockPool<Chain>,
    groups: Vec<RowHandle>,
    /// Record per (line, slot) of the group last arranged
    grid: Vec<u32>,
    /// Records seen per slot while arranging
    seen: Vec<u32>,
    slots: usize,
}

impl Default for CellStore {
    fn default() -> Self {
        Self::new(BlockPoolConfig::default())
    }
}

impl CellStore {
    pub fn new(config: BlockPoolConfig) -> Self {
        Self {
            values: ByteArena::new(),
            records: Vec::new(),
            chains: BlockPool::new(config),
            groups: Vec::new(),
            grid: Vec::new(),
            seen: Vec::new(),
            slots: 0,
        }
    }

    /// Buffered rows
    pub fn records(&self) -> usize {
        self.records.len()
    }

    /// Bytes of buffered values, terminators included
    pub fn value_bytes(&self) -> usize {
        self.values.len()
    }

    /// Growth events of the value arena
    pub fn arena_growths(&self) -> usize {
        self.values.growths()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.chains.stats()
    }

    /// Append one row of `values` for `slot` to the chain of `group`
    ///
    /// Group ids are dense: a group is either known or the next new one.
    pub fn push<'a, I>(&mut self, group: usize, slot: usize, values: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        if self.records.len() >= NO_RECORD as usize {
            return Err(PassError::Configuration(format!(
                "cannot buffer more than {} rows",
                NO_RECORD
            )));
        }
        if group == self.groups.len() {
            let handle = self.chains.alloc_row(1, EMPTY_CHAIN);
            self.groups.push(handle);
        }

        let start = self.values.len() as u32;
        let mut count = 0u32;
        for value in values {
            self.values.push_token(value)?;
            count += 1;
        }

        let index = self.records.len() as u32;
        self.records.push(Record {
            slot: slot as u32,
            values: start,
            count,
            next: NO_RECORD,
        });
        let chain = &mut self.chains.row_mut(self.groups[group])[0];
        if chain.tail == NO_RECORD {
            chain.head = index;
        } else {
            self.records[chain.tail as usize].next = index;
        }
        chain.tail = index;
        Ok(())
    }

    /// Lay the records of `group` out as output lines over `slots` slots
    ///
    /// The n-th record of a slot lands on line n. Returns the number of
    /// lines; read them back with [`cell`](Self::cell).
    pub fn arrange(&mut self, group: usize, slots: usize) -> usize {
        self.slots = slots;
        self.seen.clear();
        self.seen.resize(slots, 0);
        let head = match self.groups.get(group) {
            Some(&handle) => self.chains.row(handle)[0].head,
            None => NO_RECORD,
        };

        let mut depth = 0u32;
        let mut index = head;
        while index != NO_RECORD {
            let record = self.records[index as usize];
            let seen = &mut self.seen[record.slot as usize];
            *seen += 1;
            depth = depth.max(*seen);
            index = record.next;
        }

        self.grid.clear();
        self.grid.resize(depth as usize * slots, NO_RECORD);
        self.seen.iter_mut().for_each(|seen| *seen = 0);
        let mut index = head;
        while index != NO_RECORD {
            let record = self.records[index as usize];
            let slot = record.slot as usize;
            let line = self.seen[slot] as usize;
            self.grid[line * slots + slot] = index;
            self.seen[slot] += 1;
            index = record.next;
        }
        depth as usize
    }

    /// Values on `line` of `slot` in the last arranged group
    pub fn cell(&self, line: usize, slot: usize) -> Option<impl Iterator<Item = &[u8]> + '_> {
        let index = *self.grid.get(line * self.slots + slot)?;
        if index == NO_RECORD {
            return None;
        }
        let record = self.records[index as usize];
        let bytes = &self.values.as_bytes()[record.values as usize..];
        Some(
            bytes
                .split(|&b| b == TOKEN_TERMINATOR)
                .take(record.count as usize),
        )
    }

    /// Forget every record; buffers are kept for reuse
    pub fn clear(&mut self) {
        self.values.clear();
        self.records.clear();
        self.chains.clear();
        self.groups.clear();
        self.grid.clear();
        self.seen.clear();
        self.slots = 0;
    }
}
