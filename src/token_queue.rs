//! FIFO of NUL-terminated tokens stored in chunked blocks
//!
//! Cloning a queue is O(1): both copies share one block list. The first
//! push or pop on either copy afterwards deep-copies the blocks
//! (`Rc::make_mut`), so copies never observe each other's mutations.
//! Blocks drained by `pop` go back to a [`BlockRecycler`] that can be shared
//! by many queues.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::arena::TOKEN_TERMINATOR;
use crate::error::{PassError, Result};

/// Default block size in bytes
pub const DEFAULT_QUEUE_BLOCK_BYTES: usize = 8 * 1024;

/// Default number of free blocks a recycler retains
pub const DEFAULT_RECYCLER_LIMIT: usize = 64;

/// Shared pool of drained queue blocks
#[derive(Debug, Clone)]
pub struct BlockRecycler {
    free: Rc<RefCell<Vec<Vec<u8>>>>,
    limit: usize,
}

impl Default for BlockRecycler {
    fn default() -> Self {
        Self::new(DEFAULT_RECYCLER_LIMIT)
    }
}

impl BlockRecycler {
    pub fn new(limit: usize) -> Self {
        Self {
            free: Rc::new(RefCell::new(Vec::new())),
            limit,
        }
    }

    /// Blocks currently waiting for reuse
    pub fn available(&self) -> usize {
        self.free.borrow().len()
    }

    fn take(&self, capacity: usize) -> Vec<u8> {
        let mut free = self.free.borrow_mut();
        match free.iter().position(|block| block.capacity() >= capacity) {
            Some(index) => {
                let mut block = free.swap_remove(index);
                block.clear();
                block
            }
            None => Vec::with_capacity(capacity),
        }
    }

    fn give(&self, block: Vec<u8>) {
        let mut free = self.free.borrow_mut();
        if free.len() < self.limit {
            free.push(block);
        }
    }
}

/// Copy-on-write queue of byte strings
#[derive(Debug, Clone)]
pub struct TokenQueue {
    blocks: Rc<VecDeque<Vec<u8>>>,
    /// Read offset into the front block
    head: usize,
    len: usize,
    block_bytes: usize,
    recycler: BlockRecycler,
}

impl Default for TokenQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenQueue {
    pub fn new() -> Self {
        Self::with_recycler(DEFAULT_QUEUE_BLOCK_BYTES, BlockRecycler::default())
    }

    pub fn with_block_size(block_bytes: usize) -> Self {
        Self::with_recycler(block_bytes, BlockRecycler::default())
    }

    /// Queue drawing its blocks from (and returning them to) `recycler`
    pub fn with_recycler(block_bytes: usize, recycler: BlockRecycler) -> Self {
        Self {
            blocks: Rc::new(VecDeque::new()),
            head: 0,
            len: 0,
            block_bytes: block_bytes.max(1),
            recycler,
        }
    }

    /// Number of queued tokens
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Blocks currently held
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// True while another copy still shares this queue's blocks
    pub fn is_shared(&self) -> bool {
        Rc::strong_count(&self.blocks) > 1
    }

    /// Append a token
    pub fn push(&mut self, token: &[u8]) -> Result<()> {
        if let Some(offset) = token.iter().position(|&b| b == TOKEN_TERMINATOR) {
            return Err(PassError::QueuedTerminator { offset });
        }

        let needed = token.len() + 1;
        let capacity = self.block_bytes.max(needed);
        let recycler = self.recycler.clone();
        let blocks = Rc::make_mut(&mut self.blocks);

        let fits = blocks
            .back()
            .map(|block| block.capacity() - block.len() >= needed)
            .unwrap_or(false);
        if !fits {
            blocks.push_back(recycler.take(capacity));
        }

        if let Some(block) = blocks.back_mut() {
            block.extend_from_slice(token);
            block.push(TOKEN_TERMINATOR);
        }
        self.len += 1;
        Ok(())
    }

    /// Oldest token, if any
    pub fn front(&self) -> Option<&[u8]> {
        let block = self.blocks.front()?;
        let rest = &block[self.head..];
        let end = rest.iter().position(|&b| b == TOKEN_TERMINATOR)?;
        Some(&rest[..end])
    }

    /// Advance past the oldest token; returns false if the queue was empty
    pub fn pop(&mut self) -> bool {
        let Some(token_len) = self.front().map(<[u8]>::len) else {
            return false;
        };

        let blocks = Rc::make_mut(&mut self.blocks);
        self.head += token_len + 1;
        self.len -= 1;

        let drained = blocks
            .front()
            .map(|block| self.head >= block.len())
            .unwrap_or(false);
        if drained {
            if let Some(block) = blocks.pop_front() {
                self.recycler.give(block);
            }
            self.head = 0;
        }
        true
    }

    /// Copy the oldest token into `out` (replacing its contents) and pop it
    pub fn pop_into(&mut self, out: &mut Vec<u8>) -> bool {
        match self.front() {
            Some(token) => {
                out.clear();
                out.extend_from_slice(token);
            }
            None => return false,
        }
        self.pop()
    }

    /// Remove and return the oldest token
    pub fn pop_owned(&mut self) -> Option<Vec<u8>> {
        let token = self.front()?.to_vec();
        self.pop();
        Some(token)
    }

    /// Queued tokens, oldest first
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            blocks: &self.blocks,
            block: 0,
            offset: self.head,
            remaining: self.len,
        }
    }

    /// Drop every queued token, returning blocks to the recycler
    pub fn clear(&mut self) {
        if self.is_shared() {
            self.blocks = Rc::new(VecDeque::new());
        }
        if let Some(blocks) = Rc::get_mut(&mut self.blocks) {
            for block in blocks.drain(..) {
                self.recycler.give(block);
            }
        }
        self.head = 0;
        self.len = 0;
    }
}

impl<'a> IntoIterator for &'a TokenQueue {
    type Item = &'a [u8];
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over queued tokens
pub struct Iter<'a> {
    blocks: &'a VecDeque<Vec<u8>>,
    block: usize,
    offset: usize,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        loop {
            let block = self.blocks.get(self.block)?;
            if self.offset < block.len() {
                let rest = &block[self.offset..];
                let end = rest.iter().position(|&b| b == TOKEN_TERMINATOR)?;
                self.offset += end + 1;
                self.remaining -= 1;
                return Some(&rest[..end]);
            }
            self.block += 1;
            self.offset = 0;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut TokenQueue) -> Vec<Vec<u8>> {
        std::iter::from_fn(|| queue.pop_owned()).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = TokenQueue::new();
        for token in ["a", "", "ccc"] {
            queue.push(token.as_bytes()).unwrap();
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.front(), Some(&b"a"[..]));
        assert_eq!(drain(&mut queue), vec![b"a".to_vec(), b"".to_vec(), b"ccc".to_vec()]);
        assert!(queue.is_empty());
        assert!(!queue.pop());
    }

    #[test]
    fn test_small_blocks_chain() {
        let mut queue = TokenQueue::with_block_size(8);
        for i in 0..20 {
            queue.push(format!("t{}", i).as_bytes()).unwrap();
        }
        assert!(queue.block_count() > 1);
        let collected: Vec<&[u8]> = queue.iter().collect();
        assert_eq!(collected.len(), 20);
        assert_eq!(collected[13], b"t13");
    }

    #[test]
    fn test_oversized_token_gets_own_block() {
        let mut queue = TokenQueue::with_block_size(4);
        let big = vec![b'x'; 100];
        queue.push(b"a").unwrap();
        queue.push(&big).unwrap();
        queue.push(b"b").unwrap();
        assert_eq!(queue.pop_owned(), Some(b"a".to_vec()));
        assert_eq!(queue.pop_owned(), Some(big));
        assert_eq!(queue.pop_owned(), Some(b"b".to_vec()));
    }

    #[test]
    fn test_drained_blocks_are_recycled() {
        let recycler = BlockRecycler::default();
        let mut queue = TokenQueue::with_recycler(4, recycler.clone());
        queue.push(b"abc").unwrap();
        queue.push(b"def").unwrap();
        assert_eq!(queue.block_count(), 2);
        queue.pop();
        assert_eq!(recycler.available(), 1);
        assert_eq!(queue.block_count(), 1);

        let mut other = TokenQueue::with_recycler(4, recycler.clone());
        other.push(b"ghi").unwrap();
        assert_eq!(recycler.available(), 0);
    }

    #[test]
    fn test_clone_is_copy_on_write() {
        let mut original = TokenQueue::new();
        original.push(b"one").unwrap();
        original.push(b"two").unwrap();

        let mut copy = original.clone();
        assert!(original.is_shared());
        assert!(copy.is_shared());

        copy.push(b"three").unwrap();
        assert!(!original.is_shared());
        assert!(!copy.is_shared());
        assert_eq!(original.len(), 2);
        assert_eq!(copy.len(), 3);

        original.pop();
        assert_eq!(original.front(), Some(&b"two"[..]));
        assert_eq!(copy.front(), Some(&b"one"[..]));
        assert_eq!(
            copy.iter().collect::<Vec<_>>(),
            vec![&b"one"[..], &b"two"[..], &b"three"[..]]
        );
    }

    #[test]
    fn test_pop_on_copy_leaves_original_intact() {
        let mut original = TokenQueue::new();
        original.push(b"keep").unwrap();
        let mut copy = original.clone();
        assert_eq!(copy.pop_owned(), Some(b"keep".to_vec()));
        assert_eq!(original.front(), Some(&b"keep"[..]));
    }

    #[test]
    fn test_rejects_embedded_terminator() {
        let mut queue = TokenQueue::new();
        let err = queue.push(b"ab\0c").unwrap_err();
        assert!(matches!(err, PassError::QueuedTerminator { offset: 2 }));
        assert_eq!(err.to_string(), "queued token contains a NUL byte at offset 2");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clear_and_reuse() {
        let mut queue = TokenQueue::with_block_size(4);
        queue.push(b"abc").unwrap();
        queue.push(b"def").unwrap();
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.iter().count(), 0);
        queue.push(b"x").unwrap();
        assert_eq!(queue.pop_owned(), Some(b"x".to_vec()));
    }

    #[test]
    fn test_pop_into_reuses_buffer() {
        let mut queue = TokenQueue::new();
        queue.push(b"first").unwrap();
        let mut buf = b"stale content".to_vec();
        assert!(queue.pop_into(&mut buf));
        assert_eq!(buf, b"first");
        assert!(!queue.pop_into(&mut buf));
    }
}
