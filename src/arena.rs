//! Append-only byte arena for tokens and composite group keys
//!
//! Tokens are stored NUL-terminated. A composite key is a run of tokens
//! closed by [`KEY_SENTINEL`]. Everything handed out is an offset into the
//! owned buffer, never an address, so growth cannot invalidate a key.
//!
//! ```text
//! offset: 0   1   2   3   4   5   6
//!         'e' 'u' \0  'q' '1' \0  \x03     <- key ("eu", "q1")
//! ```

use std::hash::{Hash, Hasher};

use crate::error::{PassError, Result};

/// Terminates every stored token
pub const TOKEN_TERMINATOR: u8 = 0x00;

/// Terminates a composite key (ASCII ETX)
pub const KEY_SENTINEL: u8 = 0x03;

/// Separates physically distinct storage blocks (ASCII EOT)
pub const BLOCK_TERMINATOR: u8 = 0x04;

/// Initial arena capacity when none is requested
pub const DEFAULT_ARENA_CAPACITY: usize = 4096;

/// Reject tokens carrying one of the reserved delimiter bytes
pub fn check_token(token: &[u8], column: usize) -> Result<()> {
    match token
        .iter()
        .find(|&&b| b == TOKEN_TERMINATOR || b == KEY_SENTINEL || b == BLOCK_TERMINATOR)
    {
        Some(&byte) => Err(PassError::ReservedByte { byte, column }),
        None => Ok(()),
    }
}

/// Capacity after a growth event: double, or fit the request if larger
pub fn grown_capacity(capacity: usize, used: usize, additional: usize) -> usize {
    let needed = used + additional;
    let doubled = capacity.max(1).saturating_mul(2);
    doubled.max(needed)
}

/// FNV-1a over a byte run
pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hasher = fnv::FnvHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

/// Location of a single stored token (terminator excluded)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: u32,
    pub len: u32,
}

/// Location of a composite key (sentinel included)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRef {
    pub offset: u32,
    pub len: u32,
}

/// Growable byte buffer with an explicit doubling policy
#[derive(Debug, Clone)]
pub struct ByteArena {
    buf: Vec<u8>,
    capacity: usize,
    growths: usize,
}

impl Default for ByteArena {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ARENA_CAPACITY)
    }
}

impl ByteArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            growths: 0,
        }
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Logical capacity under the growth policy
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of growth events since creation or the last `clear`
    pub fn growths(&self) -> usize {
        self.growths
    }

    fn reserve(&mut self, additional: usize) -> Result<()> {
        let used = self.buf.len();
        if used + additional <= self.capacity {
            return Ok(());
        }
        let capacity = grown_capacity(self.capacity, used, additional);
        if capacity > u32::MAX as usize {
            return Err(PassError::Configuration(format!(
                "arena would grow to {} bytes, beyond the addressable limit",
                capacity
            )));
        }
        self.buf.reserve_exact(capacity - used);
        tracing::trace!(from = self.capacity, to = capacity, "arena grown");
        self.capacity = capacity;
        self.growths += 1;
        Ok(())
    }

    /// Append a token and its terminator
    pub fn push_token(&mut self, token: &[u8]) -> Result<Span> {
        self.reserve(token.len() + 1)?;
        let offset = self.buf.len() as u32;
        self.buf.extend_from_slice(token);
        self.buf.push(TOKEN_TERMINATOR);
        Ok(Span {
            offset,
            len: token.len() as u32,
        })
    }

    /// Append the key sentinel, closing the key that began at `start`
    pub fn close_key(&mut self, start: usize) -> Result<KeyRef> {
        self.reserve(1)?;
        self.buf.push(KEY_SENTINEL);
        Ok(KeyRef {
            offset: start as u32,
            len: (self.buf.len() - start) as u32,
        })
    }

    /// Drop everything written at or after `offset`
    pub fn truncate(&mut self, offset: usize) {
        self.buf.truncate(offset);
    }

    pub fn token(&self, span: Span) -> &[u8] {
        let start = span.offset as usize;
        &self.buf[start..start + span.len as usize]
    }

    pub fn key(&self, key: KeyRef) -> GroupKey<'_> {
        let start = key.offset as usize;
        GroupKey::new(&self.buf[start..start + key.len as usize])
    }

    /// Raw content, terminators included
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Forget all content; capacity is kept for reuse
    pub fn clear(&mut self) {
        self.buf.clear();
        self.growths = 0;
    }
}

/// Borrowed view of a sentinel-terminated composite key
///
/// Hashing, equality and ordering look only at the bytes before the
/// sentinel, so a key can be compared straight out of the arena.
#[derive(Debug, Clone, Copy)]
pub struct GroupKey<'a> {
    content: &'a [u8],
}

impl<'a> GroupKey<'a> {
    /// Wrap a byte run; content stops at the first sentinel if there is one
    pub fn new(bytes: &'a [u8]) -> Self {
        let end = bytes
            .iter()
            .position(|&b| b == KEY_SENTINEL)
            .unwrap_or(bytes.len());
        Self {
            content: &bytes[..end],
        }
    }

    /// Bytes before the sentinel, token terminators included
    pub fn content(&self) -> &'a [u8] {
        self.content
    }

    pub fn fnv_hash(&self) -> u64 {
        fnv1a(self.content)
    }

    /// The individual tokens the key was built from
    pub fn parts(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        let content = self.content;
        let body = content
            .strip_suffix(&[TOKEN_TERMINATOR])
            .unwrap_or(content);
        let empty = content.is_empty();
        body.split(|&b| b == TOKEN_TERMINATOR)
            .filter(move |_| !empty)
    }
}

impl PartialEq for GroupKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content
    }
}

impl Eq for GroupKey<'_> {}

impl PartialOrd for GroupKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.content.cmp(other.content)
    }
}

impl Hash for GroupKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(self.content);
    }
}
