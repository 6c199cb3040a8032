//! Discovery-ordered interning of composite keys
//!
//! Keys are assembled part by part at the tail of a [`ByteArena`]. On commit
//! the pending bytes are looked up through an FNV-1a bucket index; a hit
//! rolls the arena back, a miss keeps the bytes and assigns the next id.
//! Ids are dense and follow first-seen order, so iterating `0..len()` is
//! discovery order.

use std::collections::HashMap;

use fnv::FnvBuildHasher;

use crate::arena::{ByteArena, GroupKey, KeyRef};
use crate::error::Result;

/// Dense index of a group, in discovery order
pub type GroupId = usize;

const NO_NEXT: u32 = u32::MAX;

#[derive(Debug, Clone, Default)]
pub struct GroupTable {
    arena: ByteArena,
    keys: Vec<KeyRef>,
    /// hash -> most recently inserted id with that hash
    heads: HashMap<u64, u32, FnvBuildHasher>,
    /// per id: previous id in the same hash chain
    chain: Vec<u32>,
    pending: Option<usize>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_arena_capacity(capacity: usize) -> Self {
        Self {
            arena: ByteArena::with_capacity(capacity),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Append one token to the key under construction
    pub fn push_part(&mut self, token: &[u8]) -> Result<()> {
        if self.pending.is_none() {
            self.pending = Some(self.arena.len());
        }
        self.arena.push_token(token)?;
        Ok(())
    }

    /// Close the pending key and intern it
    ///
    /// Returns the group id and whether the key was seen for the first time.
    /// A commit with no parts pushed interns the empty key.
    pub fn commit(&mut self) -> Result<(GroupId, bool)> {
        let start = self.pending.take().unwrap_or(self.arena.len());
        let key_ref = self.arena.close_key(start)?;
        let hash = self.arena.key(key_ref).fnv_hash();

        if let Some(id) = self.find(hash, key_ref) {
            self.arena.truncate(start);
            return Ok((id, false));
        }

        let id = self.keys.len();
        let previous = self.heads.insert(hash, id as u32).unwrap_or(NO_NEXT);
        self.chain.push(previous);
        self.keys.push(key_ref);
        Ok((id, true))
    }

    /// Discard a partially built key
    pub fn abandon(&mut self) {
        if let Some(start) = self.pending.take() {
            self.arena.truncate(start);
        }
    }

    fn find(&self, hash: u64, candidate: KeyRef) -> Option<GroupId> {
        let wanted = self.arena.key(candidate);
        let mut cursor = *self.heads.get(&hash)?;
        while cursor != NO_NEXT {
            let id = cursor as usize;
            if self.arena.key(self.keys[id]) == wanted {
                return Some(id);
            }
            cursor = self.chain[id];
        }
        None
    }

    /// Look up an already-built key without inserting it
    pub fn get(&self, key: GroupKey<'_>) -> Option<GroupId> {
        let mut cursor = *self.heads.get(&key.fnv_hash())?;
        while cursor != NO_NEXT {
            let id = cursor as usize;
            if self.arena.key(self.keys[id]) == key {
                return Some(id);
            }
            cursor = self.chain[id];
        }
        None
    }

    pub fn key(&self, id: GroupId) -> GroupKey<'_> {
        self.arena.key(self.keys[id])
    }

    /// Keys in discovery order
    pub fn iter(&self) -> impl Iterator<Item = (GroupId, GroupKey<'_>)> + '_ {
        self.keys
            .iter()
            .enumerate()
            .map(move |(id, &key)| (id, self.arena.key(key)))
    }

    pub fn arena_bytes(&self) -> usize {
        self.arena.len()
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.keys.clear();
        self.heads.clear();
        self.chain.clear();
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intern(table: &mut GroupTable, parts: &[&str]) -> (GroupId, bool) {
        for part in parts {
            table.push_part(part.as_bytes()).unwrap();
        }
        table.commit().unwrap()
    }

    #[test]
    fn test_ids_follow_discovery_order() {
        let mut table = GroupTable::new();
        assert_eq!(intern(&mut table, &["zeta"]), (0, true));
        assert_eq!(intern(&mut table, &["alpha"]), (1, true));
        assert_eq!(intern(&mut table, &["zeta"]), (0, false));
        assert_eq!(intern(&mut table, &["mid"]), (2, true));

        let order: Vec<Vec<u8>> = table
            .iter()
            .map(|(_, key)| key.parts().next().unwrap().to_vec())
            .collect();
        assert_eq!(order, vec![b"zeta".to_vec(), b"alpha".to_vec(), b"mid".to_vec()]);
    }

    #[test]
    fn test_duplicate_key_rolls_back_arena() {
        let mut table = GroupTable::new();
        intern(&mut table, &["a", "b"]);
        let used = table.arena_bytes();
        intern(&mut table, &["a", "b"]);
        assert_eq!(table.arena_bytes(), used);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_multi_part_keys_are_not_concatenations() {
        let mut table = GroupTable::new();
        let (ab, _) = intern(&mut table, &["a", "b"]);
        let (a_b, fresh) = intern(&mut table, &["ab"]);
        assert!(fresh);
        assert_ne!(ab, a_b);
    }

    #[test]
    fn test_empty_key() {
        let mut table = GroupTable::new();
        assert_eq!(table.commit().unwrap(), (0, true));
        assert_eq!(table.commit().unwrap(), (0, false));
        assert_eq!(table.key(0).parts().count(), 0);
    }

    #[test]
    fn test_get_and_abandon() {
        let mut table = GroupTable::new();
        intern(&mut table, &["x"]);
        table.push_part(b"partial").unwrap();
        table.abandon();
        let (id, fresh) = intern(&mut table, &["y"]);
        assert_eq!((id, fresh), (1, true));
        assert_eq!(table.key(1).parts().next(), Some(&b"y"[..]));

        let mut probe = ByteArena::new();
        probe.push_token(b"x").unwrap();
        let key = probe.close_key(0).unwrap();
        assert_eq!(table.get(probe.key(key)), Some(0));
    }

    #[test]
    fn test_many_keys_survive_growth() {
        let mut table = GroupTable::with_arena_capacity(8);
        for i in 0..2000 {
            let name = format!("group-{}", i);
            assert_eq!(intern(&mut table, &[&name, "tail"]), (i, true));
        }
        for i in (0..2000).step_by(97) {
            let name = format!("group-{}", i);
            assert_eq!(intern(&mut table, &[&name, "tail"]), (i, false));
        }
    }

    #[test]
    fn test_clear_resets_ids() {
        let mut table = GroupTable::new();
        intern(&mut table, &["a"]);
        table.clear();
        assert!(table.is_empty());
        assert_eq!(intern(&mut table, &["b"]), (0, true));
    }
}
