use bytes::{Buf, BufMut};
use crate::core::error::{Error, Result};
use crate::core::types::{HashEntry, StringLocation};

/// `{ u64 hash, u64 offset_or_bitoffset, u32 length }`, little-endian
pub const ENTRY_RECORD_SIZE: usize = 20;

const NIL: u32 = u32::MAX;

#[derive(Debug, Clone)]
struct IndexNode {
    entry: HashEntry,
    left: u32,
    right: u32,
    height: u8,
}

/// Ordered index over 64-bit hashes (AVL tree in a flat node arena).
/// Nodes are addressed by `u32` slot, so the arena can grow and move freely.
#[derive(Debug, Clone)]
pub struct HashIndex {
    nodes: Vec<IndexNode>,
    root: u32,
}

impl Default for HashIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl HashIndex {
    pub fn new() -> Self {
        HashIndex {
            nodes: Vec::new(),
            root: NIL,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        HashIndex {
            nodes: Vec::with_capacity(capacity),
            root: NIL,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert `hash` unless already present (first writer wins).
    /// Returns whether the entry was added.
    pub fn insert(&mut self, hash: u64, location: StringLocation) -> bool {
        if self.contains(hash) {
            return false;
        }

        let slot = self.nodes.len() as u32;
        self.nodes.push(IndexNode {
            entry: HashEntry::new(hash, location),
            left: NIL,
            right: NIL,
            height: 1,
        });
        self.root = self.insert_at(self.root, slot);
        true
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.find(hash).is_some()
    }

    /// Exact match only
    pub fn search(&self, hash: u64) -> Option<StringLocation> {
        self.find(hash).map(|slot| self.nodes[slot as usize].entry.location)
    }

    pub fn get(&self, hash: u64) -> Option<&HashEntry> {
        self.find(hash).map(|slot| &self.nodes[slot as usize].entry)
    }

    /// Entries in ascending hash order
    pub fn iter(&self) -> Iter<'_> {
        let mut iter = Iter {
            index: self,
            stack: Vec::with_capacity(self.height() as usize),
        };
        iter.push_left(self.root);
        iter
    }

    /// Tree height, 0 for an empty index
    pub fn height(&self) -> u8 {
        self.node_height(self.root)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = NIL;
    }

    /// Byte length of the serialized index (count word included)
    pub fn encoded_len(&self) -> usize {
        4 + self.nodes.len() * ENTRY_RECORD_SIZE
    }

    /// Node count followed by every entry in ascending hash order
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_le(self.nodes.len() as u32);
        for entry in self.iter() {
            let (offset, length) = entry.location.raw();
            buf.put_u64_le(entry.hash);
            buf.put_u64_le(offset);
            buf.put_u32_le(length);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf
    }

    /// Decode a node count plus its records, consuming exactly that much of `buf`.
    /// `compressed` selects how record offsets are interpreted.
    pub fn decode<B: Buf>(buf: &mut B, compressed: bool) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(Error::format("index node count truncated"));
        }
        let count = buf.get_u32_le() as usize;
        Self::decode_records(buf, count, compressed)
    }

    /// Decode a standalone serialized index; trailing bytes are an error
    pub fn from_bytes(mut bytes: &[u8], compressed: bool) -> Result<Self> {
        let index = Self::decode(&mut bytes, compressed)?;
        if bytes.has_remaining() {
            return Err(Error::format(format!(
                "{} trailing bytes after {} index entries",
                bytes.remaining(),
                index.len()
            )));
        }
        Ok(index)
    }

    /// Decode `count` records (count word already consumed)
    pub fn decode_records<B: Buf>(buf: &mut B, count: usize, compressed: bool) -> Result<Self> {
        let needed = count
            .checked_mul(ENTRY_RECORD_SIZE)
            .ok_or_else(|| Error::format(format!("index node count {} overflows", count)))?;
        if buf.remaining() < needed {
            return Err(Error::format(format!(
                "index declares {} entries ({} bytes) but only {} bytes are available",
                count,
                needed,
                buf.remaining()
            )));
        }

        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let hash = buf.get_u64_le();
            let offset = buf.get_u64_le();
            let length = buf.get_u32_le();
            entries.push(HashEntry::new(hash, StringLocation::from_raw(compressed, offset, length)));
        }

        Ok(Self::from_entries(entries))
    }

    /// Build from entries. A strictly ascending run is linked into a balanced
    /// tree directly; anything else goes through `insert`.
    pub fn from_entries(entries: Vec<HashEntry>) -> Self {
        let sorted = entries.windows(2).all(|pair| pair[0].hash < pair[1].hash);

        if !sorted {
            let mut index = HashIndex::with_capacity(entries.len());
            for entry in entries {
                index.insert(entry.hash, entry.location);
            }
            return index;
        }

        let mut index = HashIndex {
            nodes: entries
                .into_iter()
                .map(|entry| IndexNode { entry, left: NIL, right: NIL, height: 1 })
                .collect(),
            root: NIL,
        };
        index.root = index.link_sorted(0, index.nodes.len());
        index
    }

    fn find(&self, hash: u64) -> Option<u32> {
        let mut slot = self.root;
        while slot != NIL {
            let node = &self.nodes[slot as usize];
            if hash == node.entry.hash {
                return Some(slot);
            }
            slot = if hash < node.entry.hash { node.left } else { node.right };
        }
        None
    }

    fn link_sorted(&mut self, lo: usize, hi: usize) -> u32 {
        if lo >= hi {
            return NIL;
        }
        let mid = lo + (hi - lo) / 2;
        let left = self.link_sorted(lo, mid);
        let right = self.link_sorted(mid + 1, hi);

        let node = &mut self.nodes[mid];
        node.left = left;
        node.right = right;
        self.update_height(mid as u32);
        mid as u32
    }

    fn insert_at(&mut self, slot: u32, new: u32) -> u32 {
        if slot == NIL {
            return new;
        }

        let hash = self.nodes[new as usize].entry.hash;
        if hash < self.nodes[slot as usize].entry.hash {
            let left = self.insert_at(self.nodes[slot as usize].left, new);
            self.nodes[slot as usize].left = left;
        } else {
            let right = self.insert_at(self.nodes[slot as usize].right, new);
            self.nodes[slot as usize].right = right;
        }

        self.rebalance(slot)
    }

    fn node_height(&self, slot: u32) -> u8 {
        if slot == NIL { 0 } else { self.nodes[slot as usize].height }
    }

    fn update_height(&mut self, slot: u32) {
        let node = &self.nodes[slot as usize];
        let height = 1 + self.node_height(node.left).max(self.node_height(node.right));
        self.nodes[slot as usize].height = height;
    }

    fn balance_factor(&self, slot: u32) -> i32 {
        let node = &self.nodes[slot as usize];
        self.node_height(node.left) as i32 - self.node_height(node.right) as i32
    }

    fn rotate_right(&mut self, slot: u32) -> u32 {
        let pivot = self.nodes[slot as usize].left;
        self.nodes[slot as usize].left = self.nodes[pivot as usize].right;
        self.nodes[pivot as usize].right = slot;
        self.update_height(slot);
        self.update_height(pivot);
        pivot
    }

    fn rotate_left(&mut self, slot: u32) -> u32 {
        let pivot = self.nodes[slot as usize].right;
        self.nodes[slot as usize].right = self.nodes[pivot as usize].left;
        self.nodes[pivot as usize].left = slot;
        self.update_height(slot);
        self.update_height(pivot);
        pivot
    }

    fn rebalance(&mut self, slot: u32) -> u32 {
        self.update_height(slot);
        let balance = self.balance_factor(slot);

        if balance > 1 {
            let left = self.nodes[slot as usize].left;
            if self.balance_factor(left) < 0 {
                self.nodes[slot as usize].left = self.rotate_left(left);
            }
            return self.rotate_right(slot);
        }

        if balance < -1 {
            let right = self.nodes[slot as usize].right;
            if self.balance_factor(right) > 0 {
                self.nodes[slot as usize].right = self.rotate_right(right);
            }
            return self.rotate_left(slot);
        }

        slot
    }
}

/// In-order iterator over a `HashIndex`
pub struct Iter<'a> {
    index: &'a HashIndex,
    stack: Vec<u32>,
}

impl<'a> Iter<'a> {
    fn push_left(&mut self, mut slot: u32) {
        while slot != NIL {
            self.stack.push(slot);
            slot = self.index.nodes[slot as usize].left;
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a HashEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.stack.pop()?;
        let node = &self.index.nodes[slot as usize];
        self.push_left(node.right);
        Some(&node.entry)
    }
}

impl<'a> IntoIterator for &'a HashIndex {
    type Item = &'a HashEntry;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    fn plain(offset: u64, length: u32) -> StringLocation {
        StringLocation::Uncompressed { byte_offset: offset, length }
    }

    #[test]
    fn test_insert_and_search() {
        let mut index = HashIndex::new();
        assert!(index.insert(30, plain(0, 3)));
        assert!(index.insert(10, plain(3, 4)));
        assert!(index.insert(20, plain(7, 1)));

        assert_eq!(index.len(), 3);
        assert_eq!(index.search(10), Some(plain(3, 4)));
        assert_eq!(index.search(20), Some(plain(7, 1)));
        assert_eq!(index.search(25), None);
        assert!(index.contains(30));
        assert!(!index.contains(0));
    }

    #[test]
    fn test_duplicate_insert_keeps_first_location() {
        let mut index = HashIndex::new();
        assert!(index.insert(7, plain(0, 3)));
        assert!(!index.insert(7, plain(100, 9)));

        assert_eq!(index.len(), 1);
        assert_eq!(index.search(7), Some(plain(0, 3)));
    }

    #[test]
    fn test_iter_is_hash_ordered() {
        let mut index = HashIndex::new();
        for hash in [50u64, 3, u64::MAX, 0, 42, 17] {
            index.insert(hash, plain(hash, 1));
        }
        let hashes: Vec<u64> = index.iter().map(|entry| entry.hash).collect();
        assert_eq!(hashes, vec![0, 3, 17, 42, 50, u64::MAX]);
    }

    #[test]
    fn test_sequential_inserts_stay_balanced() {
        let mut index = HashIndex::new();
        let n = 100_000u64;
        for hash in 0..n {
            index.insert(hash, plain(hash, 0));
        }
        // AVL bound: h < 1.44 log2(n + 2)
        let bound = (1.44 * ((n + 2) as f64).log2()).ceil() as u8;
        assert!(index.height() <= bound, "height {} > {}", index.height(), bound);
        assert_eq!(index.search(n - 1), Some(plain(n - 1, 0)));
    }

    #[test]
    fn test_serialize_layout_and_roundtrip() {
        let mut index = HashIndex::new();
        index.insert(2, plain(8, 3));
        index.insert(1, plain(0, 8));

        let bytes = index.to_bytes();
        assert_eq!(bytes.len(), 4 + 2 * ENTRY_RECORD_SIZE);
        assert_eq!(&bytes[0..4], &2u32.to_le_bytes());
        // Lowest hash first
        assert_eq!(&bytes[4..12], &1u64.to_le_bytes());
        assert_eq!(&bytes[12..20], &0u64.to_le_bytes());
        assert_eq!(&bytes[20..24], &8u32.to_le_bytes());

        let loaded = HashIndex::from_bytes(&bytes, false).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.search(2), Some(plain(8, 3)));

        let compressed = HashIndex::from_bytes(&bytes, true).unwrap();
        assert_eq!(
            compressed.search(1),
            Some(StringLocation::Compressed { bit_offset: 0, decoded_length: 8 })
        );
    }

    #[test]
    fn test_truncated_table_is_format_error() {
        let mut index = HashIndex::new();
        index.insert(1, plain(0, 1));
        index.insert(2, plain(1, 1));
        let bytes = index.to_bytes();

        let err = HashIndex::from_bytes(&bytes[..bytes.len() - 1], false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Format);

        let err = HashIndex::from_bytes(&bytes[..2], false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Format);

        let mut padded = bytes.clone();
        padded.push(0);
        assert_eq!(HashIndex::from_bytes(&padded, false).unwrap_err().kind, ErrorKind::Format);
    }

    #[test]
    fn test_unsorted_records_are_inserted() {
        let entries = vec![
            HashEntry::new(9, plain(0, 1)),
            HashEntry::new(4, plain(1, 1)),
            HashEntry::new(9, plain(2, 1)),
        ];
        let index = HashIndex::from_entries(entries);
        assert_eq!(index.len(), 2);
        assert_eq!(index.search(9), Some(plain(0, 1)));
        assert_eq!(index.search(4), Some(plain(1, 1)));
    }

    #[test]
    fn test_sorted_load_then_insert() {
        let entries: Vec<HashEntry> = (0..1000u64).map(|h| HashEntry::new(h * 2, plain(h, 1))).collect();
        let mut index = HashIndex::from_entries(entries);
        assert!(index.height() <= 10);

        assert!(index.insert(501, plain(0, 0)));
        assert!(!index.insert(500, plain(0, 0)));
        assert_eq!(index.search(500), Some(plain(250, 1)));
        assert_eq!(index.iter().count(), 1001);
    }
}
