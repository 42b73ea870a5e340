//! Database file layout (little-endian throughout):
//!
//! ```text
//! u32 flags                 version in the low 16 bits, bit 31 = compressed
//! u32 index_node_count
//! index_node_count x { u64 hash, u64 offset_or_bitoffset, u32 length }
//! [compressed] u32 code_node_count
//! [compressed] code_node_count x { u8 is_leaf, u8 value, u32 left, u32 right }
//! <blob>                    raw strings or packed bit stream
//! ```
//!
//! Entry offsets are absolute within the file: byte offsets for raw strings,
//! bit offsets counted from byte 0 for the compressed stream. Readers can
//! therefore seek on the same handle they parsed the header from.

use std::io::Read;
use bytes::{Buf, BufMut};
use crate::compression::huffman::{CodeTree, CODE_NODE_RECORD_SIZE};
use crate::core::error::{Error, Result};
use crate::index::hash_index::{HashIndex, ENTRY_RECORD_SIZE};
use crate::storage::fs::read_exact_or_truncated;

/// Versions 1 and 2 (tree only, then runtime registration) predate compression
pub const FORMAT_VERSION: u32 = 3;
pub const VERSION_MASK: u32 = 0x0000_FFFF;
pub const FLAG_COMPRESSED: u32 = 1 << 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseFlags(pub u32);

impl DatabaseFlags {
    pub fn new(compressed: bool) -> Self {
        let mut bits = FORMAT_VERSION;
        if compressed {
            bits |= FLAG_COMPRESSED;
        }
        DatabaseFlags(bits)
    }

    pub fn version(&self) -> u32 {
        self.0 & VERSION_MASK
    }

    pub fn is_compressed(&self) -> bool {
        self.0 & FLAG_COMPRESSED != 0
    }

    pub fn check_version(&self) -> Result<()> {
        if self.version() != FORMAT_VERSION {
            return Err(Error::unsupported_version(self.version(), FORMAT_VERSION));
        }
        Ok(())
    }
}

/// Everything in a database file except the blob
#[derive(Debug, Clone)]
pub struct DatabaseHeader {
    pub flags: DatabaseFlags,
    pub index: HashIndex,
    pub code_tree: Option<CodeTree>,
}

impl DatabaseHeader {
    /// The compressed flag follows the presence of a code tree
    pub fn new(index: HashIndex, code_tree: Option<CodeTree>) -> Self {
        DatabaseHeader {
            flags: DatabaseFlags::new(code_tree.is_some()),
            index,
            code_tree,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.flags.is_compressed()
    }

    /// Byte length of the header; the blob starts here
    pub fn encoded_len(&self) -> usize {
        Self::encoded_len_for(self.index.len(), self.code_tree.as_ref().map(CodeTree::len))
    }

    /// Header length for the given table sizes, before the tables exist
    pub fn encoded_len_for(index_entries: usize, code_nodes: Option<usize>) -> usize {
        let mut len = 4 + 4 + index_entries * ENTRY_RECORD_SIZE;
        if let Some(nodes) = code_nodes {
            len += 4 + nodes * CODE_NODE_RECORD_SIZE;
        }
        len
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_le(self.flags.0);
        self.index.encode(buf);
        if let Some(tree) = &self.code_tree {
            tree.encode(buf);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf
    }

    /// Parse a header from the front of `bytes`; returns it with the number of bytes consumed
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        let mut buf = bytes;
        if buf.remaining() < 4 {
            return Err(Error::format("flags word truncated"));
        }
        let flags = DatabaseFlags(buf.get_u32_le());
        flags.check_version()?;

        let index = HashIndex::decode(&mut buf, flags.is_compressed())?;
        let code_tree = if flags.is_compressed() {
            Some(CodeTree::decode_from(&mut buf)?)
        } else {
            None
        };

        let consumed = bytes.len() - buf.remaining();
        Ok((DatabaseHeader { flags, index, code_tree }, consumed))
    }

    /// Parse a header from a read handle, leaving it positioned at the blob.
    /// The version is checked before any table is read.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let word = read_exact_or_truncated(reader, 4, "flags word")?;
        let flags = DatabaseFlags(u32::from_le_bytes([word[0], word[1], word[2], word[3]]));
        flags.check_version()?;

        let word = read_exact_or_truncated(reader, 4, "index node count")?;
        let count = u32::from_le_bytes([word[0], word[1], word[2], word[3]]) as usize;
        let table = read_exact_or_truncated(reader, count * ENTRY_RECORD_SIZE, "index table")?;
        let index = HashIndex::decode_records(&mut table.as_slice(), count, flags.is_compressed())?;

        let code_tree = if flags.is_compressed() {
            let word = read_exact_or_truncated(reader, 4, "code node count")?;
            let count = u32::from_le_bytes([word[0], word[1], word[2], word[3]]) as usize;
            let table = read_exact_or_truncated(reader, count * CODE_NODE_RECORD_SIZE, "code tree")?;
            Some(CodeTree::decode_records(&mut table.as_slice(), count)?)
        } else {
            None
        };

        Ok(DatabaseHeader { flags, index, code_tree })
    }
}
