use std::cmp::Reverse;
use std::collections::BinaryHeap;
use bytes::{Buf, BufMut};
use crate::compression::bitstream::{bit_at, BitWriter};
use crate::core::error::{Error, Result};

/// `{ u8 is_leaf, u8 value, u32 left_or_unused, u32 right_or_unused }`, little-endian
pub const CODE_NODE_RECORD_SIZE: usize = 10;

/// Largest output reservation made up front from a length read off disk
const MAX_PREALLOC: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeNode {
    Leaf(u8),
    /// Children for a 0 bit and a 1 bit
    Branch { zero: u32, one: u32 },
}

/// Prefix code over byte values, persisted as a flat node array whose root
/// is the last node. A corpus with a single distinct byte yields a lone leaf
/// root and 0-bit codes; an empty corpus yields an empty tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTree {
    nodes: Vec<CodeNode>,
    max_depth: u32,
}

impl CodeTree {
    /// Greedy two-lowest merge over the byte frequencies of `corpus`.
    /// Ties go to the node created first (leaves in byte order, then merges),
    /// so the same corpus always produces the same tree.
    pub fn build<I, T>(corpus: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut frequencies = [0u64; 256];
        for chunk in corpus {
            for &byte in chunk.as_ref() {
                frequencies[byte as usize] += 1;
            }
        }

        let mut nodes = Vec::new();
        let mut heap = BinaryHeap::new();
        for (value, &weight) in frequencies.iter().enumerate() {
            if weight > 0 {
                heap.push(Reverse((weight, nodes.len() as u32)));
                nodes.push(CodeNode::Leaf(value as u8));
            }
        }

        while heap.len() > 1 {
            let (Some(Reverse((w0, zero))), Some(Reverse((w1, one)))) = (heap.pop(), heap.pop()) else {
                break;
            };
            heap.push(Reverse((w0 + w1, nodes.len() as u32)));
            nodes.push(CodeNode::Branch { zero, one });
        }

        let mut tree = CodeTree { nodes, max_depth: 0 };
        // Freshly merged trees are acyclic by construction
        tree.max_depth = tree.measure_depth().unwrap_or(0);
        tree
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[CodeNode] {
        &self.nodes
    }

    /// Longest code in bits
    pub fn max_code_len(&self) -> u32 {
        self.max_depth
    }

    fn root(&self) -> Option<u32> {
        self.nodes.len().checked_sub(1).map(|root| root as u32)
    }

    /// Per-byte code paths
    pub fn code_table(&self) -> CodeTable {
        let mut codes: Vec<Option<Vec<bool>>> = vec![None; 256];
        if let Some(root) = self.root() {
            let mut stack = vec![(root, Vec::new())];
            while let Some((slot, path)) = stack.pop() {
                match self.nodes[slot as usize] {
                    CodeNode::Leaf(value) => {
                        if codes[value as usize].is_none() {
                            codes[value as usize] = Some(path);
                        }
                    }
                    CodeNode::Branch { zero, one } => {
                        let mut one_path = path.clone();
                        one_path.push(true);
                        let mut zero_path = path;
                        zero_path.push(false);
                        stack.push((one, one_path));
                        stack.push((zero, zero_path));
                    }
                }
            }
        }
        CodeTable { codes }
    }

    /// Decode one byte starting at `bit_offset`; returns it with the offset just past its code
    pub fn decode(&self, buf: &[u8], bit_offset: u64) -> Result<(u8, u64)> {
        let mut slot = self.root().ok_or_else(|| Error::format("decode with an empty code tree"))?;
        let mut offset = bit_offset;

        // A validated tree reaches a leaf within max_depth steps
        for _ in 0..=self.max_depth {
            match self.nodes[slot as usize] {
                CodeNode::Leaf(value) => return Ok((value, offset)),
                CodeNode::Branch { zero, one } => {
                    let bit = bit_at(buf, offset)
                        .ok_or_else(|| Error::format(format!("bit stream ends at bit {}", offset)))?;
                    slot = if bit { one } else { zero };
                    offset += 1;
                }
            }
        }

        Err(Error::format("code path longer than the code tree"))
    }

    /// Decode exactly `count` bytes starting at `bit_offset`
    pub fn decode_bytes(&self, buf: &[u8], bit_offset: u64, count: usize) -> Result<Vec<u8>> {
        // Each symbol costs at least one bit unless the tree is a lone leaf
        let reserve = if self.max_depth > 0 {
            count.min(buf.len().saturating_mul(8))
        } else {
            count.min(MAX_PREALLOC)
        };
        let mut out = Vec::with_capacity(reserve);
        let mut offset = bit_offset;
        for _ in 0..count {
            let (byte, next) = self.decode(buf, offset)?;
            out.push(byte);
            offset = next;
        }
        Ok(out)
    }

    /// Upper bound on the bytes holding `count` symbols that start at `bit_offset`
    pub fn encoded_span(&self, bit_offset: u64, count: u32) -> (u64, usize) {
        let first_byte = bit_offset / 8;
        let bits = (bit_offset % 8) + count as u64 * self.max_depth as u64;
        (first_byte, bits.div_ceil(8) as usize)
    }

    pub fn encoded_len(&self) -> usize {
        4 + self.nodes.len() * CODE_NODE_RECORD_SIZE
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_le(self.nodes.len() as u32);
        for node in &self.nodes {
            match *node {
                CodeNode::Leaf(value) => {
                    buf.put_u8(1);
                    buf.put_u8(value);
                    buf.put_u32_le(0);
                    buf.put_u32_le(0);
                }
                CodeNode::Branch { zero, one } => {
                    buf.put_u8(0);
                    buf.put_u8(0);
                    buf.put_u32_le(zero);
                    buf.put_u32_le(one);
                }
            }
        }
    }

    pub fn decode_from<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(Error::format("code tree node count truncated"));
        }
        let count = buf.get_u32_le() as usize;
        Self::decode_records(buf, count)
    }

    /// Decode `count` node records (count word already consumed) and validate the links
    pub fn decode_records<B: Buf>(buf: &mut B, count: usize) -> Result<Self> {
        let needed = count
            .checked_mul(CODE_NODE_RECORD_SIZE)
            .ok_or_else(|| Error::format(format!("code node count {} overflows", count)))?;
        if buf.remaining() < needed {
            return Err(Error::format(format!(
                "code tree declares {} nodes but only {} bytes are available",
                count,
                buf.remaining()
            )));
        }

        let mut nodes = Vec::with_capacity(count);
        for slot in 0..count {
            let is_leaf = buf.get_u8();
            let value = buf.get_u8();
            let zero = buf.get_u32_le();
            let one = buf.get_u32_le();

            let node = match is_leaf {
                1 => CodeNode::Leaf(value),
                0 => {
                    if zero as usize >= count || one as usize >= count {
                        return Err(Error::format(format!("code node {} links outside the tree", slot)));
                    }
                    CodeNode::Branch { zero, one }
                }
                other => {
                    return Err(Error::format(format!("code node {} has leaf marker {}", slot, other)));
                }
            };
            nodes.push(node);
        }

        let mut tree = CodeTree { nodes, max_depth: 0 };
        tree.max_depth = tree.measure_depth()?;
        Ok(tree)
    }

    /// Deepest leaf below the root. Every node must be reached exactly once
    /// from the root, which rules out cycles, shared children and orphans.
    fn measure_depth(&self) -> Result<u32> {
        let Some(root) = self.root() else {
            return Ok(0);
        };

        let mut visited = vec![false; self.nodes.len()];
        let mut reached = 0usize;
        let mut deepest = 0;
        let mut stack = vec![(root, 0u32)];
        while let Some((slot, depth)) = stack.pop() {
            if std::mem::replace(&mut visited[slot as usize], true) {
                return Err(Error::format(format!("code tree node {} shared", slot)));
            }
            reached += 1;
            match self.nodes[slot as usize] {
                CodeNode::Leaf(_) => deepest = deepest.max(depth),
                CodeNode::Branch { zero, one } => {
                    stack.push((zero, depth + 1));
                    stack.push((one, depth + 1));
                }
            }
        }

        if reached != self.nodes.len() {
            return Err(Error::format(format!(
                "code tree declares {} nodes but only {} are reachable from the root",
                self.nodes.len(),
                reached
            )));
        }
        Ok(deepest)
    }
}

/// Code path for every byte value a tree can encode
#[derive(Debug, Clone)]
pub struct CodeTable {
    codes: Vec<Option<Vec<bool>>>,
}

impl CodeTable {
    pub fn code(&self, byte: u8) -> Option<&[bool]> {
        self.codes[byte as usize].as_deref()
    }

    /// Append the codes of `bytes` to `writer`
    pub fn encode_into(&self, bytes: &[u8], writer: &mut BitWriter) -> Result<()> {
        for &byte in bytes {
            let code = self.code(byte).ok_or_else(|| {
                Error::invalid_argument(format!("byte 0x{:02x} is not in the code tree", byte))
            })?;
            writer.push_bits(code);
        }
        Ok(())
    }

    /// Encode `bytes` into a fresh buffer; returns the buffer and its length in bits
    pub fn encode(&self, bytes: &[u8]) -> Result<(Vec<u8>, u64)> {
        let mut writer = BitWriter::new();
        self.encode_into(bytes, &mut writer)?;
        let bits = writer.bit_len();
        Ok((writer.into_bytes(), bits))
    }

    pub fn encoded_bits(&self, bytes: &[u8]) -> Option<u64> {
        bytes
            .iter()
            .map(|&byte| self.code(byte).map(|code| code.len() as u64))
            .sum()
    }
}
