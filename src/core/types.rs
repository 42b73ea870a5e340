/// Where the bytes of a hashed string live inside a blob.
/// The persisted record only carries `(offset, length)`; which variant applies
/// is decided by the compressed flag of the database that owns the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringLocation {
    /// Verbatim bytes at `byte_offset`
    Uncompressed { byte_offset: u64, length: u32 },
    /// Prefix-coded bit stream starting at `bit_offset`, `decoded_length` output bytes
    Compressed { bit_offset: u64, decoded_length: u32 },
}

impl StringLocation {
    pub fn from_raw(compressed: bool, offset: u64, length: u32) -> Self {
        if compressed {
            StringLocation::Compressed { bit_offset: offset, decoded_length: length }
        } else {
            StringLocation::Uncompressed { byte_offset: offset, length }
        }
    }

    /// `(offset_or_bitoffset, length)` as stored on disk
    pub fn raw(&self) -> (u64, u32) {
        match *self {
            StringLocation::Uncompressed { byte_offset, length } => (byte_offset, length),
            StringLocation::Compressed { bit_offset, decoded_length } => (bit_offset, decoded_length),
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, StringLocation::Compressed { .. })
    }

    /// Number of string bytes this location decodes to
    pub fn len(&self) -> u32 {
        self.raw().1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashEntry {
    pub hash: u64,
    pub location: StringLocation,
}

impl HashEntry {
    pub fn new(hash: u64, location: StringLocation) -> Self {
        HashEntry { hash, location }
    }
}

/// Fixed-width lowercase hex rendering used for fallbacks and dumps
pub fn format_hash(hash: u64) -> String {
    format!("{:016x}", hash)
}
