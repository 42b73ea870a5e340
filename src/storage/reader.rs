use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use crate::compression::huffman::CodeTree;
use crate::core::error::{Error, Result};
use crate::core::types::{HashEntry, StringLocation};
use crate::index::hash_index::HashIndex;
use crate::storage::format::DatabaseHeader;
use crate::storage::fs::{read_at, FileSystem};

/// A database file whose header is loaded; the blob stays on disk and is
/// read through a fresh handle per lookup.
#[derive(Debug, Clone)]
pub struct DatabaseReader {
    pub path: PathBuf,
    pub header: DatabaseHeader,
}

impl DatabaseReader {
    /// Explicit load: version, format and I/O failures are all surfaced
    pub fn open<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> Result<Self> {
        let mut handle = fs.open_for_read(path)?;
        let header = DatabaseHeader::read_from(&mut *handle).map_err(|e| e.at(path.display()))?;

        Ok(DatabaseReader {
            path: path.to_path_buf(),
            header,
        })
    }

    /// Discovery load: a version mismatch means "not ours" and yields `None`
    pub fn open_if_supported<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> Result<Option<Self>> {
        match Self::open(fs, path) {
            Ok(reader) => Ok(Some(reader)),
            Err(e) if e.is_unsupported_version() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn index(&self) -> &HashIndex {
        &self.header.index
    }

    pub fn code_tree(&self) -> Option<&CodeTree> {
        self.header.code_tree.as_ref()
    }

    pub fn is_compressed(&self) -> bool {
        self.header.is_compressed()
    }

    pub fn len(&self) -> usize {
        self.header.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.header.index.is_empty()
    }

    /// Look up `hash` and read its string; the file is opened and closed here
    pub fn read_string<F: FileSystem + ?Sized>(&self, fs: &F, hash: u64) -> Result<Option<String>> {
        let Some(location) = self.index().search(hash) else {
            return Ok(None);
        };
        let mut handle = fs.open_for_read(&self.path)?;
        let text = self.read_location(&mut *handle, location).map_err(|e| e.at(self.path.display()))?;
        Ok(Some(text))
    }

    pub fn read_location<R: Read + Seek + ?Sized>(&self, handle: &mut R, location: StringLocation) -> Result<String> {
        let bytes = read_location_bytes(handle, location, self.code_tree())?;
        bytes_to_string(bytes)
    }

    /// Visit every entry in hash order with its string, through one handle
    pub fn for_each_string<F, V>(&self, fs: &F, mut visit: V) -> Result<()>
    where
        F: FileSystem + ?Sized,
        V: FnMut(&HashEntry, &str) -> Result<()>,
    {
        let mut handle = fs.open_for_read(&self.path)?;
        for entry in self.index() {
            let text = self
                .read_location(&mut *handle, entry.location)
                .map_err(|e| e.at(format!("{} entry {:016x}", self.path.display(), entry.hash)))?;
            visit(entry, &text)?;
        }
        Ok(())
    }
}

/// Raw string bytes for `location`: a direct read, or a decode loop over the
/// code tree for compressed entries
pub fn read_location_bytes<R: Read + Seek + ?Sized>(
    handle: &mut R,
    location: StringLocation,
    code_tree: Option<&CodeTree>,
) -> Result<Vec<u8>> {
    match location {
        StringLocation::Uncompressed { byte_offset, length } => {
            let bytes = read_at(handle, byte_offset, length as usize)?;
            if bytes.len() < length as usize {
                return Err(Error::format(format!(
                    "string at byte {} truncated: expected {} bytes, found {}",
                    byte_offset,
                    length,
                    bytes.len()
                )));
            }
            Ok(bytes)
        }
        StringLocation::Compressed { bit_offset, decoded_length } => {
            let tree = code_tree.ok_or_else(|| Error::format("compressed entry without a code tree"))?;
            let (first_byte, span) = tree.encoded_span(bit_offset, decoded_length);
            let encoded = read_at(handle, first_byte, span)?;
            tree.decode_bytes(&encoded, bit_offset % 8, decoded_length as usize)
        }
    }
}

pub fn bytes_to_string(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| Error::format(format!("string is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use crate::compression::bitstream::BitWriter;
    use crate::core::error::ErrorKind;
    use crate::storage::format::{DatabaseFlags, FORMAT_VERSION};
    use crate::storage::fs::MemoryFileSystem;

    /// Header plus raw strings, offsets absolute
    fn raw_database(strings: &[(u64, &str)]) -> Vec<u8> {
        let base = DatabaseHeader::encoded_len_for(strings.len(), None) as u64;
        let mut index = HashIndex::new();
        let mut blob = Vec::new();
        for &(hash, text) in strings {
            let location = StringLocation::Uncompressed {
                byte_offset: base + blob.len() as u64,
                length: text.len() as u32,
            };
            index.insert(hash, location);
            blob.extend_from_slice(text.as_bytes());
        }
        let mut bytes = DatabaseHeader::new(index, None).to_bytes();
        bytes.extend_from_slice(&blob);
        bytes
    }

    #[test]
    fn test_open_and_read_string() {
        let fs = MemoryFileSystem::new();
        fs.insert("db.hdb", raw_database(&[(1, "alpha"), (2, "beta")]));

        let reader = DatabaseReader::open(&fs, Path::new("db.hdb")).unwrap();
        assert_eq!(reader.len(), 2);
        assert!(!reader.is_compressed());
        assert_eq!(reader.read_string(&fs, 2).unwrap().as_deref(), Some("beta"));
        assert_eq!(reader.read_string(&fs, 3).unwrap(), None);
    }

    #[test]
    fn test_open_if_supported_skips_other_versions() {
        let fs = MemoryFileSystem::new();
        let mut bytes = raw_database(&[(1, "alpha")]);
        bytes[..4].copy_from_slice(&DatabaseFlags(FORMAT_VERSION - 1).0.to_le_bytes());
        fs.insert("old.hdb", bytes);

        assert!(DatabaseReader::open_if_supported(&fs, Path::new("old.hdb")).unwrap().is_none());
        let err = DatabaseReader::open(&fs, Path::new("old.hdb")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedVersion);

        fs.insert("junk.hdb", b"\x03\x00".to_vec());
        let err = DatabaseReader::open_if_supported(&fs, Path::new("junk.hdb")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Format);
    }

    #[test]
    fn test_truncated_blob_is_format_error() {
        let fs = MemoryFileSystem::new();
        let mut bytes = raw_database(&[(9, "complete")]);
        bytes.truncate(bytes.len() - 2);
        fs.insert("cut.hdb", bytes);

        let reader = DatabaseReader::open(&fs, Path::new("cut.hdb")).unwrap();
        let err = reader.read_string(&fs, 9).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Format);
    }

    #[test]
    fn test_compressed_location_at_unaligned_bit() {
        let tree = CodeTree::build(["abcabcd"]);
        let table = tree.code_table();
        let mut writer = BitWriter::new();
        writer.push_bits(&[true; 5]);
        let start = writer.bit_len();
        table.encode_into(b"dcba", &mut writer).unwrap();

        // Two bytes of padding before the stream
        let mut file = vec![0xff, 0xff];
        file.extend_from_slice(writer.as_bytes());
        let location = StringLocation::Compressed { bit_offset: 16 + start, decoded_length: 4 };

        let bytes = read_location_bytes(&mut Cursor::new(file), location, Some(&tree)).unwrap();
        assert_eq!(bytes, b"dcba");
    }

    #[test]
    fn test_for_each_string_in_hash_order() {
        let fs = MemoryFileSystem::new();
        fs.insert("db.hdb", raw_database(&[(30, "c"), (10, "a"), (20, "b")]));
        let reader = DatabaseReader::open(&fs, Path::new("db.hdb")).unwrap();

        let mut seen = Vec::new();
        reader
            .for_each_string(&fs, |entry, text| {
                seen.push((entry.hash, text.to_string()));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![(10, "a".into()), (20, "b".into()), (30, "c".into())]);
    }
}
