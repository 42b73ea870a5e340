use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use tracing::info;
use crate::compression::bitstream::BitWriter;
use crate::compression::huffman::CodeTree;
use crate::core::error::{Error, Result};
use crate::core::types::StringLocation;
use crate::index::hash_index::HashIndex;
use crate::storage::format::DatabaseHeader;
use crate::storage::fs::FileSystem;

/// Builds complete database files from `(hash, string)` pairs
#[derive(Debug, Clone, Copy)]
pub struct DatabaseGenerator {
    pub compress: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationReport {
    pub entries: usize,
    /// Pairs dropped because their hash was already present
    pub duplicates: usize,
    /// Total string bytes before encoding
    pub raw_bytes: u64,
    pub blob_bytes: u64,
    pub compressed: bool,
}

/// A database ready to be written: header tables plus blob
#[derive(Debug, Clone)]
pub struct BuiltDatabase {
    pub header: DatabaseHeader,
    pub blob: Vec<u8>,
    pub report: GenerationReport,
}

impl BuiltDatabase {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.header.to_bytes();
        bytes.extend_from_slice(&self.blob);
        bytes
    }
}

impl DatabaseGenerator {
    pub fn new(compress: bool) -> Self {
        DatabaseGenerator { compress }
    }

    /// Index every pair (first occurrence of a hash wins) and lay out the blob.
    /// Offsets are absolute, so the header size is fixed before the blob is built.
    pub fn build<I>(&self, corpus: I) -> Result<BuiltDatabase>
    where
        I: IntoIterator<Item = (u64, String)>,
    {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        let mut duplicates = 0;
        for (hash, text) in corpus {
            if !seen.insert(hash) {
                duplicates += 1;
                continue;
            }
            if u32::try_from(text.len()).is_err() {
                return Err(Error::invalid_argument(format!(
                    "string for {:016x} is {} bytes, longer than an entry can address",
                    hash,
                    text.len()
                )));
            }
            unique.push((hash, text));
        }

        let raw_bytes: u64 = unique.iter().map(|(_, text)| text.len() as u64).sum();
        let code_tree = self
            .compress
            .then(|| CodeTree::build(unique.iter().map(|(_, text)| text.as_bytes())));

        let blob_start = DatabaseHeader::encoded_len_for(unique.len(), code_tree.as_ref().map(CodeTree::len)) as u64;
        let mut index = HashIndex::with_capacity(unique.len());

        let blob = match &code_tree {
            Some(tree) => {
                let table = tree.code_table();
                let mut stream = BitWriter::new();
                for (hash, text) in &unique {
                    let bit_offset = blob_start * 8 + stream.bit_len();
                    table.encode_into(text.as_bytes(), &mut stream)?;
                    index.insert(*hash, StringLocation::Compressed {
                        bit_offset,
                        decoded_length: text.len() as u32,
                    });
                }
                stream.into_bytes()
            }
            None => {
                let mut blob = Vec::with_capacity(raw_bytes as usize);
                for (hash, text) in &unique {
                    let byte_offset = blob_start + blob.len() as u64;
                    blob.extend_from_slice(text.as_bytes());
                    index.insert(*hash, StringLocation::Uncompressed {
                        byte_offset,
                        length: text.len() as u32,
                    });
                }
                blob
            }
        };

        let report = GenerationReport {
            entries: index.len(),
            duplicates,
            raw_bytes,
            blob_bytes: blob.len() as u64,
            compressed: self.compress,
        };

        Ok(BuiltDatabase {
            header: DatabaseHeader::new(index, code_tree),
            blob,
            report,
        })
    }

    /// Header, tables and blob in one pass; any failure aborts the write
    pub fn write<F: FileSystem + ?Sized>(&self, fs: &F, path: &Path, database: &BuiltDatabase) -> Result<()> {
        let mut out = fs.create_for_write(path)?;
        let write = |out: &mut Box<dyn Write>| -> std::io::Result<()> {
            out.write_all(&database.header.to_bytes())?;
            out.write_all(&database.blob)?;
            out.flush()
        };
        write(&mut out).map_err(|e| Error::from(e).at(path.display()))
    }

    pub fn generate<F, I>(&self, fs: &F, path: &Path, corpus: I) -> Result<GenerationReport>
    where
        F: FileSystem + ?Sized,
        I: IntoIterator<Item = (u64, String)>,
    {
        let database = self.build(corpus)?;
        self.write(fs, path, &database)?;

        let report = database.report;
        info!(
            path = %path.display(),
            entries = report.entries,
            duplicates = report.duplicates,
            raw_bytes = report.raw_bytes,
            blob_bytes = report.blob_bytes,
            compressed = report.compressed,
            "generated database"
        );
        Ok(report)
    }
}
