use std::io::Read;
use std::path::Path;
use regex::Regex;
use tracing::debug;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::hash::StringHasher;
use crate::storage::fs::FileSystem;
use crate::storage::walk::walk_files;

/// Extracts hashed string literals from source files.
/// The first capture group of the configured pattern is the literal;
/// escape sequences are kept as written.
pub struct LiteralScanner<H: StringHasher> {
    pattern: Regex,
    config: Config,
    hasher: H,
}

impl<H: StringHasher> LiteralScanner<H> {
    pub fn new(config: &Config, hasher: H) -> Result<Self> {
        let pattern = Regex::new(&config.literal_pattern)?;
        if pattern.captures_len() < 2 {
            return Err(Error::new(
                ErrorKind::Config,
                format!("literal pattern {:?} has no capture group", config.literal_pattern),
            ));
        }

        Ok(LiteralScanner {
            pattern,
            config: config.clone(),
            hasher,
        })
    }

    pub fn scan_text(&self, text: &str) -> Vec<(u64, String)> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|literal| (self.hasher.hash_str(literal.as_str()), literal.as_str().to_string()))
            .collect()
    }

    /// Scan one file, or every source file under a directory in walk order
    pub fn scan_path<F: FileSystem + ?Sized>(&self, fs: &F, path: &Path) -> Result<Vec<(u64, String)>> {
        let stat = fs.stat(path);
        if !stat.exists {
            return Err(Error::new(ErrorKind::Io, format!("{}: no such file or directory", path.display())));
        }

        let files = if stat.is_directory {
            walk_files(fs, path, self.config.hidden_prefix)
                .into_iter()
                .filter(|file| self.config.is_source_file(file))
                .collect()
        } else {
            vec![path.to_path_buf()]
        };

        let mut pairs = Vec::new();
        for file in &files {
            let mut handle = fs.open_for_read(file)?;
            let mut bytes = Vec::new();
            handle.read_to_end(&mut bytes).map_err(|e| Error::from(e).at(file.display()))?;

            let found = self.scan_text(&String::from_utf8_lossy(&bytes));
            debug!(path = %file.display(), literals = found.len(), "scanned source file");
            pairs.extend(found);
        }

        Ok(pairs)
    }
}
