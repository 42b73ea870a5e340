use std::num::NonZeroUsize;
use std::path::Path;
use lru::LruCache;
use tracing::{debug, info, warn};
use crate::core::config::Config;
use crate::core::hash::{MurmurHash64A, StringHasher};
use crate::core::types::{format_hash, StringLocation};
use crate::index::hash_index::HashIndex;
use crate::memory::arena::StringArena;
use crate::storage::fs::{FileSystem, StdFileSystem};
use crate::storage::reader::DatabaseReader;
use crate::storage::walk::walk_files;

/// Resolves hashes against strings registered in this process and against
/// every database discovered under the configured root.
///
/// Precedence: runtime strings first, then on-disk databases in discovery
/// order (depth-first, children in listing order). Discovery runs once, on
/// the first lookup that misses the runtime index. Single-threaded; wrap in
/// a mutex to share between threads.
pub struct Resolver<F: FileSystem = StdFileSystem, H: StringHasher = MurmurHash64A> {
    config: Config,
    fs: F,
    hasher: H,
    runtime_index: HashIndex,
    runtime_strings: StringArena,
    databases: Vec<DatabaseReader>,
    discovered: bool,
    cache: Option<LruCache<u64, String>>,
    cache_hits: u64,
    cache_misses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverStats {
    pub runtime_strings: usize,
    pub runtime_bytes: usize,
    pub databases: usize,
    pub database_entries: usize,
    pub discovered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub size: usize,
}

impl Resolver {
    /// Resolver over the local disk with the default hash
    pub fn with_config(config: Config) -> Self {
        Resolver::new(config, StdFileSystem, MurmurHash64A::default())
    }
}

impl<F: FileSystem, H: StringHasher> Resolver<F, H> {
    pub fn new(config: Config, fs: F, hasher: H) -> Self {
        let cache = NonZeroUsize::new(config.decode_cache_size).map(LruCache::new);
        Resolver {
            config,
            fs,
            hasher,
            runtime_index: HashIndex::new(),
            runtime_strings: StringArena::new(),
            databases: Vec::new(),
            discovered: false,
            cache,
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Hash `s` and remember it for this process. Repeated strings are stored once.
    pub fn register_string(&mut self, s: &str) -> u64 {
        let hash = self.hasher.hash_str(s);
        if self.runtime_index.contains(hash) {
            return hash;
        }

        let length = match u32::try_from(s.len()) {
            Ok(length) => length,
            Err(_) => {
                warn!(bytes = s.len(), "string too long to register");
                return hash;
            }
        };
        let byte_offset = self.runtime_strings.append(s);
        self.runtime_index.insert(hash, StringLocation::Uncompressed { byte_offset, length });
        hash
    }

    /// String registered at runtime for `hash`, without touching the disk
    pub fn runtime_string(&self, hash: u64) -> Option<&str> {
        match self.runtime_index.search(hash)? {
            StringLocation::Uncompressed { byte_offset, length } => {
                self.runtime_strings.get_str(byte_offset, length)
            }
            StringLocation::Compressed { .. } => None,
        }
    }

    /// Runtime entries in hash order
    pub fn runtime_entries(&self) -> impl Iterator<Item = (u64, &str)> + '_ {
        self.runtime_index
            .iter()
            .filter_map(|entry| self.runtime_string(entry.hash).map(|text| (entry.hash, text)))
    }

    /// Reverse `hash`. `None` when no index knows it.
    pub fn decode(&mut self, hash: u64) -> Option<String> {
        if let Some(text) = self.runtime_string(hash) {
            return Some(text.to_string());
        }

        self.discover();

        if let Some(cache) = self.cache.as_mut() {
            if let Some(text) = cache.get(&hash) {
                self.cache_hits += 1;
                return Some(text.clone());
            }
            self.cache_misses += 1;
        }

        let text = self.decode_from_databases(hash)?;
        if let Some(cache) = self.cache.as_mut() {
            cache.put(hash, text.clone());
        }
        Some(text)
    }

    /// Like `decode`, falling back to the hash as 16 hex digits
    pub fn try_decode(&mut self, hash: u64) -> String {
        self.decode(hash).unwrap_or_else(|| format_hash(hash))
    }

    /// First database in discovery order that holds `hash`. A database that
    /// fails to read is logged and treated as a miss.
    fn decode_from_databases(&self, hash: u64) -> Option<String> {
        for database in &self.databases {
            match database.read_string(&self.fs, hash) {
                Ok(Some(text)) => return Some(text),
                Ok(None) => {}
                Err(e) => warn!(path = %database.path.display(), error = %e, "lookup failed, skipping database"),
            }
        }
        None
    }

    /// Scan the configured root once; later calls are no-ops
    pub fn discover(&mut self) {
        if self.discovered {
            return;
        }
        self.discovered = true;

        let root = self.config.root_path.clone();
        let added = self.add_databases(&root);
        info!(root = %root.display(), added, total = self.databases.len(), "database discovery finished");
    }

    /// Scan the configured root again, keeping what is already loaded
    pub fn rediscover(&mut self) {
        self.discovered = false;
        self.discover();
    }

    /// Load every supported database under `path` that is not loaded yet.
    /// New databases rank after existing ones. Returns how many were added.
    pub fn add_databases(&mut self, path: &Path) -> usize {
        let mut added = 0;

        for candidate in walk_files(&self.fs, path, self.config.hidden_prefix) {
            if !self.config.is_database_file(&candidate) {
                continue;
            }
            if self.databases.iter().any(|known| known.path == candidate) {
                debug!(path = %candidate.display(), "database already loaded");
                continue;
            }

            match DatabaseReader::open_if_supported(&self.fs, &candidate) {
                Ok(Some(database)) => {
                    debug!(
                        path = %candidate.display(),
                        entries = database.len(),
                        compressed = database.is_compressed(),
                        "loaded database"
                    );
                    self.databases.push(database);
                    added += 1;
                }
                Ok(None) => debug!(path = %candidate.display(), "skipping database with another format version"),
                Err(e) => warn!(path = %candidate.display(), error = %e, "skipping unreadable database"),
            }
        }

        added
    }

    pub fn databases(&self) -> &[DatabaseReader] {
        &self.databases
    }

    pub fn is_discovered(&self) -> bool {
        self.discovered
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            runtime_strings: self.runtime_index.len(),
            runtime_bytes: self.runtime_strings.len(),
            databases: self.databases.len(),
            database_entries: self.databases.iter().map(DatabaseReader::len).sum(),
            discovered: self.discovered,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        let total = self.cache_hits + self.cache_misses;
        let hit_rate = if total > 0 {
            self.cache_hits as f64 / total as f64
        } else {
            0.0
        };

        CacheStats {
            hits: self.cache_hits,
            misses: self.cache_misses,
            hit_rate,
            size: self.cache.as_ref().map_or(0, LruCache::len),
        }
    }

    /// Release every runtime string, loaded database and cached lookup.
    /// The resolver is left as if freshly created.
    pub fn reset(&mut self) {
        self.runtime_index.clear();
        self.runtime_strings.clear();
        self.databases.clear();
        self.discovered = false;
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
        self.cache_hits = 0;
        self.cache_misses = 0;
    }
}
