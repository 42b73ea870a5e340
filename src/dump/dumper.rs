use std::path::Path;
use tracing::{info, warn};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::hash::StringHasher;
use crate::dump::sink::DumpSink;
use crate::resolver::resolver::Resolver;
use crate::storage::fs::FileSystem;
use crate::storage::reader::DatabaseReader;
use crate::storage::walk::walk_files;

/// Every entry of one database, in hash order. Returns the entry count.
pub fn dump_database<F, S>(fs: &F, database: &DatabaseReader, sink: &mut S) -> Result<u64>
where
    F: FileSystem + ?Sized,
    S: DumpSink + ?Sized,
{
    let mut count = 0;
    database.for_each_string(fs, |entry, text| {
        count += 1;
        sink.write_entry(entry.hash, text)
    })?;
    Ok(count)
}

/// Like `dump_database`, but a database whose contents turn out to be corrupt
/// is logged and counted as empty. Sink failures still propagate.
fn dump_database_or_skip<F, S>(fs: &F, database: &DatabaseReader, sink: &mut S) -> Result<u64>
where
    F: FileSystem + ?Sized,
    S: DumpSink + ?Sized,
{
    match dump_database(fs, database, sink) {
        Err(e) if e.kind == ErrorKind::Format => {
            warn!(path = %database.path.display(), error = %e, "skipping corrupt database");
            Ok(0)
        }
        result => result,
    }
}

/// Dump an explicit database file (every failure surfaced) or every
/// supported database under a directory (other versions skipped)
pub fn dump_path<F, S>(fs: &F, config: &Config, path: &Path, sink: &mut S) -> Result<u64>
where
    F: FileSystem + ?Sized,
    S: DumpSink + ?Sized,
{
    let stat = fs.stat(path);
    if !stat.exists {
        return Err(Error::new(ErrorKind::Io, format!("{}: no such file or directory", path.display())));
    }

    let mut count = 0;
    if stat.is_directory {
        for candidate in walk_files(fs, path, config.hidden_prefix) {
            if !config.is_database_file(&candidate) {
                continue;
            }
            match DatabaseReader::open_if_supported(fs, &candidate) {
                Ok(Some(database)) => count += dump_database_or_skip(fs, &database, sink)?,
                Ok(None) => {}
                Err(e) => warn!(path = %candidate.display(), error = %e, "skipping unreadable database"),
            }
        }
    } else {
        let database = DatabaseReader::open(fs, path)?;
        count = dump_database(fs, &database, sink)?;
    }

    sink.finish()?;
    info!(path = %path.display(), entries = count, "dump finished");
    Ok(count)
}

/// Dump what a resolver knows: runtime strings, then each discovered database
pub fn dump_resolver<F, H, S>(resolver: &mut Resolver<F, H>, sink: &mut S) -> Result<u64>
where
    F: FileSystem,
    H: StringHasher,
    S: DumpSink + ?Sized,
{
    resolver.discover();

    let mut count = 0;
    for (hash, text) in resolver.runtime_entries() {
        sink.write_entry(hash, text)?;
        count += 1;
    }
    for database in resolver.databases() {
        count += dump_database_or_skip(resolver.fs(), database, sink)?;
    }

    sink.finish()?;
    Ok(count)
}
