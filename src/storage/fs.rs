use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use parking_lot::RwLock;
use tracing::debug;
use crate::core::error::{Error, ErrorKind, Result};

/// Random-access read handle; closing is dropping
pub trait ReadHandle: Read + Seek {}

impl<T: Read + Seek> ReadHandle for T {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStat {
    pub exists: bool,
    pub is_directory: bool,
}

/// Host file-system capability consumed by discovery, generation and dumping
pub trait FileSystem {
    fn stat(&self, path: &Path) -> FileStat;

    /// Names of the direct children of a directory
    fn list_children(&self, path: &Path) -> Result<Vec<String>>;

    fn open_for_read(&self, path: &Path) -> Result<Box<dyn ReadHandle>>;

    fn create_for_write(&self, path: &Path) -> Result<Box<dyn Write>>;
}

/// Read up to `count` bytes at `offset`; shorter only at end of file
pub fn read_at<R: Read + Seek + ?Sized>(handle: &mut R, offset: u64, count: usize) -> Result<Vec<u8>> {
    handle.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity(count.min(64 * 1024));
    Read::take(&mut *handle, count as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Read exactly `count` bytes from the current position; a short read is a format error
pub fn read_exact_or_truncated<R: Read + ?Sized>(handle: &mut R, count: usize, what: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(count.min(64 * 1024));
    Read::take(&mut *handle, count as u64).read_to_end(&mut buf)?;
    if buf.len() < count {
        return Err(Error::format(format!(
            "{} truncated: expected {} bytes, found {}",
            what,
            count,
            buf.len()
        )));
    }
    Ok(buf)
}

/// The local disk. Children are listed sorted by name so that database
/// precedence does not depend on the host's directory order.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn stat(&self, path: &Path) -> FileStat {
        match fs::metadata(path) {
            Ok(meta) => FileStat {
                exists: true,
                is_directory: meta.is_dir(),
            },
            Err(_) => FileStat::default(),
        }
    }

    fn list_children(&self, path: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => debug!(?name, "skipping non UTF-8 directory entry"),
            }
        }
        names.sort();
        Ok(names)
    }

    fn open_for_read(&self, path: &Path) -> Result<Box<dyn ReadHandle>> {
        let file = File::open(path).map_err(|e| Error::from(e).at(path.display()))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn create_for_write(&self, path: &Path) -> Result<Box<dyn Write>> {
        let file = File::create(path).map_err(|e| Error::from(e).at(path.display()))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

/// In-memory file tree keyed by normalized path. Directories are implied by
/// the files beneath them; listing order is lexicographic.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<RwLock<BTreeMap<PathBuf, Vec<u8>>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<P: AsRef<Path>>(&self, path: P, bytes: impl Into<Vec<u8>>) {
        self.files.write().insert(normalize(path.as_ref()), bytes.into());
    }

    pub fn read<P: AsRef<Path>>(&self, path: P) -> Option<Vec<u8>> {
        self.files.read().get(&normalize(path.as_ref())).cloned()
    }

    pub fn remove<P: AsRef<Path>>(&self, path: P) -> Option<Vec<u8>> {
        self.files.write().remove(&normalize(path.as_ref()))
    }

    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }
}

/// Drop `.` components so `./a/b` and `a/b` name the same entry
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

impl FileSystem for MemoryFileSystem {
    fn stat(&self, path: &Path) -> FileStat {
        let path = normalize(path);
        let files = self.files.read();
        if files.contains_key(&path) {
            return FileStat { exists: true, is_directory: false };
        }
        let is_directory = files.keys().any(|key| key.starts_with(&path) && *key != path);
        FileStat { exists: is_directory, is_directory }
    }

    fn list_children(&self, path: &Path) -> Result<Vec<String>> {
        let path = normalize(path);
        let files = self.files.read();

        let mut names = BTreeSet::new();
        for key in files.keys() {
            if let Ok(rest) = key.strip_prefix(&path) {
                if let Some(Component::Normal(name)) = rest.components().next() {
                    names.insert(name.to_string_lossy().into_owned());
                }
            }
        }

        if names.is_empty() {
            return Err(Error::new(ErrorKind::Io, format!("{}: not a directory", path.display())));
        }
        Ok(names.into_iter().collect())
    }

    fn open_for_read(&self, path: &Path) -> Result<Box<dyn ReadHandle>> {
        let bytes = self.read(path).ok_or_else(|| {
            Error::new(ErrorKind::Io, format!("{}: no such file", path.display()))
        })?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn create_for_write(&self, path: &Path) -> Result<Box<dyn Write>> {
        let path = normalize(path);
        self.files.write().insert(path.clone(), Vec::new());
        Ok(Box::new(MemoryWriter {
            path,
            buffer: Vec::new(),
            files: Arc::clone(&self.files),
        }))
    }
}

/// Buffers writes and publishes them on flush and on drop
struct MemoryWriter {
    path: PathBuf,
    buffer: Vec<u8>,
    files: Arc<RwLock<BTreeMap<PathBuf, Vec<u8>>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.files.write().insert(self.path.clone(), self.buffer.clone());
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        let buffer = std::mem::take(&mut self.buffer);
        self.files.write().insert(self.path.clone(), buffer);
    }
}
