//! Persistent byte store behind the decode cache.
//!
//! The decode cache treats the store as a cache-through layer keyed by content hash:
//! bytes are written once, then always read back from the store, so the stored copy
//! and the decoded copy come from identical bytes.
//!
//! Two implementations:
//! - `FsStore` - one file per id inside a directory (atomic write via rename)
//! - `MemoryStore` - in-process map with read/write counters (tests, embedding)

use std::collections::HashMap;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use log::debug;

/// Readable byte stream handed between the upload collaborator, the store and decoders.
pub type ByteStream = Box<dyn Read + Send>;

/// Store contract required by `MediaDecodeCache`.
pub trait MediaStore: Send + Sync {
    /// Whether bytes are stored under `id`
    fn exists(&self, id: &str) -> io::Result<bool>;

    /// Store everything readable from `stream` under `id`. Returns bytes written.
    fn write(&self, id: &str, stream: &mut dyn Read) -> io::Result<u64>;

    /// Fresh read stream over the stored bytes, None if nothing is stored
    fn stream(&self, id: &str) -> io::Result<Option<ByteStream>>;

    /// URL-like locator of the stored bytes, for display and `MediaSource::url`
    fn locate(&self, id: &str) -> String;
}

impl<T: MediaStore + ?Sized> MediaStore for Arc<T> {
    fn exists(&self, id: &str) -> io::Result<bool> {
        (**self).exists(id)
    }

    fn write(&self, id: &str, stream: &mut dyn Read) -> io::Result<u64> {
        (**self).write(id, stream)
    }

    fn stream(&self, id: &str) -> io::Result<Option<ByteStream>> {
        (**self).stream(id)
    }

    fn locate(&self, id: &str) -> String {
        (**self).locate(id)
    }
}

/// Ids are content hashes; anything that could escape the store directory is refused.
fn check_id(id: &str) -> io::Result<()> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(io::Error::new(io::ErrorKind::InvalidInput, format!("invalid media id: {:?}", id)))
    }
}

/// Directory-backed store: `<root>/<id>`
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create media store: {}", root.display()))?;
        debug!("FsStore opened at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `id`
    pub fn path(&self, id: &str) -> io::Result<PathBuf> {
        check_id(id)?;
        Ok(self.root.join(id))
    }
}

impl MediaStore for FsStore {
    fn exists(&self, id: &str) -> io::Result<bool> {
        Ok(self.path(id)?.is_file())
    }

    fn write(&self, id: &str, stream: &mut dyn Read) -> io::Result<u64> {
        let path = self.path(id)?;
        let tmp = self.root.join(format!(".{}.partial", id));
        let written = {
            let mut file = fs::File::create(&tmp)?;
            io::copy(stream, &mut file)?
        };
        fs::rename(&tmp, &path)?;
        debug!("FsStore wrote {} ({} bytes)", id, written);
        Ok(written)
    }

    fn stream(&self, id: &str) -> io::Result<Option<ByteStream>> {
        let path = self.path(id)?;
        match fs::File::open(&path) {
            Ok(file) => Ok(Some(Box::new(io::BufReader::new(file)))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn locate(&self, id: &str) -> String {
        self.root.join(id).display().to_string()
    }
}

/// In-memory store with access counters
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<String, Arc<Vec<u8>>>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `stream()` calls that returned data
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `write()` calls
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MediaStore for MemoryStore {
    fn exists(&self, id: &str) -> io::Result<bool> {
        Ok(self.files.lock().unwrap_or_else(|e| e.into_inner()).contains_key(id))
    }

    fn write(&self, id: &str, stream: &mut dyn Read) -> io::Result<u64> {
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        let written = bytes.len() as u64;
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string(), Arc::new(bytes));
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(written)
    }

    fn stream(&self, id: &str) -> io::Result<Option<ByteStream>> {
        let bytes = self.files.lock().unwrap_or_else(|e| e.into_inner()).get(id).cloned();
        Ok(bytes.map(|b| {
            self.reads.fetch_add(1, Ordering::Relaxed);
            Box::new(Cursor::new(b.as_ref().clone())) as ByteStream
        }))
    }

    fn locate(&self, id: &str) -> String {
        format!("memory://{}", id)
    }
}
