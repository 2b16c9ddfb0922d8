// Copyright 2024 fifocache
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Manages the files inside a managed subdirectory of a cache root.
//! Entries are plain files named by their key; when an insertion would push
//! the directory past its byte budget, the least recently modified files are
//! deleted first until enough room is reclaimed.
//!
//! All entry state lives on disk. There is no in-memory index: lookups and
//! size accounting are fresh directory probes, so entries survive dropping
//! and rebuilding the [`FifoCache`] value.
//!
//! This type does not support concurrent read/write operations. Mutating
//! operations take `&mut self`; callers sharing one managed subdirectory
//! across threads or processes must serialize access themselves.

use std::{
    fmt::{Debug, Formatter},
    fs,
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
    time::SystemTime,
};

use fifocache_utils::readable_size::ReadableSize;
use snafu::{ensure, OptionExt, ResultExt};
use tracing::{debug, warn};

use crate::{
    err::{
        CreateCacheDirSnafu, NegativeStreamSizeSnafu, OpenLocatorSnafu, ReadCacheDirSnafu,
        ResolverUnsetSnafu, Result, StreamLargerThanCacheSnafu, SubdirectoryNotEmptySnafu,
        WriteEntrySnafu, ZeroCapacitySnafu,
    },
    DEFAULT_DIRECTORY, DEFAULT_SIZE,
};

const COPY_BUFFER_SIZE: usize = 1024;

/// Opens a readable byte stream for an opaque content locator.
///
/// This is the injectable seam for callers that hold a URI-like reference
/// instead of an already-open stream; how a locator maps to bytes is the
/// host's business, not the cache's.
pub trait ContentResolver {
    fn open(&self, locator: &str) -> std::io::Result<Box<dyn Read>>;
}

pub struct FifoCacheBuilder {
    base_dir: PathBuf,
    subdirectory: String,
    capacity: ReadableSize,
    resolver: Option<Box<dyn ContentResolver>>,
}

impl FifoCacheBuilder {
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        FifoCacheBuilder {
            base_dir: base_dir.into(),
            subdirectory: DEFAULT_DIRECTORY.to_string(),
            capacity: ReadableSize(DEFAULT_SIZE),
            resolver: None,
        }
    }

    /// Sets the relative path of the subdirectory to manage. An empty string
    /// means the whole cache root is managed by this instance.
    pub fn with_subdirectory<S: Into<String>>(mut self, subdirectory: S) -> Self {
        self.subdirectory = subdirectory.into();
        self
    }

    pub fn with_capacity(mut self, capacity: ReadableSize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_resolver(mut self, resolver: Box<dyn ContentResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn build(self) -> Result<FifoCache> {
        ensure!(self.capacity.as_bytes() > 0, ZeroCapacitySnafu);
        debug!(
            "create fifo cache at {:?}, subdirectory {:?}, capacity {}",
            self.base_dir, self.subdirectory, self.capacity
        );
        Ok(FifoCache {
            base_dir: self.base_dir,
            subdirectory: self.subdirectory,
            capacity: self.capacity.as_bytes(),
            resolver: self.resolver,
        })
    }
}

/// A bounded disk cache with oldest-first eviction.
///
/// The cache root is injected at construction and never managed by this
/// type; only the subdirectory under it is.
pub struct FifoCache {
    base_dir: PathBuf,
    subdirectory: String,
    capacity: u64,
    resolver: Option<Box<dyn ContentResolver>>,
}

impl Debug for FifoCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "FifoCache({})", self.managed_dir().display())
    }
}

impl FifoCache {
    pub fn builder<P: Into<PathBuf>>(base_dir: P) -> FifoCacheBuilder {
        FifoCacheBuilder::new(base_dir)
    }

    /// The relative path of the managed subdirectory,
    /// [`DEFAULT_DIRECTORY`](crate::DEFAULT_DIRECTORY) unless changed.
    pub fn subdirectory(&self) -> &str {
        &self.subdirectory
    }

    /// Replaces the managed subdirectory.
    ///
    /// Fails with [`Error::SubdirectoryNotEmpty`](crate::err::Error) while
    /// the current managed directory still holds any file bytes. No files
    /// are moved; the old directory was confirmed empty and is left as-is.
    pub fn set_subdirectory<S: Into<String>>(&mut self, path: S) -> Result<()> {
        let used = dir_size(&self.managed_dir())?;
        ensure!(used == 0, SubdirectoryNotEmptySnafu { used });
        self.subdirectory = path.into();
        Ok(())
    }

    /// The byte budget, [`DEFAULT_SIZE`](crate::DEFAULT_SIZE) unless changed.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Replaces the byte budget. Lowering it does not evict anything by
    /// itself; eviction is deferred to the next [`put`](Self::put).
    pub fn set_capacity(&mut self, capacity: u64) -> Result<()> {
        ensure!(capacity > 0, ZeroCapacitySnafu);
        self.capacity = capacity;
        Ok(())
    }

    /// Copies `reader` into the cache under `name`, evicting the least
    /// recently modified entries first if `declared_size` would push the
    /// managed directory past its budget. An existing entry with the same
    /// name is overwritten. Returns the path of the written file.
    ///
    /// `declared_size` is trusted as-is and never reconciled against the
    /// bytes actually read; eviction frees room for what the caller claims.
    pub fn put<R: Read>(&mut self, mut reader: R, name: &str, declared_size: i64) -> Result<PathBuf> {
        ensure!(
            declared_size >= 0,
            NegativeStreamSizeSnafu {
                declared: declared_size
            }
        );
        let declared = declared_size as u64;
        ensure!(
            declared <= self.capacity,
            StreamLargerThanCacheSnafu {
                declared,
                capacity: self.capacity
            }
        );

        let managed = self.managed_dir();
        if !managed.exists() {
            fs::create_dir_all(&managed).context(CreateCacheDirSnafu {
                path: managed.clone(),
            })?;
        }

        let used = dir_size(&managed)?;
        let projected = declared + used;
        if projected > self.capacity {
            evict(&managed, projected - self.capacity)?;
        }

        let path = managed.join(name);
        let mut out = fs::File::create(&path).context(WriteEntrySnafu { path: path.clone() })?;
        let written =
            copy_stream(&mut reader, &mut out).context(WriteEntrySnafu { path: path.clone() })?;
        debug!("cached {} bytes as {} (declared {})", written, path.display(), declared);
        Ok(path)
    }

    /// Resolves `locator` through the injected [`ContentResolver`] and caches
    /// the resulting stream; see [`put`](Self::put).
    pub fn put_locator(&mut self, locator: &str, name: &str, declared_size: i64) -> Result<PathBuf> {
        let resolver = self.resolver.as_ref().context(ResolverUnsetSnafu)?;
        let reader = resolver.open(locator).context(OpenLocatorSnafu { locator })?;
        self.put(reader, name, declared_size)
    }

    /// Looks up the file cached under `name`. A miss returns `None`; it is
    /// an expected outcome, not an error. No lock is held on the returned
    /// path.
    pub fn get(&self, name: &str) -> Option<PathBuf> {
        let path = self.managed_dir().join(name);
        if !path.exists() {
            // data doesn't exist
            return None;
        }
        Some(path)
    }

    /// Deletes every cached file in the managed subdirectory. Individual
    /// delete failures are logged and skipped, never surfaced.
    pub fn clear(&mut self) {
        let managed = self.managed_dir();
        if !managed.exists() {
            return;
        }
        // An over-budget directory left behind by earlier failed deletes must
        // still come out empty, so the target is unbounded rather than the
        // configured capacity.
        if let Err(e) = evict(&managed, u64::MAX) {
            warn!("failed to clear cache directory {}: {}", managed.display(), e);
        }
    }

    /// Current total byte size of the direct files in the managed
    /// subdirectory. A missing directory counts as empty.
    pub fn usage(&self) -> Result<u64> {
        dir_size(&self.managed_dir())
    }

    fn managed_dir(&self) -> PathBuf {
        if self.subdirectory.is_empty() {
            self.base_dir.clone()
        } else {
            self.base_dir.join(&self.subdirectory)
        }
    }
}

/// Total byte size of the direct (non-recursive) plain files in `dir`.
fn dir_size(dir: &Path) -> Result<u64> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut size = 0;
    for entry in fs::read_dir(dir).context(ReadCacheDirSnafu { path: dir })? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("cannot read entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        match entry.metadata() {
            Ok(meta) if meta.is_file() => size += meta.len(),
            Ok(_) => {}
            Err(e) => warn!("cannot stat {}: {}", entry.path().display(), e),
        }
    }
    Ok(size)
}

/// Deletes the least recently modified files in `dir` until at least
/// `bytes_to_free` bytes have been reclaimed.
///
/// The listing is a snapshot; a file that disappeared before its turn counts
/// as already freed. Any other individual delete failure is skipped without
/// counting, which can leave the directory over budget.
fn evict(dir: &Path, bytes_to_free: u64) -> Result<u64> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir).context(ReadCacheDirSnafu { path: dir })? {
        let Ok(entry) = entry else { continue };
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        candidates.push((entry.path(), meta.len(), modified));
    }

    // oldest file first
    candidates.sort_by_key(|(_, _, modified)| *modified);

    let mut bytes_deleted = 0;
    for (path, len, _) in candidates {
        match fs::remove_file(&path) {
            Ok(()) => bytes_deleted += len,
            Err(e) if e.kind() == ErrorKind::NotFound => bytes_deleted += len,
            Err(e) => warn!("failed to delete cache file {}: {}", path.display(), e),
        }
        if bytes_deleted >= bytes_to_free {
            break;
        }
    }
    debug!("evicted {} bytes from {}", bytes_deleted, dir.display());
    Ok(bytes_deleted)
}

fn copy_stream<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> std::io::Result<u64> {
    let mut buf = [0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    writer.flush()?;
    Ok(total)
}
