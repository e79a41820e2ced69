use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::error::{ManifestError, Result};
use crate::models::{CacheMetadata, ManifestDocument, ManifestTable};

/// Manifest body file name in the cache directory
const DOCUMENT_FILE: &str = "manifest.json";

/// Metadata file name in the cache directory
const METADATA_FILE: &str = "metadata.json";

/// Suffix for in-progress writes, renamed into place once synced
const TEMP_SUFFIX: &str = ".tmp";

/// Lock file serializing refills between processes sharing the directory
const LOCK_FILE: &str = ".lock";

struct Loaded {
    metadata: CacheMetadata,
    document: Arc<ManifestDocument>,
}

/// Disk-backed store for a single manifest and its metadata.
///
/// The document is written before the metadata, each through a temp file
/// and rename, so metadata never points at a half-written body. A body
/// whose size disagrees with the metadata, or either file on its own, reads
/// as an empty cache.
///
/// The last document read or written is kept in memory and reused while the
/// on-disk metadata still matches it.
/// Exclusive hold on the cache directory's lock file. Released on drop.
pub struct CacheLock {
    _file: File,
}

pub struct CacheStore {
    cache_dir: PathBuf,
    loaded: RwLock<Option<Loaded>>,
}

impl CacheStore {
    /// The directory is created on first write.
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            loaded: RwLock::new(None),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn document_path(&self) -> PathBuf {
        self.cache_dir.join(DOCUMENT_FILE)
    }

    fn metadata_path(&self) -> PathBuf {
        self.cache_dir.join(METADATA_FILE)
    }

    pub fn read_metadata(&self) -> Result<Option<CacheMetadata>> {
        let path = self.metadata_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ManifestError::io("Failed to read", &path, e)),
        };

        match serde_json::from_str(&contents) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable cache metadata, treating as empty cache");
                Ok(None)
            }
        }
    }

    pub fn read_document(&self) -> Result<Option<Arc<ManifestDocument>>> {
        match self.read_metadata()? {
            Some(metadata) => self.read_document_for(&metadata),
            None => Ok(None),
        }
    }

    /// Read the document described by `metadata`. `None` if the body is
    /// missing or does not match.
    pub fn read_document_for(
        &self,
        metadata: &CacheMetadata,
    ) -> Result<Option<Arc<ManifestDocument>>> {
        if let Some(document) = self.mirrored(metadata) {
            debug!(version = %metadata.version, "Manifest served from memory");
            return Ok(Some(document));
        }

        let path = self.document_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(version = %metadata.version, "Cache metadata without a document, treating as empty cache");
                return Ok(None);
            }
            Err(e) => return Err(ManifestError::io("Failed to read", &path, e)),
        };

        if bytes.len() as u64 != metadata.size_bytes {
            warn!(
                expected = metadata.size_bytes,
                actual = bytes.len(),
                "Cached document size does not match metadata, treating as empty cache"
            );
            return Ok(None);
        }

        let document: ManifestDocument = match serde_json::from_slice(&bytes) {
            Ok(document) => document,
            Err(e) => {
                warn!(error = %e, "Unreadable cached document, treating as empty cache");
                return Ok(None);
            }
        };

        debug!(version = %metadata.version, tables = document.len(), "Manifest loaded from disk");
        let document = Arc::new(document);
        *self.loaded.write().unwrap_or_else(PoisonError::into_inner) = Some(Loaded {
            metadata: metadata.clone(),
            document: Arc::clone(&document),
        });
        Ok(Some(document))
    }

    /// One table of the cached document. `Ok(None)` when nothing is cached,
    /// `TableNotFound` when the cached document has no such table.
    pub fn read_table(&self, name: &str) -> Result<Option<ManifestTable>> {
        match self.read_document()? {
            Some(document) => ManifestTable::new(document, name)
                .map(Some)
                .ok_or_else(|| ManifestError::TableNotFound(name.to_string())),
            None => Ok(None),
        }
    }

    /// Replace the cached manifest. `size_bytes` in the returned metadata is
    /// the size of the document as written.
    pub fn write(
        &self,
        mut metadata: CacheMetadata,
        document: Arc<ManifestDocument>,
    ) -> Result<CacheMetadata> {
        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| ManifestError::io("Failed to create", &self.cache_dir, e))?;

        let document_path = self.document_path();
        let bytes = serde_json::to_vec(document.as_ref())
            .map_err(|e| ManifestError::io("Failed to serialize", &document_path, e))?;
        metadata.size_bytes = bytes.len() as u64;

        write_atomic(&document_path, &bytes)
            .map_err(|e| ManifestError::io("Failed to write", &document_path, e))?;

        let metadata_path = self.metadata_path();
        let metadata_bytes = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| ManifestError::io("Failed to serialize", &metadata_path, e))?;

        if let Err(e) = write_atomic(&metadata_path, &metadata_bytes) {
            // The old metadata no longer describes the document on disk.
            if let Err(remove_err) = remove_if_exists(&metadata_path) {
                warn!(error = %remove_err, "Failed to remove outdated cache metadata");
            }
            self.forget();
            return Err(ManifestError::io("Failed to write", &metadata_path, e));
        }

        *self.loaded.write().unwrap_or_else(PoisonError::into_inner) = Some(Loaded {
            metadata: metadata.clone(),
            document,
        });

        info!(
            version = %metadata.version,
            size_bytes = metadata.size_bytes,
            "Manifest written to cache"
        );
        Ok(metadata)
    }

    /// Block until this handle holds the directory's lock file exclusively.
    ///
    /// Other processes (and other stores on the same directory) wait here
    /// until the returned guard is dropped. The lock file itself is never
    /// removed.
    pub fn lock(&self) -> Result<CacheLock> {
        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| ManifestError::io("Failed to create", &self.cache_dir, e))?;

        let path = self.cache_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| ManifestError::io("Failed to open", &path, e))?;
        file.lock()
            .map_err(|e| ManifestError::io("Failed to lock", &path, e))?;

        debug!(path = %path.display(), "Cache lock acquired");
        Ok(CacheLock { _file: file })
    }

    /// Remove the cached manifest and its metadata. Succeeds on an empty cache.
    pub fn invalidate(&self) -> Result<()> {
        self.forget();

        let metadata_path = self.metadata_path();
        remove_if_exists(&metadata_path)
            .map_err(|e| ManifestError::io("Failed to remove", &metadata_path, e))?;

        let document_path = self.document_path();
        remove_if_exists(&document_path)
            .map_err(|e| ManifestError::io("Failed to remove", &document_path, e))?;

        for path in [temp_path(&metadata_path), temp_path(&document_path)] {
            if let Err(e) = remove_if_exists(&path) {
                debug!(path = %path.display(), error = %e, "Failed to remove leftover temp file");
            }
        }

        debug!(cache_dir = %self.cache_dir.display(), "Cache invalidated");
        Ok(())
    }

    fn mirrored(&self, metadata: &CacheMetadata) -> Option<Arc<ManifestDocument>> {
        let loaded = self.loaded.read().unwrap_or_else(PoisonError::into_inner);
        loaded
            .as_ref()
            .filter(|l| l.metadata == *metadata)
            .map(|l| Arc::clone(&l.document))
    }

    fn forget(&self) {
        *self.loaded.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Write to a sibling temp file, sync, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = temp_path(path);
    let result = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
