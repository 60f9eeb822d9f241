//! Content-addressed snapshot storage.
//!
//! Snapshot states are stored as blobs named by their SHA-256 hash under
//! `blobs/<first byte hex>/<hash hex>`. Snapshot metadata goes to an
//! append-only `manifest.jsonl`, one JSON object per line, so the ordered
//! snapshot list can be rebuilt with [`SnapshotBlobStore::load_snapshots`].

use crate::error::{HistoryError, Result};
use crate::types::{Snapshot, SnapshotHash, SnapshotId, Timestamp};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Magic bytes for blob files.
const BLOB_MAGIC: &[u8; 4] = b"SNB\0";

/// Current blob format version.
const BLOB_VERSION: u8 = 1;

const MANIFEST_FILE: &str = "manifest.jsonl";

/// One line of the manifest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub id: SnapshotId,
    pub timestamp: Timestamp,
    pub edit_index: i64,
    pub doc_length: usize,
    /// Hex SHA-256 of the state blob.
    pub hash: String,
}

/// Content-addressed snapshot storage with an LRU read cache.
pub struct SnapshotBlobStore {
    /// Base directory.
    path: PathBuf,

    /// Recently read or written states.
    cache: Mutex<LruCache<SnapshotHash, Vec<u8>>>,

    /// Manifest handle, opened for append.
    manifest: Mutex<File>,
}

impl SnapshotBlobStore {
    pub fn open(path: impl AsRef<Path>, cache_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(path.join("blobs"))?;

        let manifest = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.join(MANIFEST_FILE))?;

        let cache_size = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            path,
            cache: Mutex::new(LruCache::new(cache_size)),
            manifest: Mutex::new(manifest),
        })
    }

    /// Store a state blob, returning its hash.
    ///
    /// Storing content that already exists is a no-op.
    pub fn store(&self, content: &[u8]) -> Result<SnapshotHash> {
        let hash = SnapshotHash::from_bytes(content);

        if self.exists(&hash) {
            return Ok(hash);
        }

        fs::create_dir_all(self.shard_path(&hash))?;

        // Write to a temp file first so readers never see a partial blob
        let blob_path = self.blob_path(&hash);
        let tmp_path = blob_path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(BLOB_MAGIC)?;
            file.write_all(&[BLOB_VERSION])?;
            file.write_all(&(content.len() as u64).to_le_bytes())?;
            file.write_all(content)?;
            file.write_all(&crc32fast::hash(content).to_le_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &blob_path)?;

        self.cache.lock().put(hash, content.to_vec());

        Ok(hash)
    }

    /// Get a state blob by hash.
    pub fn get(&self, hash: &SnapshotHash) -> Result<Option<Vec<u8>>> {
        if let Some(cached) = self.cache.lock().get(hash).cloned() {
            return Ok(Some(cached));
        }

        let blob_path = self.blob_path(hash);
        if !blob_path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&blob_path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != BLOB_MAGIC {
            return Err(HistoryError::InvalidFormat("Invalid snapshot blob magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != BLOB_VERSION {
            return Err(HistoryError::InvalidFormat(format!(
                "Unsupported snapshot blob version: {}",
                version[0]
            )));
        }

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let mut content = vec![0u8; u64::from_le_bytes(len_bytes) as usize];
        file.read_exact(&mut content)?;

        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)?;
        let stored_checksum = u32::from_le_bytes(checksum_bytes);
        let computed_checksum = crc32fast::hash(&content);
        if stored_checksum != computed_checksum {
            return Err(HistoryError::ChecksumMismatch {
                expected: stored_checksum,
                got: computed_checksum,
            });
        }

        let computed_hash = SnapshotHash::from_bytes(&content);
        if &computed_hash != hash {
            return Err(HistoryError::HashMismatch {
                expected: *hash,
                got: computed_hash,
            });
        }

        self.cache.lock().put(*hash, content.clone());

        Ok(Some(content))
    }

    pub fn exists(&self, hash: &SnapshotHash) -> bool {
        if self.cache.lock().contains(hash) {
            return true;
        }
        self.blob_path(hash).exists()
    }

    /// Delete a blob. Manifest entries referring to it are left in place
    /// and fail to load afterwards.
    pub fn delete(&self, hash: &SnapshotHash) -> Result<bool> {
        self.cache.lock().pop(hash);

        let blob_path = self.blob_path(hash);
        if blob_path.exists() {
            fs::remove_file(&blob_path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// List all stored blob hashes.
    pub fn list(&self) -> Result<Vec<SnapshotHash>> {
        let mut hashes = Vec::new();

        for entry in fs::read_dir(self.path.join("blobs"))? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            for blob_entry in fs::read_dir(entry.path())? {
                let filename = blob_entry?.file_name();
                if let Ok(hash) = SnapshotHash::from_hex(&filename.to_string_lossy()) {
                    hashes.push(hash);
                }
            }
        }

        Ok(hashes)
    }

    /// Store a snapshot's state and append its metadata to the manifest.
    pub fn store_snapshot(&self, snapshot: &Snapshot) -> Result<SnapshotHash> {
        let hash = self.store(&snapshot.state)?;

        let entry = ManifestEntry {
            id: snapshot.id.clone(),
            timestamp: snapshot.timestamp,
            edit_index: snapshot.edit_index,
            doc_length: snapshot.doc_length,
            hash: hash.to_hex(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut manifest = self.manifest.lock();
        manifest.write_all(line.as_bytes())?;

        tracing::debug!(id = %snapshot.id, hash = %hash, "stored snapshot");

        Ok(hash)
    }

    /// Manifest entries in the order they were stored.
    ///
    /// A torn last line is skipped.
    pub fn manifest(&self) -> Result<Vec<ManifestEntry>> {
        let reader = BufReader::new(File::open(self.path.join(MANIFEST_FILE))?);
        let mut entries: Vec<ManifestEntry> = Vec::new();
        let mut lines = reader.lines().peekable();

        while let Some(line) = lines.next() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) if lines.peek().is_none() => {
                    tracing::warn!(error = %e, "skipping torn manifest line");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(entries)
    }

    /// Rebuild the snapshot list from the manifest and blobs.
    pub fn load_snapshots(&self) -> Result<Vec<Snapshot>> {
        self.manifest()?
            .into_iter()
            .map(|entry| {
                let hash = SnapshotHash::from_hex(&entry.hash)
                    .map_err(|e| HistoryError::InvalidFormat(format!("bad manifest hash: {}", e)))?;
                let state = self.get(&hash)?.ok_or_else(|| {
                    HistoryError::InvalidFormat(format!(
                        "snapshot {} refers to missing blob {}",
                        entry.id, entry.hash
                    ))
                })?;
                Ok(Snapshot {
                    id: entry.id,
                    timestamp: entry.timestamp,
                    state,
                    edit_index: entry.edit_index,
                    doc_length: entry.doc_length,
                })
            })
            .collect()
    }

    /// Sync the manifest to disk. Blobs are synced as they are written.
    pub fn sync(&self) -> Result<()> {
        self.manifest.lock().sync_all()?;
        Ok(())
    }

    fn shard_path(&self, hash: &SnapshotHash) -> PathBuf {
        self.path.join("blobs").join(hash.shard_prefix())
    }

    fn blob_path(&self, hash: &SnapshotHash) -> PathBuf {
        self.shard_path(hash).join(hash.to_hex())
    }
}
