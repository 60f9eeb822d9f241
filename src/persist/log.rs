//! Append-only edit log file.
//!
//! Each frame is:
//!
//! ```text
//! magic "EDL\0" | version u8 | flags u8 | body_len u32 LE | body | crc32 u32 LE
//! ```
//!
//! where `body` is the MessagePack encoding of one [`VersionedEdit`] and the
//! checksum covers `body`.

use crate::error::{HistoryError, Result};
use crate::types::VersionedEdit;
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for edit log frames.
const LOG_MAGIC: &[u8; 4] = b"EDL\0";

/// Current log format version.
const LOG_VERSION: u8 = 1;

/// Frame size without body.
const FRAME_OVERHEAD: u64 = 4 + 1 + 1 + 4 + 4;

struct Writer {
    file: File,
    /// Offset the next frame is written at.
    size: u64,
    writes_since_sync: u64,
    count: usize,
}

/// Append-only edit log, exclusively locked while open.
pub struct EditLogFile {
    path: PathBuf,
    writer: Mutex<Writer>,
    /// Sync every N writes.
    sync_interval: u64,
}

impl EditLogFile {
    /// Sync every 100 writes by default.
    const DEFAULT_SYNC_INTERVAL: u64 = 100;

    /// Open or create a log with the default sync interval.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_sync_interval(path, Self::DEFAULT_SYNC_INTERVAL)
    }

    /// Open or create a log.
    /// - sync_interval = 0 or 1: sync every write
    /// - sync_interval = 100: sync every 100 writes
    ///
    /// A torn frame at the end of the file (from a crash mid-append) is
    /// truncated away. A complete frame that fails its magic, version or
    /// checksum check is an error and leaves the file untouched.
    pub fn open_with_sync_interval(path: impl AsRef<Path>, sync_interval: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        file.try_lock_exclusive().map_err(|_| HistoryError::Locked)?;

        let file_size = file.metadata()?.len();
        let (valid_size, count) = scan(&path, file_size)?;
        if valid_size < file_size {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = file_size - valid_size,
                "truncating torn tail of edit log"
            );
            file.set_len(valid_size)?;
            file.sync_all()?;
        }

        tracing::debug!(path = %path.display(), edits = count, "opened edit log");

        Ok(Self {
            path,
            writer: Mutex::new(Writer {
                file,
                size: valid_size,
                writes_since_sync: 0,
                count,
            }),
            sync_interval: sync_interval.max(1),
        })
    }

    /// Append an edit. Returns the offset of its frame.
    pub fn append(&self, edit: &VersionedEdit) -> Result<u64> {
        let body = rmp_serde::to_vec_named(edit)?;
        let frame = encode_frame(&body)?;

        let mut writer = self.writer.lock();
        let offset = writer.size;
        writer.file.seek(SeekFrom::Start(offset))?;
        writer.file.write_all(&frame)?;
        writer.size = offset + frame.len() as u64;
        writer.count += 1;

        writer.writes_since_sync += 1;
        if writer.writes_since_sync >= self.sync_interval {
            writer.file.sync_all()?;
            writer.writes_since_sync = 0;
        }

        Ok(offset)
    }

    /// Force pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.file.sync_all()?;
        writer.writes_since_sync = 0;
        Ok(())
    }

    /// Iterate edits in append order.
    ///
    /// Reads through a separate handle, so edits appended after the call
    /// are not visited.
    pub fn iter(&self) -> Result<EditLogIter> {
        let end = self.writer.lock().size;
        let reader = BufReader::new(File::open(&self.path)?);
        Ok(EditLogIter {
            reader,
            offset: 0,
            end,
        })
    }

    /// Read every edit, stopping at the first corrupt frame.
    pub fn read_all(&self) -> Result<Vec<VersionedEdit>> {
        self.iter()?.collect()
    }

    /// Number of edits in the log.
    pub fn len(&self) -> usize {
        self.writer.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the log in bytes.
    pub fn size(&self) -> u64 {
        self.writer.lock().size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for EditLogFile {
    fn drop(&mut self) {
        let writer = self.writer.get_mut();
        let _ = writer.file.sync_all();
        let _ = writer.file.unlock();
    }
}

fn encode_frame(body: &[u8]) -> Result<Vec<u8>> {
    let body_len = u32::try_from(body.len())
        .map_err(|_| HistoryError::Serialization("edit larger than 4 GiB".into()))?;

    let mut frame = Vec::with_capacity(FRAME_OVERHEAD as usize + body.len());
    frame.extend_from_slice(LOG_MAGIC);
    frame.push(LOG_VERSION);
    // Flags (reserved)
    frame.push(0);
    frame.extend_from_slice(&body_len.to_le_bytes());
    frame.extend_from_slice(body);
    frame.extend_from_slice(&crc32fast::hash(body).to_le_bytes());
    Ok(frame)
}

/// Read one frame body. `Ok(None)` on clean end of input.
fn read_frame(reader: &mut impl Read) -> Result<Option<Vec<u8>>> {
    let mut magic = [0u8; 4];
    match reader.read_exact(&mut magic) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    if &magic != LOG_MAGIC {
        return Err(HistoryError::InvalidFormat("Invalid edit log magic".into()));
    }

    let mut version_flags = [0u8; 2];
    reader.read_exact(&mut version_flags)?;
    if version_flags[0] != LOG_VERSION {
        return Err(HistoryError::InvalidFormat(format!(
            "Unsupported edit log version: {}",
            version_flags[0]
        )));
    }

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let mut body = vec![0u8; u32::from_le_bytes(len_bytes) as usize];
    reader.read_exact(&mut body)?;

    let mut checksum_bytes = [0u8; 4];
    reader.read_exact(&mut checksum_bytes)?;
    let stored = u32::from_le_bytes(checksum_bytes);
    let computed = crc32fast::hash(&body);
    if stored != computed {
        return Err(HistoryError::ChecksumMismatch {
            expected: stored,
            got: computed,
        });
    }

    Ok(Some(body))
}

/// Walk the frames of a log. Returns the length of the valid prefix and
/// the number of frames in it.
///
/// Only a frame cut short by the end of the file ends the prefix early;
/// any other bad frame fails the scan.
fn scan(path: &Path, file_size: u64) -> Result<(u64, usize)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut offset = 0u64;
    let mut count = 0usize;

    while offset < file_size {
        match read_frame(&mut reader) {
            Ok(Some(body)) => {
                offset += FRAME_OVERHEAD + body.len() as u64;
                count += 1;
            }
            Ok(None) => break,
            Err(HistoryError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                tracing::error!(path = %path.display(), offset, error = %e, "corrupt edit log frame");
                return Err(e);
            }
        }
    }

    Ok((offset, count))
}

/// Iterator over the edits of an [`EditLogFile`].
pub struct EditLogIter {
    reader: BufReader<File>,
    offset: u64,
    end: u64,
}

impl Iterator for EditLogIter {
    type Item = Result<VersionedEdit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.end {
            return None;
        }

        let body = match read_frame(&mut self.reader) {
            Ok(Some(body)) => body,
            Ok(None) => {
                self.offset = self.end;
                return None;
            }
            Err(e) => {
                // Stop iteration on error
                self.offset = self.end;
                return Some(Err(e));
            }
        };
        self.offset += FRAME_OVERHEAD + body.len() as u64;

        match rmp_serde::from_slice(&body) {
            Ok(edit) => Some(Ok(edit)),
            Err(e) => {
                self.offset = self.end;
                Some(Err(e.into()))
            }
        }
    }
}
