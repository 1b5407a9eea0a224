//! On-disk cache tier: one file per key.

use crate::error::{CacheError, CacheResult};
use bytes::Bytes;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

// Longest file name accepted by common filesystems.
const MAX_FILE_NAME_LEN: usize = 255;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// The persistent cache tier.
///
/// Each entry is one file directly under the cache directory, named
/// after its key. There is no manifest and no internal structure:
/// whatever files exist on disk are the cache, and a missing file is a
/// miss. Entries survive process restarts and are bounded only by
/// available storage.
///
/// Writes are atomic per entry (temp file + rename), so concurrent
/// writers to the same key end last-writer-wins and a reader never sees
/// a half-written entry.
#[derive(Debug)]
pub struct DiskTier {
    dir: PathBuf,
}

impl DiskTier {
    /// Opens the tier rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> CacheResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Returns the cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a value under a key, replacing any existing entry.
    pub fn put(&self, key: &str, value: &[u8]) -> CacheResult<()> {
        let path = self.path_for(key)?;
        let temp = self.dir.join(format!(
            ".tmp-{}-{}",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let mut file = fs::File::create(&temp)?;
        file.write_all(value)?;
        file.sync_all()?;
        drop(file);

        if let Err(err) = fs::rename(&temp, &path) {
            let _ = fs::remove_file(&temp);
            return Err(err.into());
        }
        Ok(())
    }

    /// Reads the value under a key. Absence is a miss, not an error.
    pub fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Removes the entry under a key, if present.
    pub fn remove(&self, key: &str) -> CacheResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Removes every entry in the cache directory.
    pub fn clear(&self) -> CacheResult<()> {
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                match fs::remove_file(entry.path()) {
                    Ok(()) => {}
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }
        Ok(())
    }

    fn path_for(&self, key: &str) -> CacheResult<PathBuf> {
        if key.is_empty() {
            return Err(CacheError::invalid_key("empty key"));
        }
        let name = file_name_for_key(key);
        if name.len() > MAX_FILE_NAME_LEN {
            return Err(CacheError::invalid_key("key too long for a file name"));
        }
        Ok(self.dir.join(name))
    }
}

/// Maps a cache key to a flat file name.
///
/// Alphanumerics plus `.`, `_` and `-` pass through; every other byte
/// becomes `%XX`. The mapping is injective, so distinct keys never
/// collide on disk.
fn file_name_for_key(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                name.push(byte as char);
            }
            _ => {
                name.push('%');
                name.push_str(&format!("{byte:02X}"));
            }
        }
    }
    name
}
