use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const SNAPSHOT_FILE: &str = "content.json";

/// Modification timestamp captured from the filesystem, stored at full
/// nanosecond precision so that comparison is exact equality, not ordering.
/// A file restored to an older mtime is just as stale as a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
    pub secs: u64,
    pub nanos: u32,
}

impl FileStamp {
    pub fn from_metadata(path: &Path) -> Result<Self> {
        let modified = fs::metadata(path)?.modified()?;
        Ok(Self::from_system_time(modified))
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(duration) => Self {
                secs: duration.as_secs(),
                nanos: duration.subsec_nanos(),
            },
            // Pre-epoch mtimes collapse to zero; such files always re-parse.
            Err(_) => Self { secs: 0, nanos: 0 },
        }
    }
}

/// One cached parse result: the rendered HTML body plus the frontmatter map,
/// keyed by the source file's mtime at parse time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub mtime: FileStamp,
    pub html: String,
    pub frontmatter: HashMap<String, Value>,
}

/// Parse-result cache persisted as a JSON snapshot between builds. Lookups
/// require the stored mtime to equal the file's current mtime exactly; any
/// mismatch is a miss and the file is re-parsed.
pub struct FreshnessCache {
    snapshot_path: PathBuf,
    entries: HashMap<String, CacheEntry>,
    dirty: bool,
}

impl FreshnessCache {
    /// Loads the snapshot under `cache_dir`. A missing or unreadable
    /// snapshot yields an empty cache; corruption is reported but never
    /// fails a build.
    pub fn load(cache_dir: &Path) -> Self {
        let snapshot_path = cache_dir.join(SNAPSHOT_FILE);

        let entries = match fs::read_to_string(&snapshot_path) {
            Ok(serialized) => match serde_json::from_str(&serialized) {
                Ok(entries) => entries,
                Err(error) => {
                    eprintln!(
                        "Warning: discarding corrupt cache snapshot {}: {}",
                        snapshot_path.display(),
                        error
                    );
                    HashMap::new()
                }
            },
            Err(error) => {
                if error.kind() != std::io::ErrorKind::NotFound {
                    eprintln!(
                        "Warning: failed to read cache snapshot {}: {}",
                        snapshot_path.display(),
                        error
                    );
                }
                HashMap::new()
            }
        };

        Self {
            snapshot_path,
            entries,
            dirty: false,
        }
    }

    pub fn get(&self, key: &str, current: &FileStamp) -> Option<&CacheEntry> {
        self.entries
            .get(key)
            .filter(|entry| entry.mtime == *current)
    }

    pub fn put(&mut self, key: &str, entry: CacheEntry) {
        self.entries.insert(key.to_string(), entry);
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the snapshot back to disk if anything changed. The write goes
    /// through a temporary file and a rename so a crash mid-write leaves the
    /// previous snapshot intact.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.snapshot_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let serialized = serde_json::to_string(&self.entries)
            .map_err(|error| std::io::Error::other(error.to_string()))?;

        let temporary_path = self.snapshot_path.with_extension("json.tmp");
        fs::write(&temporary_path, serialized)?;
        fs::rename(&temporary_path, &self.snapshot_path)?;

        self.dirty = false;
        Ok(())
    }
}
