//! One JSON document per package on disk, sharded by top-level directory.
//!
//! Unreadable or stale records are treated as cache misses, never as errors;
//! the worst a broken cache can do is force a recomputation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::check::status::{CACHE_SCHEMA_VERSION, CachedRecord};
use crate::dt::descriptor::TypingsDescriptor;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] io::Error),
    #[error("cache serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct StatusCache {
    root: PathBuf,
}

impl StatusCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `node` lands in `<root>/node/node.json`; a versioned subdirectory
    /// like `node/v18` lands beside it as `node/node#v18.json`. The shard
    /// keeps any one directory from collecting ten thousand entries.
    fn record_path(&self, sub_directory_path: &str) -> PathBuf {
        let shard = sub_directory_path
            .split('/')
            .next()
            .unwrap_or(sub_directory_path);
        let file = format!("{}.json", sub_directory_path.replace('/', "#"));
        self.root.join(shard).join(file)
    }

    /// A usable prior record for this descriptor, or `None`. Reads that fail
    /// for any reason and records fenced off by a schema or declared-version
    /// mismatch all count as misses.
    pub fn load(&self, descriptor: &TypingsDescriptor) -> Option<CachedRecord> {
        let path = self.record_path(&descriptor.sub_directory_path);
        let raw = fs::read_to_string(&path).ok()?;
        let record: CachedRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                debug!("discarding unreadable cache record {}: {e}", path.display());
                return None;
            }
        };
        if record.schema_version != CACHE_SCHEMA_VERSION {
            debug!(
                "discarding cache record {} with schema {}",
                path.display(),
                record.schema_version
            );
            return None;
        }
        let declared = format!("{}.{}", descriptor.major, descriptor.minor);
        if record.types_version != declared {
            debug!(
                "discarding cache record {}: declared {} but cached {}",
                path.display(),
                declared,
                record.types_version
            );
            return None;
        }
        Some(record)
    }

    pub fn store(&self, record: &CachedRecord) -> Result<(), CacheError> {
        let path = self.record_path(&record.sub_directory_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut body = serde_json::to_string_pretty(record)?;
        body.push('\n');
        fs::write(&path, body)?;
        Ok(())
    }

    /// Every record under the cache root, in directory-walk order. A missing
    /// root is an empty cache; individual unreadable records are skipped.
    pub fn load_all(&self) -> Result<Vec<CachedRecord>, CacheError> {
        let shards = match fs::read_dir(&self.root) {
            Ok(shards) => shards,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for shard in shards {
            let shard = shard?.path();
            if !shard.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&shard)? {
                let path = entry?.path();
                if path.extension().is_none_or(|ext| ext != "json") {
                    continue;
                }
                match read_record(&path) {
                    Some(record) => records.push(record),
                    None => debug!("skipping unreadable cache record {}", path.display()),
                }
            }
        }
        Ok(records)
    }
}

fn read_record(path: &Path) -> Option<CachedRecord> {
    let raw = fs::read_to_string(path).ok()?;
    let record: CachedRecord = serde_json::from_str(&raw).ok()?;
    (record.schema_version == CACHE_SCHEMA_VERSION).then_some(record)
}
