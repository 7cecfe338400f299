//! Persistent strategy state
//!
//! One JSON document per tracked asset, an aggregate snapshot, the last
//! order time, and append-only CSV value logs for charting. Documents are
//! written to a temporary sibling and renamed into place.

mod document;
mod values;

pub use document::{AssetDocument, Snapshot, SnapshotEntry};
pub use values::ValueLog;

use crate::asset::{AssetRecord, AssetRegistry, TransactionLedger};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SNAPSHOT_FILE: &str = "assets.json";
const LAST_ORDER_FILE: &str = "last_order_time.txt";
const ASSET_PREFIX: &str = "asset_";

/// Persistence failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("CSV error on {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("invalid timestamp in {path}: {source}")]
    Timestamp {
        path: PathBuf,
        source: chrono::ParseError,
    },
}

/// Lowercase the symbol and replace anything that is not alphanumeric
pub fn sanitize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// File-backed state for one strategy working directory
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Open (creating if needed) a working directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for a symbol
    pub fn asset_path(&self, symbol: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}.json", ASSET_PREFIX, sanitize_symbol(symbol)))
    }

    /// Load a symbol's persisted state, `None` if never saved
    pub fn load_asset(
        &self,
        symbol: &str,
        capacity: usize,
    ) -> Result<Option<(AssetRecord, TransactionLedger)>, StoreError> {
        let path = self.asset_path(symbol);
        let doc: Option<AssetDocument> = read_json(&path)?;
        Ok(doc.map(|d| d.into_state(capacity)))
    }

    /// Persist a symbol's record and ledger
    pub fn save_asset(
        &self,
        record: &AssetRecord,
        ledger: &TransactionLedger,
    ) -> Result<(), StoreError> {
        let path = self.asset_path(&record.symbol);
        write_json(&path, &AssetDocument::from_state(record, ledger))
    }

    /// Load every asset document in the directory
    ///
    /// Unparsable documents are logged and skipped.
    pub fn load_all_assets(
        &self,
        capacity: usize,
    ) -> Result<Vec<(AssetRecord, TransactionLedger)>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                let name = p.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                name.starts_with(ASSET_PREFIX) && name.ends_with(".json")
            })
            .collect();
        paths.sort();

        let mut assets = Vec::with_capacity(paths.len());
        for path in paths {
            match read_json::<AssetDocument>(&path) {
                Ok(Some(doc)) => assets.push(doc.into_state(capacity)),
                Ok(None) => {}
                Err(e @ StoreError::Json { .. }) => {
                    tracing::warn!(error = %e, "Skipping unreadable asset document")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(assets)
    }

    /// Write the aggregate snapshot
    pub fn save_snapshot(
        &self,
        registry: &AssetRegistry,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        write_json(
            &self.dir.join(SNAPSHOT_FILE),
            &Snapshot::from_registry(registry, now),
        )
    }

    /// Read the aggregate snapshot, `None` if never written
    pub fn load_snapshot(&self) -> Result<Option<Snapshot>, StoreError> {
        read_json(&self.dir.join(SNAPSHOT_FILE))
    }

    /// Record when orders were last placed
    pub fn save_last_order_time(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        write_atomic(&self.dir.join(LAST_ORDER_FILE), at.to_rfc3339().as_bytes())
    }

    /// When orders were last placed, `None` if never
    pub fn load_last_order_time(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let path = self.dir.join(LAST_ORDER_FILE);
        let Some(content) = read_optional(&path)? else {
            return Ok(None);
        };
        DateTime::parse_from_rfc3339(content.trim())
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|source| StoreError::Timestamp { path, source })
    }

    /// CSV value log writer for this directory
    pub fn value_log(&self) -> ValueLog {
        ValueLog::new(self.dir.clone())
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let Some(content) = read_optional(path)? else {
        return Ok(None);
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &json)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    let io_err = |source: io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    fs::write(&tmp, bytes).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}
