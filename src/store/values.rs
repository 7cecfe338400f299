//! Append-only CSV value logs for external charting

use super::{sanitize_symbol, StoreError};
use crate::asset::AssetRegistry;
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

const TOTAL_FILE: &str = "value_total.csv";
const TOTAL_HEADER: [&str; 2] = ["timestamp", "total_value"];
const ASSET_HEADER: [&str; 4] = ["timestamp", "price", "quantity", "value"];

/// Writes one row per tick to the total and per-asset CSV files
#[derive(Debug, Clone)]
pub struct ValueLog {
    dir: PathBuf,
}

impl ValueLog {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn total_path(&self) -> PathBuf {
        self.dir.join(TOTAL_FILE)
    }

    pub fn asset_path(&self, symbol: &str) -> PathBuf {
        self.dir
            .join(format!("value_{}.csv", sanitize_symbol(symbol)))
    }

    /// Append the registry's total and per-asset values at `now`
    pub fn append(&self, registry: &AssetRegistry, now: DateTime<Utc>) -> Result<(), StoreError> {
        let ts = now.to_rfc3339();

        append_row(
            &self.total_path(),
            &TOTAL_HEADER,
            &[ts.clone(), registry.total_value().to_string()],
        )?;

        for asset in registry.iter() {
            let price = asset
                .current_price()
                .map(|p| p.to_string())
                .unwrap_or_default();
            append_row(
                &self.asset_path(&asset.symbol),
                &ASSET_HEADER,
                &[
                    ts.clone(),
                    price,
                    asset.quantity.to_string(),
                    asset.value().to_string(),
                ],
            )?;
        }
        Ok(())
    }
}

fn append_row(path: &Path, header: &[&str], row: &[String]) -> Result<(), StoreError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let is_new = file
        .metadata()
        .map(|m| m.len() == 0)
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let csv_err = |source: csv::Error| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if is_new {
        writer.write_record(header).map_err(csv_err)?;
    }
    writer.write_record(row).map_err(csv_err)?;
    writer.flush().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}
