//! Asset registry keyed by symbol

use super::record::AssetRecord;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Result of merging a record into the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Symbol was new
    Inserted,
    /// Symbol existed; `appended` new price points were accepted
    Merged { appended: usize },
}

/// A named group of assets, at most one record per symbol
///
/// Insertion order is preserved so logs and snapshots are deterministic.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    name: String,
    assets: Vec<AssetRecord>,
}

impl AssetRegistry {
    /// Create an empty registry
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assets: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetRecord> {
        self.assets.iter()
    }

    /// Symbols in insertion order
    pub fn symbols(&self) -> Vec<String> {
        self.assets.iter().map(|a| a.symbol.clone()).collect()
    }

    /// Look up an asset by symbol
    pub fn search(&self, symbol: &str) -> Option<&AssetRecord> {
        self.assets.iter().find(|a| a.symbol == symbol)
    }

    /// Mutable lookup by symbol
    pub fn search_mut(&mut self, symbol: &str) -> Option<&mut AssetRecord> {
        self.assets.iter_mut().find(|a| a.symbol == symbol)
    }

    /// Merge a record into the registry, inserting it if new
    ///
    /// Incoming price points go through the history ordering guard, so
    /// points already seen are silently skipped and re-applying the same
    /// record is a no-op. Quantity and name are taken from the incoming
    /// record.
    pub fn update(&mut self, record: AssetRecord) -> UpdateOutcome {
        match self.search_mut(&record.symbol) {
            Some(existing) => {
                let mut appended = 0;
                for point in record.history.iter() {
                    match existing.record_price(*point) {
                        Ok(()) => appended += 1,
                        Err(e) => {
                            tracing::trace!(symbol = %record.symbol, error = %e, "Skipping seen point")
                        }
                    }
                }
                existing.quantity = record.quantity;
                existing.name = record.name;
                UpdateOutcome::Merged { appended }
            }
            None => {
                self.assets.push(record);
                UpdateOutcome::Inserted
            }
        }
    }

    /// Drop an asset, returning it if present
    pub fn remove(&mut self, symbol: &str) -> Option<AssetRecord> {
        let idx = self.assets.iter().position(|a| a.symbol == symbol)?;
        Some(self.assets.remove(idx))
    }

    /// Keep only assets matching the predicate
    pub fn retain(&mut self, mut keep: impl FnMut(&AssetRecord) -> bool) {
        self.assets.retain(|a| keep(a));
    }

    /// Sum of member values
    pub fn total_value(&self) -> Decimal {
        self.assets.iter().map(AssetRecord::value).sum()
    }

    /// Fraction (0..=1) of total value held in each asset
    ///
    /// Every fraction is zero when the total value is zero.
    pub fn percents(&self) -> BTreeMap<String, Decimal> {
        let total = self.total_value();
        self.assets
            .iter()
            .map(|a| {
                let fraction = if total.is_zero() {
                    Decimal::ZERO
                } else {
                    a.value() / total
                };
                (a.symbol.clone(), fraction)
            })
            .collect()
    }
}

impl FromIterator<AssetRecord> for AssetRegistry {
    fn from_iter<I: IntoIterator<Item = AssetRecord>>(iter: I) -> Self {
        let mut registry = AssetRegistry::new("assets");
        for record in iter {
            registry.update(record);
        }
        registry
    }
}
