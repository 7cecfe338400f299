//! Per-asset transaction ledger of executed fills

use super::types::{LedgerEntry, PendingFill, Side};
use rust_decimal::Decimal;

/// Append-only, chronological list of fills for one asset
///
/// Orders accepted without a known fill price wait in `pending` until a
/// price is observed; they never appear as entries before that.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionLedger {
    entries: Vec<LedgerEntry>,
    pending: Vec<PendingFill>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored entries, kept in the given order
    pub fn from_entries(entries: Vec<LedgerEntry>) -> Self {
        Self {
            entries,
            pending: Vec::new(),
        }
    }

    /// Build from stored entries and unsettled orders
    pub fn with_pending(entries: Vec<LedgerEntry>, pending: Vec<PendingFill>) -> Self {
        Self { entries, pending }
    }

    /// Record a fill
    pub fn append(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    /// Hold an accepted order until its price is known
    pub fn add_pending(&mut self, pending: PendingFill) {
        self.pending.push(pending);
    }

    pub fn pending(&self) -> &[PendingFill] {
        &self.pending
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Settle every pending order at `price`, returning the new entries
    ///
    /// Nothing happens unless `price` is positive.
    pub fn settle_pending(&mut self, price: Decimal) -> Vec<LedgerEntry> {
        if price <= Decimal::ZERO || self.pending.is_empty() {
            return Vec::new();
        }
        let settled: Vec<LedgerEntry> = self
            .pending
            .drain(..)
            .filter_map(|p| p.settle(price))
            .collect();
        self.entries.extend(settled.iter().copied());
        settled
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are neither fills nor pending orders
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.pending.is_empty()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Most recent fill of any side
    pub fn latest(&self) -> Option<&LedgerEntry> {
        self.entries.last()
    }

    /// Most recent buy
    pub fn latest_buy(&self) -> Option<&LedgerEntry> {
        self.latest_of(Side::Buy)
    }

    /// Most recent sell
    pub fn latest_sell(&self) -> Option<&LedgerEntry> {
        self.latest_of(Side::Sell)
    }

    fn latest_of(&self, side: Side) -> Option<&LedgerEntry> {
        self.entries.iter().rev().find(|e| e.side == side)
    }

    /// Side and length of the trailing run of same-side fills
    pub fn streak(&self) -> Option<(Side, usize)> {
        let side = self.latest()?.side;
        let count = self
            .entries
            .iter()
            .rev()
            .take_while(|e| e.side == side)
            .count();
        Some((side, count))
    }

    /// Length of the trailing run if it is on `side`, else zero
    pub fn streak_of(&self, side: Side) -> usize {
        match self.streak() {
            Some((s, count)) if s == side => count,
            _ => 0,
        }
    }
}
