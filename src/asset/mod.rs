//! Asset state tracking
//!
//! Price histories, per-asset records, the asset registry and the
//! transaction ledger of executed fills.

mod history;
mod ledger;
mod record;
mod registry;
mod types;

pub use history::{PriceHistory, DEFAULT_HISTORY_CAPACITY};
pub use ledger::TransactionLedger;
pub use record::{rate_of_return, AssetRecord};
pub use registry::{AssetRegistry, UpdateOutcome};
pub use types::{LedgerEntry, OrderingViolation, PendingFill, PricePoint, Side};
