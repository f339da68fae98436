//! Usage metering for the Reco assistant.
//!
//! Two interchangeable quota strategies, selected by configuration:
//!
//! - **Balance mode**: an integer minor-unit balance with clamped debits and
//!   an append-only ledger whose running sum always equals the cached balance.
//! - **Quota mode**: a capped count of answered messages.
//!
//! All state lives behind the [`CreditStore`] trait; [`MemoryStore`] backs the
//! degraded mode when no durable store is configured, [`SqliteStore`] backs
//! production. Every store failure degrades to a safe default (no balance,
//! zero credits) instead of propagating.

mod error;
mod ledger;
mod store;

pub use error::StoreError;
pub use ledger::{
    CreditLedger, LedgerConfig, MeteringMode, REASON_CHAT_SPEND, REASON_INIT_GRANT, REASON_TOPUP,
};
pub use store::{CreditStore, LedgerEntry, MemoryStore, SqliteStore, UserAccount};
