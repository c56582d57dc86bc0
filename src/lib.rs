//! Tax-parcel bookkeeping for an ASX share portfolio.
//!
//! The ledger of buys and sells is replayed into parcels under a FIFO or LIFO
//! matching policy. Every sale becomes one CGT event per parcel it draws on,
//! with the 12-month discount applied. Around that engine sit a SQLite store,
//! a CSV importer, a rate-limited quote gateway and franking credit maths.

pub mod accounting;
pub mod config;
pub mod error;
pub mod franking;
pub mod ledger;
pub mod parser;
pub mod prices;
pub mod store;

pub use accounting::accountant::Accountant;
pub use accounting::calculation::rebuild_from_ledger;
pub use accounting::{CgtEvent, MatchingPolicy, Parcel, ParcelBook};
pub use error::TaxError;
pub use ledger::{Action, Status, Transaction};
