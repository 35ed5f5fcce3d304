//! Accounting rules that turn completion events into persisted progress.

pub mod achievements;
pub mod completion;
pub mod ledger;
pub mod streak;
pub mod xp;
