//! Ledger integration tests.

mod reconciliation;
mod revenue;
mod events;
mod concurrency;
