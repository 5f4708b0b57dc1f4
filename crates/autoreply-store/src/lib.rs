//! # autoreply-store
//!
//! Per-session JSON persistence for keyword rules, default messages, and the
//! set of contacts that already received the default message.

pub mod store;

pub use store::{JsonStore, RecordKind, SessionRecords, StoreError};
