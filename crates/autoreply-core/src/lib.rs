//! # autoreply-core
//!
//! Core types, traits, configuration, keyword matching, and error handling
//! for the autoreply service.

pub mod config;
pub mod error;
pub mod message;
pub mod rules;
pub mod session;
pub mod traits;

pub use config::shellexpand;
