//! # autoreply-channels
//!
//! Session connections for autoreply and QR code rendering.

pub mod qr;
#[cfg(feature = "whatsapp")]
pub mod whatsapp;

pub use qr::{generate_qr_image, generate_qr_terminal};
