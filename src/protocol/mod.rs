//! Protocol module
//!
//! Wire-level constants shared by every info packet:
//! - Client variants and their per-variant quirks
//! - Outgoing packet opcodes and framing

pub mod client;
pub mod packets;

pub use client::ClientVariant;
pub use packets::OutgoingOpcode;
