//! Rustscape Info Engine Library
//!
//! Entity visibility tracking and bit-packed player/NPC info for the
//! Rustscape game server.
//!
//! ## Modules
//!
//! - `config` - Engine configuration management
//! - `error` - Error types and result definitions
//! - `game` - Zone index, build areas and the info protocol
//! - `net` - Packet buffers and shared published buffers
//! - `protocol` - Client variants, opcodes and framing

pub mod config;
pub mod error;
pub mod game;
pub mod net;
pub mod protocol;

// Re-export commonly used types
pub use config::InfoConfig;
pub use error::{InfoError, Result};
pub use game::sync::{InfoProtocol, TickReport};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Client revision the wire format targets
pub const REVISION: u32 = 530;
