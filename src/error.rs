//! Error handling module
//!
//! Defines the error types for the info engine. Structural violations
//! (corrupting the zone index, localizing outside a build area) are panics
//! and never show up here; everything in this module is recoverable at
//! avatar granularity or reported at configuration time.

use thiserror::Error;

use crate::game::sync::extended_info::ExtendedInfoKind;
use crate::protocol::ClientVariant;

/// Main error type for the info engine
#[derive(Error, Debug)]
pub enum InfoError {
    /// Protocol-related errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Extended info encoder errors
    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    /// Avatar allocation errors
    #[error("Avatar error: {0}")]
    Avatar(#[from] AvatarError),

    /// An encoder or packet builder panicked; the panic was contained to
    /// one avatar
    #[error("Panicked: {0}")]
    Panicked(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Protocol-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Packet too large: {size} bytes (max: {max})")]
    PacketTooLarge { size: usize, max: usize },

    #[error("Movement delta out of range: ({dx}, {dz})")]
    MovementOutOfRange { dx: i32, dz: i32 },

    #[error("Invalid coordinate: ({x}, {z}, level {level})")]
    InvalidCoordinate { x: u32, z: u32, level: u8 },
}

/// Extended info encoder errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncoderError {
    #[error("No {kind:?} encoder registered for client variant {variant:?}")]
    MissingEncoder {
        kind: ExtendedInfoKind,
        variant: ClientVariant,
    },

    #[error("{kind:?} payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge {
        kind: ExtendedInfoKind,
        size: usize,
        max: usize,
    },

    #[error("Client variant {0:?} is not supported by this registry")]
    UnsupportedVariant(ClientVariant),

    #[error("Encoder failed: {0}")]
    Failed(String),
}

/// Avatar allocation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AvatarError {
    #[error("Index {index} out of range (capacity: {capacity})")]
    IndexOutOfRange { index: u16, capacity: usize },

    #[error("Index {0} already allocated")]
    IndexInUse(u16),

    #[error("Index {0} not allocated")]
    NotAllocated(u16),
}

/// Result type alias for info engine operations
pub type Result<T> = std::result::Result<T, InfoError>;
