//! Networking module
//!
//! Byte-level building blocks for the info engine:
//! - `PacketBuffer` byte/bit cursor used to assemble packets
//! - `SharedBuffer` reference-counted buffers handed to the transport layer
//!
//! Socket I/O lives in the transport layer that consumes these buffers.

pub mod buffer;
pub mod shared;

pub use buffer::PacketBuffer;
pub use shared::SharedBuffer;
