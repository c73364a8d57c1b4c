//! Entity info synchronization
//!
//! Keeps every connected client's view of nearby players and NPCs in sync:
//! - Tracking which entities each observer sees (high and low resolution)
//! - Encoding movement as walk/run/teleport deltas (opcodes 81 and 65)
//! - Precomputing extended info once per tick for all observers
//! - Assembling observer packets in parallel each game tick

pub mod avatar;
pub mod cell_opcodes;
pub mod extended_info;
pub mod info_protocol;
pub mod observer;
pub mod packet;
pub mod pool;
pub mod update_flags;
pub mod visibility;

pub use avatar::{Avatar, AvatarKind, AvatarMovement};
pub use extended_info::{EncoderRegistry, ExtendedInfoKind};
pub use info_protocol::{AvatarIndex, ExceptionHandler, InfoProtocol, InfoProtocolBuilder, TickReport};
pub use observer::{Observer, ObserverPackets, ViewSettings, ViewState};
pub use update_flags::UpdateFlags;
pub use visibility::{DistanceVisibility, VisibilityPredicate};
