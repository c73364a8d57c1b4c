//! Game module
//!
//! Spatial and synchronization logic of the info engine:
//! - Coordinates, zones and build areas
//! - Zone index of players and NPCs
//! - Region rebuilds
//! - Entity info synchronization and the tick driver

pub mod build_area;
pub mod coord;
pub mod rebuild;
pub mod sync;
pub mod world;
pub mod zone_index;
