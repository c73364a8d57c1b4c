//! Visibility rules
//!
//! Which entities an observer can see is decided by game logic through a
//! `VisibilityPredicate`. The engine only narrows the candidates down to
//! the zones around the observer before asking it.

use crate::game::coord::{CoordGrid, ZONE_SIZE};
use crate::game::zone_index::ZoneIndexStorage;

/// Decides whether one entity is visible to an observer.
///
/// Must be a pure function of its inputs for the duration of a tick.
pub trait VisibilityPredicate: Send + Sync {
    fn is_visible(
        &self,
        observer: CoordGrid,
        candidate: CoordGrid,
        view_distance: u32,
        level: u8,
    ) -> bool;
}

/// Square view distance on the observer's level
#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceVisibility;

impl VisibilityPredicate for DistanceVisibility {
    fn is_visible(
        &self,
        observer: CoordGrid,
        candidate: CoordGrid,
        view_distance: u32,
        level: u8,
    ) -> bool {
        candidate.level == level && observer.within_distance(&candidate, view_distance)
    }
}

impl<F> VisibilityPredicate for F
where
    F: Fn(CoordGrid, CoordGrid, u32, u8) -> bool + Send + Sync,
{
    fn is_visible(
        &self,
        observer: CoordGrid,
        candidate: CoordGrid,
        view_distance: u32,
        level: u8,
    ) -> bool {
        self(observer, candidate, view_distance, level)
    }
}

/// Visit every index stored in the zones within `radius` tiles of `center`
/// on its level, zone by zone from south-west to north-east
pub fn for_each_candidate(
    index: &ZoneIndexStorage,
    center: CoordGrid,
    radius: u32,
    mut visit: impl FnMut(u16),
) {
    let min_x = center.x.saturating_sub(radius) / ZONE_SIZE;
    let min_z = center.z.saturating_sub(radius) / ZONE_SIZE;
    let max_x = (center.x + radius) / ZONE_SIZE;
    let max_z = (center.z + radius) / ZONE_SIZE;

    for zone_x in min_x..=max_x.min(2047) {
        for zone_z in min_z..=max_z.min(2047) {
            for &member in index.get(center.level, zone_x, zone_z) {
                visit(member);
            }
        }
    }
}
