//! Info protocol
//!
//! Owns every avatar and observer and drives the per-tick pipeline:
//! 1. Move changed avatars in the zone indices
//! 2. Resolve each observer's views (and recentre its build area)
//! 3. Precompute flagged extended info once per avatar
//! 4. Assemble every observer's packets in parallel on the worker pool
//! 5. Publish the packets, releasing the ones from two ticks ago
//! 6. Reset per-tick avatar state
//!
//! Steps 1-3 and 5-6 mutate shared state and run on the calling thread.
//! Step 4 only reads it.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, error, info, trace};

use crate::config::InfoConfig;
use crate::error::{AvatarError, EncoderError, InfoError, Result};
use crate::game::coord::CoordGrid;
use crate::game::rebuild::{StaticZoneProvider, ZoneProvider};
use crate::game::zone_index::ZoneIndexStorage;
use crate::net::buffer::PacketBuffer;
use crate::protocol::ClientVariant;

use super::avatar::{Avatar, AvatarArgs, AvatarKind};
use super::extended_info::{Appearance, EncoderRegistry};
use super::observer::{Observer, ObserverArgs, ObserverPackets, ViewSettings};
use super::packet::AssemblyContext;
use super::pool::{ObjectPool, PoolStats};
use super::visibility::{DistanceVisibility, VisibilityPredicate};

/// Player or NPC slot index
pub type AvatarIndex = u16;

/// Receives per-avatar failures that were isolated from the rest of the tick
pub type ExceptionHandler = Box<dyn Fn(AvatarIndex, &InfoError) + Send + Sync>;

/// Idle avatars and observers kept for reuse
const POOL_MAX_IDLE: usize = 256;

/// Outcome of one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Observers that received packets
    pub observers: usize,
    pub published_bytes: usize,
    pub failures: usize,
    pub elapsed: Duration,
}

fn default_exception_handler() -> ExceptionHandler {
    Box::new(|index, error| {
        error!(avatar = index, error = %error, "Avatar info update failed");
    })
}

/// Text of a caught panic payload
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}

/// Builder for `InfoProtocol`
pub struct InfoProtocolBuilder {
    config: InfoConfig,
    registry: EncoderRegistry,
    zone_provider: Box<dyn ZoneProvider>,
    visibility: Box<dyn VisibilityPredicate>,
    exception_handler: ExceptionHandler,
}

impl InfoProtocolBuilder {
    pub fn new(config: InfoConfig) -> Self {
        Self {
            config,
            registry: EncoderRegistry::standard(),
            zone_provider: Box::new(StaticZoneProvider),
            visibility: Box::new(DistanceVisibility),
            exception_handler: default_exception_handler(),
        }
    }

    pub fn registry(mut self, registry: EncoderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn zone_provider(mut self, provider: impl ZoneProvider + 'static) -> Self {
        self.zone_provider = Box::new(provider);
        self
    }

    pub fn visibility(mut self, predicate: impl VisibilityPredicate + 'static) -> Self {
        self.visibility = Box::new(predicate);
        self
    }

    pub fn exception_handler(
        mut self,
        handler: impl Fn(AvatarIndex, &InfoError) + Send + Sync + 'static,
    ) -> Self {
        self.exception_handler = Box::new(handler);
        self
    }

    /// Build the protocol; fails when the registry is missing an encoder
    /// for a configured client variant
    pub fn build(self) -> Result<InfoProtocol> {
        let config = self.config;
        config
            .validate()
            .map_err(|e| InfoError::Config(e.to_string()))?;
        self.registry.validate(&config.client_variants)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("info-worker-{}", i))
            .build()
            .map_err(|e| InfoError::Internal(format!("worker pool: {}", e)))?;

        info!(
            workers = pool.current_num_threads(),
            players = config.player_capacity,
            npcs = config.npc_capacity,
            variants = ?config.client_variants,
            "Info protocol ready"
        );

        Ok(InfoProtocol {
            view: config.view_settings(),
            build_area_zones: config.build_area_zones,
            rebuild_threshold: config.rebuild_threshold_tiles,
            max_packet_size: config.max_packet_size,
            variants: config.client_variants,
            registry: self.registry,
            zone_provider: self.zone_provider,
            visibility: self.visibility,
            exception_handler: self.exception_handler,
            pool,
            players: (0..config.player_capacity).map(|_| None).collect(),
            npcs: (0..config.npc_capacity).map(|_| None).collect(),
            observers: (0..config.player_capacity).map(|_| None).collect(),
            // Every avatar occupies one zone, so capacity bounds the zone count
            player_index: ZoneIndexStorage::new(config.player_capacity),
            npc_index: ZoneIndexStorage::new(config.npc_capacity),
            freed_players: HashSet::new(),
            freed_npcs: HashSet::new(),
            avatar_pool: ObjectPool::new(POOL_MAX_IDLE),
            observer_pool: ObjectPool::new(POOL_MAX_IDLE),
            published: [Vec::new(), Vec::new()],
            appearance_epoch: 0,
            tick: 0,
            scratch: PacketBuffer::with_capacity(256),
        })
    }
}

/// Entity info engine
pub struct InfoProtocol {
    view: ViewSettings,
    build_area_zones: u32,
    rebuild_threshold: u32,
    max_packet_size: usize,
    variants: Vec<ClientVariant>,
    registry: EncoderRegistry,
    zone_provider: Box<dyn ZoneProvider>,
    visibility: Box<dyn VisibilityPredicate>,
    exception_handler: ExceptionHandler,
    pool: ThreadPool,

    players: Vec<Option<Box<Avatar>>>,
    npcs: Vec<Option<Box<Avatar>>>,
    /// Indexed by the observer's player index
    observers: Vec<Option<Box<Observer>>>,
    player_index: ZoneIndexStorage,
    npc_index: ZoneIndexStorage,
    /// Indices freed since the last tick; clients still know them until
    /// the next info packet removes them
    freed_players: HashSet<u16>,
    freed_npcs: HashSet<u16>,
    avatar_pool: ObjectPool<Avatar>,
    observer_pool: ObjectPool<Observer>,

    /// Two ticks of published packets, slot `tick % 2`
    published: [Vec<(u16, ObserverPackets)>; 2],
    appearance_epoch: u32,
    tick: u64,
    scratch: PacketBuffer,
}

impl InfoProtocol {
    pub fn builder(config: InfoConfig) -> InfoProtocolBuilder {
        InfoProtocolBuilder::new(config)
    }

    /// Build with the standard registry and distance visibility
    pub fn new(config: InfoConfig) -> Result<Self> {
        InfoProtocolBuilder::new(config).build()
    }

    pub fn set_exception_handler(&mut self, handler: ExceptionHandler) {
        self.exception_handler = handler;
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn player_index(&self) -> &ZoneIndexStorage {
        &self.player_index
    }

    pub fn npc_index(&self) -> &ZoneIndexStorage {
        &self.npc_index
    }

    /// Allocation counters of the avatar and observer pools
    pub fn pool_stats(&self) -> (PoolStats, PoolStats) {
        (self.avatar_pool.stats(), self.observer_pool.stats())
    }

    // ============ Allocation ============

    fn check_slot(
        slots: &[Option<Box<Avatar>>],
        freed: &HashSet<u16>,
        index: u16,
    ) -> std::result::Result<(), AvatarError> {
        match slots.get(index as usize) {
            None => Err(AvatarError::IndexOutOfRange {
                index,
                capacity: slots.len(),
            }),
            Some(Some(_)) => Err(AvatarError::IndexInUse(index)),
            Some(None) if freed.contains(&index) => Err(AvatarError::IndexInUse(index)),
            Some(None) => Ok(()),
        }
    }

    /// Register a player and its observer
    pub fn alloc_player(
        &mut self,
        index: u16,
        variant: ClientVariant,
        coord: CoordGrid,
    ) -> Result<()> {
        Self::check_slot(&self.players, &self.freed_players, index)?;
        if !self.variants.contains(&variant) {
            return Err(EncoderError::UnsupportedVariant(variant).into());
        }
        let coord = CoordGrid::checked(coord.level, coord.x, coord.z)?;

        let mut avatar = self.avatar_pool.alloc(AvatarArgs {
            index,
            kind: AvatarKind::Player,
            coord,
        });
        avatar.set_appearance(Appearance::default());
        self.player_index.add(index, coord);
        self.players[index as usize] = Some(avatar);
        self.observers[index as usize] = Some(self.observer_pool.alloc(ObserverArgs { index, variant }));

        debug!(player = index, ?variant, %coord, "Allocated player");
        Ok(())
    }

    /// Register an NPC
    pub fn alloc_npc(&mut self, index: u16, type_id: u16, coord: CoordGrid) -> Result<()> {
        Self::check_slot(&self.npcs, &self.freed_npcs, index)?;
        let coord = CoordGrid::checked(coord.level, coord.x, coord.z)?;

        let avatar = self.avatar_pool.alloc(AvatarArgs {
            index,
            kind: AvatarKind::Npc { type_id },
            coord,
        });
        self.npc_index.add(index, coord);
        self.npcs[index as usize] = Some(avatar);

        trace!(npc = index, type_id, %coord, "Allocated NPC");
        Ok(())
    }

    /// Remove a player and its observer
    pub fn dealloc_player(&mut self, index: u16) -> Result<()> {
        let avatar = self
            .players
            .get_mut(index as usize)
            .and_then(Option::take)
            .ok_or(AvatarError::NotAllocated(index))?;
        self.player_index.remove(index, avatar.last_coord());
        self.avatar_pool.dealloc(avatar);
        if let Some(observer) = self.observers[index as usize].take() {
            self.observer_pool.dealloc(observer);
        }
        self.freed_players.insert(index);

        debug!(player = index, "Deallocated player");
        Ok(())
    }

    pub fn dealloc_npc(&mut self, index: u16) -> Result<()> {
        let avatar = self
            .npcs
            .get_mut(index as usize)
            .and_then(Option::take)
            .ok_or(AvatarError::NotAllocated(index))?;
        self.npc_index.remove(index, avatar.last_coord());
        self.avatar_pool.dealloc(avatar);
        self.freed_npcs.insert(index);

        trace!(npc = index, "Deallocated NPC");
        Ok(())
    }

    pub fn player(&self, index: u16) -> Option<&Avatar> {
        self.players.get(index as usize)?.as_deref()
    }

    pub fn player_mut(&mut self, index: u16) -> Option<&mut Avatar> {
        self.players.get_mut(index as usize)?.as_deref_mut()
    }

    pub fn npc(&self, index: u16) -> Option<&Avatar> {
        self.npcs.get(index as usize)?.as_deref()
    }

    pub fn npc_mut(&mut self, index: u16) -> Option<&mut Avatar> {
        self.npcs.get_mut(index as usize)?.as_deref_mut()
    }

    pub fn observer(&self, index: u16) -> Option<&Observer> {
        self.observers.get(index as usize)?.as_deref()
    }

    /// Packets published for an observer in the latest tick
    pub fn packets(&self, observer: u16) -> Option<&ObserverPackets> {
        let slot = &self.published[(self.tick % 2) as usize];
        slot.binary_search_by_key(&observer, |(index, _)| *index)
            .ok()
            .map(|position| &slot[position].1)
    }

    // ============ Tick ============

    /// Run one tick
    pub fn update(&mut self) -> TickReport {
        let started = Instant::now();
        self.tick += 1;

        self.update_index();
        self.resolve_views();
        self.precompute();
        self.assemble();
        let mut report = self.publish();
        self.post_update();

        report.elapsed = started.elapsed();
        report
    }

    fn update_index(&mut self) {
        for avatar in self.players.iter().flatten() {
            self.player_index
                .move_entity(avatar.index(), avatar.last_coord(), avatar.coord());
        }
        for avatar in self.npcs.iter().flatten() {
            self.npc_index
                .move_entity(avatar.index(), avatar.last_coord(), avatar.coord());
        }
    }

    fn resolve_views(&mut self) {
        for (i, slot) in self.observers.iter_mut().enumerate() {
            let coord = match self.players[i].as_deref() {
                Some(avatar) if !avatar.is_destroyed() => avatar.coord(),
                _ => {
                    if let Some(mut observer) = slot.take() {
                        observer.destroy();
                        self.observer_pool.dealloc(observer);
                        debug!(observer = i, "Dropped observer of destroyed avatar");
                    }
                    continue;
                }
            };
            let Some(observer) = slot.as_deref_mut() else {
                continue;
            };

            observer.update_build_area(coord, self.build_area_zones, self.rebuild_threshold);
            observer.players.resolve(
                Some(i as u16),
                coord,
                &self.players,
                &self.player_index,
                self.visibility.as_ref(),
                &self.view,
            );
            observer.npcs.resolve(
                None,
                coord,
                &self.npcs,
                &self.npc_index,
                self.visibility.as_ref(),
                &self.view,
            );
        }
    }

    fn precompute(&mut self) {
        for avatar in self
            .players
            .iter_mut()
            .chain(self.npcs.iter_mut())
            .flatten()
        {
            if avatar.is_destroyed() || avatar.extended_info.flags().is_empty() {
                continue;
            }
            if avatar.extended_info.appearance.is_flagged() {
                self.appearance_epoch = self.appearance_epoch.wrapping_add(1).max(1);
                avatar.set_appearance_version(self.appearance_epoch);
            }
            // Encoders are caller-supplied; a panic in one is contained to its avatar
            let registry = &self.registry;
            let variants = &self.variants;
            let scratch = &mut self.scratch;
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                avatar.extended_info.precompute(registry, variants, scratch)
            }));
            let error = match result {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => InfoError::Encoder(e),
                Err(payload) => {
                    self.scratch.clear();
                    InfoError::Panicked(panic_message(payload))
                }
            };
            avatar.destroy();
            avatar.extended_info.reset();
            (self.exception_handler)(avatar.index(), &error);
        }
    }

    fn assemble(&mut self) {
        let ctx = AssemblyContext {
            players: &self.players,
            npcs: &self.npcs,
            registry: &self.registry,
            zone_provider: self.zone_provider.as_ref(),
            max_packet_size: self.max_packet_size,
        };
        let observers = &mut self.observers;

        self.pool.install(|| {
            observers.par_iter_mut().for_each(|slot| {
                if let Some(observer) = slot.as_deref_mut() {
                    let result =
                        panic::catch_unwind(AssertUnwindSafe(|| observer.build_packets(&ctx)));
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => observer.fail(e),
                        Err(payload) => observer.fail(InfoError::Panicked(panic_message(payload))),
                    }
                }
            });
        });
    }

    fn publish(&mut self) -> TickReport {
        let slot = (self.tick % 2) as usize;
        for (_, mut packets) in self.published[slot].drain(..) {
            packets.release();
        }

        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };
        for (i, entry) in self.observers.iter_mut().enumerate() {
            let Some(observer) = entry.as_deref_mut() else {
                continue;
            };

            if let Some(error) = observer.take_failure() {
                report.failures += 1;
                (self.exception_handler)(i as u16, &error);
                observer.destroy();
                if let Some(avatar) = self.players[i].as_deref_mut() {
                    avatar.destroy();
                }
                if let Some(observer) = entry.take() {
                    self.observer_pool.dealloc(observer);
                }
                continue;
            }

            observer.commit();
            let packets = observer.take_packets();
            report.observers += 1;
            report.published_bytes += packets.total_len();
            self.published[slot].push((i as u16, packets));
        }
        report
    }

    fn post_update(&mut self) {
        for avatar in self
            .players
            .iter_mut()
            .chain(self.npcs.iter_mut())
            .flatten()
        {
            avatar.post_update();
        }
        self.freed_players.clear();
        self.freed_npcs.clear();
    }
}
