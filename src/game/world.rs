//! World module
//!
//! Drives the info engine on the game tick:
//! - Tick loop (600ms intervals, missed ticks skipped)
//! - Game logic hook run before every info update
//! - Tick statistics and uptime

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::task;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::InfoConfig;
use crate::error::Result;
use crate::game::sync::{InfoProtocol, TickReport};

/// World state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldState {
    /// World is initializing
    Initializing,
    /// World is running normally
    Running,
    /// World has stopped
    Stopped,
}

impl WorldState {
    /// Check if the world is processing ticks
    pub fn is_active(&self) -> bool {
        matches!(self, WorldState::Running)
    }
}

/// Info world - owns the info protocol and runs it on the game tick
pub struct InfoWorld {
    tick_rate_ms: u64,
    /// Current world state
    state: RwLock<WorldState>,
    /// Current tick number
    tick: AtomicU64,
    /// Whether the world is running
    running: AtomicBool,
    /// Time the world started
    start_time: RwLock<Option<Instant>>,
    protocol: RwLock<InfoProtocol>,
    last_report: RwLock<Option<TickReport>>,
}

impl InfoWorld {
    /// Create a world with the standard protocol for `config`
    pub fn new(config: &InfoConfig) -> Result<Self> {
        let protocol = InfoProtocol::new(config.clone())?;
        Ok(Self::with_protocol(config.tick_rate_ms, protocol))
    }

    /// Create a world around an already built protocol
    pub fn with_protocol(tick_rate_ms: u64, protocol: InfoProtocol) -> Self {
        info!(tick_rate_ms, "Creating info world");
        Self {
            tick_rate_ms,
            state: RwLock::new(WorldState::Initializing),
            tick: AtomicU64::new(0),
            running: AtomicBool::new(false),
            start_time: RwLock::new(None),
            protocol: RwLock::new(protocol),
            last_report: RwLock::new(None),
        }
    }

    /// Get the current world state
    pub fn state(&self) -> WorldState {
        *self.state.read()
    }

    /// Set the world state
    pub fn set_state(&self, new_state: WorldState) {
        let mut state = self.state.write();
        let old_state = *state;
        *state = new_state;
        info!(
            old_state = ?old_state,
            new_state = ?new_state,
            "World state changed"
        );
    }

    /// Get the current tick number
    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    /// Check if the world is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the tick loop to stop after the current tick
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Get the uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time
            .read()
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
    }

    /// Report of the most recent tick
    pub fn last_report(&self) -> Option<TickReport> {
        *self.last_report.read()
    }

    /// Shared access to the protocol, e.g. for the transport to collect packets
    pub fn protocol(&self) -> &RwLock<InfoProtocol> {
        &self.protocol
    }

    /// Run the tick loop until shutdown.
    ///
    /// `game_logic` runs before every info update with exclusive access to
    /// the protocol; it moves avatars and flags extended info. Ticks are
    /// CPU-bound and run through `block_in_place`, so this must be driven by
    /// the multi-threaded runtime.
    pub async fn run<F>(&self, shutdown_rx: &mut broadcast::Receiver<()>, mut game_logic: F)
    where
        F: FnMut(&mut InfoProtocol, u64),
    {
        info!(tick_rate_ms = self.tick_rate_ms, "Starting info world");

        self.running.store(true, Ordering::SeqCst);
        *self.start_time.write() = Some(Instant::now());
        self.set_state(WorldState::Running);

        let mut tick_interval = interval(Duration::from_millis(self.tick_rate_ms));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    if !self.is_running() {
                        break;
                    }
                    task::block_in_place(|| self.process_tick(&mut game_logic));
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        self.set_state(WorldState::Stopped);

        info!(
            total_ticks = self.tick(),
            uptime_secs = self.uptime_secs(),
            "Info world stopped"
        );
    }

    /// Run game logic and one info update
    pub fn process_tick<F>(&self, game_logic: &mut F) -> TickReport
    where
        F: FnMut(&mut InfoProtocol, u64),
    {
        let tick_num = self.tick.fetch_add(1, Ordering::SeqCst);

        let report = {
            let mut protocol = self.protocol.write();
            game_logic(&mut protocol, tick_num);
            protocol.update()
        };

        if report.elapsed > Duration::from_millis(self.tick_rate_ms) {
            warn!(
                tick = report.tick,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Info update overran the tick"
            );
        }
        if tick_num % 100 == 0 || report.failures > 0 {
            debug!(
                tick = report.tick,
                observers = report.observers,
                bytes = report.published_bytes,
                failures = report.failures,
                elapsed_us = report.elapsed.as_micros() as u64,
                "Info tick"
            );
        }

        *self.last_report.write() = Some(report);
        report
    }
}
