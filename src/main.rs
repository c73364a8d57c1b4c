//! Rustscape Info Engine
//!
//! Runs the entity info engine standalone on the game tick, driving a
//! simulated population of random-walking players and NPCs.

use std::sync::Arc;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use rustscape_info::config::{InfoConfig, SimulationConfig};
use rustscape_info::game::coord::CoordGrid;
use rustscape_info::game::sync::InfoProtocol;
use rustscape_info::game::world::InfoWorld;
use rustscape_info::protocol::ClientVariant;
use rustscape_info::{REVISION, VERSION};

/// Centre of the simulated area
const SPAWN: CoordGrid = CoordGrid::new(0, 3222, 3222);

/// Half-width of the simulated area in tiles
const ROAM_RADIUS: i32 = 48;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = InfoConfig::load().await?;
    init_logging(config.log_json);

    info!("Rustscape Info Engine v{} (revision {})", VERSION, REVISION);
    info!(
        "Configuration loaded from: {}",
        config.config_path.display()
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let world = Arc::new(InfoWorld::new(&config)?);
    let mut simulation = Simulation::new(&config.simulation, &config.client_variants);

    let world_handle = {
        let world = world.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            world
                .run(&mut shutdown_rx, |protocol, tick| simulation.step(protocol, tick))
                .await;
        })
    };

    info!(
        players = config.simulation.players,
        npcs = config.simulation.npcs,
        "Simulation started"
    );

    wait_for_shutdown(shutdown_tx.clone()).await;

    info!("Shutting down info engine...");
    let _ = world_handle.await;

    if let Some(report) = world.last_report() {
        info!(
            tick = report.tick,
            observers = report.observers,
            bytes = report.published_bytes,
            "Last tick"
        );
    }
    info!("Shutdown complete. Goodbye!");
    Ok(())
}

/// Initialize the logging/tracing system
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rustscape_info=debug"));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Random-walking population
struct Simulation {
    rng: StdRng,
    players: usize,
    npcs: usize,
    variants: Vec<ClientVariant>,
}

impl Simulation {
    fn new(config: &SimulationConfig, variants: &[ClientVariant]) -> Self {
        let rng = if config.seed == 0 {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(config.seed)
        };
        Self {
            rng,
            players: config.players,
            npcs: config.npcs,
            variants: variants.to_vec(),
        }
    }

    fn random_coord(&mut self) -> CoordGrid {
        let dx = self.rng.gen_range(-ROAM_RADIUS..=ROAM_RADIUS);
        let dz = self.rng.gen_range(-ROAM_RADIUS..=ROAM_RADIUS);
        SPAWN.translate(dx, dz)
    }

    /// Step `coord` by up to `max_step` tiles, staying in the roaming area
    fn wander(&mut self, coord: CoordGrid, max_step: i32) -> CoordGrid {
        let dx = self.rng.gen_range(-max_step..=max_step);
        let dz = self.rng.gen_range(-max_step..=max_step);
        let next = coord.translate(dx, dz);
        let (ox, oz) = SPAWN.delta_to(&next);
        if ox.abs() > ROAM_RADIUS || oz.abs() > ROAM_RADIUS {
            coord
        } else {
            next
        }
    }

    fn step(&mut self, protocol: &mut InfoProtocol, tick: u64) {
        if tick == 0 {
            self.populate(protocol);
            return;
        }

        for index in 0..self.players as u16 {
            let Some(coord) = protocol.player(index).map(|p| p.coord()) else {
                continue;
            };
            let roll: f32 = self.rng.gen();
            let next = if roll < 0.4 {
                self.wander(coord, 1)
            } else if roll < 0.6 {
                self.wander(coord, 2)
            } else {
                coord
            };
            let talk = self.rng.gen_ratio(1, 50);
            let teleport = self.rng.gen_ratio(1, 500);
            let far = self.random_coord();

            if let Some(player) = protocol.player_mut(index) {
                if teleport {
                    player.teleport(far);
                } else {
                    player.set_coord(next);
                }
                if talk {
                    player.say("Hello world");
                    player.set_sequence(855, 0);
                }
            }
        }

        for index in 0..self.npcs as u16 {
            let Some(coord) = protocol.npc(index).map(|n| n.coord()) else {
                continue;
            };
            if !self.rng.gen_ratio(3, 10) {
                continue;
            }
            let next = self.wander(coord, 1);
            if let Some(npc) = protocol.npc_mut(index) {
                npc.set_coord(next);
            }
        }
    }

    fn populate(&mut self, protocol: &mut InfoProtocol) {
        for index in 0..self.players {
            let variant = self.variants[index % self.variants.len()];
            let coord = self.random_coord();
            if let Err(e) = protocol.alloc_player(index as u16, variant, coord) {
                warn!(player = index, error = %e, "Failed to spawn simulated player");
            }
        }
        for index in 0..self.npcs {
            let type_id = self.rng.gen_range(0..1000);
            let coord = self.random_coord();
            if let Err(e) = protocol.alloc_npc(index as u16, type_id, coord) {
                warn!(npc = index, error = %e, "Failed to spawn simulated NPC");
            }
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    let _ = shutdown_tx.send(());
}
