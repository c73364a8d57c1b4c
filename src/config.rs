//! Info engine configuration module
//!
//! Handles loading and parsing of the engine configuration from a TOML file
//! and environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::game::sync::observer::ViewSettings;
use crate::protocol::ClientVariant;

/// Info engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Tick rate in milliseconds
    #[serde(default = "default_tick_rate")]
    pub tick_rate_ms: u64,

    /// Packet assembly threads (0 = one per core)
    #[serde(default)]
    pub worker_threads: usize,

    /// High resolution view distance in tiles
    #[serde(default = "default_view_distance")]
    pub view_distance: u32,

    /// Low resolution view distance in tiles (0 disables the band)
    #[serde(default = "default_low_resolution_distance")]
    pub low_resolution_distance: u32,

    /// Most entities one observer tracks in high resolution
    #[serde(default = "default_max_high_resolution")]
    pub max_high_resolution: usize,

    /// Player slots (indices 0..capacity)
    #[serde(default = "default_player_capacity")]
    pub player_capacity: usize,

    /// NPC slots (indices 0..capacity)
    #[serde(default = "default_npc_capacity")]
    pub npc_capacity: usize,

    /// Build area width and height in zones
    #[serde(default = "default_build_area_zones")]
    pub build_area_zones: u32,

    /// Distance from the build area edge that triggers a rebuild
    #[serde(default = "default_rebuild_threshold")]
    pub rebuild_threshold_tiles: u32,

    /// Largest framed payload
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,

    /// Client variants encoders must be registered for
    #[serde(default = "default_client_variants")]
    pub client_variants: Vec<ClientVariant>,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Simulated load for the standalone binary
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Simulated population driven by the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_sim_players")]
    pub players: usize,

    #[serde(default = "default_sim_npcs")]
    pub npcs: usize,

    /// RNG seed (0 = random)
    #[serde(default)]
    pub seed: u64,
}

// Default value functions
fn default_tick_rate() -> u64 {
    600 // 600ms = standard RS tick rate
}

fn default_view_distance() -> u32 {
    15
}

fn default_low_resolution_distance() -> u32 {
    64
}

fn default_max_high_resolution() -> usize {
    255
}

fn default_player_capacity() -> usize {
    2047
}

fn default_npc_capacity() -> usize {
    65535
}

fn default_build_area_zones() -> u32 {
    13
}

fn default_rebuild_threshold() -> u32 {
    16
}

fn default_max_packet_size() -> usize {
    65535
}

fn default_client_variants() -> Vec<ClientVariant> {
    ClientVariant::ALL.to_vec()
}

fn default_sim_players() -> usize {
    200
}

fn default_sim_npcs() -> usize {
    1000
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            players: default_sim_players(),
            npcs: default_sim_npcs(),
            seed: 0,
        }
    }
}

impl Default for InfoConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/info.toml"),
            tick_rate_ms: default_tick_rate(),
            worker_threads: 0,
            view_distance: default_view_distance(),
            low_resolution_distance: default_low_resolution_distance(),
            max_high_resolution: default_max_high_resolution(),
            player_capacity: default_player_capacity(),
            npc_capacity: default_npc_capacity(),
            build_area_zones: default_build_area_zones(),
            rebuild_threshold_tiles: default_rebuild_threshold(),
            max_packet_size: default_max_packet_size(),
            client_variants: default_client_variants(),
            log_json: false,
            simulation: SimulationConfig::default(),
        }
    }
}

impl InfoConfig {
    /// Load configuration from file and environment variables
    pub async fn load() -> Result<Self> {
        let config_path = env::var("RUSTSCAPE_INFO_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/info.toml"));

        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

            Self::from_toml(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.config_path = config_path;
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
            env::var(key).ok().and_then(|val| val.parse().ok())
        }

        if let Some(val) = parsed("RUSTSCAPE_INFO_TICK_RATE_MS") {
            self.tick_rate_ms = val;
        }
        if let Some(val) = parsed("RUSTSCAPE_INFO_WORKER_THREADS") {
            self.worker_threads = val;
        }
        if let Some(val) = parsed("RUSTSCAPE_INFO_VIEW_DISTANCE") {
            self.view_distance = val;
        }
        if let Some(val) = parsed("RUSTSCAPE_INFO_LOW_RESOLUTION_DISTANCE") {
            self.low_resolution_distance = val;
        }
        if let Some(val) = parsed("RUSTSCAPE_INFO_MAX_HIGH_RESOLUTION") {
            self.max_high_resolution = val;
        }
        if let Some(val) = parsed("RUSTSCAPE_INFO_PLAYER_CAPACITY") {
            self.player_capacity = val;
        }
        if let Some(val) = parsed("RUSTSCAPE_INFO_NPC_CAPACITY") {
            self.npc_capacity = val;
        }
        if let Some(val) = parsed("RUSTSCAPE_INFO_BUILD_AREA_ZONES") {
            self.build_area_zones = val;
        }
        if let Some(val) = parsed("RUSTSCAPE_INFO_REBUILD_THRESHOLD_TILES") {
            self.rebuild_threshold_tiles = val;
        }
        if let Some(val) = parsed("RUSTSCAPE_INFO_MAX_PACKET_SIZE") {
            self.max_packet_size = val;
        }
        if let Ok(val) = env::var("RUSTSCAPE_INFO_CLIENT_VARIANTS") {
            let variants: Vec<ClientVariant> = val
                .split(',')
                .filter_map(|name| match name.trim().to_lowercase().as_str() {
                    "legacy" => Some(ClientVariant::Legacy),
                    "native" => Some(ClientVariant::Native),
                    "mobile" => Some(ClientVariant::Mobile),
                    _ => None,
                })
                .collect();
            if !variants.is_empty() {
                self.client_variants = variants;
            }
        }
        if let Ok(val) = env::var("RUSTSCAPE_INFO_LOG_JSON") {
            self.log_json = val.to_lowercase() == "true" || val == "1";
        }
        if let Some(val) = parsed("RUSTSCAPE_INFO_SIM_PLAYERS") {
            self.simulation.players = val;
        }
        if let Some(val) = parsed("RUSTSCAPE_INFO_SIM_NPCS") {
            self.simulation.npcs = val;
        }
        if let Some(val) = parsed("RUSTSCAPE_INFO_SIM_SEED") {
            self.simulation.seed = val;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.tick_rate_ms < 100 || self.tick_rate_ms > 5000 {
            anyhow::bail!("Tick rate must be between 100ms and 5000ms");
        }

        // Relative offsets are 5 bits wide
        if self.view_distance == 0 || self.view_distance > 15 {
            anyhow::bail!("View distance must be between 1 and 15 tiles");
        }
        if self.low_resolution_distance != 0 && self.low_resolution_distance < self.view_distance
        {
            anyhow::bail!("Low resolution distance must be 0 or at least the view distance");
        }

        if self.max_high_resolution == 0 || self.max_high_resolution > 255 {
            anyhow::bail!("Max high resolution must be between 1 and 255");
        }

        if self.player_capacity == 0 || self.player_capacity > 2047 {
            anyhow::bail!("Player capacity must be between 1 and 2047");
        }
        if self.npc_capacity == 0 || self.npc_capacity > 65535 {
            anyhow::bail!("NPC capacity must be between 1 and 65535");
        }

        if self.build_area_zones == 0 || self.build_area_zones > 16 || self.build_area_zones % 2 == 0
        {
            anyhow::bail!("Build area zones must be odd and between 1 and 16");
        }
        // A freshly centred area must not already be within the threshold
        let max_threshold = (self.build_area_zones / 2) * 8;
        if self.rebuild_threshold_tiles > max_threshold {
            anyhow::bail!(
                "Rebuild threshold must be at most {} tiles for a {}-zone build area",
                max_threshold,
                self.build_area_zones
            );
        }

        if self.max_packet_size < 64 || self.max_packet_size > 65535 {
            anyhow::bail!("Max packet size must be between 64 and 65535 bytes");
        }

        if self.client_variants.is_empty() {
            anyhow::bail!("At least one client variant must be configured");
        }

        Ok(())
    }

    /// View resolution settings
    pub fn view_settings(&self) -> ViewSettings {
        ViewSettings {
            view_distance: self.view_distance,
            low_resolution_distance: self.low_resolution_distance,
            max_high_resolution: self.max_high_resolution,
        }
    }
}
