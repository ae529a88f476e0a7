//! Kavram Brain Configuration
//!
//! Runtime configuration of the host process: where state lives and how
//! often maintenance runs. Engine tuning lives in `KavramConfig`.

use std::env;
use std::path::PathBuf;

use kavram_core::{KavramConfig, KavramResult};

/// Host configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Snapshot file
    pub data_path: PathBuf,
    /// Optional JSON engine configuration
    pub engine_config_path: Option<PathBuf>,
    /// Optional JSON dictionary
    pub dictionary_path: Option<PathBuf>,
    /// Seconds between decay passes
    pub decay_interval_secs: u64,
    /// Seconds between autosaves
    pub autosave_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/kavram.bin"),
            engine_config_path: None,
            dictionary_path: None,
            decay_interval_secs: 600,
            autosave_secs: 300,
        }
    }
}

impl Config {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = env::var("KAVRAM_DATA") {
            config.data_path = PathBuf::from(path);
        }
        if let Ok(path) = env::var("KAVRAM_CONFIG") {
            config.engine_config_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = env::var("KAVRAM_DICTIONARY") {
            config.dictionary_path = Some(PathBuf::from(path));
        }
        if let Ok(secs) = env::var("KAVRAM_DECAY_INTERVAL_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                config.decay_interval_secs = s.max(1);
            }
        }
        if let Ok(secs) = env::var("KAVRAM_AUTOSAVE_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                config.autosave_secs = s.max(1);
            }
        }

        config
    }

    /// Engine tuning: the JSON file when given, the environment otherwise
    pub fn engine_config(&self) -> KavramResult<KavramConfig> {
        match &self.engine_config_path {
            Some(path) => {
                let config = KavramConfig::load(&path.to_string_lossy())?;
                tracing::info!("Engine config loaded from {}", path.display());
                Ok(config)
            }
            None => Ok(KavramConfig::from_env()),
        }
    }
}

/// Print startup banner with config info
pub fn print_banner(config: &Config, engine: &KavramConfig) {
    println!();
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║            Kavram - Associative Lookup Engine            ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("║  Data: {:<50}║", config.data_path.display().to_string());
    println!("║  Layers: {:>4}   Grid: {:>3}x{:<3}   Depth: {:>3}             ║",
        engine.grid.layers, engine.grid.rows, engine.grid.cols, engine.activation.max_depth);
    println!("║  Decay every {:>6}s   Autosave every {:>6}s           ║",
        config.decay_interval_secs, config.autosave_secs);
    println!("║  Seed: {:>20}   Self-reinforce: {:<5}        ║",
        engine.seed, engine.arbiter.self_reinforce);
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();
}
