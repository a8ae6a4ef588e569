// Configuration module for reading Bot.toml
// This module provides OOP-style configuration management for the spe_ed agent

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Main configuration structure containing all tunable parameters
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub search: SearchConfig,
    pub timing: TimingConfig,
    pub debug: DebugConfig,
}

/// Lookahead search and move selection constants
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Levels of the move tree below the root
    pub depth: u32,
    /// Per-level discount applied by the score evaluator (tau)
    pub decay: f64,
    /// Penalty per predicted collision and per depth unit (xi)
    pub collision_penalty: f64,
    /// Every n-th tick uses the abbreviated occupancy scan
    pub fast_path_interval: u64,
    /// Opponents further than `proximity_margin + speed` on either axis are ignored
    pub proximity_margin: i32,
    /// SPEED_UP is skipped at final selection above this speed
    pub speed_up_limit: i32,
    /// Build the five root branches on the rayon pool
    pub parallel_root: bool,
}

/// Response timing constants, used by the transport only
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    pub response_time_budget_ms: u64,
    pub network_overhead_ms: u64,
}

impl TimingConfig {
    /// Computes the effective computation budget when the server sends no deadline
    pub fn effective_budget_ms(&self) -> u64 {
        self.response_time_budget_ms.saturating_sub(self.network_overhead_ms)
    }
}

/// Debug configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    pub enabled: bool,
    pub log_file_path: String,
}

impl Config {
    /// Loads configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the Bot.toml configuration file
    ///
    /// # Returns
    /// * `Result<Config, String>` - Parsed configuration or error message
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        toml::from_str(&contents).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Loads default configuration from Bot.toml in the project root
    pub fn load_default() -> Result<Self, String> {
        Self::from_file("Bot.toml")
    }

    /// Creates a configuration with hardcoded default values as fallback
    /// This should match the constants defined in Bot.toml
    pub fn default_hardcoded() -> Self {
        Config {
            search: SearchConfig {
                depth: 7,
                decay: 0.1,
                collision_penalty: 0.4,
                fast_path_interval: 6,
                proximity_margin: 10,
                speed_up_limit: 9,
                parallel_root: true,
            },
            timing: TimingConfig {
                response_time_budget_ms: 1000,
                network_overhead_ms: 100,
            },
            debug: DebugConfig {
                enabled: false,
                log_file_path: "spe_ed_debug.jsonl".to_string(),
            },
        }
    }

    /// Attempts to load from file, falls back to hardcoded defaults on error
    pub fn load_or_default() -> Self {
        Self::load_default().unwrap_or_else(|e| {
            eprintln!("Warning: Could not load Bot.toml ({}), using hardcoded defaults", e);
            Self::default_hardcoded()
        })
    }
}
