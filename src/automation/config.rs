//! Configuration types for automation.
//!
//! Loads settings from config.json at startup. Provides timings, file
//! locations, player-id rules for the match export and OCR tuning. Screen
//! regions and button positions are fixed for a 2560x1440 window and live
//! beside the code that uses them.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<AutomationConfig> = OnceLock::new();

/// Complete automation configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Executable name of the game process to attach to
    pub game_process_name: String,
    /// Delay between polls while a match is running (milliseconds)
    pub polling_interval_ms: u64,
    /// Settle delay after every synthetic input (milliseconds)
    pub action_delay_ms: u64,
    /// Time the game needs to load a new match (seconds)
    pub launch_delay_secs: u64,
    /// Time the main menu needs to come back after leaving a match (milliseconds)
    pub menu_load_delay_ms: u64,
    /// Time the end-of-match screen needs to settle (milliseconds)
    pub end_screen_grace_ms: u64,
    /// Maximum wait for the export file to appear (milliseconds)
    pub export_timeout_ms: u64,
    /// Send the advance-turn input every this many polls without other signals
    pub skip_turn_every_polls: u32,
    /// Directory the game writes match exports into
    pub export_dir: PathBuf,
    /// Results log location
    pub results_path: PathBuf,
    /// Highest player id that belongs to a real civilization
    pub num_players: i64,
    /// Player id of the spectator slot we occupy
    pub spectator_id: i64,
    /// OCR brightness threshold (pixels with R, G, B all > threshold are kept)
    pub ocr_threshold: u8,
    /// Integer upscale factor applied before OCR
    pub ocr_scale: u32,
    /// Save the region image when an end-of-match read fails
    pub save_debug_captures: bool,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            game_process_name: "CivilizationVI_DX12.exe".to_string(),
            polling_interval_ms: 5000,
            action_delay_ms: 150,
            launch_delay_secs: 30,
            menu_load_delay_ms: 10000,
            end_screen_grace_ms: 5000,
            export_timeout_ms: 30000,
            skip_turn_every_polls: 2,
            export_dir: crate::paths::get_default_export_dir(),
            results_path: crate::paths::get_default_results_path(),
            num_players: 8,
            spectator_id: 0,
            ocr_threshold: 160,
            ocr_scale: 3,
            save_debug_captures: true,
        }
    }
}

impl AutomationConfig {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn action_delay(&self) -> Duration {
        Duration::from_millis(self.action_delay_ms)
    }

    pub fn menu_load_delay(&self) -> Duration {
        Duration::from_millis(self.menu_load_delay_ms)
    }

    pub fn end_screen_grace(&self) -> Duration {
        Duration::from_millis(self.end_screen_grace_ms)
    }

    pub fn export_timeout(&self) -> Duration {
        Duration::from_millis(self.export_timeout_ms)
    }
}

/// Loads configuration from a JSON file, falling back to defaults.
pub fn load_config_from(config_path: &Path) -> AutomationConfig {
    tracing::info!("Looking for config at: {}", config_path.display());

    if !config_path.exists() {
        tracing::info!("config.json not found. Using default config.");
        return AutomationConfig::default();
    }

    match fs::read_to_string(config_path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Config loaded from {}", config_path.display());
                config
            }
            Err(e) => {
                tracing::warn!("Failed to parse config.json: {}. Using defaults.", e);
                AutomationConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config.json: {}. Using defaults.", e);
            AutomationConfig::default()
        }
    }
}

/// Initializes the global configuration from config.json next to the
/// executable. Call once at startup.
pub fn init_config() {
    get_config();
}

/// Returns a reference to the global configuration, loading it on first use.
pub fn get_config() -> &'static AutomationConfig {
    CONFIG.get_or_init(|| load_config_from(&crate::paths::get_exe_dir().join("config.json")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "num_players": 4, "polling_interval_ms": 1000 }"#).unwrap();

        let config = load_config_from(&path);

        assert_eq!(config.num_players, 4);
        assert_eq!(config.polling_interval(), Duration::from_secs(1));
        assert_eq!(config.action_delay(), Duration::from_millis(150));
        assert_eq!(config.game_process_name, "CivilizationVI_DX12.exe");
    }

    #[test]
    fn test_invalid_config_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = load_config_from(&path);
        assert_eq!(config.spectator_id, 0);
        assert_eq!(config.skip_turn_every_polls, 2);
    }

    #[test]
    fn test_negative_spectator_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "spectator_id": -1 }"#).unwrap();

        let config = load_config_from(&path);
        assert_eq!(config.spectator_id, -1);
        assert_eq!(config.num_players, 8);
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.json"));
        assert_eq!(config.launch_delay_secs, 30);
    }
}
