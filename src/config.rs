use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub content: ContentSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Longest frame the simulation will integrate in one step (seconds)
    pub max_dt: f32,
    pub countdown_seconds: f32,
    pub max_bots: usize,
    /// Frame rate of the headless runner
    pub tick_rate_hz: u16,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSettings {
    /// Root that asset paths like `/models/x.glb` resolve against
    pub models_dir: String,
    pub default_model: String,
    pub ghosts_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub console_enabled: bool,
    /// Daily rolling log files are written here when set
    pub file_dir: Option<String>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            max_dt: 0.05,
            countdown_seconds: 5.0,
            max_bots: 6,
            tick_rate_hz: 60,
            seed: None,
        }
    }
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            models_dir: "./content".to_string(),
            default_model: "/models/porsche_gt3_rs.glb".to_string(),
            ghosts_dir: "./content/ghosts".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_enabled: true,
            file_dir: None,
        }
    }
}

impl SimConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: SimConfig =
            toml::from_str(&contents).map_err(|e| SimError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            eprintln!("Failed to load config: {}, using defaults", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        if !(sim.max_dt > 0.0) {
            return Err(SimError::Config(format!("max_dt must be positive, got {}", sim.max_dt)));
        }
        if !(sim.countdown_seconds >= 0.0) {
            return Err(SimError::Config(format!(
                "countdown_seconds must not be negative, got {}",
                sim.countdown_seconds
            )));
        }
        if sim.tick_rate_hz == 0 {
            return Err(SimError::Config("tick_rate_hz must be at least 1".to_string()));
        }
        Ok(())
    }
}
