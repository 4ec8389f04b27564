/// TOML configuration with sensible defaults.
/// No config file is required to run; defaults match the reference airframe
/// (two arms of 5 LEDs on GPIO 12/13, GRB strips, DMA 10).

use crate::color::{Color, ColorConfig};
use crate::driver::{ChannelConfig, DMA_LIMIT, StripType};
use crate::flight_mode::FlightMode;
use crate::link::LinkSettings;
use crate::palette::ColorTable;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Vehicle link endpoint (tcp://host:port)
    pub endpoint: String,
    pub system_id: u8,
    /// Component identity remote LED commands must be addressed to
    pub component_id: u8,
    pub discovery_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// Turn the arms off before releasing the driver
    pub clear_on_exit: bool,
    pub driver: DriverKind,
    pub leds: LedConfig,
    /// Per-mode color overrides on top of the built-in table
    pub palette: HashMap<FlightMode, ColorConfig>,
    /// Color for modes without an entry
    pub default_color: ColorConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Console,
}

/// Strip hardware shared by every arm.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedConfig {
    pub dma: u8,
    pub strip_type: StripType,
    pub brightness: u8,
    pub arms: Vec<ArmConfig>,
}

/// One physical LED strip.
#[derive(Debug, Clone, Deserialize)]
pub struct ArmConfig {
    pub gpio: u8,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid dma {0} (must be below 14)")]
    Dma(u8),
    #[error("no arms configured")]
    NoArms,
    #[error("arm {0} has no LEDs")]
    EmptyArm(usize),
    #[error("GPIO {0} is used by more than one arm")]
    DuplicateGpio(u8),
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "tcp://127.0.0.1:5760".into(),
            system_id: 1,
            component_id: 134,
            discovery_timeout_ms: 3000,
            heartbeat_interval_ms: 1000,
            clear_on_exit: false,
            driver: DriverKind::Console,
            leds: LedConfig::default(),
            palette: HashMap::new(),
            default_color: Color::WHITE.into(),
        }
    }
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            dma: 10,
            strip_type: StripType::Grb,
            brightness: 255,
            arms: vec![
                ArmConfig { gpio: 12, length: 5 }, // left arm, PWM0
                ArmConfig { gpio: 13, length: 5 }, // right arm, PWM1
            ],
        }
    }
}

impl Config {
    /// Load config from the default config file path, or return defaults if not found.
    pub fn load() -> Self {
        let config_path = config_file_path();
        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {config_path}");
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse config file {config_path}: {e}. Using defaults.");
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No config file found at {config_path}. Using defaults.");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.leds.dma >= DMA_LIMIT {
            return Err(ConfigError::Dma(self.leds.dma));
        }
        if self.leds.arms.is_empty() {
            return Err(ConfigError::NoArms);
        }
        for (i, arm) in self.leds.arms.iter().enumerate() {
            if arm.length == 0 {
                return Err(ConfigError::EmptyArm(i));
            }
            if self.leds.arms[..i].iter().any(|other| other.gpio == arm.gpio) {
                return Err(ConfigError::DuplicateGpio(arm.gpio));
            }
        }
        if self.discovery_timeout_ms == 0 {
            return Err(ConfigError::ZeroInterval("discovery_timeout_ms"));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("heartbeat_interval_ms"));
        }
        Ok(())
    }

    /// Driver setup, one channel per arm.
    pub fn channels(&self) -> Vec<ChannelConfig> {
        self.leds
            .arms
            .iter()
            .map(|arm| ChannelConfig {
                gpio: arm.gpio,
                dma: self.leds.dma,
                length: arm.length,
                strip_type: self.leds.strip_type,
                brightness: self.leds.brightness,
            })
            .collect()
    }

    pub fn color_table(&self) -> ColorTable {
        let overrides: Vec<(FlightMode, Color)> =
            self.palette.iter().map(|(&mode, &c)| (mode, c.into())).collect();
        ColorTable::with_overrides(&overrides, self.default_color.into())
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            endpoint: self.endpoint.clone(),
            system_id: self.system_id,
            component_id: self.component_id,
            discovery_timeout: Duration::from_millis(self.discovery_timeout_ms),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
        }
    }
}

fn config_file_path() -> String {
    if let Ok(path) = std::env::var("DRONE_LIGHTS_CONFIG") {
        path
    } else {
        "/etc/drone-lights/config.toml".into()
    }
}
