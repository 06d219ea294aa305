use crate::render::{ColorMode, RenderMode};
use crate::show::celebration::TimeMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures reading or writing the config file. None of these stop the show.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} already exists")]
    Exists { path: PathBuf },

    #[error("no config directory on this platform")]
    NoConfigDir,
}

/// User configuration loaded from config file.
/// All fields are optional: CLI flags override config, config overrides defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default render mode
    pub render: Option<RenderModeConfig>,
    /// Default color mode
    pub color: Option<ColorModeConfig>,
    /// Target FPS (1-120)
    pub fps: Option<u32>,
    /// Fixed launch size in points (1-80); random when unset
    pub points: Option<u32>,
    /// Leaderboard rank; when set, launches are sized by tier instead of points
    pub rank: Option<u32>,
    /// Leaderboard size for tier percentiles
    pub total: Option<u32>,
    /// ISO country code for flag-themed rockets
    pub country: Option<String>,
    /// Words shown on bursts
    pub words: Option<Vec<String>>,
    /// Message shown under the crown finale
    pub crown_message: Option<String>,
    /// World height in simulation units
    pub world_height: Option<f64>,
    /// JSON-lines launch records to replay ("-" for stdin)
    pub relay_in: Option<PathBuf>,
    /// JSON-lines file local launches are appended to
    pub relay_out: Option<PathBuf>,
    /// RNG seed for a reproducible show
    pub seed: Option<u64>,
    /// Hide status bar
    pub clean: Option<bool>,
    /// Seconds between automatic launches (0 = off)
    pub auto_launch: Option<f64>,
    /// Log destination; logging is off without one
    pub log_file: Option<PathBuf>,
    /// Color quantization step (0 = off, 4/8/16 = coarser colors for less output)
    pub color_quant: Option<u8>,
    /// New Year celebration clock; off when unset
    pub celebrate: Option<CelebrateConfig>,
    /// Fast-forward rate of the accelerated celebration clock
    pub time_scale: Option<f64>,
}

impl Config {
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Render mode names for config file (kebab-case friendly)
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RenderModeConfig {
    Braille,
    HalfBlock,
}

impl From<RenderModeConfig> for RenderMode {
    fn from(c: RenderModeConfig) -> Self {
        match c {
            RenderModeConfig::Braille => RenderMode::Braille,
            RenderModeConfig::HalfBlock => RenderMode::HalfBlock,
        }
    }
}

/// Color mode names for config file (kebab-case friendly)
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ColorModeConfig {
    Mono,
    Ansi16,
    Ansi256,
    TrueColor,
}

impl From<ColorModeConfig> for ColorMode {
    fn from(c: ColorModeConfig) -> Self {
        match c {
            ColorModeConfig::Mono => ColorMode::Mono,
            ColorModeConfig::Ansi16 => ColorMode::Ansi16,
            ColorModeConfig::Ansi256 => ColorMode::Ansi256,
            ColorModeConfig::TrueColor => ColorMode::TrueColor,
        }
    }
}

/// Celebration clock names for config file
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CelebrateConfig {
    Live,
    Accelerated,
}

impl From<CelebrateConfig> for TimeMode {
    fn from(c: CelebrateConfig) -> Self {
        match c {
            CelebrateConfig::Live => TimeMode::Live,
            CelebrateConfig::Accelerated => TimeMode::Accelerated,
        }
    }
}

/// Get the config file path: ~/.config/skyburst/config.toml
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("skyburst").join("config.toml"))
}

/// Load config from file. A missing file is not an error.
pub fn load_config() -> Result<Config, ConfigError> {
    let Some(path) = config_path() else {
        return Ok(Config::default());
    };
    load_from(&path)
}

pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    Config::parse(&contents, path)
}

/// Write the commented default config, refusing to clobber an existing file.
pub fn init_config() -> Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    write_default(&path)?;
    Ok(path)
}

fn write_default(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Err(ConfigError::Exists {
            path: path.to_path_buf(),
        });
    }
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(write_err)?;
    }
    std::fs::write(path, default_config_string()).map_err(write_err)
}

/// Generate a default config file with all options commented out
pub fn default_config_string() -> String {
    r#"# skyburst configuration
# Use --show-config to see the active config file path.
# CLI flags override these settings.

# Default render mode: braille, half-block
# render = "braille"

# Default color mode: mono, ansi16, ansi256, true-color
# color = "true-color"

# Target FPS (1-120)
# fps = 30

# Fixed launch size in points (1-80). Random when unset.
# points = 40

# Leaderboard rank and size. Setting rank sizes launches by tier.
# Rank 1 can fire the crown finale with 'k'.
# rank = 1
# total = 100

# ISO country code for flag-themed rockets
# country = "JP"

# Words shown on bursts
# words = ["HAPPY", "NEW", "YEAR"]

# Message under the crown finale
# crown_message = "THANK YOU"

# World height in simulation units
# world_height = 900.0

# Replay launch records (JSON lines) from a file, or "-" for stdin
# relay_in = "/tmp/skyburst-in.jsonl"

# Append local launches as JSON lines
# relay_out = "/tmp/skyburst-out.jsonl"

# RNG seed for a reproducible show
# seed = 2026

# Hide status bar
# clean = false

# Seconds between automatic launches (0 = off)
# auto_launch = 0.0

# Log file (logging is disabled without one; level via RUST_LOG)
# log_file = "/tmp/skyburst.log"

# Color quantization step (0 = off, 4/8/16 = coarser colors, less output)
# Useful for slow terminals or tmux
# color_quant = 0

# New Year around the world: flags burst as each timezone reaches midnight.
# "live" follows the real clock, "accelerated" fast-forwards to each midnight.
# celebrate = "accelerated"

# Fast-forward rate of the accelerated clock
# time_scale = 1000.0
"#
    .to_string()
}
