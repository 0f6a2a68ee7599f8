//! Configuration
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. TOML file: explicit path, `BLOCKDRIVE_CONFIG_PATH`, or `./blockdrive.toml`
//! 3. Environment: `BLOCKDRIVE_` prefix, `__` between sections
//!    (`BLOCKDRIVE_PLAYBACK__BASE_PERIOD_MS=350`)
//! 4. Builder overrides

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::interpreter::{CompilerOptions, PlaybackOptions, UnrecognizedBlockPolicy};
use crate::types::{Speed, SPEED_OPTIONS};

const ENV_PREFIX: &str = "BLOCKDRIVE";
const CONFIG_PATH_VAR: &str = "BLOCKDRIVE_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "blockdrive.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub playback: PlaybackConfig,
    pub compiler: CompilerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Tick period at speed 1, in milliseconds
    pub base_period_ms: u64,
    pub default_speed: f64,
    /// Multipliers offered to the player
    pub speed_options: Vec<f64>,
    pub reschedule_on_speed_change: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            base_period_ms: 700,
            default_speed: 1.0,
            speed_options: SPEED_OPTIONS.to_vec(),
            reschedule_on_speed_change: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub unrecognized_blocks: UnrecognizedBlockPolicy,
    pub max_instructions: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        let options = CompilerOptions::default();
        Self {
            unrecognized_blocks: options.unrecognized_blocks,
            max_instructions: options.max_instructions,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from `.env`, the config file and the environment
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    pub fn validate(&self) -> Result<()> {
        let playback = &self.playback;

        if playback.base_period_ms == 0 {
            bail!("playback.base_period_ms must be greater than zero");
        }
        if playback.speed_options.is_empty() {
            bail!("playback.speed_options must not be empty");
        }
        for option in &playback.speed_options {
            Speed::new(*option).context("Invalid entry in playback.speed_options")?;
        }
        Speed::new(playback.default_speed).context("Invalid playback.default_speed")?;
        if !playback.speed_options.contains(&playback.default_speed) {
            bail!(
                "playback.default_speed {} is not one of playback.speed_options {:?}",
                playback.default_speed,
                playback.speed_options
            );
        }

        if self.compiler.max_instructions == 0 {
            bail!("compiler.max_instructions must be greater than zero");
        }

        Ok(())
    }

    pub fn base_period(&self) -> Duration {
        Duration::from_millis(self.playback.base_period_ms)
    }

    pub fn default_speed(&self) -> Result<Speed> {
        Speed::new(self.playback.default_speed).context("Invalid playback.default_speed")
    }

    /// Configured speed options, in the order given
    pub fn speed_options(&self) -> Result<Vec<Speed>> {
        self.playback
            .speed_options
            .iter()
            .map(|option| Speed::new(*option).context("Invalid entry in playback.speed_options"))
            .collect()
    }

    pub fn playback_options(&self) -> Result<PlaybackOptions> {
        Ok(PlaybackOptions {
            base_period: self.base_period(),
            speed: self.default_speed()?,
            reschedule_on_speed_change: self.playback.reschedule_on_speed_change,
        })
    }

    pub fn compiler_options(&self) -> CompilerOptions {
        CompilerOptions {
            unrecognized_blocks: self.compiler.unrecognized_blocks,
            max_instructions: self.compiler.max_instructions,
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

/* ===================== Builder ===================== */

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    environment: Option<HashMap<String, String>>,
    base_period_ms: Option<u64>,
    default_speed: Option<f64>,
    unrecognized_blocks: Option<UnrecognizedBlockPolicy>,
}

impl ConfigBuilder {
    /// Config file to read instead of the default search
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Read `BLOCKDRIVE_*` variables from this map instead of the process
    /// environment
    pub fn environment(mut self, vars: HashMap<String, String>) -> Self {
        self.environment = Some(vars);
        self
    }

    pub fn base_period_ms(mut self, ms: Option<u64>) -> Self {
        self.base_period_ms = ms;
        self
    }

    pub fn default_speed(mut self, speed: Option<f64>) -> Self {
        self.default_speed = speed;
        self
    }

    pub fn unrecognized_blocks(mut self, policy: Option<UnrecognizedBlockPolicy>) -> Self {
        self.unrecognized_blocks = policy;
        self
    }

    pub fn build(self) -> Result<Config> {
        // A missing .env is fine
        if self.environment.is_none() {
            dotenvy::dotenv().ok();
        }

        let mut builder = ::config::Config::builder();

        let path_from_env = match &self.environment {
            Some(vars) => vars.get(CONFIG_PATH_VAR).cloned(),
            None => std::env::var(CONFIG_PATH_VAR).ok(),
        };
        let explicit_path = self
            .config_path
            .clone()
            .or_else(|| path_from_env.map(PathBuf::from));

        builder = match &explicit_path {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                builder.add_source(::config::File::from(path.as_path()).required(true))
            }
            None => builder
                .add_source(::config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(self.environment.clone()),
        );

        if let Some(ms) = self.base_period_ms {
            builder = builder.set_override("playback.base_period_ms", ms)?;
        }
        if let Some(speed) = self.default_speed {
            builder = builder.set_override("playback.default_speed", speed)?;
        }
        if let Some(policy) = self.unrecognized_blocks {
            let policy = match policy {
                UnrecognizedBlockPolicy::Skip => "skip",
                UnrecognizedBlockPolicy::Wait => "wait",
            };
            builder = builder.set_override("compiler.unrecognized_blocks", policy)?;
        }

        let config: Config = builder
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config.validate()?;

        debug!(
            config_path = ?explicit_path,
            base_period_ms = config.playback.base_period_ms,
            default_speed = config.playback.default_speed,
            "Configuration loaded"
        );

        Ok(config)
    }
}
