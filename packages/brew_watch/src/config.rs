use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use brew_signal::{ClassifierConfig, Messages, SamplerConfig};

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Two equivalent ways to configure:
//
//   config.toml:     [chat]
//                    enabled = true
//
//   env var:         BREW_CHAT__ENABLED=true   (double underscore = nesting)
//
//   (single underscore stays within field names: BREW_MONITOR__DRIP_SETTLE_SECS)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub sensor: SensorFileConfig,
    #[serde(default)]
    pub monitor: MonitorFileConfig,
    #[serde(default)]
    pub chat: ChatFileConfig,
    #[serde(default)]
    pub lights: LightsFileConfig,
    #[serde(default)]
    pub telemetry: TelemetryFileConfig,
    #[serde(default)]
    pub messages: Messages,
}

/// Power meter (lives under `[sensor]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SensorFileConfig {
    /// Status endpoint of the plug, e.g. `http://10.0.0.12/status`
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_sensor_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SensorFileConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_sensor_timeout_secs(),
        }
    }
}

/// Loop timing (lives under `[monitor]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitorFileConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_drip_settle_secs")]
    pub drip_settle_secs: u64,
    /// Re-send the brewing light every cycle while the heater runs
    #[serde(default)]
    pub reassert_brewing_light: bool,
}

impl Default for MonitorFileConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            drip_settle_secs: default_drip_settle_secs(),
            reassert_brewing_light: false,
        }
    }
}

/// Slack (lives under `[chat]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatFileConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
}

impl Default for ChatFileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token: None,
            channel_id: None,
            api_base: default_slack_api_base(),
        }
    }
}

/// Hue bridge (lives under `[lights]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LightsFileConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Bridge address, `10.0.0.2` or `http://10.0.0.2`
    #[serde(default)]
    pub bridge: Option<String>,
    /// Bridge user; falls back to the one saved by `pair-lights`
    #[serde(default)]
    pub username: Option<String>,
    /// Light group; "0" addresses every light on the bridge
    #[serde(default = "default_light_group")]
    pub group: String,
}

impl Default for LightsFileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bridge: None,
            username: None,
            group: default_light_group(),
        }
    }
}

/// Power log (lives under `[telemetry]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelemetryFileConfig {
    #[serde(default)]
    pub enabled: bool,
    /// SQLite connection string; defaults to `telemetry.db` in the data dir
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_telemetry_table")]
    pub table: String,
}

impl Default for TelemetryFileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            table: default_telemetry_table(),
        }
    }
}

fn default_sensor_timeout_secs() -> u64 {
    5
}
fn default_interval_secs() -> u64 {
    5
}
fn default_drip_settle_secs() -> u64 {
    30
}
fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}
fn default_light_group() -> String {
    "0".to_string()
}
fn default_telemetry_table() -> String {
    "power_samples".to_string()
}

/// Build a figment that layers: defaults → config.toml → BREW_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `BREW_SENSOR__URL=http://plug/status`  →  `sensor.url = "http://plug/status"`
///   `BREW_CHAT__TOKEN=xoxb-...`  →  `chat.token = "xoxb-..."`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("BREW_").split("__"))
}

// =============================================================================
// Validation
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("`{key}` is required while `{section}.enabled` is true")]
    MissingForEnabled {
        section: &'static str,
        key: &'static str,
    },

    #[error("no Hue username configured or saved; run `brew-watch pair-lights` first")]
    Unpaired,

    #[error("nothing to notify: enable at least one of chat, lights or telemetry")]
    NothingEnabled,

    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn require(
    value: &Option<String>,
    section: &'static str,
    key: &'static str,
) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::MissingForEnabled { section, key })
}

fn positive_secs(secs: u64, key: &'static str) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

/// SQLite identifiers are interpolated into statements, so keep them plain.
fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// =============================================================================
// Runtime config structs (derived from FileConfig after validation)
// =============================================================================

#[derive(Clone, Debug)]
pub struct SensorConfig {
    pub url: String,
    pub timeout: Duration,
}

/// Slack settings (runtime view).
#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub token: String,
    pub channel_id: String,
    pub api_base: String,
}

impl ChatConfig {
    pub fn from_file(fc: &ChatFileConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            token: require(&fc.token, "chat", "chat.token")?,
            channel_id: require(&fc.channel_id, "chat", "chat.channel_id")?,
            api_base: fc.api_base.trim_end_matches('/').to_string(),
        })
    }
}

/// Hue settings (runtime view).
#[derive(Clone, Debug)]
pub struct LightsConfig {
    /// Base URL of the bridge, scheme included
    pub bridge_url: String,
    pub username: String,
    pub group: String,
}

impl LightsConfig {
    pub fn from_file(fc: &LightsFileConfig, paths: &DataDir) -> Result<Self, ConfigError> {
        let bridge_url = bridge_url(fc)?;
        let username = fc
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .or_else(|| paths.saved_hue_username())
            .ok_or(ConfigError::Unpaired)?;

        Ok(Self {
            bridge_url,
            username,
            group: fc.group.clone(),
        })
    }
}

/// Bridge base URL; a bare address gets `http://` (v1 API is plain HTTP).
pub fn bridge_url(fc: &LightsFileConfig) -> Result<String, ConfigError> {
    let bridge = require(&fc.bridge, "lights", "lights.bridge")?;
    let url = if bridge.contains("://") {
        bridge
    } else {
        format!("http://{}", bridge)
    };
    Ok(url.trim_end_matches('/').to_string())
}

/// Telemetry settings (runtime view).
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub url: String,
    pub table: String,
}

impl TelemetryConfig {
    pub fn from_file(fc: &TelemetryFileConfig, paths: &DataDir) -> Result<Self, ConfigError> {
        if !is_plain_identifier(&fc.table) {
            return Err(ConfigError::Invalid {
                key: "telemetry.table",
                reason: format!("{:?} is not a plain SQL identifier", fc.table),
            });
        }
        let url = fc
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| paths.default_telemetry_url());

        Ok(Self {
            url,
            table: fc.table.clone(),
        })
    }
}

/// Everything `run` needs, validated.
#[derive(Clone, Debug)]
pub struct Settings {
    pub sensor: SensorConfig,
    pub sampler: SamplerConfig,
    pub classifier: ClassifierConfig,
    pub chat: Option<ChatConfig>,
    pub lights: Option<LightsConfig>,
    pub telemetry: Option<TelemetryConfig>,
    pub messages: Messages,
}

impl Settings {
    /// Read config.toml and the environment, then validate.
    pub fn load(paths: &DataDir) -> Result<Self, ConfigError> {
        let fc = FileConfig::load(paths)?;
        Self::resolve(&fc, paths)
    }

    pub fn resolve(fc: &FileConfig, paths: &DataDir) -> Result<Self, ConfigError> {
        let url = fc
            .sensor
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::Missing("sensor.url"))?;

        let sensor = SensorConfig {
            url: url.to_string(),
            timeout: positive_secs(fc.sensor.timeout_secs, "sensor.timeout_secs")?,
        };
        let sampler = SamplerConfig {
            interval: positive_secs(fc.monitor.interval_secs, "monitor.interval_secs")?,
            ..Default::default()
        };
        let classifier = ClassifierConfig {
            drip_settle: Duration::from_secs(fc.monitor.drip_settle_secs),
            reassert_brewing_light: fc.monitor.reassert_brewing_light,
        };

        let chat = fc
            .chat
            .enabled
            .then(|| ChatConfig::from_file(&fc.chat))
            .transpose()?;
        let lights = fc
            .lights
            .enabled
            .then(|| LightsConfig::from_file(&fc.lights, paths))
            .transpose()?;
        let telemetry = fc
            .telemetry
            .enabled
            .then(|| TelemetryConfig::from_file(&fc.telemetry, paths))
            .transpose()?;

        if chat.is_none() && lights.is_none() && telemetry.is_none() {
            return Err(ConfigError::NothingEnabled);
        }

        Ok(Self {
            sensor,
            sampler,
            classifier,
            chat,
            lights,
            telemetry,
            messages: fc.messages.clone(),
        })
    }

    /// Names of the enabled collaborators, for the startup log line.
    pub fn enabled_collaborators(&self) -> Vec<&'static str> {
        [
            self.chat.as_ref().map(|_| "chat"),
            self.lights.as_ref().map(|_| "lights"),
            self.telemetry.as_ref().map(|_| "telemetry"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

impl FileConfig {
    pub fn load(paths: &DataDir) -> Result<Self, ConfigError> {
        load_config(&paths.root)
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }
}

// =============================================================================
// Directory layout (not tunable via figment; derived from --data-dir)
// =============================================================================

#[derive(Clone, Debug)]
pub struct DataDir {
    pub root: PathBuf,
}

impl DataDir {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let root = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".brew-watch"),
        };

        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create data directory: {:?}", root))?;

        info!("Data directory: {}", root.display());

        Ok(Self { root })
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn hue_username_path(&self) -> PathBuf {
        self.root.join("hue_username")
    }

    pub fn telemetry_db_path(&self) -> PathBuf {
        self.root.join("telemetry.db")
    }

    pub fn default_telemetry_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.telemetry_db_path().display())
    }

    pub fn saved_hue_username(&self) -> Option<String> {
        std::fs::read_to_string(self.hue_username_path())
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn save_hue_username(&self, username: &str) -> Result<()> {
        let path = self.hue_username_path();
        std::fs::write(&path, username)
            .with_context(|| format!("Failed to save Hue username to {:?}", path))
    }
}
