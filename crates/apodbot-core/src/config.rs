//! apodbot configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ApodError, Result};
use crate::time::SendTime;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApodConfig {
    #[serde(default)]
    pub nasa: NasaConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Platform user ids allowed to manage schedules.
    #[serde(default)]
    pub superusers: Vec<String>,
}

impl ApodConfig {
    /// Load config from the default path (~/.apodbot/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ApodError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ApodError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ApodError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Fill empty secrets from environment variables.
    pub fn apply_env_overrides(&mut self) {
        fill_from_env(&mut self.nasa.api_key, &["NASA_API_KEY", "APOD_API_KEY"]);
        fill_from_env(&mut self.translate.deepl.api_key, &["DEEPL_API_KEY"]);
        fill_from_env(&mut self.translate.baidu.appid, &["BAIDU_TRANS_APPID"]);
        fill_from_env(&mut self.translate.baidu.api_key, &["BAIDU_TRANS_API_KEY"]);
        if self.channel.telegram.is_none()
            && let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN")
            && !token.is_empty()
        {
            self.channel.telegram = Some(TelegramChannelConfig {
                bot_token: token,
                enabled: true,
                poll_interval: default_poll_interval(),
            });
        }
    }

    /// Reject values that would only fail later at schedule time.
    pub fn validate(&self) -> Result<()> {
        SendTime::parse(&self.schedule.default_send_time).map_err(|e| {
            ApodError::Config(format!("schedule.default_send_time: {e}"))
        })?;
        SendTime::parse(&self.schedule.janitor_time)
            .map_err(|e| ApodError::Config(format!("schedule.janitor_time: {e}")))?;
        if self.schedule.check_interval_secs == 0 {
            return Err(ApodError::Config(
                "schedule.check_interval_secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Whether the NASA key is present. Without it the bot stays disabled.
    pub fn is_enabled(&self) -> bool {
        !self.nasa.api_key.is_empty()
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the apodbot home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".apodbot")
    }
}

fn fill_from_env(slot: &mut String, keys: &[&str]) {
    if slot.is_empty()
        && let Some(value) = keys.iter().find_map(|k| std::env::var(k).ok())
    {
        *slot = value;
    }
}

fn bool_true() -> bool { true }

/// NASA APOD API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NasaConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_nasa_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_nasa_endpoint() -> String { "https://api.nasa.gov/planetary/apod".into() }
fn default_http_timeout() -> u64 { 30 }

impl Default for NasaConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_nasa_endpoint(),
            timeout_secs: default_http_timeout(),
        }
    }
}

/// Scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Used by `start` when no time is given.
    #[serde(default = "default_send_time")]
    pub default_send_time: String,
    /// Daily cache eviction time. The default matches the APOD rollover
    /// (midnight US Eastern, 13:00 in UTC+8). A send firing in the same tick
    /// gets either the previous entry or the new one, never a mix of the two.
    #[serde(default = "default_janitor_time")]
    pub janitor_time: String,
    /// Trigger engine tick period.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

fn default_send_time() -> String { "13:00".into() }
fn default_janitor_time() -> String { "13:00".into() }
fn default_check_interval() -> u64 { 1 }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            default_send_time: default_send_time(),
            janitor_time: default_janitor_time(),
            check_interval_secs: default_check_interval(),
        }
    }
}

/// Delivery behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Send one composed image instead of text + image.
    #[serde(default)]
    pub infopuzzle: bool,
    /// Attach the HD url instead of the regular one in puzzle mode.
    #[serde(default)]
    pub hd_image: bool,
    /// Dark stylesheet for the composed image.
    #[serde(default)]
    pub dark_mode: bool,
    /// Tell the chat when a scheduled send could not fetch today's picture.
    #[serde(default = "bool_true")]
    pub notify_on_scheduled_failure: bool,
    /// Drop the composed image once a one-shot command has sent it.
    #[serde(default)]
    pub consume_composed_on_command: bool,
    /// Lifetime of reply metadata attached to sent pictures.
    #[serde(default = "default_argot_expiry")]
    pub argot_expiry_secs: u64,
    /// Width of the composed image in pixels.
    #[serde(default = "default_render_width")]
    pub render_width: u32,
}

fn default_argot_expiry() -> u64 { 360 }
fn default_render_width() -> u32 { 600 }

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            infopuzzle: false,
            hd_image: false,
            dark_mode: false,
            notify_on_scheduled_failure: true,
            consume_composed_on_command: false,
            argot_expiry_secs: default_argot_expiry(),
            render_width: default_render_width(),
        }
    }
}

/// Translation backends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslateConfig {
    #[serde(default)]
    pub deepl: DeepLConfig,
    #[serde(default)]
    pub baidu: BaiduConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepLConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_deepl_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_deepl_lang")]
    pub target_lang: String,
}

fn default_deepl_endpoint() -> String { "https://api-free.deepl.com/v2/translate".into() }
fn default_deepl_lang() -> String { "ZH".into() }

impl Default for DeepLConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            endpoint: default_deepl_endpoint(),
            target_lang: default_deepl_lang(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaiduConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub appid: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_baidu_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_baidu_lang")]
    pub to_lang: String,
}

fn default_baidu_endpoint() -> String { "http://api.fanyi.baidu.com/api/trans/vip/translate".into() }
fn default_baidu_lang() -> String { "zh".into() }

impl Default for BaiduConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            appid: String::new(),
            api_key: String::new(),
            endpoint: default_baidu_endpoint(),
            to_lang: default_baidu_lang(),
        }
    }
}

/// HTML-to-image render service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Empty disables composition (puzzle mode then reports a compose failure).
    #[serde(default)]
    pub endpoint: String,
}

/// On-disk locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

fn default_data_dir() -> String { "~/.apodbot/data".into() }
fn default_cache_dir() -> String { "~/.apodbot/cache".into() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl StorageConfig {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).to_string())
    }

    pub fn cache_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.cache_dir).to_string())
    }
}

/// Messaging platforms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub telegram: Option<TelegramChannelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChannelConfig {
    pub bot_token: String,
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_poll_interval() -> u64 { 1 }
