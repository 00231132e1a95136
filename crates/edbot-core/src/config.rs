use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::{Duration, SystemTime},
};

use ini::Ini;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Level;

use crate::{domain::ChannelId, errors::Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.ini";
pub const CONFIG_PATH_ENV: &str = "EDBOT_CONFIG";

const WATCH_INTERVAL: Duration = Duration::from_secs(2);

/// Typed configuration loaded from the sectioned `config.ini`.
///
/// Keys mirror the INI layout: `[general]`, `[discord]`, `[elite]`, `[news]`.
#[derive(Clone)]
pub struct Config {
    // [general]
    pub log_level: Level,
    pub log_file: Option<PathBuf>,
    pub scrape_gallery: bool,
    pub gallery_folder: PathBuf,
    pub post_galnet_news: bool,
    pub post_website_news: bool,
    pub news_timestamp_use_ugt: bool,
    pub timezone: String,
    pub check_interval: Duration,

    // [discord]
    pub discord_auth_token: String,
    pub gallery_channel_id: Option<ChannelId>,
    pub news_channel_id: Option<ChannelId>,
    pub new_news_message: String,

    // [elite]
    pub galnet_api: Option<String>,

    // [news]
    pub rss_url: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_ini_str(&contents)
    }

    pub fn from_ini_str(contents: &str) -> Result<Self> {
        let ini = Ini::load_from_str(contents)
            .map_err(|e| Error::Config(format!("invalid config file: {e}")))?;

        let discord_auth_token = get_str(&ini, "discord", "auth_token").unwrap_or_default();
        if discord_auth_token.trim().is_empty() {
            return Err(Error::Config(
                "discord.auth_token is required".to_string(),
            ));
        }

        let log_level = match get_str(&ini, "general", "log_level") {
            Some(raw) => parse_level(&raw)?,
            None => Level::INFO,
        };

        let check_interval =
            Duration::from_secs(get_u64(&ini, "general", "check_interval")?.unwrap_or(1800));

        Ok(Self {
            log_level,
            log_file: get_str(&ini, "general", "log_file").map(PathBuf::from),
            scrape_gallery: get_bool(&ini, "general", "scrape_gallery")?.unwrap_or(false),
            gallery_folder: get_str(&ini, "general", "gallery_folder")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("gallery")),
            post_galnet_news: get_bool(&ini, "general", "post_galnet_news")?.unwrap_or(false),
            post_website_news: get_bool(&ini, "general", "post_website_news")?.unwrap_or(false),
            news_timestamp_use_ugt: get_bool(&ini, "general", "news_timestamp_use_ugt")?
                .unwrap_or(true),
            timezone: get_str(&ini, "general", "timezone").unwrap_or_else(|| "UTC".to_string()),
            check_interval,
            discord_auth_token,
            gallery_channel_id: get_u64(&ini, "discord", "gallery_channel_id")?.map(ChannelId),
            news_channel_id: get_u64(&ini, "discord", "news_channel_id")?.map(ChannelId),
            new_news_message: get_str(&ini, "discord", "new_news_message")
                .unwrap_or_else(|| "@here".to_string()),
            galnet_api: get_str(&ini, "elite", "galnet_api"),
            rss_url: get_str(&ini, "news", "rss_url"),
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("log_level", &self.log_level)
            .field("log_file", &self.log_file)
            .field("scrape_gallery", &self.scrape_gallery)
            .field("gallery_folder", &self.gallery_folder)
            .field("post_galnet_news", &self.post_galnet_news)
            .field("post_website_news", &self.post_website_news)
            .field("news_timestamp_use_ugt", &self.news_timestamp_use_ugt)
            .field("timezone", &self.timezone)
            .field("check_interval", &self.check_interval)
            .field("discord_auth_token", &"<redacted>")
            .field("gallery_channel_id", &self.gallery_channel_id)
            .field("news_channel_id", &self.news_channel_id)
            .field("new_news_message", &self.new_news_message)
            .field("galnet_api", &self.galnet_api)
            .field("rss_url", &self.rss_url)
            .finish()
    }
}

/// Config path: first CLI argument, then `$EDBOT_CONFIG`, then `config.ini`.
pub fn resolve_path(arg: Option<String>) -> PathBuf {
    arg.or_else(|| env::var(CONFIG_PATH_ENV).ok())
        .and_then(non_empty)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Shared, hot-reloadable configuration.
///
/// Readers take an immutable snapshot per use; the watcher swaps in a new
/// snapshot when the file changes. A reload that fails validation keeps the
/// previous snapshot.
pub struct ConfigStore {
    path: Option<PathBuf>,
    current: RwLock<Arc<Config>>,
    last_modified: Mutex<Option<SystemTime>>,
}

impl ConfigStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cfg = Config::load(&path)?;
        let modified = modified_time(&path);
        Ok(Self {
            path: Some(path),
            current: RwLock::new(Arc::new(cfg)),
            last_modified: Mutex::new(modified),
        })
    }

    /// In-memory store without a backing file (never reloads).
    pub fn from_config(cfg: Config) -> Self {
        Self {
            path: None,
            current: RwLock::new(Arc::new(cfg)),
            last_modified: Mutex::new(None),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn snapshot(&self) -> Arc<Config> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, cfg: Config) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(cfg);
    }

    pub fn reload(&self) -> Result<Arc<Config>> {
        let Some(path) = &self.path else {
            return Ok(self.snapshot());
        };
        let cfg = Config::load(path)?;
        self.replace(cfg);
        Ok(self.snapshot())
    }

    /// Returns true when the backing file's mtime moved forward since the last check.
    fn file_changed(&self) -> bool {
        let Some(path) = &self.path else {
            return false;
        };
        let Some(modified) = modified_time(path) else {
            return false;
        };
        let mut last = self
            .last_modified
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match *last {
            Some(prev) if modified <= prev => false,
            _ => {
                *last = Some(modified);
                true
            }
        }
    }

    /// Poll the config file's mtime and reload on change until `cancel` fires.
    pub fn spawn_watcher(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(WATCH_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        if !store.file_changed() {
                            continue;
                        }
                        match store.reload() {
                            Ok(_) => tracing::info!(path = ?store.path(), "config reloaded"),
                            Err(e) => tracing::error!(
                                path = ?store.path(),
                                "config reload failed, keeping previous values: {e}"
                            ),
                        }
                    }
                }
            }
        })
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|md| md.modified()).ok()
}

fn parse_level(raw: &str) -> Result<Level> {
    match raw.trim().to_uppercase().as_str() {
        "TRACE" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" | "WARNING" => Ok(Level::WARN),
        "ERROR" | "CRITICAL" => Ok(Level::ERROR),
        other => Err(Error::Config(format!(
            "general.log_level: unknown level {other:?}"
        ))),
    }
}

fn get_str(ini: &Ini, section: &str, key: &str) -> Option<String> {
    ini.get_from(Some(section), key)
        .map(|s| s.trim().to_string())
        .and_then(non_empty)
}

fn get_bool(ini: &Ini, section: &str, key: &str) -> Result<Option<bool>> {
    let Some(raw) = get_str(ini, section, key) else {
        return Ok(None);
    };
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(Error::Config(format!(
            "{section}.{key}: expected a boolean, got {raw:?}"
        ))),
    }
}

fn get_u64(ini: &Ini, section: &str, key: &str) -> Result<Option<u64>> {
    let Some(raw) = get_str(ini, section, key) else {
        return Ok(None);
    };
    raw.parse::<u64>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{section}.{key}: expected a number, got {raw:?}")))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
