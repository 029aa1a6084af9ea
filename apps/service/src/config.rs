use std::collections::HashMap;
use std::time::Duration;
use std::{env, fmt, fs, path};

use beacon::{CheckKind, EngineConfig, Registry, RetryPolicy, Target, Thresholds};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: std::io::Error },

    #[error("failed to write {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: std::io::Error },

    #[error("failed to parse {path}: {source}")]
    ParseFailed { path: path::PathBuf, source: toml::de::Error },

    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("no config path: neither XDG_CONFIG_HOME nor HOME is set")]
    ConfigPathUnavailable,

    #[error("duplicate channel name: {0}")]
    DuplicateChannel(String),

    #[error(transparent)]
    Targets(#[from] beacon::ConfigError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineSection,
    pub retry: RetrySection,
    pub database: DatabaseSection,
    pub defaults: TargetDefaults,
    pub channels: Vec<ChannelConfig>,
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub startup_jitter_ms: u64,
    pub dispatch_grace_seconds: u64,
    pub error_samples: usize,
    pub restore_state: bool,
    /// How often the config file is checked for changes; 0 disables polling
    pub reload_poll_seconds: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            startup_jitter_ms: 2000,
            dispatch_grace_seconds: 10,
            error_samples: 3,
            restore_state: true,
            reload_poll_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self { max_attempts: 5, initial_backoff_ms: 500, max_backoff_ms: 30_000, multiplier: 2.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// SQLite file for check history; without one history is kept in memory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<path::PathBuf>,
    pub retention_days: i64,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self { path: None, retention_days: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetDefaults {
    pub interval_seconds: u64,
    pub timeout_seconds: u64,
    pub failure_threshold: u32,
    pub recovery_threshold: u32,
}

impl Default for TargetDefaults {
    fn default() -> Self {
        Self { interval_seconds: 30, timeout_seconds: 10, failure_threshold: 2, recovery_threshold: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    #[serde(flatten)]
    pub kind: ChannelKind,
}

/// Channel settings; credentials left out fall back to the environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChannelKind {
    Telegram {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chat_id: Option<String>,
        /// Self-hosted Bot API server
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_base: Option<String>,
    },
    Email {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        smtp_host: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        smtp_port: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
    },
    Webhook {
        url: String,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        headers: HashMap<String, String>,
    },
    Log,
}

impl ChannelKind {
    pub fn label(&self) -> &'static str {
        match self {
            ChannelKind::Telegram { .. } => "telegram",
            ChannelKind::Email { .. } => "email",
            ChannelKind::Webhook { .. } => "webhook",
            ChannelKind::Log => "log",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    /// URL for http targets, `host:port` for tcp targets
    pub url: String,
    #[serde(default)]
    pub kind: CheckKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_threshold: Option<u32>,
    /// Channels to alert; all channels when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<String>>,
}

impl TargetConfig {
    pub fn to_target(&self, defaults: &TargetDefaults) -> Target {
        let interval = self.interval_seconds.unwrap_or(defaults.interval_seconds);
        let timeout = self.timeout_seconds.unwrap_or(defaults.timeout_seconds);
        let thresholds = Thresholds::new(
            self.failure_threshold.unwrap_or(defaults.failure_threshold),
            self.recovery_threshold.unwrap_or(defaults.recovery_threshold),
        );

        let mut target = Target::new(self.name.clone(), self.url.clone(), self.kind)
            .with_interval(Duration::from_secs(interval))
            .with_timeout(Duration::from_secs(timeout));
        target.thresholds = thresholds;
        target.channels = self.channels.clone();
        target
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/beacon/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("beacon/config.toml"))
}

/// The config file to use: `optional_path` when given, else the default
pub fn resolve_path(optional_path: Option<impl AsRef<path::Path>>) -> Result<path::PathBuf, Error> {
    match optional_path {
        Some(path) => Ok(normalize_toml_path(path.as_ref())),
        None => default_config_path(),
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Beacon Configuration:")?;
        write_title_1(f, "Engine")?;
        write_1(f, "Startup Jitter (ms)", &self.engine.startup_jitter_ms)?;
        write_1(f, "Dispatch Grace (s)", &self.engine.dispatch_grace_seconds)?;
        write_1(f, "Error Samples", &self.engine.error_samples)?;
        write_1(f, "Restore State", &self.engine.restore_state)?;
        write_1(f, "Reload Poll (s)", &self.engine.reload_poll_seconds)?;

        write_title_1(f, "Retry")?;
        write_1(f, "Max Attempts", &self.retry.max_attempts)?;
        write_1(f, "Initial Backoff (ms)", &self.retry.initial_backoff_ms)?;
        write_1(f, "Max Backoff (ms)", &self.retry.max_backoff_ms)?;
        write_1(f, "Multiplier", &self.retry.multiplier)?;

        write_title_1(f, "Database")?;
        match &self.database.path {
            Some(path) => write_1(f, "Path", &path.display())?,
            None => write_1(f, "Path", &"(in memory)")?,
        }
        write_1(f, "Retention (days)", &self.database.retention_days)?;

        write_title_1(f, "Channels")?;
        for channel in &self.channels {
            write_1(f, &channel.name, &channel.kind.label())?;
        }

        write_title_1(f, "Targets")?;
        for target in &self.targets {
            let resolved = target.to_target(&self.defaults);
            write_1(f, &target.name, &format!("{} ({})", target.url, target.kind))?;
            write_2(f, "Interval", &format!("{:?}", resolved.interval))?;
            write_2(f, "Timeout", &format!("{:?}", resolved.timeout))?;
            write_2(
                f,
                "Thresholds",
                &format!("down after {}, up after {}", resolved.thresholds.failure, resolved.thresholds.recovery),
            )?;
            if let Some(channels) = &target.channels {
                write_2(f, "Channels", &channels.join(", "))?;
            }
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config at `config_path` if one does not exist
    pub fn load_or_create(config_path: &path::Path) -> Result<Self, Error> {
        if config_path.exists() {
            Self::read(config_path)
        } else {
            let config = Self::default_with_log_channel();
            config.write_config(config_path)?;
            Ok(config)
        }
    }

    /// Parse the file at `path`, failing if it does not exist
    pub fn read(path: &path::Path) -> Result<Self, Error> {
        let raw_string = fs::read_to_string(path)
            .map_err(|source| Error::ReadFailed { path: path.to_path_buf(), source })?;
        Self::parse(&raw_string).map_err(|source| Error::ParseFailed { path: path.to_path_buf(), source })
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str).map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }

    fn default_with_log_channel() -> Self {
        Self {
            database: DatabaseSection { path: Some("beacon.db".into()), ..DatabaseSection::default() },
            channels: vec![ChannelConfig { name: "log".into(), kind: ChannelKind::Log }],
            ..Self::default()
        }
    }

    /// Validated target registry, with routes checked against `channels`
    pub fn registry(&self) -> Result<Registry, Error> {
        self.channel_names()?;
        let registry = Registry::new(self.targets.iter().map(|t| t.to_target(&self.defaults)))?;
        registry.check_routes(self.channels.iter().map(|c| c.name.as_str()))?;
        Ok(registry)
    }

    /// Channel names, rejecting duplicates
    pub fn channel_names(&self) -> Result<Vec<&str>, Error> {
        let mut names: Vec<&str> = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            if names.contains(&channel.name.as_str()) {
                return Err(Error::DuplicateChannel(channel.name.clone()));
            }
            names.push(&channel.name);
        }
        Ok(names)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            startup_jitter: Duration::from_millis(self.engine.startup_jitter_ms),
            error_samples: self.engine.error_samples,
            restore_state: self.engine.restore_state,
            dispatch_grace: Duration::from_secs(self.engine.dispatch_grace_seconds),
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts.max(1),
                initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
                multiplier: self.retry.multiplier,
            },
        }
    }

    /// Whether switching to `next` needs a restart rather than a reload
    pub fn requires_restart(&self, next: &Config) -> bool {
        self.engine != next.engine
            || self.retry != next.retry
            || self.database != next.database
            || self.channels != next.channels
    }
}
