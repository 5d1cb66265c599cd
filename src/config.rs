//! Process configuration.
//!
//! Values come from command-line flags, `MF_`-prefixed environment variables
//! and an optional TOML file (`--config`). A flag or env var beats the file;
//! the file beats the built-in default. The config file is optional and any
//! subset of keys may be given.
use crate::client::Credentials;
use crate::filter::RunMode;
use crate::rules::{RuleSource, SourceError};
use crate::util::{validate_url, UrlValidationError};
use clap::Parser;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const DEFAULT_ENVIRONMENT: &str = "develop";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_UPDATE_INTERVAL_MINUTES: u64 = 15;
const DEFAULT_REFRESH_INTERVAL_MINUTES: u64 = 60;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("api endpoint must be provided")]
    MissingEndpoint,

    #[error("Invalid {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: UrlValidationError,
    },

    #[error("either an api key or a username and password must be provided")]
    MissingCredentials,

    #[error("either a killfile path or a killfile url must be provided")]
    NoRuleSource,

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

// ============================================================================
// Command Line
// ============================================================================

/// Command-line flags. Every flag can also be set through its env var.
#[derive(Parser, Default)]
#[command(
    name = "sidekick",
    version,
    about = "Marks Miniflux entries as read when they match killfile rules"
)]
pub struct Args {
    /// Optional TOML config file
    #[arg(long, env = "MF_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Environment we are running in; "prod"/"production" enables destructive mode
    #[arg(long, env = "MF_ENVIRONMENT")]
    pub environment: Option<String>,

    /// Username used to log into Miniflux
    #[arg(long, env = "MF_USERNAME")]
    pub username: Option<String>,

    /// Password used to log into Miniflux
    #[arg(long, env = "MF_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Miniflux API key (used instead of username/password when set)
    #[arg(long, env = "MF_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the Miniflux instance
    #[arg(long, env = "MF_API_ENDPOINT", value_name = "URL")]
    pub api_endpoint: Option<String>,

    /// Path to a local killfile (wins over --killfile-url)
    #[arg(long, env = "MF_KILLFILE_PATH", value_name = "FILE")]
    pub killfile_path: Option<String>,

    /// URL of a remote killfile
    #[arg(long, env = "MF_KILLFILE_URL", value_name = "URL")]
    pub killfile_url: Option<String>,

    /// Minutes between remote killfile refreshes (0 disables refresh)
    #[arg(long, env = "MF_KILLFILE_REFRESH_INTERVAL", value_name = "MINUTES")]
    pub killfile_refresh_interval: Option<u64>,

    /// Minutes between filter runs
    #[arg(long, env = "MF_UPDATE_INTERVAL", value_name = "MINUTES")]
    pub update_interval: Option<u64>,

    /// Port of the status endpoint
    #[arg(long, env = "MF_PORT")]
    pub port: Option<u16>,

    /// Never mark entries read, only log what would happen
    #[arg(long)]
    pub simulation: bool,

    /// Run a single filter pass and exit
    #[arg(long)]
    pub once: bool,
}

// ============================================================================
// Config File
// ============================================================================

/// Contents of the optional TOML config file. Keys mirror the flag names.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub environment: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub killfile_path: Option<String>,
    pub killfile_url: Option<String>,
    pub killfile_refresh_interval: Option<u64>,
    pub update_interval: Option<u64>,
    pub port: Option<u16>,
}

/// Mask secrets in Debug output.
impl std::fmt::Debug for FileConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfig")
            .field("environment", &self.environment)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_endpoint", &self.api_endpoint)
            .field("killfile_path", &self.killfile_path)
            .field("killfile_url", &self.killfile_url)
            .field("killfile_refresh_interval", &self.killfile_refresh_interval)
            .field("update_interval", &self.update_interval)
            .field("port", &self.port)
            .finish()
    }
}

impl FileConfig {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 10] = [
        "environment",
        "username",
        "password",
        "api_key",
        "api_endpoint",
        "killfile_path",
        "killfile_url",
        "killfile_refresh_interval",
        "update_interval",
        "port",
    ];

    /// Load the config file.
    ///
    /// - Missing or empty file → `Ok(FileConfig::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: FileConfig = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}

// ============================================================================
// Resolved Settings
// ============================================================================

/// Where the killfile lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleLocation {
    Local(PathBuf),
    Remote(Url),
}

impl RuleLocation {
    /// Pick the rule location. A non-empty local path wins over a remote URL;
    /// empty strings count as absent.
    pub fn select(path: Option<&str>, url: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(path) = non_empty(path) {
            if non_empty(url).is_some() {
                tracing::info!(path = %path, "Both killfile path and url given, using the local path");
            }
            return Ok(RuleLocation::Local(PathBuf::from(path)));
        }
        match non_empty(url) {
            Some(url) => validate_url(url)
                .map(RuleLocation::Remote)
                .map_err(|source| ConfigError::InvalidUrl {
                    field: "killfile url",
                    source,
                }),
            None => Err(ConfigError::NoRuleSource),
        }
    }

    pub fn into_source(self) -> Result<RuleSource, SourceError> {
        match self {
            RuleLocation::Local(path) => Ok(RuleSource::local(path)),
            RuleLocation::Remote(url) => RuleSource::remote(url),
        }
    }
}

/// Fully resolved configuration.
#[derive(Debug)]
pub struct Settings {
    pub environment: String,
    pub mode: RunMode,
    pub api_endpoint: Url,
    pub credentials: Credentials,
    pub rule_location: RuleLocation,
    /// `None` disables periodic killfile refresh
    pub refresh_interval: Option<Duration>,
    pub update_interval: Duration,
    pub port: u16,
    pub run_once: bool,
}

impl Settings {
    /// Merge flags/env over the config file over defaults, and validate.
    pub fn resolve(args: Args, file: FileConfig) -> Result<Self, ConfigError> {
        let environment = pick(args.environment, file.environment)
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        let mode = if args.simulation || !is_production(&environment) {
            RunMode::Simulation
        } else {
            RunMode::Destructive
        };

        let api_endpoint = pick(args.api_endpoint, file.api_endpoint)
            .ok_or(ConfigError::MissingEndpoint)
            .and_then(|raw| {
                validate_url(&raw).map_err(|source| ConfigError::InvalidUrl {
                    field: "api endpoint",
                    source,
                })
            })?;

        let credentials = match pick(args.api_key, file.api_key) {
            Some(key) => Credentials::ApiKey(SecretString::from(key)),
            None => match (
                pick(args.username, file.username),
                pick(args.password, file.password),
            ) {
                (Some(username), Some(password)) => Credentials::Basic {
                    username,
                    password: SecretString::from(password),
                },
                _ => return Err(ConfigError::MissingCredentials),
            },
        };

        let killfile_path = pick(args.killfile_path, file.killfile_path);
        let killfile_url = pick(args.killfile_url, file.killfile_url);
        let rule_location =
            RuleLocation::select(killfile_path.as_deref(), killfile_url.as_deref())?;

        let update_minutes = args
            .update_interval
            .or(file.update_interval)
            .unwrap_or(DEFAULT_UPDATE_INTERVAL_MINUTES);
        if update_minutes == 0 {
            return Err(ConfigError::InvalidValue(
                "update interval must be at least 1 minute".to_string(),
            ));
        }

        let refresh_minutes = args
            .killfile_refresh_interval
            .or(file.killfile_refresh_interval)
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_MINUTES);

        Ok(Self {
            environment,
            mode,
            api_endpoint,
            credentials,
            rule_location,
            refresh_interval: (refresh_minutes > 0).then(|| minutes(refresh_minutes)),
            update_interval: minutes(update_minutes),
            port: args.port.or(file.port).unwrap_or(DEFAULT_PORT),
            run_once: args.once,
        })
    }

    /// Default tracing directive when `RUST_LOG` is unset.
    pub fn log_directive(&self) -> &'static str {
        default_log_directive(&self.environment)
    }
}

/// `warn` in production, `info` everywhere else.
pub fn default_log_directive(environment: &str) -> &'static str {
    if is_production(environment) {
        "warn"
    } else {
        "info"
    }
}

fn is_production(environment: &str) -> bool {
    matches!(
        environment.trim().to_lowercase().as_str(),
        "prod" | "production"
    )
}

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(60))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// First non-empty of flag and file value.
fn pick(flag: Option<String>, file: Option<String>) -> Option<String> {
    non_empty(flag.as_deref())
        .or_else(|| non_empty(file.as_deref()))
        .map(str::to_string)
}

// ============================================================================
// Tests
// ============================================================================
