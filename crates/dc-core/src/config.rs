//! Configuration types and loading

use serde::{Deserialize, Serialize};

/// Default storage path template handed to the attachment engine
pub const DEFAULT_PATH_TEMPLATE: &str = ":class/:attachment/:id_partition/:style/:filename";

/// Default URL template handed to the attachment engine
pub const DEFAULT_URL_TEMPLATE: &str = "/system/:class/:attachment/:id_partition/:style/:filename";

/// Main library configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    /// Defaults applied to attachment fields that do not override them
    #[serde(default)]
    pub attachments: AttachmentDefaults,

    /// Callback propagation limits
    #[serde(default)]
    pub callbacks: CallbackSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AttachmentDefaults {
    /// Storage path template
    pub default_path: String,
    /// Public URL template
    pub default_url: String,
    /// Style used when none is requested
    pub default_style: String,
    /// Storage backend selector
    pub storage: String,
}

impl Default for AttachmentDefaults {
    fn default() -> Self {
        Self {
            default_path: DEFAULT_PATH_TEMPLATE.to_string(),
            default_url: DEFAULT_URL_TEMPLATE.to_string(),
            default_style: "original".to_string(),
            storage: "memory".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackSettings {
    /// Maximum embedded-document nesting walked during propagation
    pub max_embedding_depth: usize,
}

impl Default for CallbackSettings {
    fn default() -> Self {
        Self {
            max_embedding_depth: 32,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Output format of the fallback subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidValue {
                key: "DOCCLIP_LOG_FORMAT".to_string(),
                message: format!("expected \"pretty\" or \"json\", got {:?}", other),
            }),
        }
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("Config file error: {0}")]
    FileError(String),
}

impl Settings {
    /// Load a `.env` file if one exists, then read the environment
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(ConfigError::FileError(e.to_string())),
        }
        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup (environment-shaped)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Attachments
        if let Some(path) = lookup("DOCCLIP_DEFAULT_PATH") {
            config.attachments.default_path = path;
        }
        if let Some(url) = lookup("DOCCLIP_DEFAULT_URL") {
            config.attachments.default_url = url;
        }
        if let Some(style) = lookup("DOCCLIP_DEFAULT_STYLE") {
            config.attachments.default_style = style;
        }
        if let Some(storage) = lookup("DOCCLIP_STORAGE") {
            config.attachments.storage = storage;
        }

        // Callbacks
        if let Some(depth) = lookup("DOCCLIP_MAX_EMBEDDING_DEPTH") {
            let parsed: usize = depth.parse().map_err(|_| ConfigError::InvalidValue {
                key: "DOCCLIP_MAX_EMBEDDING_DEPTH".to_string(),
                message: format!("expected a positive integer, got {:?}", depth),
            })?;
            if parsed == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "DOCCLIP_MAX_EMBEDDING_DEPTH".to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
            config.callbacks.max_embedding_depth = parsed;
        }

        // Logging
        if let Some(filter) = lookup("DOCCLIP_LOG") {
            config.logging.filter = filter;
        }
        if let Some(format) = lookup("DOCCLIP_LOG_FORMAT") {
            config.logging.format = format.parse()?;
        }

        Ok(config)
    }
}
