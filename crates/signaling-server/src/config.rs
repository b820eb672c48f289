//! Signaling server configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use base64::{engine::general_purpose::STANDARD, Engine};
use common::jwt::MAX_CLOCK_SKEW;
use common::secret::{ExposeSecret, SecretBox, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default WebSocket and admin API bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:5000";

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default `iat` clock skew tolerance in seconds.
pub const DEFAULT_JWT_CLOCK_SKEW_SECONDS: u64 = 300;

/// Default number of chat messages kept per room.
pub const DEFAULT_CHAT_HISTORY_LIMIT: usize = 100;

/// Default number of chat messages sent in `room-joined`.
pub const DEFAULT_CHAT_HISTORY_WINDOW: usize = 50;

/// Default maximum chat message length in characters.
pub const DEFAULT_MAX_CHAT_MESSAGE_LENGTH: usize = 5000;

/// Default per-connection outbound queue capacity.
pub const DEFAULT_OUTBOUND_QUEUE_SIZE: usize = 256;

/// Default instance ID prefix.
pub const DEFAULT_INSTANCE_ID_PREFIX: &str = "signaling";

/// Minimum decoded length of the chat encryption key material (32 bytes).
pub const MIN_CHAT_KEY_LENGTH: usize = 32;

/// Signaling server configuration.
///
/// Loaded from environment variables with sensible defaults.
/// Sensitive fields are redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// HS256 verification secret for client bearer tokens.
    pub jwt_secret: SecretString,

    /// Base64-encoded key material for chat transcript encryption.
    pub chat_encryption_key: SecretString,

    /// WebSocket + admin API bind address (default: "0.0.0.0:5000").
    pub bind_address: String,

    /// Health endpoint bind address (default: "0.0.0.0:8081").
    pub health_bind_address: String,

    /// Clock skew tolerance for the `iat` claim (default: 300, max: 600).
    pub jwt_clock_skew_seconds: u64,

    /// Chat transcript cap per room (default: 100).
    pub chat_history_limit: usize,

    /// Messages included in `room-joined` (default: 50, clamped to the limit).
    pub chat_history_window: usize,

    /// Maximum chat message length in characters (default: 5000).
    pub max_chat_message_length: usize,

    /// Per-connection outbound queue capacity (default: 256).
    pub outbound_queue_size: usize,

    /// Unique identifier for this server instance.
    pub instance_id: String,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("jwt_secret", &"[REDACTED]")
            .field("chat_encryption_key", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("health_bind_address", &self.health_bind_address)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("chat_history_limit", &self.chat_history_limit)
            .field("chat_history_window", &self.chat_history_window)
            .field("max_chat_message_length", &self.max_chat_message_length)
            .field("outbound_queue_size", &self.outbound_queue_size)
            .field("instance_id", &self.instance_id)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value is invalid.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwt_secret = vars
            .get("SIGNALING_JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("SIGNALING_JWT_SECRET".to_string()))?;
        let jwt_secret = SecretString::from(jwt_secret.clone());

        let chat_encryption_key = vars
            .get("SIGNALING_CHAT_ENCRYPTION_KEY")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ConfigError::MissingEnvVar("SIGNALING_CHAT_ENCRYPTION_KEY".to_string())
            })?;
        let chat_encryption_key = SecretString::from(chat_encryption_key.clone());

        let bind_address = vars
            .get("SIGNALING_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let health_bind_address = vars
            .get("SIGNALING_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let jwt_clock_skew_seconds = parse_var(
            vars,
            "SIGNALING_JWT_CLOCK_SKEW_SECONDS",
            DEFAULT_JWT_CLOCK_SKEW_SECONDS,
        )?;
        if jwt_clock_skew_seconds > MAX_CLOCK_SKEW.as_secs() {
            return Err(ConfigError::InvalidValue(format!(
                "SIGNALING_JWT_CLOCK_SKEW_SECONDS must be at most {}, got {jwt_clock_skew_seconds}",
                MAX_CLOCK_SKEW.as_secs()
            )));
        }

        let chat_history_limit = parse_positive(
            vars,
            "SIGNALING_CHAT_HISTORY_LIMIT",
            DEFAULT_CHAT_HISTORY_LIMIT,
        )?;

        // A window larger than the stored transcript cannot be served
        let chat_history_window = parse_var(
            vars,
            "SIGNALING_CHAT_HISTORY_WINDOW",
            DEFAULT_CHAT_HISTORY_WINDOW,
        )?
        .min(chat_history_limit);

        let max_chat_message_length = parse_positive(
            vars,
            "SIGNALING_MAX_CHAT_MESSAGE_LENGTH",
            DEFAULT_MAX_CHAT_MESSAGE_LENGTH,
        )?;

        let outbound_queue_size = parse_positive(
            vars,
            "SIGNALING_OUTBOUND_QUEUE_SIZE",
            DEFAULT_OUTBOUND_QUEUE_SIZE,
        )?;

        let instance_id = vars
            .get("SIGNALING_INSTANCE_ID")
            .cloned()
            .unwrap_or_else(|| {
                let hostname = env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
                let uuid_suffix = uuid::Uuid::new_v4().to_string();
                let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
                format!("{DEFAULT_INSTANCE_ID_PREFIX}-{hostname}-{short_suffix}")
            });

        let config = Config {
            jwt_secret,
            chat_encryption_key,
            bind_address,
            health_bind_address,
            jwt_clock_skew_seconds,
            chat_history_limit,
            chat_history_window,
            max_chat_message_length,
            outbound_queue_size,
            instance_id,
        };

        // Fail fast on unusable key material
        config.chat_key_material()?;

        Ok(config)
    }

    /// Decode the chat encryption key material.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the key is not valid base64 or
    /// decodes to fewer than `MIN_CHAT_KEY_LENGTH` bytes.
    pub fn chat_key_material(&self) -> Result<SecretBox<Vec<u8>>, ConfigError> {
        let bytes = STANDARD
            .decode(self.chat_encryption_key.expose_secret())
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "SIGNALING_CHAT_ENCRYPTION_KEY is not valid base64".to_string(),
                )
            })?;

        if bytes.len() < MIN_CHAT_KEY_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "SIGNALING_CHAT_ENCRYPTION_KEY must decode to at least {MIN_CHAT_KEY_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }

        Ok(SecretBox::new(Box::new(bytes)))
    }
}

/// Parse an optional numeric variable, rejecting non-numeric values.
fn parse_var<T: FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| {
                ConfigError::InvalidValue(format!("{name} must be a number, got {raw:?}"))
            }),
        None => Ok(default),
    }
}

/// Parse an optional numeric variable that must be greater than zero.
fn parse_positive(
    vars: &HashMap<String, String>,
    name: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    let value = parse_var(vars, name, default)?;
    if value == 0 {
        return Err(ConfigError::InvalidValue(format!(
            "{name} must be greater than zero"
        )));
    }
    Ok(value)
}
