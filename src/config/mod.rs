//! Configuration types.
//!
//! Provides configuration with builder pattern for:
//! - MIME composition (content-id and message-id domains, charsets)
//! - HTTP kernel behavior
//! - Backend selection (installed client libraries, default ports, timeouts)

use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::{FrameworkError, FrameworkResult};
use crate::mime::TransferEncoding;
use crate::store::client::ClientLibraries;

/// Default domain appended to generated content IDs.
pub const DEFAULT_CONTENT_ID_DOMAIN: &str = "symfony";

/// Default domain appended to generated message IDs.
pub const DEFAULT_MESSAGE_ID_DOMAIN: &str = "localhost";

/// Default charset for text parts.
pub const DEFAULT_CHARSET: &str = "utf-8";

/// Default Redis port.
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// Default Memcached port.
pub const DEFAULT_MEMCACHED_PORT: u16 = 11211;

/// Default Zookeeper port.
pub const DEFAULT_ZOOKEEPER_PORT: u16 = 2181;

/// MIME composition configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MimeConfig {
    /// Domain used for generated content IDs (`<hash>@domain`).
    #[serde(default = "default_content_id_domain")]
    pub content_id_domain: String,
    /// Domain used for generated message IDs.
    #[serde(default = "default_message_id_domain")]
    pub message_id_domain: String,
    /// Charset for text and html bodies when none is given.
    #[serde(default = "default_charset")]
    pub default_charset: String,
    /// Transfer encoding for text parts.
    #[serde(default)]
    pub text_encoding: TransferEncoding,
}

fn default_content_id_domain() -> String { DEFAULT_CONTENT_ID_DOMAIN.to_string() }
fn default_message_id_domain() -> String { DEFAULT_MESSAGE_ID_DOMAIN.to_string() }
fn default_charset() -> String { DEFAULT_CHARSET.to_string() }

impl Default for MimeConfig {
    fn default() -> Self {
        Self {
            content_id_domain: default_content_id_domain(),
            message_id_domain: default_message_id_domain(),
            default_charset: default_charset(),
            text_encoding: TransferEncoding::default(),
        }
    }
}

impl MimeConfig {
    /// Creates a new MIME config builder.
    pub fn builder() -> MimeConfigBuilder {
        MimeConfigBuilder::default()
    }

    /// Validates the MIME configuration.
    pub fn validate(&self) -> FrameworkResult<()> {
        for (field, domain) in [
            ("content_id_domain", &self.content_id_domain),
            ("message_id_domain", &self.message_id_domain),
        ] {
            if domain.is_empty() {
                return Err(FrameworkError::configuration(format!("{} cannot be empty", field)));
            }
            if domain.chars().any(|c| c.is_control() || c.is_whitespace() || matches!(c, '@' | '<' | '>')) {
                return Err(FrameworkError::configuration(format!(
                    "{} contains characters not allowed in an id: {}",
                    field, domain
                )));
            }
        }

        if self.default_charset.is_empty() || !self.default_charset.is_ascii() {
            return Err(FrameworkError::configuration("default_charset must be a non-empty ASCII label"));
        }

        Ok(())
    }
}

/// Builder for MIME configuration.
#[derive(Debug, Default)]
pub struct MimeConfigBuilder {
    config: MimeConfig,
}

impl MimeConfigBuilder {
    /// Sets the content-id domain.
    pub fn content_id_domain(mut self, domain: impl Into<String>) -> Self {
        self.config.content_id_domain = domain.into();
        self
    }

    /// Sets the message-id domain.
    pub fn message_id_domain(mut self, domain: impl Into<String>) -> Self {
        self.config.message_id_domain = domain.into();
        self
    }

    /// Sets the default charset.
    pub fn default_charset(mut self, charset: impl Into<String>) -> Self {
        self.config.default_charset = charset.into();
        self
    }

    /// Sets the text transfer encoding.
    pub fn text_encoding(mut self, encoding: TransferEncoding) -> Self {
        self.config.text_encoding = encoding;
        self
    }

    /// Builds the MIME configuration.
    pub fn build(self) -> FrameworkResult<MimeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// HTTP kernel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Debug mode: error messages are kept in default error responses.
    #[serde(default)]
    pub debug: bool,
    /// Whether `handle_main` routes failures through the exception listeners.
    #[serde(default = "default_true")]
    pub catch_exceptions: bool,
}

fn default_true() -> bool {
    true
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            debug: false,
            catch_exceptions: true,
        }
    }
}

/// Backend selection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Client libraries available to resolved backends.
    #[serde(default)]
    pub libraries: ClientLibraries,
    /// Default Redis port.
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,
    /// Default Memcached port.
    #[serde(default = "default_memcached_port")]
    pub memcached_port: u16,
    /// Default Zookeeper port.
    #[serde(default = "default_zookeeper_port")]
    pub zookeeper_port: u16,
    /// Connect timeout.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Read timeout (zero means none).
    #[serde(default = "default_read_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Default lock time-to-live.
    #[serde(default = "default_lock_ttl", with = "humantime_serde")]
    pub default_lock_ttl: Duration,
    /// Directory for flock-style lock files (system temp dir when unset).
    pub flock_directory: Option<PathBuf>,
}

fn default_redis_port() -> u16 { DEFAULT_REDIS_PORT }
fn default_memcached_port() -> u16 { DEFAULT_MEMCACHED_PORT }
fn default_zookeeper_port() -> u16 { DEFAULT_ZOOKEEPER_PORT }
fn default_connect_timeout() -> Duration { Duration::from_secs(30) }
fn default_read_timeout() -> Duration { Duration::ZERO }
fn default_lock_ttl() -> Duration { Duration::from_secs(300) }

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            libraries: ClientLibraries::default(),
            redis_port: default_redis_port(),
            memcached_port: default_memcached_port(),
            zookeeper_port: default_zookeeper_port(),
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            default_lock_ttl: default_lock_ttl(),
            flock_directory: None,
        }
    }
}

impl BackendConfig {
    /// Creates a new backend config builder.
    pub fn builder() -> BackendConfigBuilder {
        BackendConfigBuilder::default()
    }

    /// Validates the backend configuration.
    pub fn validate(&self) -> FrameworkResult<()> {
        if self.redis_port == 0 || self.memcached_port == 0 || self.zookeeper_port == 0 {
            return Err(FrameworkError::configuration("Default ports must be non-zero"));
        }

        if self.default_lock_ttl.is_zero() {
            return Err(FrameworkError::configuration("default_lock_ttl must be positive"));
        }

        Ok(())
    }

    /// Returns the directory holding flock-style lock files.
    pub fn flock_directory(&self) -> PathBuf {
        self.flock_directory
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Builder for backend configuration.
#[derive(Debug, Default)]
pub struct BackendConfigBuilder {
    config: BackendConfig,
}

impl BackendConfigBuilder {
    /// Sets the installed client libraries.
    pub fn libraries(mut self, libraries: ClientLibraries) -> Self {
        self.config.libraries = libraries;
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Sets the default lock TTL.
    pub fn default_lock_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_lock_ttl = ttl;
        self
    }

    /// Sets the flock directory.
    pub fn flock_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.flock_directory = Some(path.into());
        self
    }

    /// Builds the backend configuration.
    pub fn build(self) -> FrameworkResult<BackendConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameworkConfig {
    /// MIME composition.
    #[serde(default)]
    pub mime: MimeConfig,
    /// HTTP kernel.
    #[serde(default)]
    pub kernel: KernelConfig,
    /// Backend selection.
    #[serde(default)]
    pub backend: BackendConfig,
}

impl FrameworkConfig {
    /// Validates every section.
    pub fn validate(&self) -> FrameworkResult<()> {
        self.mime.validate()?;
        self.backend.validate()?;
        Ok(())
    }
}

// Humantime serde support
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
