//! Configuration types for the HTTP service
//!
//! Every field carries a serde default, so an empty source set produces a
//! complete configuration. [`ServiceConfig::validate`] must pass before the
//! service starts.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::info;
use webhook_receiver_core::{
    wiring::FunctionEnvironment, DeploymentOutputs, SecretName, StandardSecrets, VerifierConfig,
};

/// System-wide configuration file
pub const SYSTEM_CONFIG_FILE: &str = "/etc/stripe-webhook-receiver/service.yaml";

/// Deployment-local configuration file
pub const LOCAL_CONFIG_FILE: &str = "config/service.yaml";

/// Environment variable naming an operator-supplied configuration file
pub const CONFIG_FILE_ENV_VAR: &str = "SWR_CONFIG_FILE";

/// Prefix for environment overrides (`SWR__SERVER__PORT=9090`)
pub const ENV_PREFIX: &str = "SWR";

/// Longest accepted signing-secret cache TTL
pub const MAX_CACHE_TTL_SECONDS: u64 = 24 * 60 * 60;

// ============================================================================
// Configuration types
// ============================================================================

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Signature verification settings
    pub verifier: VerifierSettings,

    /// Secret store settings
    pub secrets: SecretsConfig,

    /// Verified-event queue settings
    pub queue: QueueConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Values reported to operators
    pub deployment: DeploymentConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timeout_seconds: 30,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Signature verification settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VerifierSettings {
    /// Replay tolerance in seconds (0 disables the check)
    pub tolerance_seconds: u64,

    /// Budget for each secret lookup and each publish, in seconds
    pub dependency_timeout_seconds: u64,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            tolerance_seconds: 300,
            dependency_timeout_seconds: 30,
        }
    }
}

/// Where the signing secret comes from
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecretBackendConfig {
    /// Secret value held in configuration (development only)
    Literal { value: String },

    /// AWS Secrets Manager
    #[default]
    Aws,
}

impl fmt::Debug for SecretBackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal { .. } => f
                .debug_struct("Literal")
                .field("value", &"[REDACTED]")
                .finish(),
            Self::Aws => f.write_str("Aws"),
        }
    }
}

/// Secret store settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SecretsConfig {
    /// Backend holding the secrets
    pub backend: SecretBackendConfig,

    /// Name of the webhook signing secret
    pub signing_secret_name: String,

    /// Name of the Stripe API key secret
    pub api_key_secret_name: String,

    /// How long a fetched secret is reused, in seconds (0 disables caching)
    pub cache_ttl_seconds: u64,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            backend: SecretBackendConfig::default(),
            signing_secret_name: StandardSecrets::WEBHOOK_SIGNING_SECRET.to_string(),
            api_key_secret_name: StandardSecrets::API_KEY.to_string(),
            cache_ttl_seconds: 300,
        }
    }
}

/// Queue backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackendConfig {
    /// In-process queue (development only)
    Memory,

    /// AWS SQS
    #[default]
    Aws,
}

/// Verified-event queue settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct QueueConfig {
    /// Backend receiving verified events
    pub backend: QueueBackendConfig,

    /// Queue URL (taken from the function environment when unset)
    pub queue_url: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub filter: Option<String>,

    /// Enable JSON structured logging
    pub json_format: bool,
}

/// Operator-facing values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Public URL Stripe delivers to (defaults to the bind address)
    pub public_endpoint_url: Option<String>,
}

// ============================================================================
// Behaviour
// ============================================================================

impl ServiceConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(invalid("server.port must be greater than zero"));
        }

        if self.server.timeout_seconds == 0 {
            return Err(invalid("server.timeout_seconds must be greater than zero"));
        }

        if self.server.max_body_size == 0 {
            return Err(invalid("server.max_body_size must be greater than zero"));
        }

        if self.verifier.dependency_timeout_seconds == 0 {
            return Err(invalid(
                "verifier.dependency_timeout_seconds must be greater than zero",
            ));
        }

        if self.secrets.cache_ttl_seconds > MAX_CACHE_TTL_SECONDS {
            return Err(ConfigError::Invalid {
                message: format!(
                    "secrets.cache_ttl_seconds must not exceed {} (one day)",
                    MAX_CACHE_TTL_SECONDS
                ),
            });
        }

        for (key, name) in [
            ("secrets.signing_secret_name", &self.secrets.signing_secret_name),
            ("secrets.api_key_secret_name", &self.secrets.api_key_secret_name),
        ] {
            SecretName::new(name.as_str()).map_err(|e| ConfigError::Invalid {
                message: format!("{}: {}", key, e),
            })?;
        }

        if let SecretBackendConfig::Literal { value } = &self.secrets.backend {
            if value.is_empty() {
                return Err(invalid("secrets.backend.value must not be empty"));
            }
        }

        if let Some(queue_url) = &self.queue.queue_url {
            url::Url::parse(queue_url).map_err(|e| ConfigError::Invalid {
                message: format!("queue.queue_url: {}", e),
            })?;
        }

        if let Some(endpoint) = &self.deployment.public_endpoint_url {
            url::Url::parse(endpoint).map_err(|e| ConfigError::Invalid {
                message: format!("deployment.public_endpoint_url: {}", e),
            })?;
        }

        Ok(())
    }

    /// Whether the function environment must be present at startup
    pub fn requires_function_environment(&self) -> bool {
        self.secrets.backend == SecretBackendConfig::Aws
            || self.queue.backend == QueueBackendConfig::Aws
    }

    /// Take secret names and the queue URL from the function environment
    pub fn apply_function_environment(&mut self, env: &FunctionEnvironment) {
        self.secrets.signing_secret_name = env.signing_secret_name.to_string();
        self.secrets.api_key_secret_name = env.api_key_secret_name.to_string();
        self.queue.queue_url = Some(env.verified_queue_url.clone());
    }

    /// Settings handed to the verifier
    pub fn to_verifier_config(&self) -> Result<VerifierConfig, ConfigError> {
        let signing_secret_name =
            SecretName::new(self.secrets.signing_secret_name.as_str()).map_err(|e| {
                ConfigError::Invalid {
                    message: format!("secrets.signing_secret_name: {}", e),
                }
            })?;

        Ok(VerifierConfig {
            signing_secret_name,
            tolerance: Duration::from_secs(self.verifier.tolerance_seconds),
            dependency_timeout: Duration::from_secs(self.verifier.dependency_timeout_seconds),
        })
    }

    /// Copy safe to print: literal secret values are masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let SecretBackendConfig::Literal { value } = &mut copy.secrets.backend {
            *value = "[REDACTED]".to_string();
        }
        copy
    }

    /// Request timeout applied by the HTTP layer
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout_seconds)
    }

    /// Public endpoint URL, falling back to the bind address
    pub fn endpoint_url(&self) -> String {
        self.deployment
            .public_endpoint_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}/", self.server.host, self.server.port))
    }

    /// Outputs operators need, given the queue the service publishes to
    pub fn deployment_outputs(&self, queue_identifier: &str) -> DeploymentOutputs {
        DeploymentOutputs::new(self.endpoint_url(), queue_identifier)
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid {
        message: message.to_string(),
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Layered configuration loader
///
/// Sources are applied in order; later sources override earlier ones.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    files: Vec<(PathBuf, bool)>,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Loader with no sources (yields the defaults)
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard source chain
    ///
    /// 1. [`SYSTEM_CONFIG_FILE`] (optional)
    /// 2. [`LOCAL_CONFIG_FILE`] (optional)
    /// 3. `explicit_file`, or the file named by [`CONFIG_FILE_ENV_VAR`] (required)
    /// 4. `SWR__...` environment variables
    pub fn standard(explicit_file: Option<&Path>) -> Self {
        let mut loader = Self::new()
            .with_file(SYSTEM_CONFIG_FILE, false)
            .with_file(LOCAL_CONFIG_FILE, false);

        let explicit = explicit_file.map(Path::to_path_buf).or_else(|| {
            std::env::var(CONFIG_FILE_ENV_VAR)
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
        });

        if let Some(path) = explicit {
            info!(path = %path.display(), "Loading configuration from explicit path");
            loader = loader.with_file(path, true);
        }

        loader.with_env_prefix(ENV_PREFIX)
    }

    /// Add a file source
    pub fn with_file(mut self, path: impl Into<PathBuf>, required: bool) -> Self {
        self.files.push((path.into(), required));
        self
    }

    /// Add environment overrides with the given prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Build and deserialize the configuration
    ///
    /// Does not validate; call [`ServiceConfig::validate`] afterwards.
    pub fn load(&self) -> Result<ServiceConfig, ConfigError> {
        let mut builder = config::Config::builder();

        for (path, required) in &self.files {
            builder = builder.add_source(
                config::File::from(path.as_path())
                    .format(file_format(path))
                    .required(*required),
            );
        }

        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                config::Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}

fn file_format(path: &Path) -> config::FileFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => config::FileFormat::Toml,
        Some("json") => config::FileFormat::Json,
        _ => config::FileFormat::Yaml,
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
