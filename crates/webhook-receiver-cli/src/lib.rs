//! # Stripe Webhook Receiver CLI
//!
//! Operator and developer tooling for the webhook receiver.
//!
//! This module provides CLI commands for:
//! - Signing a payload the way Stripe does, for local testing
//! - Verifying a captured delivery offline
//! - Printing the deployment outputs
//! - Validating and showing the resolved configuration

use clap::{CommandFactory, Parser, Subcommand};
use serde::Serialize;
use std::{
    io::{self, Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use webhook_receiver_api::{
    config::QueueBackendConfig, ConfigError, ConfigLoader, ServiceConfig,
};
use webhook_receiver_core::{
    adapters::memory_queue::DEFAULT_MEMORY_QUEUE,
    signature::{sign_payload, SignatureError, SignatureHeader, SignatureVerifier},
    FunctionEnvironment, RejectReason, SecretValue, Timestamp, VerifiedEvent,
};

// ============================================================================
// CLI Structure
// ============================================================================

/// Stripe webhook receiver tooling
#[derive(Parser)]
#[command(name = "stripe-webhook-receiver")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tools for the Stripe webhook receiver")]
#[command(
    long_about = "Sign and verify Stripe webhook payloads offline, and inspect the receiver's configuration and deployment outputs"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SWR_CONFIG_FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (logs go to stderr)
    #[arg(short, long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Produce a Stripe-Signature header for a payload
    Sign {
        /// Webhook signing secret
        #[arg(short, long, env = "STRIPE_WEBHOOK_SECRET", hide_env_values = true)]
        secret: String,

        /// File holding the payload ("-" reads stdin)
        #[arg(short, long)]
        payload: PathBuf,

        /// Signing time in seconds since the epoch (defaults to now)
        #[arg(short, long)]
        timestamp: Option<i64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Verify a payload against a Stripe-Signature header
    Verify {
        /// Webhook signing secret
        #[arg(short, long, env = "STRIPE_WEBHOOK_SECRET", hide_env_values = true)]
        secret: String,

        /// File holding the payload ("-" reads stdin)
        #[arg(short, long)]
        payload: PathBuf,

        /// Value of the Stripe-Signature header
        #[arg(long)]
        header: String,

        /// Replay tolerance in seconds (0 disables the check)
        #[arg(long, default_value = "300")]
        tolerance: u64,

        /// Reference time in seconds since the epoch (defaults to now)
        #[arg(long)]
        now: Option<i64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the deployment outputs
    Outputs {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate configuration
    Config {
        /// Show resolved configuration (secrets masked)
        #[arg(short, long)]
        show: bool,

        /// Output format for configuration
        #[arg(short = 'f', long, default_value = "yaml")]
        format: ConfigFormat,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// Configuration format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
    /// TOML format
    Toml,
}

// ============================================================================
// Error Types
// ============================================================================

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Verification failed ({reason}): {message}")]
    Verification {
        reason: RejectReason,
        message: String,
    },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to render output: {message}")]
    Output { message: String },
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Verification { .. } => 2,
            Self::InvalidArgument { .. } => 4,
            Self::Io(_) => 5,
            Self::Output { .. } => 6,
        }
    }
}

fn output_error(e: impl std::fmt::Display) -> CliError {
    CliError::Output {
        message: e.to_string(),
    }
}

// ============================================================================
// Output Types
// ============================================================================

#[derive(Debug, Serialize)]
struct SignOutput {
    timestamp: i64,
    header: String,
}

#[derive(Debug, Serialize)]
struct VerifyOutput<'a> {
    valid: bool,
    event_id: &'a str,
    event_type: &'a str,
    signed_at: i64,
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(cli, &mut out)
}

/// Execute a parsed command, writing results to `out`
pub fn run<W: Write>(cli: Cli, out: &mut W) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Sign {
            secret,
            payload,
            timestamp,
            format,
        } => execute_sign_command(&secret, &payload, timestamp, format, out),
        Commands::Verify {
            secret,
            payload,
            header,
            tolerance,
            now,
            format,
        } => execute_verify_command(
            &secret,
            &payload,
            &header,
            Duration::from_secs(tolerance),
            now,
            format,
            out,
        ),
        Commands::Outputs { format } => execute_outputs_command(config_path, format, out),
        Commands::Config { show, format } => {
            execute_config_command(config_path, show, format, out)
        }
        Commands::Completions { shell } => execute_completions_command(shell, out),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Initialize logging based on CLI arguments
///
/// Logs go to stderr so command output on stdout stays machine-readable.
fn initialize_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    // A second initialisation (e.g. from tests) keeps the first subscriber
    let _ = if cli.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Read a payload from a file, or stdin when the path is "-"
fn read_payload(path: &Path) -> Result<Vec<u8>, CliError> {
    let mut payload = Vec::new();
    if path == Path::new("-") {
        io::stdin().read_to_end(&mut payload)?;
    } else {
        payload = std::fs::read(path)?;
    }
    debug!(bytes = payload.len(), "Read payload");
    Ok(payload)
}

fn signing_secret(secret: &str) -> Result<SecretValue, CliError> {
    if secret.is_empty() {
        return Err(CliError::InvalidArgument {
            arg: "secret".to_string(),
            message: "must not be empty".to_string(),
        });
    }
    Ok(SecretValue::from_string(secret.to_string()))
}

fn signature_failure(e: SignatureError) -> CliError {
    CliError::Verification {
        reason: RejectReason::from(&e),
        message: e.to_string(),
    }
}

/// Execute sign command
fn execute_sign_command<W: Write>(
    secret: &str,
    payload_path: &Path,
    timestamp: Option<i64>,
    format: OutputFormat,
    out: &mut W,
) -> Result<(), CliError> {
    let secret = signing_secret(secret)?;
    let payload = read_payload(payload_path)?;
    let timestamp = timestamp.unwrap_or_else(|| Timestamp::now().unix_seconds());

    let header = sign_payload(secret.expose_bytes(), timestamp, &payload).map_err(|e| {
        CliError::InvalidArgument {
            arg: "secret".to_string(),
            message: e.to_string(),
        }
    })?;

    info!(timestamp = timestamp, "Signed payload");

    match format {
        OutputFormat::Text => writeln!(out, "{}", header)?,
        OutputFormat::Json => {
            let rendered = serde_json::to_string_pretty(&SignOutput {
                timestamp,
                header: header.to_string(),
            })
            .map_err(output_error)?;
            writeln!(out, "{}", rendered)?;
        }
    }

    Ok(())
}

/// Execute verify command
///
/// Applies the same checks, in the same order, as the receiver.
fn execute_verify_command<W: Write>(
    secret: &str,
    payload_path: &Path,
    header: &str,
    tolerance: Duration,
    now: Option<i64>,
    format: OutputFormat,
    out: &mut W,
) -> Result<(), CliError> {
    let secret = signing_secret(secret)?;
    let payload = read_payload(payload_path)?;

    let now = match now {
        Some(seconds) => {
            Timestamp::from_unix_seconds(seconds).ok_or_else(|| CliError::InvalidArgument {
                arg: "now".to_string(),
                message: format!("{} is not a representable time", seconds),
            })?
        }
        None => Timestamp::now(),
    };

    let header = SignatureHeader::parse(header).map_err(signature_failure)?;
    let verifier = SignatureVerifier::new(tolerance);

    verifier
        .verify_signature(&header, &payload, &secret)
        .map_err(signature_failure)?;
    verifier
        .check_timestamp(&header, now)
        .map_err(signature_failure)?;

    let signed_at = Timestamp::from_unix_seconds(header.timestamp()).unwrap_or(now);
    let event =
        VerifiedEvent::from_body(&payload, signed_at).map_err(|e| CliError::Verification {
            reason: RejectReason::MalformedPayload,
            message: e.to_string(),
        })?;

    info!(event_id = %event.id, event_type = %event.event_type, "Payload verified");

    match format {
        OutputFormat::Text => writeln!(
            out,
            "Signature valid: {} ({})",
            event.id, event.event_type
        )?,
        OutputFormat::Json => {
            let rendered = serde_json::to_string_pretty(&VerifyOutput {
                valid: true,
                event_id: &event.id,
                event_type: &event.event_type,
                signed_at: header.timestamp(),
            })
            .map_err(output_error)?;
            writeln!(out, "{}", rendered)?;
        }
    }

    Ok(())
}

/// Load and validate configuration from the standard chain
fn load_configuration(config_path: Option<&Path>) -> Result<ServiceConfig, CliError> {
    let config = ConfigLoader::standard(config_path).load()?;
    config.validate()?;
    Ok(config)
}

/// Execute outputs command
///
/// The queue URL comes from the function environment when it is present,
/// otherwise from configuration.
fn execute_outputs_command<W: Write>(
    config_path: Option<&Path>,
    format: OutputFormat,
    out: &mut W,
) -> Result<(), CliError> {
    let mut config = load_configuration(config_path)?;

    match FunctionEnvironment::from_env() {
        Ok(env) => config.apply_function_environment(&env),
        Err(e) => debug!(error = %e, "Function environment not available"),
    }

    let queue_identifier = match (&config.queue.queue_url, config.queue.backend) {
        (Some(url), _) => url.clone(),
        (None, QueueBackendConfig::Memory) => DEFAULT_MEMORY_QUEUE.to_string(),
        (None, QueueBackendConfig::Aws) => {
            return Err(ConfigError::Missing {
                key: "queue.queue_url".to_string(),
            }
            .into())
        }
    };

    let outputs = config.deployment_outputs(&queue_identifier);

    match format {
        OutputFormat::Text => {
            for (name, value) in outputs.as_pairs() {
                writeln!(out, "{} = {}", name, value)?;
            }
        }
        OutputFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = outputs
                .as_pairs()
                .iter()
                .map(|(name, value)| (name.to_string(), serde_json::Value::from(*value)))
                .collect();
            let rendered = serde_json::to_string_pretty(&map).map_err(output_error)?;
            writeln!(out, "{}", rendered)?;
        }
    }

    Ok(())
}

/// Execute config command
fn execute_config_command<W: Write>(
    config_path: Option<&Path>,
    show: bool,
    format: ConfigFormat,
    out: &mut W,
) -> Result<(), CliError> {
    let config = load_configuration(config_path)?;

    if !show {
        writeln!(out, "Configuration is valid")?;
        return Ok(());
    }

    let redacted = config.redacted();
    let rendered = match format {
        ConfigFormat::Yaml => serde_yaml::to_string(&redacted).map_err(output_error)?,
        ConfigFormat::Json => serde_json::to_string_pretty(&redacted).map_err(output_error)?,
        ConfigFormat::Toml => toml::to_string_pretty(&redacted).map_err(output_error)?,
    };

    write!(out, "{}", rendered)?;
    if !rendered.ends_with('\n') {
        writeln!(out)?;
    }
    Ok(())
}

/// Execute completions command
fn execute_completions_command<W: Write>(
    shell: clap_complete::Shell,
    out: &mut W,
) -> Result<(), CliError> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(shell, &mut command, name, out);
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
