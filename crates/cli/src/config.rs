//! Command-line arguments and resolution of [`ClientOptions`].
//!
//! Precedence, lowest first: built-in defaults, the TOML file named by
//! `--config`, then flags and `DSCTL_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use protocol::{ClientOptions, Endpoint, MinimumPrivilegeLevel, DEFAULT_PORT, DEFAULT_RETRIES};

#[derive(Debug, Parser)]
#[command(
    name = "dsctl",
    version,
    about = "Client for a dedicated server's HTTPS management API"
)]
pub struct Cli {
    /// Server host name or IP address.
    #[arg(long, env = "DSCTL_HOST")]
    pub host: String,

    /// Server API port.
    #[arg(long, env = "DSCTL_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Pre-issued bearer token (e.g. an API token).
    #[arg(long, env = "DSCTL_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// TOML file with client options.
    #[arg(long, env = "DSCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Do not validate the server certificate at all.
    #[arg(long, env = "DSCTL_SKIP_SSL_VERIFICATION")]
    pub skip_ssl_verification: bool,

    /// Per-call deadline in milliseconds.
    #[arg(long, env = "DSCTL_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Deadline of the first health-check attempt in milliseconds.
    #[arg(long, env = "DSCTL_HEALTH_CHECK_TIMEOUT_MS")]
    pub health_check_timeout_ms: Option<u64>,

    /// Directory holding pinned certificates.
    #[arg(long, env = "DSCTL_CERT_DIR")]
    pub cert_dir: Option<PathBuf>,

    /// Log output format (logs go to stderr).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch and pin the server certificate, then print its cache path.
    Trust,

    #[command(flatten)]
    Remote(RemoteCommand),
}

/// Commands that call the server through a pinned connection.
#[derive(Debug, Subcommand)]
pub enum RemoteCommand {
    /// Probe the server with HealthCheck, retrying with growing deadlines.
    Health {
        #[arg(long, default_value = "")]
        custom_data: String,
        #[arg(long, default_value_t = DEFAULT_RETRIES)]
        retries: u32,
    },

    /// Log in and print the issued token.
    Login {
        /// Password; omit for a passwordless login.
        #[arg(long, env = "DSCTL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[arg(long, default_value = "Administrator")]
        privilege: MinimumPrivilegeLevel,
    },

    /// Invoke any remote function.
    Call {
        /// Remote function name, e.g. QueryServerState.
        function: String,
        /// JSON payload sent as the envelope's `data`.
        #[arg(long)]
        data: Option<String>,
        /// Write the result to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    pub fn endpoint(&self) -> Result<Endpoint> {
        Ok(Endpoint::new(self.host.clone(), self.port)?)
    }

    /// Merges the config file (if any) with command-line overrides.
    pub fn options(&self) -> Result<ClientOptions> {
        let mut options = match &self.config {
            Some(path) => load_options(path)?,
            None => ClientOptions::default(),
        };
        if self.skip_ssl_verification {
            options.skip_ssl_verification = true;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            options.timeout_ms = timeout_ms;
        }
        if let Some(health_check_timeout_ms) = self.health_check_timeout_ms {
            options.health_check_timeout_ms = health_check_timeout_ms;
        }
        if let Some(cert_dir) = &self.cert_dir {
            options.cert_dir = cert_dir.clone();
        }
        Ok(options)
    }
}

/// Reads [`ClientOptions`] from a TOML file.
pub fn load_options(path: &Path) -> Result<ClientOptions> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config file {}", path.display()))
}
