//! `dsctl` entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: flags, `DSCTL_*` variables, and an optional
//!    TOML file (see [`config`]).
//! 2. **Wire observability**: `tracing-subscriber` plus an optional OTLP
//!    exporter (see [`telemetry`]).
//! 3. **Construct infrastructure**: establish trust for the endpoint and build
//!    a [`protocol::ServerClient`] over `transport`'s invoker. A `--token` is
//!    verified with the server before any command runs.
//! 4. **Dispatch the command** and print the result as JSON on stdout.
//!
//! Failures print the `{code, message}` failure as JSON on stderr and exit
//! with status 1.

mod config;
mod telemetry;

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use protocol::{ApiError, BearerToken, ClientOptions, Endpoint, RpcOutcome, ServerClient};
use serde_json::{json, Value};
use transport::TrustStore;

use crate::config::{Cli, Command, RemoteCommand};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _telemetry = match telemetry::init(cli.log_format) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let endpoint = cli.endpoint()?;
    let options = cli.options()?;

    match cli.command {
        Command::Trust => trust(&endpoint, &options).await,
        Command::Remote(command) => {
            let mut client = transport::connect(&endpoint, options).await?;
            if let Some(token) = cli.token.as_deref().and_then(BearerToken::new) {
                client = client.with_verified_token(token).await?;
            }
            dispatch(&client, command).await
        }
    }
}

async fn trust(endpoint: &Endpoint, options: &ClientOptions) -> Result<ExitCode> {
    let tls = TrustStore::from_options(options)
        .establish(endpoint, options.skip_ssl_verification)
        .await?;
    print_json(&json!({
        "endpoint": endpoint.to_string(),
        "certificate": tls.anchor().cache_file().display().to_string(),
    }))?;
    Ok(ExitCode::SUCCESS)
}

async fn dispatch(client: &ServerClient, command: RemoteCommand) -> Result<ExitCode> {
    match command {
        RemoteCommand::Health {
            custom_data,
            retries,
        } => {
            let report = client.health_check(&custom_data, retries).await;
            print_json(&json!({
                "success": report.success,
                "data": report.data.as_ref().map(outcome_to_json),
                "message": report.message,
            }))?;
            Ok(if report.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        RemoteCommand::Login {
            password,
            privilege,
        } => {
            match password {
                Some(password) => client.password_login(privilege, &password).await?,
                None => client.passwordless_login(privilege).await?,
            }
            print_token(client)?;
            Ok(ExitCode::SUCCESS)
        }
        RemoteCommand::Call {
            function,
            data,
            output,
        } => {
            let payload = data
                .map(|raw| serde_json::from_str::<Value>(&raw))
                .transpose()
                .context("--data must be valid JSON")?;
            let outcome = client.invoke(&function, payload).await?;
            match output {
                Some(path) => write_outcome(&path, &outcome)?,
                None => print_outcome(&outcome)?,
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_token(client: &ServerClient) -> Result<()> {
    let token = client.session().current();
    print_json(&json!({
        "authenticationToken": token.as_ref().map(BearerToken::expose),
    }))
}

fn outcome_to_json(outcome: &RpcOutcome) -> Value {
    match outcome {
        RpcOutcome::Json(value) => value.clone(),
        RpcOutcome::Text(text) => Value::String(text.clone()),
        RpcOutcome::Binary(bytes) => json!({ "binaryLength": bytes.len() }),
    }
}

fn print_outcome(outcome: &RpcOutcome) -> Result<()> {
    match outcome {
        RpcOutcome::Binary(bytes) => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
            Ok(())
        }
        other => print_json(&outcome_to_json(other)),
    }
}

fn write_outcome(path: &Path, outcome: &RpcOutcome) -> Result<()> {
    let bytes = match outcome {
        RpcOutcome::Binary(bytes) => bytes.clone(),
        RpcOutcome::Text(text) => text.clone().into_bytes(),
        RpcOutcome::Json(value) => serde_json::to_vec_pretty(value)?,
    };
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), "result written");
    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<ApiError>() {
        Some(api_error) => match serde_json::to_string_pretty(&api_error.to_failure()) {
            Ok(text) => eprintln!("{text}"),
            Err(_) => eprintln!("{api_error}"),
        },
        None => eprintln!("error: {err:#}"),
    }
}
