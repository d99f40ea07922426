//! restoc-call - perform one service call from the command line.
//!
//! Every service named in the config is registered as remote; the resulting
//! envelope is printed to stdout as JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use restoc_core::errors::codes;
use restoc_core::{Action, Credential, Envelope, SessionId, UnknownAction};
use restoc_services::{Binding, Request, RouterConfig, ServiceRouter};
use serde_json::Value;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Call a service through the router.
#[derive(Parser, Debug)]
#[command(name = "restoc-call")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the router configuration (JSON)
    #[arg(short, long, env = "RESTOC_CONFIG")]
    config: PathBuf,

    /// Service name
    service: String,

    /// One of create, read, update, delete
    action: String,

    /// Noun path, e.g. /user/permission
    path: String,

    /// JSON payload
    #[arg(short, long, default_value = "{}")]
    data: String,

    /// Session id sent as the Authorization header
    #[arg(long, env = "RESTOC_SESSION")]
    session: Option<String>,

    /// Attach an internal key to the payload
    #[arg(long)]
    internal: bool,

    /// Log each call and its outcome
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "restoc_services=info,restoc_core=info,restoc_call=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<Envelope> {
    let mut config = RouterConfig::from_file(&cli.config)?;
    config.verbose |= cli.verbose;

    let payload: Value = serde_json::from_str(&cli.data).context("--data is not valid JSON")?;

    let bindings: Vec<_> = config
        .services
        .keys()
        .map(|name| (name.clone(), Binding::Remote))
        .collect();
    let router = ServiceRouter::register(bindings, &config).await?;

    let action = match cli.action.parse::<Action>() {
        Ok(action) => action,
        Err(UnknownAction(token)) => {
            return Ok(Envelope::fail((codes::SERVICE_ACTION, token)));
        }
    };

    let mut request = Request::new(cli.service, action, cli.path, payload);
    if let Some(session) = cli.session {
        let credential: Arc<dyn Credential> = Arc::new(SessionId::new(session));
        request = request.with_credential(credential);
    }
    if cli.internal {
        request = request.internal();
    }

    Ok(router.call(request).await?)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(envelope) => {
            println!("{envelope}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "call failed");
            ExitCode::FAILURE
        }
    }
}
