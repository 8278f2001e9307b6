use std::env;
use std::io;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::error::{ContextKind, ErrorKind};
use clap::{CommandFactory, Parser, Subcommand};
use denden::dispatch::Dispatcher;
use denden::render::{render_failure, render_health, render_response};
use denden_core::config::{resolve_config, ClientConfig, ConfigInputs};
use denden_core::envelope::{
    build_envelope, decode_raw, AmbientContext, SystemClock, UuidSource,
};
use denden_core::outcome::{Exit, Outcome};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const ENV_HELP: &str = "\
Environment:
  DENDEN_ADDR              server address (default: 127.0.0.1:9700)
  DENDEN_AGENT_ID          this agent's instance ID (auto-set by orchestrator)
  DENDEN_PARENT_AGENT_ID   parent agent's instance ID
  DENDEN_WORKTREE_ID       worktree ID
  DENDEN_TIMEOUT           request timeout e.g. \"30s\" (default: 30s)
  DENDEN_LOG               log filter (default: warn)";

#[derive(Parser, Debug)]
#[command(
    name = "denden",
    version,
    about = "Send requests to a DenDen agent orchestrator",
    after_help = ENV_HELP
)]
struct Cli {
    #[arg(long, global = true, env = "DENDEN_ADDR", value_name = "HOST:PORT")]
    addr: Option<String>,

    #[arg(long, global = true, env = "DENDEN_TIMEOUT", value_name = "DURATION")]
    timeout: Option<String>,

    #[arg(long, global = true, env = "DENDEN_LOG", value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a request (auto-fills request ID, version, trace and timestamp)
    Send {
        /// Request JSON, e.g. '{"askUser":{"question":"what color?"}}'
        #[arg(value_name = "JSON")]
        json: String,
    },
    /// Check orchestrator health
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return usage_error(&err),
    };

    let Some(command) = cli.command else {
        eprintln!("{}", Cli::command().render_help());
        return ExitCode::FAILURE;
    };

    if let Err(err) = init_logging(cli.log_level.as_deref()) {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "denden starting");

    let config = resolve(cli.addr, cli.timeout);
    let exit = match command {
        Command::Send { json } => send(&config, &json).await,
        Command::Status => status(&config).await,
    };
    exit.into()
}

fn usage_error(err: &clap::Error) -> ExitCode {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = err.print();
            ExitCode::SUCCESS
        }
        ErrorKind::InvalidSubcommand => {
            let name = err
                .get(ContextKind::InvalidSubcommand)
                .map(ToString::to_string)
                .unwrap_or_default();
            eprintln!("unknown command: {name}");
            eprintln!("{}", Cli::command().render_help());
            ExitCode::FAILURE
        }
        _ => {
            eprint!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn resolve(addr: Option<String>, timeout: Option<String>) -> ClientConfig {
    let mut inputs = ConfigInputs::from_lookup(|key| env::var(key).ok());
    inputs.addr = addr.or(inputs.addr);
    inputs.timeout = timeout.or(inputs.timeout);

    let config = resolve_config(inputs);
    if let Some(raw) = &config.ignored_timeout {
        tracing::debug!(
            value = %raw,
            fallback = ?config.timeout,
            "ignoring unparsable timeout"
        );
    }
    config
}

fn init_logging(log_level: Option<&str>) -> anyhow::Result<()> {
    let level = log_level
        .map(str::to_owned)
        .or_else(|| env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "warn".to_owned());

    let filter = EnvFilter::try_new(level).context("parse log level")?;
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .init();
    Ok(())
}

async fn send(config: &ClientConfig, json: &str) -> Exit {
    let raw = match decode_raw(json) {
        Ok(raw) => raw,
        Err(err) => {
            eprintln!("{err}");
            return Exit::Failure;
        }
    };

    let ctx = AmbientContext {
        ids: &config.ambient,
        clock: &SystemClock,
        id_source: &UuidSource,
    };
    let envelope = match build_envelope(raw, &ctx) {
        Ok(envelope) => envelope,
        Err(err) => {
            eprintln!("error: {err}");
            return Exit::Failure;
        }
    };
    tracing::debug!(
        request_id = %envelope.request_id,
        payload = envelope.payload.kind(),
        addr = %config.addr,
        "sending request"
    );

    let mut dispatcher = Dispatcher::tcp(config.addr.as_str(), config.timeout);
    let outcome = dispatcher.send(&envelope).await;
    let exit = outcome.exit();
    match outcome {
        Outcome::Delivered(resp) => match render_response(&resp) {
            Ok(out) => {
                println!("{out}");
                exit
            }
            Err(err) => {
                eprintln!("error marshaling response: {err}");
                Exit::Failure
            }
        },
        Outcome::TransportFailure(err) => {
            eprintln!("{}", render_failure(&err));
            Exit::Failure
        }
    }
}

async fn status(config: &ClientConfig) -> Exit {
    let mut dispatcher = Dispatcher::tcp(config.addr.as_str(), config.timeout);
    let outcome = dispatcher.health().await;
    let exit = outcome.transport_exit();
    match outcome {
        Outcome::Delivered(health) => match render_health(&health) {
            Ok(out) => {
                println!("{out}");
                exit
            }
            Err(err) => {
                eprintln!("error marshaling status: {err}");
                Exit::Failure
            }
        },
        Outcome::TransportFailure(err) => {
            eprintln!("{}", render_failure(&err));
            Exit::Failure
        }
    }
}
