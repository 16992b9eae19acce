use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tradestream::credentials::CredentialStore;
use tradestream_models::run::{RunSnapshot, RunState};
use tradestream_models::trade_request::{ApiKeys, TradeRequest};

#[derive(Parser, Debug)]
#[command(name = "tradestream", about = "Stream a multi-agent trade analysis")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/tradestream.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one analysis and print its progress and final result
    Analyze {
        /// Ticker symbol to analyse
        ticker: String,

        /// Pretty-print the output JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Store API keys taken from the environment
    Login,
    /// Forget stored API keys
    Logout,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = tradestream::load_config(&cli.config)?;
    let store = CredentialStore::new(&config.credentials.path);

    match cli.command {
        Command::Analyze { ticker, pretty } => {
            let mut keys = ApiKeys::from_env();
            keys.merge(&store.load().context("Failed to load stored credentials")?);
            analyze(&config, TradeRequest::new(&ticker, keys), pretty).await
        }
        Command::Login => {
            let keys = ApiKeys::from_env();
            let missing = keys.missing_required();
            if !missing.is_empty() {
                bail!("Missing required keys: {}", missing.join(", "));
            }
            if !keys.has_llm_provider() {
                warn!("No LLM provider key set; the backend will refuse to analyse");
            }
            store.save(&keys).context("Failed to store credentials")?;
            println!("Stored {}", keys.names().join(", "));
            Ok(ExitCode::SUCCESS)
        }
        Command::Logout => {
            let removed = store.clear().context("Failed to clear credentials")?;
            println!(
                "{}",
                if removed {
                    "Credentials cleared."
                } else {
                    "No stored credentials."
                }
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn analyze(
    config: &tradestream::models::config::ClientConfig,
    request: TradeRequest,
    pretty: bool,
) -> Result<ExitCode> {
    let missing = request.api_keys.missing_required();
    if !missing.is_empty() {
        bail!(
            "Missing required keys: {} (set them in the environment or run `tradestream login`)",
            missing.join(", ")
        );
    }
    if !request.api_keys.has_llm_provider() {
        warn!("No LLM provider key set; the backend will refuse to analyse");
    }

    let controller =
        Arc::new(tradestream::build_controller(config).context("Failed to build controller")?);
    let printer = tokio::spawn(print_logs(controller.subscribe()));

    let run = controller.run(request);
    tokio::pin!(run);
    let snapshot = loop {
        tokio::select! {
            snapshot = &mut run => break snapshot,
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                controller.cancel();
            }
        }
    };
    if let Err(e) = printer.await {
        warn!(error = %e, "Log printer stopped early");
    }

    // Output result as JSON to stdout
    let output = if pretty {
        serde_json::to_string_pretty(&snapshot.result)?
    } else {
        serde_json::to_string(&snapshot.result)?
    };
    println!("{output}");

    Ok(match snapshot.state {
        RunState::Failed => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

/// Echo log lines to stderr as they are published, until the run ends.
async fn print_logs(mut rx: watch::Receiver<Arc<RunSnapshot>>) {
    let mut run_id = None;
    let mut printed = 0;
    loop {
        let snapshot = Arc::clone(&rx.borrow_and_update());
        if run_id != Some(snapshot.run_id) {
            run_id = Some(snapshot.run_id);
            printed = 0;
        }
        for entry in snapshot.logs.iter().skip(printed) {
            eprintln!("{entry}");
        }
        printed = printed.max(snapshot.logs.len());

        if snapshot.state.is_terminal() || rx.changed().await.is_err() {
            break;
        }
    }
}
