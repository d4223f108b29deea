//! Synapse
//!
//! Command-line entry point and HTTP server for the cognitive cycle engine.
//! `synapse run` executes one run in the terminal; `synapse serve` exposes
//! runs, status and a live event stream over HTTP.

mod api;

use clap::{Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use synapse_core::config::SynapseConfig;
use synapse_core::cycle::{CycleEvent, Orchestrator, RunResult};
use synapse_core::gateway::{Generator, LlmGateway};
use synapse_core::memory::{SqliteThoughtIndex, ThoughtIndex};
use tokio::{net::TcpListener, sync::mpsc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::AppState;

#[derive(Parser, Clone)]
#[command(author, version, about = "Synapse - Global Workspace attention engine")]
struct Args {
    /// Config file (defaults to .synapse/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the Synapse server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Mirror embedded thoughts into .synapse/thoughts.db
        #[arg(long)]
        index: bool,
    },
    /// Run the cognitive loop on a prompt (CLI mode, no server)
    Run {
        /// The problem to think about
        prompt: String,
        /// Override the number of cycles
        #[arg(short, long)]
        cycles: Option<u32>,
        /// Print the whole run result as JSON
        #[arg(long)]
        json: bool,
        /// Mirror embedded thoughts into .synapse/thoughts.db
        #[arg(long)]
        index: bool,
    },
    /// Print the effective configuration
    Config,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Open the on-disk thought index when requested
fn open_index(enabled: bool) -> anyhow::Result<Option<Arc<dyn ThoughtIndex>>> {
    if !enabled {
        return Ok(None);
    }
    let index = SqliteThoughtIndex::open()?;
    Ok(Some(Arc::new(index)))
}

async fn run_once(
    config: SynapseConfig,
    prompt: &str,
    index: Option<Arc<dyn ThoughtIndex>>,
) -> anyhow::Result<RunResult> {
    let generator: Arc<dyn Generator> = Arc::new(LlmGateway::new(config.gateway.clone())?);
    let (event_tx, mut event_rx) = mpsc::channel::<CycleEvent>(100);

    // Progress goes to the log; stdout is reserved for the result
    let progress = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            tracing::info!(
                kind = ?event.kind,
                agent = %event.agent,
                cycle = ?event.cycle,
                "event"
            );
        }
    });

    let mut orchestrator = Orchestrator::new(config.orchestrator, config.workspace, generator)
        .with_event_channel(event_tx);
    if let Some(index) = index {
        orchestrator = orchestrator.with_thought_index(index);
    }

    let result = orchestrator.run(prompt).await;
    drop(orchestrator);
    let _ = progress.await;
    Ok(result?)
}

fn print_summary(result: &RunResult) {
    if result.final_broadcast.is_empty() {
        println!("(no broadcast was produced)");
    } else {
        println!("{}", result.final_broadcast);
    }
    println!();
    println!(
        "cycles: {}  broadcasts: {}  thoughts: {}  agents: {}  failed turns: {}",
        result.cycles_executed,
        result.broadcasts.len(),
        result.thoughts.len(),
        result.stats.total_agents,
        result.stats.agent_failures
    );
}

async fn serve(
    config: SynapseConfig,
    port: u16,
    index: Option<Arc<dyn ThoughtIndex>>,
) -> anyhow::Result<()> {
    let generator: Arc<dyn Generator> = Arc::new(LlmGateway::new(config.gateway.clone())?);
    let state = Arc::new(AppState::new(config, generator, index));
    let app = api::router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("Synapse server running at http://{}", addr);
    tracing::info!("   Runs:    POST /api/v1/runs, GET /api/v1/runs/latest");
    tracing::info!("   Status:  GET /api/v1/status");
    tracing::info!("   Events:  GET /api/v1/events (SSE)");
    tracing::info!("   OpenAPI: GET /api/v1/openapi.json");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Keys may live next to the config
    dotenvy::from_path(".synapse/.env").ok();
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(SynapseConfig::default_path);
    let mut config = SynapseConfig::resolve(&config_path).await?;

    match args.command {
        Some(CliCommand::Run {
            prompt,
            cycles,
            json,
            index,
        }) => {
            if let Some(cycles) = cycles {
                config.orchestrator.max_cycles = cycles;
            }
            tracing::info!(
                provider = config.gateway.model.provider.display_name(),
                model = %config.gateway.model.model,
                cycles = config.orchestrator.max_cycles,
                "Starting run"
            );

            let result = run_once(config, &prompt, open_index(index)?).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_summary(&result);
            }
            Ok(())
        }
        Some(CliCommand::Config) => {
            println!("# {}", config_path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Some(CliCommand::Serve { port, index }) => serve(config, port, open_index(index)?).await,
        None => serve(config, 8080, None).await,
    }
}
