use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nodeflow::{
    clients::{LogMailer, ReqwestHttpClient},
    config::Config,
    server::Server,
    store::create_store,
    workflow::{Graph, StepExecutor, WorkflowEngine, WorkflowRunner},
};

#[derive(Debug, Parser)]
#[command(name = "nodeflow", version, about = "Workflow graph execution engine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Execute a graph file (JSON or YAML) and print the trace
    Run { file: PathBuf },
    /// Check a graph file for structural problems
    Validate { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Run { file } => {
            let graph = load_graph(&file)?;
            let trace = build_engine(&config)?.execute(&graph).await;
            println!("{}", serde_json::to_string_pretty(&trace)?);
            if !trace.success {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Validate { file } => {
            let graph = load_graph(&file)?;
            match graph.validate() {
                Ok(()) => {
                    println!("{}: ok", file.display());
                    Ok(())
                }
                Err(errors) => {
                    for err in &errors {
                        eprintln!("{}: {}", file.display(), err);
                    }
                    std::process::exit(1);
                }
            }
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!("Loaded configuration: {:?}", config);

    let store = create_store(&config.database).await?;
    store.init().await?;

    let runner = Arc::new(WorkflowRunner::new(store.clone(), build_engine(&config)?));
    let server = Server::new(store, runner);

    info!("Starting server on {}", config.server.addr);
    server.start(&config.server.addr).await?;
    Ok(())
}

fn build_engine(config: &Config) -> anyhow::Result<Arc<WorkflowEngine>> {
    let http = ReqwestHttpClient::new(config.execution.http_timeout(), &config.execution.user_agent)?;
    let mailer = LogMailer::new(config.mail.from.clone());
    let executor = StepExecutor::new(Arc::new(http), Arc::new(mailer))
        .with_default_timeout(config.execution.http_timeout());
    Ok(Arc::new(WorkflowEngine::new(Arc::new(executor))))
}

fn load_graph(path: &Path) -> anyhow::Result<Graph> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let graph = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&raw)?,
        _ => serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?,
    };
    Ok(graph)
}
