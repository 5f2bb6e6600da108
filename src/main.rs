use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use credkeeper::api::create_router;
use credkeeper::config::AppConfig;
use credkeeper::functions::{Function, Functions, Invocation};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "credkeeper", version, about = "Keeps BASE and Instagram credentials fresh")]
struct Cli {
    /// TOML config file; CREDKEEPER_* environment variables are used when absent
    #[arg(long, env = "CREDKEEPER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve every function over HTTP
    Serve,
    /// Run one function once and print its response body
    Invoke {
        #[arg(value_enum)]
        function: FunctionArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FunctionArg {
    ReadTokens,
    RefreshBaseToken,
    RefreshInstagramToken,
    FetchBaseItems,
}

impl From<FunctionArg> for Function {
    fn from(arg: FunctionArg) -> Self {
        match arg {
            FunctionArg::ReadTokens => Function::ReadTokens,
            FunctionArg::RefreshBaseToken => Function::RefreshBaseToken,
            FunctionArg::RefreshInstagramToken => Function::RefreshInstagramToken,
            FunctionArg::FetchBaseItems => Function::FetchBaseItems,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_file(path)?,
        None => AppConfig::from_env().context("Failed to load configuration from environment")?,
    };

    credkeeper::telemetry::init(&config.log_level);

    info!(
        store_backend = ?config.store.backend,
        bucket = %config.store.bucket,
        object = %config.store.object,
        code_source = ?config.authorization.source,
        "Configuration loaded"
    );

    let listen_addr = config.server.listen_addr.clone();
    let functions = Functions::from_config(config).context("Failed to initialize functions")?;

    match cli.command {
        Command::Serve => serve(functions, &listen_addr).await,
        Command::Invoke { function } => invoke(&functions, function.into()).await,
    }
}

async fn serve(functions: Functions, listen_addr: &str) -> Result<()> {
    let app = create_router(functions);
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", listen_addr))?;
    info!(listen_addr = %listen_addr, "credkeeper gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("credkeeper gateway stopped");
    Ok(())
}

async fn invoke(functions: &Functions, function: Function) -> Result<()> {
    let invocation = Invocation::new(function);
    let body = functions
        .invoke(&invocation)
        .await
        .with_context(|| format!("{} failed (invocation {})", function, invocation.id()))?;

    if let Some(body) = body {
        println!("{}", serde_json::to_string_pretty(&body)?);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
}
