use clap::Parser;
use flowvar::eval::HttpFetcher;
use flowvar::{EngineConfig, Error, ExecuteRequest, SetVariableExecutor};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Execute a set-variable block", long_about = None)]
struct Cli {
    /// Path to a JSON file holding `{ "block": ..., "session": ... }`
    #[arg(short, long)]
    request: PathBuf,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pretty-print the response
    #[arg(short, long)]
    pretty: bool,
}

/// Executes the request. Fetches issued by the script are awaited before
/// returning, so they complete even though the process exits right after.
async fn run(cli: &Cli) -> Result<String, Error> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    debug!("config: {:?}", config);

    let content = std::fs::read_to_string(&cli.request)
        .map_err(|e| Error::internal(format!("Failed to read request file: {}", e)))?;
    let request: ExecuteRequest = serde_json::from_str(&content)
        .map_err(|e| Error::internal(format!("Failed to parse request file: {}", e)))?;

    let fetcher = HttpFetcher::new(config.sandbox.fetch_timeout);
    let executor = SetVariableExecutor::new(&config)?.with_fetcher(Arc::new(fetcher.clone()));
    let response = executor.execute(&request.block, &request.session);
    fetcher.flush().await;
    let response = response?;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    };
    output.map_err(|e| Error::internal(format!("Failed to serialize response: {}", e)))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
