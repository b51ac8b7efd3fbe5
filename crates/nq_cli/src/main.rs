use clap::{Parser, Subcommand};
use nq_core::{ArticleStore, Error, Result, SystemClock};
use nq_storage::{create_store, loader, StoreConfig};
use nq_web::{create_app, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod logging;

const HEALTH_CHECK_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_value = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if c.is_whitespace() {
                continue;
            } else {
                let num: u64 = current_number
                    .parse()
                    .map_err(|_| format!("Missing number before unit: {}", c))?;
                total_seconds += match c {
                    's' => num,
                    'm' => num * 60,
                    'h' => num * 3600,
                    'd' => num * 86400,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                };
                current_number.clear();
                has_value = true;
            }
        }

        // A trailing bare number is seconds
        if !current_number.is_empty() {
            total_seconds += current_number
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            has_value = true;
        }

        if !has_value {
            return Err("Duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

async fn check_store_with_retry(store: &Arc<dyn ArticleStore>, max_retries: u32, timeout: Duration) -> Result<()> {
    let mut retries = 0;
    let mut last_error = None;

    while retries < max_retries {
        let outcome = match tokio::time::timeout(timeout, store.ping()).await {
            Ok(result) => result,
            Err(_) => Err(Error::StoreUnavailable(format!(
                "Store health check timed out after {}s",
                timeout.as_secs()
            ))),
        };

        match outcome {
            Ok(()) => {
                info!("🏦 Store ready (using {})", store.name());
                return Ok(());
            }
            Err(e) => {
                last_error = Some(e);
                retries += 1;
                if retries < max_retries {
                    warn!("Store health check failed, retrying {}/{}...", retries, max_retries);
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::StoreUnavailable("Store health check failed after all retries".to_string())))
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Read-only analytics API over a news article collection", long_about = None)]
pub struct Cli {
    /// Storage backend: mongodb or memory
    #[arg(long, env = "NQ_STORAGE", default_value = "mongodb", global = true)]
    storage: String,
    #[arg(long, env = "NQ_BACKEND_URL", default_value = nq_storage::DEFAULT_URL, global = true)]
    backend_url: String,
    #[arg(long, env = "NQ_DATABASE", default_value = nq_storage::DEFAULT_DATABASE, global = true)]
    database: String,
    #[arg(long, env = "NQ_COLLECTION", default_value = nq_storage::DEFAULT_COLLECTION, global = true)]
    collection: String,
    /// Connection and health check timeout (e.g. 30s, 1m, 1h15m)
    #[arg(long, env = "NQ_CONNECT_TIMEOUT", default_value = "10s", global = true)]
    connect_timeout: HumanDuration,
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn store_config(&self) -> StoreConfig {
        StoreConfig {
            url: self.backend_url.clone(),
            database: self.database.clone(),
            collection: self.collection.clone(),
            connect_timeout: self.connect_timeout.0,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1:5000")]
        bind: SocketAddr,
        /// JSON files to load before serving, handy with --storage memory
        #[arg(long, num_args = 1..)]
        preload: Vec<PathBuf>,
    },
    /// Insert articles from JSON or JSON-lines files
    Load {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}

async fn serve(store: Arc<dyn ArticleStore>, bind: SocketAddr) -> Result<()> {
    let app = create_app(AppState::new(store, Arc::new(SystemClock)));
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("🚀 Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();
    let cli = Cli::parse();
    let config = cli.store_config();

    info!("💾 Checking storage connection...");
    let store = create_store(&cli.storage, &config).await?;
    check_store_with_retry(&store, HEALTH_CHECK_ATTEMPTS, config.connect_timeout).await?;

    match cli.command {
        Commands::Serve { bind, preload } => {
            if !preload.is_empty() {
                let report = loader::load_files(store.as_ref(), &preload).await?;
                info!("📥 Preloaded {} articles from {} files", report.inserted(), report.files.len());
            }
            serve(store, bind).await?;
        }
        Commands::Load { files } => {
            let report = loader::load_files(store.as_ref(), &files).await?;
            for file in &report.files {
                println!("{}", file);
            }
            println!(
                "Inserted {} articles, skipped {} files",
                report.inserted(),
                report.skipped()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nq_storage::MemoryStorage;

    #[test]
    fn test_human_duration() {
        assert_eq!("30s".parse::<HumanDuration>().unwrap().0, Duration::from_secs(30));
        assert_eq!("1h15m".parse::<HumanDuration>().unwrap().0, Duration::from_secs(4500));
        assert_eq!("1m 30s".parse::<HumanDuration>().unwrap().0, Duration::from_secs(90));
        assert_eq!("45".parse::<HumanDuration>().unwrap().0, Duration::from_secs(45));
        assert!("".parse::<HumanDuration>().is_err());
        assert!("5x".parse::<HumanDuration>().is_err());
        assert!("m".parse::<HumanDuration>().is_err());
    }

    #[test]
    fn test_cli_parses_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "nq",
            "load",
            "a.json",
            "b.json",
            "--storage",
            "memory",
            "--connect-timeout",
            "1m",
        ])
        .unwrap();
        assert_eq!(cli.storage, "memory");
        assert_eq!(cli.store_config().connect_timeout, Duration::from_secs(60));
        match cli.command {
            Commands::Load { files } => assert_eq!(files.len(), 2),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_serve_defaults() {
        let cli = Cli::try_parse_from(["nq", "serve"]).unwrap();
        match cli.command {
            Commands::Serve { bind, preload } => {
                assert_eq!(bind, "127.0.0.1:5000".parse::<SocketAddr>().unwrap());
                assert!(preload.is_empty());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_check_store_with_retry() {
        let store: Arc<dyn ArticleStore> = Arc::new(MemoryStorage::new());
        check_store_with_retry(&store, 1, Duration::from_secs(1)).await.unwrap();
    }
}
