use anyhow::Result;
use axum::Router;
use clap::Parser;
use sitesearch_core::persist::{index_file, DEFAULT_FILE_NAME};
use sitesearch_server::{build_app, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use tokio::net::TcpListener;

#[derive(Parser)]
struct Args {
    /// Index file (or a directory holding the default file name)
    #[arg(long, default_value = DEFAULT_FILE_NAME)]
    index: PathBuf,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Stop scoring a query after this many milliseconds and return what was ranked so far
    #[arg(long, env = "QUERY_DEADLINE_MS")]
    deadline_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = ServerConfig {
        query_deadline: args.deadline_ms.map(Duration::from_millis),
        ..ServerConfig::from_env()
    };
    let app: Router = build_app(index_file(&args.index), config)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
