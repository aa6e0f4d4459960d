mod config;
mod pages;
mod routes;
mod sanitize;
mod storage;
mod upload;

use clap::Parser;
use config::{UploadConfig, DEFAULT_MAX_UPLOAD_SIZE};
use routes::AppState;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use storage::Storage;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

// --- Configuration ---
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory uploaded files are stored in (created if missing)
    #[arg(
        short,
        long,
        value_name = "DIR",
        env = "UPLOAD_STORAGE_DIR",
        default_value = "uploads"
    )]
    storage_dir: PathBuf,

    /// The network address to bind to
    #[arg(
        short,
        long,
        value_name = "ADDR",
        env = "UPLOAD_BIND_ADDR",
        default_value = "127.0.0.1:3000"
    )]
    bind_addr: SocketAddr,

    /// Largest accepted upload request, in bytes
    #[arg(
        short,
        long,
        value_name = "BYTES",
        env = "UPLOAD_MAX_SIZE",
        default_value_t = DEFAULT_MAX_UPLOAD_SIZE
    )]
    max_upload_size: u64,

    /// Comma-separated extensions to accept (e.g. png,jpg); all are accepted when unset
    #[arg(
        short,
        long,
        value_name = "EXTS",
        env = "UPLOAD_ALLOWED_EXTENSIONS",
        value_delimiter = ','
    )]
    allowed_extensions: Vec<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let storage = match Storage::open(&args.storage_dir).await {
        Ok(storage) => storage,
        Err(e) => {
            error!(
                "Failed to prepare storage directory '{}': {}. Exiting.",
                args.storage_dir.display(),
                e
            );
            eprintln!(
                "Error: Failed to prepare storage directory '{}': {}",
                args.storage_dir.display(),
                e
            );
            std::process::exit(1);
        }
    };

    let upload = UploadConfig::new(args.max_upload_size, &args.allowed_extensions);
    info!("Storing files in: {}", storage.root().display());
    info!("Maximum upload size: {} bytes", upload.max_upload_size);
    match &upload.allowed_extensions {
        Some(allowed) => info!("Allowed extensions: {:?}", allowed),
        None => info!("All file extensions allowed"),
    }
    info!("Listening on: {}", args.bind_addr);

    let shared_state = Arc::new(AppState { storage, upload });
    let app = routes::router(shared_state);

    let listener = match tokio::net::TcpListener::bind(args.bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to address {}: {}", args.bind_addr, e);
            eprintln!("Error: Failed to bind to address {}: {}", args.bind_addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
