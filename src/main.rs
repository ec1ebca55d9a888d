use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use filehost::config::{S3Config, ServerConfig, StorageConfig};
use filehost::server::{AppState, create_router};
use filehost::service::FileHost;
use filehost::storage::{FsObjectStore, ObjectStore};
use filehost::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "filehost")]
#[command(about = "A multi-tenant file hosting server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, env = "FILEHOST_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, env = "FILEHOST_PORT", default_value = "8080")]
        port: u16,

        /// Public base URL for external access (e.g., "https://files.example.com").
        /// Used to precompute file download URLs.
        #[arg(long, env = "FILEHOST_PUBLIC_BASE_URL")]
        public_base_url: Option<String>,

        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Retry removal of buckets left behind by failed repository deletions
    Reconcile {
        #[command(flatten)]
        backend: BackendArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StorageKind {
    Fs,
    S3,
}

#[derive(Args)]
struct BackendArgs {
    /// Data directory for the database and filesystem buckets
    #[arg(long, env = "FILEHOST_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Object storage backend
    #[arg(long, env = "FILEHOST_STORAGE", value_enum, default_value = "fs")]
    storage: StorageKind,

    /// S3 endpoint URL (e.g., "http://localhost:9000")
    #[arg(long, env = "FILEHOST_S3_ENDPOINT")]
    s3_endpoint: Option<String>,

    #[arg(long, env = "FILEHOST_S3_REGION", default_value = "us-east-1")]
    s3_region: String,

    #[arg(long, env = "FILEHOST_S3_ACCESS_KEY")]
    s3_access_key: Option<String>,

    #[arg(long, env = "FILEHOST_S3_SECRET_KEY", hide_env_values = true)]
    s3_secret_key: Option<String>,
}

impl BackendArgs {
    fn storage_config(&self) -> anyhow::Result<StorageConfig> {
        match self.storage {
            StorageKind::Fs => Ok(StorageConfig::Filesystem {
                root: self.data_dir.clone(),
            }),
            StorageKind::S3 => {
                let (Some(endpoint), Some(access_key), Some(secret_key)) = (
                    self.s3_endpoint.clone(),
                    self.s3_access_key.clone(),
                    self.s3_secret_key.clone(),
                ) else {
                    bail!(
                        "S3 storage requires --s3-endpoint, --s3-access-key and --s3-secret-key"
                    );
                };

                Ok(StorageConfig::S3(S3Config {
                    endpoint,
                    region: self.s3_region.clone(),
                    access_key,
                    secret_key,
                }))
            }
        }
    }
}

fn open_object_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config {
        StorageConfig::Filesystem { root } => Ok(Arc::new(FsObjectStore::new(root))),
        #[cfg(feature = "s3")]
        StorageConfig::S3(s3) => Ok(Arc::new(filehost::storage::S3ObjectStore::new(s3)?)),
        #[cfg(not(feature = "s3"))]
        StorageConfig::S3(_) => bail!("filehost was built without the `s3` feature"),
    }
}

fn open_host(config: &ServerConfig) -> anyhow::Result<FileHost> {
    fs::create_dir_all(&config.data_dir)?;

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    let objects = open_object_store(&config.storage)?;

    Ok(FileHost::new(Arc::new(store), objects)
        .with_public_base_url(config.public_base_url.clone()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("filehost=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            public_base_url,
            backend,
        } => {
            let config = ServerConfig {
                host,
                port,
                storage: backend.storage_config()?,
                data_dir: backend.data_dir,
                public_base_url,
            };

            let host = open_host(&config)?;
            let pending = host.store().list_orphaned_buckets()?.len();
            if pending > 0 {
                tracing::warn!(
                    pending,
                    "orphaned buckets are queued; run 'filehost reconcile' to remove them"
                );
            }

            let app = create_router(Arc::new(AppState { host }));
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
        Commands::Reconcile { backend } => {
            let config = ServerConfig {
                storage: backend.storage_config()?,
                data_dir: backend.data_dir,
                ..ServerConfig::default()
            };

            let host = open_host(&config)?;
            let report = host.reconcile().await?;

            info!(
                cleaned = report.cleaned.len(),
                pending = report.pending.len(),
                skipped = report.skipped.len(),
                "reconciliation finished"
            );
            for bucket in &report.pending {
                println!("pending: {bucket}");
            }
            for bucket in &report.cleaned {
                println!("cleaned: {bucket}");
            }
            for bucket in &report.skipped {
                println!("skipped (in use): {bucket}");
            }
        }
    }

    Ok(())
}
