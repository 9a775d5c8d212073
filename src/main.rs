use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

use media_ingest::config::{Config, ProviderConfig};
use media_ingest::routes::{create_routes, RouterOptions};
use media_ingest::services::catalog::SeaOrmCatalog;
use media_ingest::services::filesystem::FilesystemStorage;
use media_ingest::services::media::{MediaService, MediaSettings};
use media_ingest::services::s3::S3Storage;
use media_ingest::services::storage::StorageBackend;

#[derive(Parser)]
#[command(name = "media-ingest", version, about = "Image upload service with generated thumbnails")]
struct Cli {
    /// Address to listen on, overrides LISTEN_ADDR
    #[arg(long, global = true)]
    listen: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply migrations and serve the HTTP API (default)
    Serve,
    /// Apply pending migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("media_ingest=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("invalid configuration")?;
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }

    let db = Database::connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    Migrator::up(&db, None).await.context("failed to apply migrations")?;

    if let Some(Command::Migrate) = cli.command {
        info!("migrations applied");
        return Ok(());
    }

    let (storage, static_files) = match &config.provider {
        ProviderConfig::Filesystem {
            upload_path,
            upload_uri,
        } => {
            tokio::fs::create_dir_all(upload_path)
                .await
                .with_context(|| format!("failed to create {}", upload_path.display()))?;
            let storage = FilesystemStorage::new(upload_path.clone(), upload_uri.clone());
            (
                Arc::new(storage) as Arc<dyn StorageBackend>,
                Some((upload_uri.clone(), upload_path.clone())),
            )
        }
        ProviderConfig::S3(s3) => {
            let storage = S3Storage::new(s3).await?;
            storage.ensure_bucket_exists().await?;
            (Arc::new(storage) as Arc<dyn StorageBackend>, None)
        }
    };
    info!(provider = storage.provider_name(), "storage ready");

    let media = MediaService::new(
        storage,
        Arc::new(SeaOrmCatalog::new(db)),
        MediaSettings {
            max_upload_bytes: config.max_upload_bytes,
            max_image_pixels: config.max_image_pixels,
            upstream_timeout: config.upstream_timeout,
        },
    );

    let app = create_routes(
        Arc::new(media),
        RouterOptions {
            max_upload_bytes: config.max_upload_bytes,
            static_files,
        },
    );

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
