use std::sync::Arc;

use clap::Parser;
use succulent_core::{
    CareCatalog, HttpInferenceClient, InferenceBackend, OpenAiCompletionClient, PgCareCache,
    PgChatStore, PgIdentificationStore, SucculentConfig,
};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use succulent_server::http::{self, Backends, HttpState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "succulent.toml")]
    config: String,

    /// Check database and inference connectivity, then exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience; production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = match SucculentConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    let pool = match succulent_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    let inference = Arc::new(HttpInferenceClient::from_config(&config.inference)?);

    if args.health {
        match succulent_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        match inference.health_check().await {
            Ok(()) => println!("✅ Inference service reachable at {}", inference.base_url()),
            Err(e) => println!("⚠️  Inference service unavailable: {}", e),
        }

        println!("✅ Succulent health check passed");
        return Ok(());
    }

    if let Err(e) = succulent_core::db::run_migrations(&pool).await {
        eprintln!("Failed to run database migrations: {}", e);
        std::process::exit(1);
    }

    let catalog = match &config.care.catalog_path {
        Some(path) => match CareCatalog::load(path) {
            Ok(catalog) => {
                tracing::info!(path = %path, entries = catalog.len(), "Loaded care catalog");
                Some(catalog)
            }
            Err(e) => {
                eprintln!("Failed to load care catalog: {}", e);
                std::process::exit(1);
            }
        },
        None => None,
    };

    let completion = OpenAiCompletionClient::from_config(&config.llm)?;
    if !completion.has_api_key() {
        tracing::warn!("No LLM API key configured: chat replies will fail and care guides will use fallbacks");
    }

    // Best effort: the first identify request surfaces a dead inference service.
    if let Err(e) = inference.health_check().await {
        tracing::warn!(base_url = %inference.base_url(), error = %e, "Inference service health check failed");
    }

    let backends = Backends {
        inference,
        completion: Arc::new(completion),
        identifications: Arc::new(PgIdentificationStore::new(pool.clone())),
        chats: Arc::new(PgChatStore::new(pool.clone())),
        care_cache: Arc::new(PgCareCache::new(pool)),
        catalog,
    };
    let state = match HttpState::new(&config, backends) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Failed to prepare upload directory {}: {}", config.upload.dir, e);
            std::process::exit(1);
        }
    };

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(&config.server, state, tx.subscribe()).await?;

    Ok(())
}
