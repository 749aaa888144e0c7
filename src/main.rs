//! Quire - library catalog, blog and book REST API

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quire::{
    api::{self, AppState},
    config::Config,
    db,
};

#[derive(Debug, Parser)]
#[command(name = "quire", version, about = "Library catalog, blog and book REST API")]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, global = true, env = "QUIRE_CONFIG", default_value = "config.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run migrations and serve HTTP (default)
    Serve,
    /// Create the Viewers, Editors and Admins groups
    SetupGroups,
    /// Create a staff superuser
    CreateSuperuser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Insert the sample books
    SeedBooks,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quire=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load_with_env(&cli.config)?;
    tracing::info!("Configuration loaded from {}", cli.config.display());

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    let state = AppState::new(pool.clone(), &config);

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state, &config).await,
        Command::SetupGroups => {
            let groups = state.permission_service.setup_groups().await?;
            for group in groups {
                println!("{}: {}", group.name, group.permissions.join(", "));
            }
            Ok(())
        }
        Command::CreateSuperuser {
            username,
            email,
            password,
        } => {
            let user = state
                .user_service
                .create_superuser(&username, &email, &password)
                .await?;
            println!("Superuser {} created", user.username);
            Ok(())
        }
        Command::SeedBooks => {
            let created = state.catalog_service.seed_sample_books().await?;
            println!("{} sample books created", created);
            Ok(())
        }
    };

    pool.close().await;
    result
}

async fn serve(state: AppState, config: &Config) -> Result<()> {
    tracing::info!("Starting Quire...");

    // Start rate limiter cleanup task (runs every 5 minutes)
    {
        let limiter = state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.cleanup().await;
            }
        });
    }

    // Expired sessions are dropped once at startup
    match state.user_service.cleanup_expired_sessions().await {
        Ok(removed) if removed > 0 => tracing::info!("Removed {} expired sessions", removed),
        Ok(_) => {}
        Err(e) => tracing::warn!("Session cleanup failed: {}", e),
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin)?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
