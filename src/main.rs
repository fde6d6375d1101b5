use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use articulate_hub::config::Config;
use articulate_hub::services::accounts;
use articulate_hub::{create_routes, AppState};

#[derive(Parser)]
#[command(name = "articulate-hub", version, about = "ArticulateHub backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply migrations and start the HTTP server (default)
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Create an account; the password is read from the terminal
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
    },
}

async fn connect(config: &Config) -> Result<DatabaseConnection> {
    let db = Database::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    Migrator::up(&db, None)
        .await
        .context("Failed to apply migrations")?;
    Ok(db)
}

async fn serve(config: Config) -> Result<()> {
    let db = connect(&config).await?;

    for dir in [&config.results_dir, &config.uploads_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let port = config.port;
    tracing::info!(
        proxy = %config.proxy_url,
        results_dir = %config.results_dir.display(),
        "starting ArticulateHub"
    );
    let app = create_routes(AppState::new(db, config)?);

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn create_user(config: Config, email: String, username: String) -> Result<()> {
    let db = connect(&config).await?;

    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }

    let user = accounts::create_user(&db, &email, &username, &password)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("Created user {} ({})", user.username, user.id);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("articulate_hub=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            connect(&config).await?;
            tracing::info!("Migrations applied");
            Ok(())
        }
        Command::CreateUser { email, username } => create_user(config, email, username).await,
    }
}
