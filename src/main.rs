use dotenvy::dotenv;
use payday_planner::{
    config::{database, settings},
    errors::Result,
};
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application settings
    let settings = settings::load_app_settings()
        .inspect_err(|e| error!("Failed to load application settings: {}", e))?;
    info!(database = %settings.database.url, "Loaded application settings");

    // 4. Open the store and make sure the schema exists
    ensure_sqlite_dir(&settings.database.url)?;
    let db = database::create_connection(&settings.database)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database schema ready"))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Hold the store open for the transport layer until shutdown
    info!("Payday planner core ready; press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    db.close().await?;
    Ok(())
}

/// Creates the parent directory of a file-backed `SQLite` URL.
fn ensure_sqlite_dir(url: &str) -> Result<()> {
    let Some(rest) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = rest.split('?').next().unwrap_or(rest);
    if let Some(parent) = Path::new(file).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
