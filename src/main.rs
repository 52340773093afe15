use dotenvy::dotenv;
use penny_saved::{
    app::{App, spawn_category_sync},
    config::{self, database},
    core::{category::seed_predefined_categories, dashboard::format_dashboard_summary},
    errors::Result,
    events::EventBus,
    purchases::{EntitlementManager, StaticPurchaseProvider},
    remote::{HttpRemoteConfig, RemoteConfigSource},
    store::{GoalsStore, Refresh, SavingsStore, spawn_watcher},
};
use std::sync::Arc;
use tracing::{error, info, warn};
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
    info!("Attempted to load .env file.");

    // 3. Load the application settings
    let settings = Arc::new(config::load_app_settings()?);

    // 4. Initialize database and seed predefined categories
    let db = Arc::new(
        database::create_connection()
            .await
            .inspect_err(|e| error!("Failed to connect to database: {}", e))?,
    );
    database::create_tables(db.as_ref())
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;
    seed_predefined_categories(db.as_ref(), &settings.categories).await?;

    // 5. Entitlements
    let bus = EventBus::default();
    let provider = Arc::new(StaticPurchaseProvider::from_settings(&settings.purchases));
    let entitlements = EntitlementManager::new(provider, bus.clone());
    if let Err(e) = entitlements.load_products().await {
        warn!("Continuing without a product catalog: {}", e);
    }
    if let Err(e) = entitlements.refresh().await {
        warn!("Continuing with free tier entitlements: {}", e);
    }

    let app = App::new(Arc::clone(&db), Arc::clone(&settings), bus.clone(), entitlements.handle());

    // 6. Stores follow the event bus
    let savings = Arc::new(SavingsStore::new(Arc::clone(&db)));
    let goals = Arc::new(GoalsStore::new(db));
    savings.refresh().await?;
    goals.refresh().await?;
    let _savings_watcher = spawn_watcher(Arc::clone(&savings), &bus);
    let _goals_watcher = spawn_watcher(Arc::clone(&goals), &bus);

    // 7. Remote category sync
    if settings.remote.categories_url.is_some() {
        let remote: Arc<dyn RemoteConfigSource> = Arc::new(HttpRemoteConfig::new(&settings.remote)?);
        let _sync = spawn_category_sync(app.clone(), remote);
    } else {
        info!("No categories_url configured, remote category sync disabled.");
    }

    // 8. Report
    let summary = app.dashboard(chrono::Utc::now()).await?;
    info!(
        "Free tier usage: {:?}, premium: {}",
        app.usage().await?,
        app.entitlement_state().is_premium()
    );
    for line in format_dashboard_summary(&summary).lines() {
        info!("{line}");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down.");
    Ok(())
}
