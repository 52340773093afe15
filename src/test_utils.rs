//! Shared test utilities for `PennySaved`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    app::App,
    config::Settings,
    core::{
        category::{get_all_categories, seed_predefined_categories},
        entitlement::{EntitlementState, FreeTierLimits},
        goal::{self, NewGoal},
        saving::{self, NewSaving},
    },
    entities,
    errors::{Error, Result},
    events::EventBus,
    purchases::EntitlementHandle,
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Arc;

/// Routes `tracing` output through the test harness so it shows up for failing tests.
/// Safe to call from every test; only the first call installs the subscriber.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Inserts a category row directly.
///
/// # Defaults
/// * `icon`: `"tag"`
/// * `color`: `"#000000"`
pub async fn create_test_category(
    db: &DatabaseConnection,
    name: &str,
    predefined: bool,
) -> Result<entities::category::Model> {
    let model = entities::category::ActiveModel {
        name: Set(name.to_string()),
        icon: Set("tag".to_string()),
        color: Set("#000000".to_string()),
        is_predefined: Set(predefined),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Creates a test goal started now, with no note.
pub async fn create_test_goal(
    db: &DatabaseConnection,
    name: &str,
    target_amount: f64,
) -> Result<entities::goal::Model> {
    goal::create_goal(
        db,
        NewGoal {
            name: name.to_string(),
            target_amount,
            note: None,
            date_started: None,
        },
    )
    .await
}

/// Creates a test saving dated now.
///
/// # Defaults
/// * `category_id`: None
/// * `note`: None
pub async fn create_test_saving(
    db: &DatabaseConnection,
    name: &str,
    amount: f64,
    goal_id: Option<i64>,
) -> Result<entities::saving::Model> {
    saving::create_saving(
        db,
        NewSaving {
            name: name.to_string(),
            amount,
            date: Some(chrono::Utc::now()),
            note: None,
            category_id: None,
            goal_id,
        },
    )
    .await
}

/// Creates a test saving dated now and filed under `category_id`.
pub async fn create_categorized_saving(
    db: &DatabaseConnection,
    name: &str,
    amount: f64,
    category_id: i64,
) -> Result<entities::saving::Model> {
    saving::create_saving(
        db,
        NewSaving {
            name: name.to_string(),
            amount,
            date: Some(chrono::Utc::now()),
            note: None,
            category_id: Some(category_id),
            goal_id: None,
        },
    )
    .await
}

/// Sets up a complete test environment with a goal.
/// Returns (db, goal) for common test scenarios.
pub async fn setup_with_goal(
    target_amount: f64,
) -> Result<(DatabaseConnection, entities::goal::Model)> {
    let db = setup_test_db().await?;
    let goal = create_test_goal(&db, "Test Goal", target_amount).await?;
    Ok((db, goal))
}

/// Builds an [`App`] over a fresh database seeded with the default categories.
pub async fn test_app(limits: FreeTierLimits, entitlement: EntitlementState) -> Result<App> {
    let db = setup_test_db().await?;
    let settings = Settings {
        limits,
        ..Settings::default()
    };
    seed_predefined_categories(&db, &settings.categories).await?;

    Ok(App::new(
        Arc::new(db),
        Arc::new(settings),
        EventBus::new(16),
        EntitlementHandle::fixed(entitlement),
    ))
}

/// The alphabetically first category known to `app`.
pub async fn first_category(app: &App) -> Result<entities::category::Model> {
    get_all_categories(app.db())
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::CategoryNotFound {
            name: "any".to_string(),
        })
}
