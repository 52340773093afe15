/// Database connection and table creation
pub mod database;

/// Application settings loading from config.toml
pub mod settings;

pub use settings::{Settings, load_app_settings, load_settings};
