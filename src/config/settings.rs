//! Application settings loading from config.toml
//!
//! Every section is optional. A missing file or section falls back to the
//! built-in defaults so the app can start on a fresh install.

use crate::core::aggregator::MissingDatePolicy;
use crate::core::entitlement::FreeTierLimits;
use crate::core::sync::DeletionPolicy;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::env::VarError;
use std::path::Path;
use tracing::{debug, info};

const CONFIG_PATH_VAR: &str = "PENNY_SAVED_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Free tier caps
    pub limits: FreeTierLimits,
    /// Remote category and policy endpoints
    pub remote: RemoteSettings,
    /// Aggregation options
    pub savings: SavingsSettings,
    /// Purchase provider options
    pub purchases: PurchaseSettings,
    /// Predefined categories seeded on startup
    pub categories: Vec<CategorySeed>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            limits: FreeTierLimits::default(),
            remote: RemoteSettings::default(),
            savings: SavingsSettings::default(),
            purchases: PurchaseSettings::default(),
            categories: default_category_seeds(),
        }
    }
}

/// Remote category feed and policy document settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// GET endpoint returning `{"categories": [...]}`. Sync is disabled when unset.
    pub categories_url: Option<String>,
    /// GET endpoint returning `{"sections": [...]}`
    pub policy_url: Option<String>,
    /// Minimum hours between two category syncs
    pub sync_interval_hours: u64,
    /// Which local categories may be removed when absent from the feed
    pub deletion_policy: DeletionPolicy,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            categories_url: None,
            policy_url: None,
            sync_interval_hours: 24,
            deletion_policy: DeletionPolicy::default(),
            timeout_secs: 10,
        }
    }
}

/// Options controlling how savings are aggregated
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct SavingsSettings {
    /// What to do with savings that carry no date when filtering by date
    pub missing_date_policy: MissingDatePolicy,
}

/// Settings for the static purchase provider used by the headless binary
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PurchaseSettings {
    /// Product ids treated as verified entitlements
    pub owned_products: Vec<String>,
}

/// A predefined category to seed
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CategorySeed {
    /// Category name
    pub name: String,
    /// Icon reference
    pub icon: String,
    /// Color reference
    pub color: String,
}

impl CategorySeed {
    fn new(name: &str, icon: &str, color: &str) -> Self {
        Self {
            name: name.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
        }
    }
}

fn default_category_seeds() -> Vec<CategorySeed> {
    vec![
        CategorySeed::new("Groceries", "cart.fill", "#4CAF50"),
        CategorySeed::new("Eating Out", "fork.knife", "#FF9800"),
        CategorySeed::new("Coffee", "cup.and.saucer.fill", "#795548"),
        CategorySeed::new("Clothing", "tshirt.fill", "#E91E63"),
        CategorySeed::new("Electronics", "iphone", "#2196F3"),
        CategorySeed::new("Entertainment", "tv.fill", "#9C27B0"),
        CategorySeed::new("Transport", "car.2.fill", "#607D8B"),
        CategorySeed::new("Gifts", "gift.fill", "#F44336"),
    ]
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    debug!("Loading settings from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;

    parse_settings(&contents)
}

/// Parses settings from TOML text
pub fn parse_settings(contents: &str) -> Result<Settings> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Resolves the config path from the value of `PENNY_SAVED_CONFIG`.
///
/// An unset variable selects `./config.toml`; a value that is not valid
/// unicode is an error rather than a silent fallback.
fn config_path(var: std::result::Result<String, VarError>) -> Result<String> {
    match var {
        Ok(path) => Ok(path),
        Err(VarError::NotPresent) => Ok(DEFAULT_CONFIG_PATH.to_string()),
        Err(e) => Err(e.into()),
    }
}

/// Loads settings from `PENNY_SAVED_CONFIG` or `./config.toml`.
///
/// A missing file is not an error: the defaults are returned instead.
pub fn load_app_settings() -> Result<Settings> {
    let path = config_path(std::env::var(CONFIG_PATH_VAR))?;
    if Path::new(&path).exists() {
        let settings = load_settings(&path)?;
        info!("Loaded settings from {path}");
        Ok(settings)
    } else {
        info!("No config file at {path}, using defaults");
        Ok(Settings::default())
    }
}
