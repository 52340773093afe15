//! Unified error type for `PennySaved`.
//!
//! Form validation failures are normally reported as
//! [`ValidationResult`](crate::core::validation::ValidationResult) values; the
//! [`Error::Validation`] variant only appears once a caller tries to persist an
//! invalid form through the [`App`](crate::app::App) facade.

use crate::core::entitlement::GatedAction;
use thiserror::Error;

/// Every failure the library can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Persistence layer failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required environment variable is missing or invalid
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Remote request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote payload could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A form was submitted that does not pass validation
    #[error("Validation failed: {message}")]
    Validation {
        /// The inline message shown next to the form
        message: String,
    },

    /// The free tier cap for an action has been reached
    #[error("Upgrade required to {action}: limit of {limit} reached ({current} in use)")]
    UpgradeRequired {
        /// The action that was denied
        action: GatedAction,
        /// The configured free tier cap
        limit: u64,
        /// How many records already exist
        current: u64,
    },

    /// No saving with this id
    #[error("Saving not found: {id}")]
    SavingNotFound {
        /// Requested id
        id: i64,
    },

    /// No goal with this id
    #[error("Goal not found: {id}")]
    GoalNotFound {
        /// Requested id
        id: i64,
    },

    /// No category with this id or name
    #[error("Category not found: {name}")]
    CategoryNotFound {
        /// Requested id or name
        name: String,
    },

    /// A category with this name already exists
    #[error("Category already exists: {name}")]
    DuplicateCategory {
        /// Conflicting name
        name: String,
    },

    /// Predefined categories cannot be removed by the user
    #[error("Category '{name}' is predefined and cannot be deleted")]
    PredefinedCategory {
        /// Category name
        name: String,
    },

    /// The purchase provider failed
    #[error("Purchase provider error: {message}")]
    PurchaseProvider {
        /// Provider supplied description
        message: String,
    },
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
