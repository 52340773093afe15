//! Goal entity - A named target amount savings are allocated toward.
//!
//! The stored `completed` column is the manual completion flag only. Whether a
//! goal counts as complete is derived in [`crate::core::progress`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Goal database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "goals")]
pub struct Model {
    /// Unique identifier for the goal
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-readable name (e.g., "New bike")
    pub name: String,
    /// Amount the user wants to reach
    pub target_amount: f64,
    /// When the goal was started
    pub date_started: DateTimeUtc,
    /// Free-form note
    pub note: Option<String>,
    /// Manually marked complete by the user
    pub completed: bool,
}

/// Defines relationships between Goal and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One goal has many savings
    #[sea_orm(has_many = "super::saving::Entity")]
    Savings,
}

impl Related<super::saving::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Savings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
