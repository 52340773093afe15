//! Category entity - Groups savings for filtering and display.
//!
//! Predefined categories come from the seed list and the remote category feed.
//! Custom categories are created by the user and count against the free tier.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Category database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    /// Unique identifier for the category
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, unique across all categories
    #[sea_orm(unique)]
    pub name: String,
    /// Icon reference (symbol name)
    pub icon: String,
    /// Color reference (hex string or named color)
    pub color: String,
    /// Seeded or remote-managed (true) vs user-created (false)
    pub is_predefined: bool,
}

/// Defines relationships between Category and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One category has many savings
    #[sea_orm(has_many = "super::saving::Entity")]
    Savings,
}

impl Related<super::saving::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Savings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
