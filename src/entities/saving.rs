//! Saving entity - A logged "almost purchase".
//!
//! Each saving records money the user decided not to spend. It may point at a
//! category and at a goal the amount is allocated toward. Both references are
//! nullable and are detached when the target row is deleted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Saving database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "savings")]
pub struct Model {
    /// Unique identifier for the saving
    #[sea_orm(primary_key)]
    pub id: i64,
    /// What the user almost bought (e.g., "Coffee")
    pub name: String,
    /// Amount saved in the user's currency
    pub amount: f64,
    /// When the saving happened. Records arriving from sync may lack a date.
    pub date: Option<DateTimeUtc>,
    /// Free-form note
    pub note: Option<String>,
    /// Category this saving is filed under
    pub category_id: Option<i64>,
    /// Goal this saving counts toward
    pub goal_id: Option<i64>,
}

/// Defines relationships between Saving and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each saving may belong to one category
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    /// Each saving may belong to one goal
    #[sea_orm(
        belongs_to = "super::goal::Entity",
        from = "Column::GoalId",
        to = "super::goal::Column::Id"
    )]
    Goal,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::goal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Goal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
