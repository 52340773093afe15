//! Goal business logic - create, read, update and delete goals.
//!
//! Deleting a goal keeps its savings: their goal reference is cleared inside
//! the same database transaction.

use crate::{
    entities::{Goal, Saving, goal, saving},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};

/// Fields of a new goal.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGoal {
    /// Goal name
    pub name: String,
    /// Target amount
    pub target_amount: f64,
    /// Optional note
    pub note: Option<String>,
    /// Start date, defaults to now
    pub date_started: Option<DateTimeUtc>,
}

/// Editable fields of an existing goal.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalUpdate {
    /// Goal name
    pub name: String,
    /// Target amount
    pub target_amount: f64,
    /// Optional note
    pub note: Option<String>,
    /// Explicit manual completion toggle. `None` leaves the flag to the raise rule.
    pub completed: Option<bool>,
}

fn check_fields(name: &str, target_amount: f64) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation {
            message: "Goal name cannot be empty".to_string(),
        });
    }

    if !target_amount.is_finite() || target_amount <= 0.0 {
        return Err(Error::Validation {
            message: format!("Invalid target amount: {target_amount}"),
        });
    }

    Ok(())
}

fn normalize_note(note: Option<String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

/// Inserts a new goal. New goals are never marked complete.
pub async fn create_goal<C>(db: &C, new: NewGoal) -> Result<goal::Model>
where
    C: ConnectionTrait,
{
    check_fields(&new.name, new.target_amount)?;

    let model = goal::ActiveModel {
        name: Set(new.name.trim().to_string()),
        target_amount: Set(new.target_amount),
        date_started: Set(new.date_started.unwrap_or_else(chrono::Utc::now)),
        note: Set(normalize_note(new.note)),
        completed: Set(false),
        ..Default::default()
    };

    Ok(model.insert(db).await?)
}

/// Updates a goal.
///
/// An explicit `completed` value always wins. Without one, raising the target
/// clears the manual completion flag so the goal has to be reached again.
pub async fn update_goal<C>(db: &C, goal_id: i64, changes: GoalUpdate) -> Result<goal::Model>
where
    C: ConnectionTrait,
{
    check_fields(&changes.name, changes.target_amount)?;

    let existing = Goal::find_by_id(goal_id)
        .one(db)
        .await?
        .ok_or(Error::GoalNotFound { id: goal_id })?;

    let completed = changes
        .completed
        .unwrap_or(existing.completed && changes.target_amount <= existing.target_amount);

    let mut model: goal::ActiveModel = existing.into();
    model.name = Set(changes.name.trim().to_string());
    model.target_amount = Set(changes.target_amount);
    model.note = Set(normalize_note(changes.note));
    model.completed = Set(completed);

    Ok(model.update(db).await?)
}

/// Sets or clears the manual completion flag.
pub async fn set_goal_completed<C>(db: &C, goal_id: i64, completed: bool) -> Result<goal::Model>
where
    C: ConnectionTrait,
{
    let existing = Goal::find_by_id(goal_id)
        .one(db)
        .await?
        .ok_or(Error::GoalNotFound { id: goal_id })?;

    let mut model: goal::ActiveModel = existing.into();
    model.completed = Set(completed);
    Ok(model.update(db).await?)
}

/// Deletes a goal and detaches its savings.
pub async fn delete_goal(db: &DatabaseConnection, goal_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let goal = Goal::find_by_id(goal_id)
        .one(&txn)
        .await?
        .ok_or(Error::GoalNotFound { id: goal_id })?;

    Saving::update_many()
        .col_expr(saving::Column::GoalId, Expr::value(Option::<i64>::None))
        .filter(saving::Column::GoalId.eq(goal_id))
        .exec(&txn)
        .await?;

    goal.delete(&txn).await?;

    txn.commit().await?;
    Ok(())
}

/// Finds a goal by id.
pub async fn get_goal_by_id<C>(db: &C, goal_id: i64) -> Result<Option<goal::Model>>
where
    C: ConnectionTrait,
{
    Goal::find_by_id(goal_id).one(db).await.map_err(Into::into)
}

/// All goals, most recently started first.
pub async fn get_all_goals<C>(db: &C) -> Result<Vec<goal::Model>>
where
    C: ConnectionTrait,
{
    Goal::find()
        .order_by_desc(goal::Column::DateStarted)
        .order_by_desc(goal::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
