//! Saving business logic - create, read, update and delete saving records.
//!
//! These functions only enforce the invariants the store itself needs (a name
//! and a positive finite amount). Form validation, goal balance checks and
//! free tier gating happen in [`crate::app::App`] before these are called.

use crate::{
    entities::{Saving, saving},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Fields of a saving as entered by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSaving {
    /// Item name
    pub name: String,
    /// Amount saved
    pub amount: f64,
    /// When it happened
    pub date: Option<DateTimeUtc>,
    /// Optional note
    pub note: Option<String>,
    /// Category reference
    pub category_id: Option<i64>,
    /// Goal reference
    pub goal_id: Option<i64>,
}

fn check_fields(new: &NewSaving) -> Result<()> {
    if new.name.trim().is_empty() {
        return Err(Error::Validation {
            message: "Saving name cannot be empty".to_string(),
        });
    }

    if !new.amount.is_finite() || new.amount <= 0.0 {
        return Err(Error::Validation {
            message: format!("Invalid saving amount: {}", new.amount),
        });
    }

    Ok(())
}

fn normalize_note(note: Option<String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

/// Inserts a new saving.
pub async fn create_saving<C>(db: &C, new: NewSaving) -> Result<saving::Model>
where
    C: ConnectionTrait,
{
    check_fields(&new)?;

    let model = saving::ActiveModel {
        name: Set(new.name.trim().to_string()),
        amount: Set(new.amount),
        date: Set(new.date),
        note: Set(normalize_note(new.note)),
        category_id: Set(new.category_id),
        goal_id: Set(new.goal_id),
        ..Default::default()
    };

    Ok(model.insert(db).await?)
}

/// Replaces every editable field of an existing saving.
pub async fn update_saving<C>(db: &C, saving_id: i64, changes: NewSaving) -> Result<saving::Model>
where
    C: ConnectionTrait,
{
    check_fields(&changes)?;

    let existing = Saving::find_by_id(saving_id)
        .one(db)
        .await?
        .ok_or(Error::SavingNotFound { id: saving_id })?;

    let mut model: saving::ActiveModel = existing.into();
    model.name = Set(changes.name.trim().to_string());
    model.amount = Set(changes.amount);
    model.date = Set(changes.date);
    model.note = Set(normalize_note(changes.note));
    model.category_id = Set(changes.category_id);
    model.goal_id = Set(changes.goal_id);

    Ok(model.update(db).await?)
}

/// Deletes a saving.
pub async fn delete_saving<C>(db: &C, saving_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Saving::delete_by_id(saving_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::SavingNotFound { id: saving_id });
    }
    Ok(())
}

/// Finds a saving by id.
pub async fn get_saving_by_id<C>(db: &C, saving_id: i64) -> Result<Option<saving::Model>>
where
    C: ConnectionTrait,
{
    Saving::find_by_id(saving_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// All savings, newest first.
pub async fn get_all_savings<C>(db: &C) -> Result<Vec<saving::Model>>
where
    C: ConnectionTrait,
{
    Saving::find()
        .order_by_desc(saving::Column::Date)
        .order_by_desc(saving::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Savings allocated to a goal, newest first.
pub async fn get_savings_for_goal<C>(db: &C, goal_id: i64) -> Result<Vec<saving::Model>>
where
    C: ConnectionTrait,
{
    Saving::find()
        .filter(saving::Column::GoalId.eq(goal_id))
        .order_by_desc(saving::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use chrono::{TimeZone, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn new_saving(name: &str, amount: f64) -> NewSaving {
        NewSaving {
            name: name.to_string(),
            amount,
            date: Some(Utc::now()),
            note: None,
            category_id: None,
            goal_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_saving_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_saving(&db, new_saving("   ", 5.0)).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        let result = create_saving(&db, new_saving("Coffee", 0.0)).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        let result = create_saving(&db, new_saving("Coffee", f64::NAN)).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_and_get_saving_integration() -> Result<()> {
        let db = setup_test_db().await?;
        let category = create_test_category(&db, "Coffee", true).await?;

        let mut new = new_saving("  Latte  ", 4.75);
        new.category_id = Some(category.id);
        new.note = Some("   ".to_string());
        let created = create_saving(&db, new).await?;

        assert_eq!(created.name, "Latte");
        assert_eq!(created.amount, 4.75);
        assert_eq!(created.note, None);
        assert_eq!(created.category_id, Some(category.id));

        let found = get_saving_by_id(&db, created.id).await?.unwrap();
        assert_eq!(found, created);

        Ok(())
    }

    #[tokio::test]
    async fn test_get_all_savings_newest_first() -> Result<()> {
        let db = setup_test_db().await?;

        let mut old = new_saving("Old", 1.0);
        old.date = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut new = new_saving("New", 2.0);
        new.date = Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());

        create_saving(&db, old).await?;
        create_saving(&db, new).await?;

        let all = get_all_savings(&db).await?;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "New");
        assert_eq!(all[1].name, "Old");

        Ok(())
    }

    #[tokio::test]
    async fn test_update_saving_integration() -> Result<()> {
        let (db, goal) = setup_with_goal(100.0).await?;
        let created = create_test_saving(&db, "Coffee", 5.0, None).await?;

        let mut changes = new_saving("Espresso", 3.5);
        changes.goal_id = Some(goal.id);
        let updated = update_saving(&db, created.id, changes).await?;

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Espresso");
        assert_eq!(updated.amount, 3.5);
        assert_eq!(updated.goal_id, Some(goal.id));

        let for_goal = get_savings_for_goal(&db, goal.id).await?;
        assert_eq!(for_goal.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_saving_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        let result = update_saving(&db, 999, new_saving("Nope", 1.0)).await;
        assert!(matches!(result.unwrap_err(), Error::SavingNotFound { id: 999 }));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_saving_integration() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_test_saving(&db, "Coffee", 5.0, None).await?;

        delete_saving(&db, created.id).await?;
        assert!(get_saving_by_id(&db, created.id).await?.is_none());

        let again = delete_saving(&db, created.id).await;
        assert!(matches!(again.unwrap_err(), Error::SavingNotFound { .. }));

        Ok(())
    }
}
