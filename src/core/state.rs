//! Key/value bookkeeping stored in the `system_state` table.

use crate::{
    entities::{SystemState, system_state},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{Set, prelude::*};

/// Reads the value stored under `key`.
pub async fn get_state_value<C>(db: &C, key: &str) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    let state = SystemState::find()
        .filter(system_state::Column::Key.eq(key))
        .one(db)
        .await?;

    Ok(state.map(|s| s.value))
}

/// Stores `value` under `key`, replacing any previous value.
pub async fn set_state_value<C>(db: &C, key: &str, value: String) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now().naive_utc();

    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(key))
        .one(db)
        .await?;

    if let Some(state) = existing {
        let mut active_model: system_state::ActiveModel = state.into();
        active_model.value = Set(value);
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        system_state::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_missing_key_is_none() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(get_state_value(&db, "nothing").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_set_replaces_existing_value() -> Result<()> {
        let db = setup_test_db().await?;

        set_state_value(&db, "k", "one".to_string()).await?;
        set_state_value(&db, "k", "two".to_string()).await?;

        assert_eq!(get_state_value(&db, "k").await?.as_deref(), Some("two"));

        let count = SystemState::find()
            .filter(system_state::Column::Key.eq("k"))
            .count(&db)
            .await?;
        assert_eq!(count, 1);
        Ok(())
    }
}
