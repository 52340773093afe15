//! Category business logic - seeding, custom categories and lookups.

use crate::{
    config::settings::CategorySeed,
    entities::{Category, Saving, category, saving},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{debug, info};

/// Color given to custom categories when the user does not pick one.
pub const DEFAULT_CUSTOM_COLOR: &str = "#9E9E9E";

/// All categories ordered alphabetically by name.
pub async fn get_all_categories<C>(db: &C) -> Result<Vec<category::Model>>
where
    C: ConnectionTrait,
{
    Category::find()
        .order_by_asc(category::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a category by id.
pub async fn get_category_by_id<C>(db: &C, category_id: i64) -> Result<Option<category::Model>>
where
    C: ConnectionTrait,
{
    Category::find_by_id(category_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a category by exact name.
pub async fn get_category_by_name<C>(db: &C, name: &str) -> Result<Option<category::Model>>
where
    C: ConnectionTrait,
{
    Category::find()
        .filter(category::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Which categories a list shows, by where they came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryOrigin {
    /// Every category
    #[default]
    All,
    /// Seeded or synced categories only
    Predefined,
    /// User-created categories only
    Custom,
}

/// Predicate over categories. The default matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFilter {
    /// Restriction on predefined/custom
    pub origin: CategoryOrigin,
    /// Case-insensitive substring of the category name
    pub search: Option<String>,
}

impl CategoryFilter {
    /// A filter that matches every category.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts to one origin.
    #[must_use]
    pub const fn with_origin(mut self, origin: CategoryOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Restricts to names containing `text`. Empty text matches everything.
    #[must_use]
    pub fn matching(mut self, text: &str) -> Self {
        let text = text.trim();
        self.search = if text.is_empty() {
            None
        } else {
            Some(text.to_lowercase())
        };
        self
    }

    /// Checks one category against the filter.
    #[must_use]
    pub fn matches(&self, category: &category::Model) -> bool {
        let origin_ok = match self.origin {
            CategoryOrigin::All => true,
            CategoryOrigin::Predefined => category.is_predefined,
            CategoryOrigin::Custom => !category.is_predefined,
        };

        origin_ok
            && self
                .search
                .as_ref()
                .is_none_or(|needle| category.name.to_lowercase().contains(needle))
    }

    /// Keeps the matching categories, preserving their order.
    #[must_use]
    pub fn apply(&self, categories: Vec<category::Model>) -> Vec<category::Model> {
        categories.into_iter().filter(|c| self.matches(c)).collect()
    }
}

/// Creates a user-defined category.
pub async fn create_custom_category<C>(
    db: &C,
    name: &str,
    icon: &str,
    color: Option<&str>,
) -> Result<category::Model>
where
    C: ConnectionTrait,
{
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation {
            message: "Category name cannot be empty".to_string(),
        });
    }

    if get_category_by_name(db, name).await?.is_some() {
        return Err(Error::DuplicateCategory {
            name: name.to_string(),
        });
    }

    let model = category::ActiveModel {
        name: Set(name.to_string()),
        icon: Set(icon.to_string()),
        color: Set(color.unwrap_or(DEFAULT_CUSTOM_COLOR).to_string()),
        is_predefined: Set(false),
        ..Default::default()
    };

    Ok(model.insert(db).await?)
}

/// Clears the category reference of every saving filed under `category_id`
/// and deletes the category row.
pub(crate) async fn detach_and_delete<C>(db: &C, category: category::Model) -> Result<()>
where
    C: ConnectionTrait,
{
    Saving::update_many()
        .col_expr(saving::Column::CategoryId, Expr::value(Option::<i64>::None))
        .filter(saving::Column::CategoryId.eq(category.id))
        .exec(db)
        .await?;

    category.delete(db).await?;
    Ok(())
}

/// Deletes a user-defined category. Predefined categories are refused.
pub async fn delete_custom_category(db: &DatabaseConnection, category_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let category = Category::find_by_id(category_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::CategoryNotFound {
            name: category_id.to_string(),
        })?;

    if category.is_predefined {
        return Err(Error::PredefinedCategory {
            name: category.name,
        });
    }

    debug!("Deleting custom category {}", category.name);
    detach_and_delete(&txn, category).await?;

    txn.commit().await?;
    Ok(())
}

/// Inserts every seed whose name is not present yet. Existing rows are left untouched.
///
/// Returns the number of categories inserted.
pub async fn seed_predefined_categories<C>(db: &C, seeds: &[CategorySeed]) -> Result<usize>
where
    C: ConnectionTrait,
{
    let mut inserted = 0;

    for seed in seeds {
        if get_category_by_name(db, &seed.name).await?.is_some() {
            continue;
        }

        category::ActiveModel {
            name: Set(seed.name.clone()),
            icon: Set(seed.icon.clone()),
            color: Set(seed.color.clone()),
            is_predefined: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await?;
        inserted += 1;
    }

    if inserted > 0 {
        info!("Seeded {inserted} predefined categories");
    }

    Ok(inserted)
}
