//! Remote category synchronization.
//!
//! The remote feed is merged into the local categories by name: known names
//! get their icon and color refreshed, unknown names are inserted as
//! predefined, and local categories absent from the feed are removed as far
//! as the [`DeletionPolicy`] allows. Removed categories release their savings
//! instead of deleting them.

use crate::{
    config::settings::RemoteSettings,
    core::{
        category::detach_and_delete,
        state::{get_state_value, set_state_value},
    },
    entities::{Category, category},
    errors::Result,
    remote::{RemoteCategory, RemoteConfigSource},
};
use chrono::{DateTime, TimeDelta, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

const LAST_CATEGORY_SYNC_KEY: &str = "last_category_sync";

/// Which local categories may be deleted when the remote feed no longer lists them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionPolicy {
    /// Never delete anything
    Never,
    /// Delete predefined categories only; user-created ones always survive
    #[default]
    PredefinedOnly,
    /// Delete every category missing from the feed
    All,
}

impl DeletionPolicy {
    /// Whether a category with the given origin may be deleted.
    #[must_use]
    pub const fn may_delete(self, is_predefined: bool) -> bool {
        match self {
            Self::Never => false,
            Self::PredefinedOnly => is_predefined,
            Self::All => true,
        }
    }
}

/// What a merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorySyncReport {
    /// Names inserted
    pub added: Vec<String>,
    /// Names whose icon, color or origin changed
    pub updated: Vec<String>,
    /// Names removed
    pub deleted: Vec<String>,
    /// Feed entries ignored for missing fields
    pub skipped: usize,
}

impl CategorySyncReport {
    /// Whether the merge touched any row.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty())
    }
}

struct ValidEntry {
    name: String,
    icon: String,
    color: String,
}

fn validate_entry(entry: &RemoteCategory) -> Option<ValidEntry> {
    let name = entry.name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
    Some(ValidEntry {
        name: name.to_string(),
        icon: entry.icon.clone()?,
        color: entry.color.clone()?,
    })
}

/// Merges the remote feed into the local categories in one transaction.
///
/// A feed without a single valid entry never deletes anything, so an empty or
/// broken response cannot wipe the local list.
pub async fn merge_remote_categories(
    db: &DatabaseConnection,
    remote: &[RemoteCategory],
    policy: DeletionPolicy,
) -> Result<CategorySyncReport> {
    let mut report = CategorySyncReport::default();

    let mut entries = Vec::with_capacity(remote.len());
    for entry in remote {
        if let Some(valid) = validate_entry(entry) {
            entries.push(valid);
        } else {
            warn!("Skipping invalid remote category: {entry:?}");
            report.skipped += 1;
        }
    }

    let txn = db.begin().await?;

    let mut existing: HashMap<String, category::Model> = Category::find()
        .all(&txn)
        .await?
        .into_iter()
        .map(|c| (c.name.clone(), c))
        .collect();

    let mut remote_names = HashSet::with_capacity(entries.len());
    for entry in entries {
        remote_names.insert(entry.name.clone());

        if let Some(current) = existing.get(&entry.name) {
            if current.icon == entry.icon && current.color == entry.color && current.is_predefined
            {
                continue;
            }

            let mut model: category::ActiveModel = current.clone().into();
            model.icon = Set(entry.icon);
            model.color = Set(entry.color);
            model.is_predefined = Set(true);
            let updated = model.update(&txn).await?;

            debug!("Updated category {}", updated.name);
            report.updated.push(updated.name.clone());
            existing.insert(updated.name.clone(), updated);
        } else {
            let inserted = category::ActiveModel {
                name: Set(entry.name),
                icon: Set(entry.icon),
                color: Set(entry.color),
                is_predefined: Set(true),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            debug!("Added category {}", inserted.name);
            report.added.push(inserted.name.clone());
            existing.insert(inserted.name.clone(), inserted);
        }
    }

    if remote_names.is_empty() {
        warn!("Remote category feed has no valid entries, skipping deletions");
    } else {
        let mut stale: Vec<category::Model> = existing
            .into_values()
            .filter(|c| !remote_names.contains(&c.name) && policy.may_delete(c.is_predefined))
            .collect();
        stale.sort_by(|a, b| a.name.cmp(&b.name));

        for category in stale {
            debug!("Deleting category {}", category.name);
            report.deleted.push(category.name.clone());
            detach_and_delete(&txn, category).await?;
        }
    }

    txn.commit().await?;

    info!(
        "Category sync: {} added, {} updated, {} deleted, {} skipped",
        report.added.len(),
        report.updated.len(),
        report.deleted.len(),
        report.skipped
    );
    Ok(report)
}

/// When the last successful sync happened.
pub async fn last_category_sync<C>(db: &C) -> Result<Option<DateTime<Utc>>>
where
    C: ConnectionTrait,
{
    let Some(value) = get_state_value(db, LAST_CATEGORY_SYNC_KEY).await? else {
        return Ok(None);
    };

    match DateTime::parse_from_rfc3339(&value) {
        Ok(at) => Ok(Some(at.with_timezone(&Utc))),
        Err(e) => {
            warn!("Ignoring unreadable {LAST_CATEGORY_SYNC_KEY} value {value:?}: {e}");
            Ok(None)
        }
    }
}

/// Records a successful sync.
pub async fn set_last_category_sync<C>(db: &C, at: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    set_state_value(db, LAST_CATEGORY_SYNC_KEY, at.to_rfc3339()).await
}

/// Converts the configured interval to a duration, saturating on overflow.
#[must_use]
pub fn sync_interval(hours: u64) -> TimeDelta {
    i64::try_from(hours)
        .ok()
        .and_then(TimeDelta::try_hours)
        .unwrap_or(TimeDelta::MAX)
}

/// Whether at least `interval` has passed since the last sync.
pub async fn is_category_sync_needed<C>(
    db: &C,
    now: DateTime<Utc>,
    interval: TimeDelta,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let last = last_category_sync(db).await?;
    Ok(last.is_none_or(|at| now.signed_duration_since(at) >= interval))
}

/// Fetches and merges the remote feed when the sync interval has elapsed.
///
/// Returns `None` when no sync was due. Fetch errors propagate and leave the
/// last sync timestamp untouched.
pub async fn sync_categories(
    db: &DatabaseConnection,
    source: &dyn RemoteConfigSource,
    settings: &RemoteSettings,
    now: DateTime<Utc>,
) -> Result<Option<CategorySyncReport>> {
    let interval = sync_interval(settings.sync_interval_hours);
    if !is_category_sync_needed(db, now, interval).await? {
        debug!("Category sync not due yet");
        return Ok(None);
    }

    let remote = source.fetch_categories().await?;
    let report = merge_remote_categories(db, &remote, settings.deletion_policy).await?;
    set_last_category_sync(db, now).await?;

    Ok(Some(report))
}
