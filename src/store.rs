//! In-memory snapshots of the savings and goals collections.
//!
//! Each store holds the full list behind an `Arc<RwLock<..>>` and re-fetches it
//! from the database on [`Refresh::refresh`]. [`spawn_watcher`] ties a store to
//! the [`EventBus`] so it refreshes whenever a relevant change is published.

use crate::{
    core::{goal::get_all_goals, saving::get_all_savings},
    entities::{goal, saving},
    errors::Result,
    events::{ChangeEvent, EventBus},
};
use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast::error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// A snapshot that can be rebuilt from the database.
#[async_trait]
pub trait Refresh: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &'static str;

    /// Whether `event` affects this snapshot. [`ChangeEvent::RemoteChange`] always does.
    fn interested_in(&self, event: ChangeEvent) -> bool;

    /// Re-fetches the snapshot and returns the number of items loaded.
    async fn refresh(&self) -> Result<usize>;
}

/// Snapshot of every saving, newest first.
#[derive(Debug, Clone)]
pub struct SavingsStore {
    db: Arc<DatabaseConnection>,
    savings: Arc<RwLock<Vec<saving::Model>>>,
}

impl SavingsStore {
    /// Creates an empty store. Call [`Refresh::refresh`] to load it.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            savings: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// A copy of the current snapshot.
    pub async fn snapshot(&self) -> Vec<saving::Model> {
        self.savings.read().await.clone()
    }

    /// Number of savings in the snapshot.
    pub async fn len(&self) -> usize {
        self.savings.read().await.len()
    }

    /// Whether the snapshot is empty.
    pub async fn is_empty(&self) -> bool {
        self.savings.read().await.is_empty()
    }
}

#[async_trait]
impl Refresh for SavingsStore {
    fn name(&self) -> &'static str {
        "savings"
    }

    fn interested_in(&self, event: ChangeEvent) -> bool {
        matches!(
            event,
            ChangeEvent::SavingsChanged
                | ChangeEvent::GoalsChanged
                | ChangeEvent::CategoriesChanged
                | ChangeEvent::RemoteChange
        )
    }

    async fn refresh(&self) -> Result<usize> {
        debug!("Refreshing savings store...");
        let savings = get_all_savings(self.db.as_ref()).await?;
        let mut writer = self.savings.write().await;
        *writer = savings;
        info!("Savings store refreshed with {} items.", writer.len());
        Ok(writer.len())
    }
}

/// Snapshot of every goal, most recently started first.
#[derive(Debug, Clone)]
pub struct GoalsStore {
    db: Arc<DatabaseConnection>,
    goals: Arc<RwLock<Vec<goal::Model>>>,
}

impl GoalsStore {
    /// Creates an empty store. Call [`Refresh::refresh`] to load it.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            goals: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// A copy of the current snapshot.
    pub async fn snapshot(&self) -> Vec<goal::Model> {
        self.goals.read().await.clone()
    }

    /// Number of goals in the snapshot.
    pub async fn len(&self) -> usize {
        self.goals.read().await.len()
    }

    /// Whether the snapshot is empty.
    pub async fn is_empty(&self) -> bool {
        self.goals.read().await.is_empty()
    }
}

#[async_trait]
impl Refresh for GoalsStore {
    fn name(&self) -> &'static str {
        "goals"
    }

    fn interested_in(&self, event: ChangeEvent) -> bool {
        matches!(event, ChangeEvent::GoalsChanged | ChangeEvent::RemoteChange)
    }

    async fn refresh(&self) -> Result<usize> {
        debug!("Refreshing goals store...");
        let goals = get_all_goals(self.db.as_ref()).await?;
        let mut writer = self.goals.write().await;
        *writer = goals;
        info!("Goals store refreshed with {} items.", writer.len());
        Ok(writer.len())
    }
}

async fn refresh_logged<S>(store: &S)
where
    S: Refresh + ?Sized,
{
    if let Err(e) = store.refresh().await {
        warn!("Failed to refresh {} store: {}", store.name(), e);
    }
}

/// Spawns a task that refreshes `store` on every relevant event.
///
/// A lagged subscriber may have missed anything, so it refreshes
/// unconditionally. The task ends when the bus is dropped.
pub fn spawn_watcher<S>(store: Arc<S>, bus: &EventBus) -> JoinHandle<()>
where
    S: Refresh + 'static,
{
    let mut rx = bus.subscribe();

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if event == ChangeEvent::RemoteChange || store.interested_in(event) {
                        trace!("{} store handling {:?}", store.name(), event);
                        refresh_logged(store.as_ref()).await;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "{} store missed {} events, refreshing",
                        store.name(),
                        skipped
                    );
                    refresh_logged(store.as_ref()).await;
                }
                Err(RecvError::Closed) => {
                    debug!("Event bus closed, stopping {} watcher", store.name());
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use std::time::Duration;

    async fn wait_until<F, Fut>(mut condition: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..100 {
            if condition().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_refresh_populates_snapshots() -> Result<()> {
        let (db, goal) = setup_with_goal(100.0).await?;
        create_test_saving(&db, "Coffee", 5.0, Some(goal.id)).await?;
        create_test_saving(&db, "Lunch", 9.0, None).await?;

        let db = Arc::new(db);
        let savings = SavingsStore::new(Arc::clone(&db));
        let goals = GoalsStore::new(db);
        assert!(savings.is_empty().await);

        assert_eq!(savings.refresh().await?, 2);
        assert_eq!(goals.refresh().await?, 1);
        assert_eq!(goals.snapshot().await[0].id, goal.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_watcher_refreshes_on_matching_event() -> Result<()> {
        init_test_tracing();
        let db = Arc::new(setup_test_db().await?);
        let bus = EventBus::new(8);
        let store = Arc::new(SavingsStore::new(Arc::clone(&db)));
        let handle = spawn_watcher(Arc::clone(&store), &bus);

        create_test_saving(&db, "Coffee", 5.0, None).await?;
        bus.publish(ChangeEvent::SavingsChanged);

        let watched = Arc::clone(&store);
        assert!(
            wait_until(move || {
                let store = Arc::clone(&watched);
                async move { store.len().await == 1 }
            })
            .await
        );
        handle.abort();
        Ok(())
    }

    #[tokio::test]
    async fn test_goals_store_ignores_unrelated_events() -> Result<()> {
        let db = setup_test_db().await?;
        let store = GoalsStore::new(Arc::new(db));

        assert!(store.interested_in(ChangeEvent::GoalsChanged));
        assert!(store.interested_in(ChangeEvent::RemoteChange));
        assert!(!store.interested_in(ChangeEvent::SavingsChanged));
        assert!(!store.interested_in(ChangeEvent::EntitlementsChanged));
        Ok(())
    }

    #[tokio::test]
    async fn test_remote_change_refreshes_goals() -> Result<()> {
        let db = Arc::new(setup_test_db().await?);
        let bus = EventBus::new(8);
        let store = Arc::new(GoalsStore::new(Arc::clone(&db)));
        let handle = spawn_watcher(Arc::clone(&store), &bus);

        create_test_goal(&db, "Bike", 100.0).await?;
        bus.publish(ChangeEvent::RemoteChange);

        let watched = Arc::clone(&store);
        assert!(
            wait_until(move || {
                let store = Arc::clone(&watched);
                async move { store.len().await == 1 }
            })
            .await
        );
        handle.abort();
        Ok(())
    }

    #[tokio::test]
    async fn test_lagged_watcher_refreshes_everything() -> Result<()> {
        init_test_tracing();
        let db = Arc::new(setup_test_db().await?);
        let bus = EventBus::new(1);
        let store = Arc::new(GoalsStore::new(Arc::clone(&db)));
        let handle = spawn_watcher(Arc::clone(&store), &bus);

        create_test_goal(&db, "Bike", 100.0).await?;
        // Goals ignore these, but overflowing the channel makes the watcher lag.
        for _ in 0..5 {
            bus.publish(ChangeEvent::SavingsChanged);
        }

        let watched = Arc::clone(&store);
        assert!(
            wait_until(move || {
                let store = Arc::clone(&watched);
                async move { store.len().await == 1 }
            })
            .await
        );
        handle.abort();
        Ok(())
    }
}
