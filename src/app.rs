//! Application service.
//!
//! [`App`] is the single entry point for user actions. Every create action
//! runs the free tier gate first, then form validation, then persistence, and
//! finally publishes a [`ChangeEvent`] so stores and views can re-fetch.
//! Nothing here is global: the database, settings, event bus and entitlement
//! handle are all passed in.

use crate::{
    config::Settings,
    core::{
        aggregator::{self, SavingFilter, SavingSort},
        category::{
            CategoryFilter, create_custom_category, delete_custom_category, get_all_categories,
            get_category_by_id,
        },
        dashboard::{DashboardSummary, generate_dashboard},
        entitlement::{self, EntitlementState, GateDecision, GatedAction, UsageCounts},
        goal::{
            GoalUpdate, NewGoal, create_goal, delete_goal, get_all_goals, set_goal_completed,
            update_goal,
        },
        progress::{self, CompletionFilter, GoalOverview, GoalProgress, GoalSort},
        saving::{
            NewSaving, create_saving, delete_saving, get_all_savings, get_saving_by_id,
            update_saving,
        },
        sync::{CategorySyncReport, sync_categories, sync_interval},
        validation::{self, GoalForm, SavingForm, ValidationResult},
    },
    entities::{category, goal, saving},
    errors::{Error, Result},
    events::{ChangeEvent, EventBus},
    purchases::EntitlementHandle,
    remote::{PolicyDocument, RemoteConfigSource},
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Bounds of the pause between two background sync checks.
const MIN_SYNC_CHECK: Duration = Duration::from_secs(60);
const MAX_SYNC_CHECK: Duration = Duration::from_secs(24 * 60 * 60);

fn parse_validated(input: &str) -> Result<f64> {
    validation::parse_amount(input).ok_or_else(|| Error::Validation {
        message: format!("Invalid amount: {input}"),
    })
}

/// Dependency-injected facade over the core modules.
#[derive(Debug, Clone)]
pub struct App {
    db: Arc<DatabaseConnection>,
    settings: Arc<Settings>,
    bus: EventBus,
    entitlements: EntitlementHandle,
}

impl App {
    /// Wires an application service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        settings: Arc<Settings>,
        bus: EventBus,
        entitlements: EntitlementHandle,
    ) -> Self {
        Self {
            db,
            settings,
            bus,
            entitlements,
        }
    }

    /// The database connection.
    #[must_use]
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// The loaded settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The event bus mutations are published on.
    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The latest entitlement state.
    #[must_use]
    pub fn entitlement_state(&self) -> EntitlementState {
        self.entitlements.current()
    }

    /// Current counts of gated records.
    pub async fn usage(&self) -> Result<UsageCounts> {
        entitlement::current_usage(self.db()).await
    }

    /// Gates `action` against the free tier caps and the entitlement state.
    pub async fn check_action(&self, action: GatedAction) -> Result<GateDecision> {
        let counts = self.usage().await?;
        let decision = entitlement::check(
            action,
            &counts,
            &self.settings.limits,
            &self.entitlements.current(),
        );

        if let GateDecision::RequireUpgrade { limit, current, .. } = decision {
            info!("Upgrade required to {action}: {current} of {limit} in use");
        }
        Ok(decision)
    }

    async fn progress_for(&self, goal_id: Option<i64>) -> Result<Option<GoalProgress>> {
        match goal_id {
            Some(id) => Ok(Some(progress::goal_progress(self.db(), id).await?)),
            None => Ok(None),
        }
    }

    /// Validates a saving form against the selected goal's remaining balance.
    ///
    /// `editing` is the id of the saving being edited, if any.
    pub async fn validate_saving_form(
        &self,
        form: &SavingForm,
        editing: Option<i64>,
    ) -> Result<ValidationResult> {
        let existing = match editing {
            Some(id) => Some(self.load_saving(id).await?),
            None => None,
        };
        self.validate_saving_against(form, existing.as_ref()).await
    }

    async fn load_saving(&self, saving_id: i64) -> Result<saving::Model> {
        get_saving_by_id(self.db(), saving_id)
            .await?
            .ok_or(Error::SavingNotFound { id: saving_id })
    }

    async fn validate_saving_against(
        &self,
        form: &SavingForm,
        existing: Option<&saving::Model>,
    ) -> Result<ValidationResult> {
        // A category deleted meanwhile counts as no selection.
        let category_id = match form.category_id {
            Some(id) => get_category_by_id(self.db(), id).await?.map(|c| c.id),
            None => None,
        };
        let checked = SavingForm {
            category_id,
            ..form.clone()
        };

        let goal = self.progress_for(form.goal_id).await?;
        Ok(validation::validate_saving(&checked, goal.as_ref(), existing))
    }

    /// Validates a goal form. `editing` is the id of the goal being edited, if any.
    pub async fn validate_goal_form(
        &self,
        form: &GoalForm,
        editing: Option<i64>,
    ) -> Result<ValidationResult> {
        let current = match editing {
            Some(id) => Some(progress::goal_progress(self.db(), id).await?.current),
            None => None,
        };
        Ok(validation::validate_goal(form, current))
    }

    /// An empty date falls back to `default_date`, or to now when that is empty too.
    fn new_saving(form: &SavingForm, default_date: Option<DateTime<Utc>>) -> Result<NewSaving> {
        Ok(NewSaving {
            name: form.name.clone(),
            amount: parse_validated(&form.amount)?,
            date: Some(form.date.or(default_date).unwrap_or_else(Utc::now)),
            note: form.note.clone(),
            category_id: form.category_id,
            goal_id: form.goal_id,
        })
    }

    /// Logs a new saving.
    pub async fn add_saving(&self, form: &SavingForm) -> Result<saving::Model> {
        self.check_action(GatedAction::CreateSaving)
            .await?
            .into_result()?;
        self.validate_saving_against(form, None)
            .await?
            .into_result()?;

        let saving = create_saving(self.db(), Self::new_saving(form, None)?).await?;
        info!("Saving {} logged: {} ({})", saving.id, saving.name, saving.amount);
        self.bus.publish(ChangeEvent::SavingsChanged);
        Ok(saving)
    }

    /// Edits an existing saving.
    pub async fn edit_saving(&self, saving_id: i64, form: &SavingForm) -> Result<saving::Model> {
        let existing = self.load_saving(saving_id).await?;
        self.validate_saving_against(form, Some(&existing))
            .await?
            .into_result()?;

        let changes = Self::new_saving(form, existing.date)?;
        let saving = update_saving(self.db(), saving_id, changes).await?;
        debug!("Saving {} updated", saving.id);
        self.bus.publish(ChangeEvent::SavingsChanged);
        Ok(saving)
    }

    /// Deletes a saving.
    pub async fn remove_saving(&self, saving_id: i64) -> Result<()> {
        delete_saving(self.db(), saving_id).await?;
        debug!("Saving {saving_id} deleted");
        self.bus.publish(ChangeEvent::SavingsChanged);
        Ok(())
    }

    /// Starts a new goal.
    pub async fn add_goal(&self, form: &GoalForm) -> Result<goal::Model> {
        self.check_action(GatedAction::CreateGoal)
            .await?
            .into_result()?;
        self.validate_goal_form(form, None).await?.into_result()?;

        let goal = create_goal(
            self.db(),
            NewGoal {
                name: form.name.clone(),
                target_amount: parse_validated(&form.target_amount)?,
                note: form.note.clone(),
                date_started: None,
            },
        )
        .await?;
        info!("Goal {} started: {} ({})", goal.id, goal.name, goal.target_amount);
        self.bus.publish(ChangeEvent::GoalsChanged);
        Ok(goal)
    }

    /// Edits a goal. The target may not drop below what is already saved.
    pub async fn edit_goal(&self, goal_id: i64, form: &GoalForm) -> Result<goal::Model> {
        self.validate_goal_form(form, Some(goal_id))
            .await?
            .into_result()?;

        let goal = update_goal(
            self.db(),
            goal_id,
            GoalUpdate {
                name: form.name.clone(),
                target_amount: parse_validated(&form.target_amount)?,
                note: form.note.clone(),
                completed: form.completed,
            },
        )
        .await?;
        debug!("Goal {} updated", goal.id);
        self.bus.publish(ChangeEvent::GoalsChanged);
        Ok(goal)
    }

    /// Sets or clears the manual completion flag of a goal.
    pub async fn set_goal_completed(&self, goal_id: i64, completed: bool) -> Result<goal::Model> {
        let goal = set_goal_completed(self.db(), goal_id, completed).await?;
        self.bus.publish(ChangeEvent::GoalsChanged);
        Ok(goal)
    }

    /// Deletes a goal. Its savings are kept and detached.
    pub async fn remove_goal(&self, goal_id: i64) -> Result<()> {
        delete_goal(self.db(), goal_id).await?;
        debug!("Goal {goal_id} deleted");
        self.bus.publish(ChangeEvent::GoalsChanged);
        Ok(())
    }

    /// Adds a custom category.
    pub async fn add_category(
        &self,
        name: &str,
        icon: &str,
        color: Option<&str>,
    ) -> Result<category::Model> {
        self.check_action(GatedAction::CreateCategory)
            .await?
            .into_result()?;

        let category = create_custom_category(self.db(), name, icon, color).await?;
        info!("Custom category added: {}", category.name);
        self.bus.publish(ChangeEvent::CategoriesChanged);
        Ok(category)
    }

    /// Deletes a custom category. Its savings are kept and detached.
    pub async fn remove_category(&self, category_id: i64) -> Result<()> {
        delete_custom_category(self.db(), category_id).await?;
        self.bus.publish(ChangeEvent::CategoriesChanged);
        Ok(())
    }

    /// Categories matching `filter`, by name.
    pub async fn categories(&self, filter: &CategoryFilter) -> Result<Vec<category::Model>> {
        Ok(filter.apply(get_all_categories(self.db()).await?))
    }

    /// Filtered and sorted savings together with their total.
    pub async fn savings(
        &self,
        filter: &SavingFilter,
        sort: SavingSort,
        now: DateTime<Utc>,
    ) -> Result<(f64, Vec<saving::Model>)> {
        let policy = self.settings.savings.missing_date_policy;
        let all = get_all_savings(self.db()).await?;

        let (total, mut matched) = aggregator::filtered_total(&all, filter, policy, now);
        aggregator::sort_savings(&mut matched, sort, policy, now);
        Ok((total, matched.into_iter().cloned().collect()))
    }

    /// Goals with their progress, filtered by completion and sorted.
    pub async fn goal_overviews(
        &self,
        completion: CompletionFilter,
        sort: GoalSort,
    ) -> Result<Vec<GoalOverview>> {
        let goals = get_all_goals(self.db()).await?;
        let savings = get_all_savings(self.db()).await?;

        let mut overviews: Vec<GoalOverview> = progress::overview(&goals, &savings)
            .into_iter()
            .filter(|o| completion.matches(o))
            .collect();
        progress::sort_goals(&mut overviews, sort);
        Ok(overviews)
    }

    /// Goals a new saving may be applied to.
    pub async fn selectable_goals(&self) -> Result<Vec<GoalOverview>> {
        let goals = get_all_goals(self.db()).await?;
        let savings = get_all_savings(self.db()).await?;
        Ok(progress::selectable_goals(progress::overview(
            &goals, &savings,
        )))
    }

    /// Progress of one goal.
    pub async fn goal_progress(&self, goal_id: i64) -> Result<GoalProgress> {
        progress::goal_progress(self.db(), goal_id).await
    }

    /// The dashboard as of `now`.
    pub async fn dashboard(&self, now: DateTime<Utc>) -> Result<DashboardSummary> {
        generate_dashboard(
            self.db(),
            self.settings.savings.missing_date_policy,
            now,
            None,
        )
        .await
    }

    /// Runs the remote category sync when it is due.
    ///
    /// Failures are logged and swallowed; the local categories stay as they were.
    pub async fn sync_categories_if_due(
        &self,
        source: &dyn RemoteConfigSource,
        now: DateTime<Utc>,
    ) -> Option<CategorySyncReport> {
        match sync_categories(self.db(), source, &self.settings.remote, now).await {
            Ok(Some(report)) => {
                if report.has_changes() {
                    self.bus.publish(ChangeEvent::CategoriesChanged);
                }
                Some(report)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Category sync failed: {e}");
                None
            }
        }
    }

    /// Fetches the privacy policy.
    pub async fn privacy_policy(&self, source: &dyn RemoteConfigSource) -> Result<PolicyDocument> {
        source
            .fetch_policy()
            .await
            .inspect_err(|e| warn!("Failed to fetch privacy policy: {e}"))
    }
}

/// Spawns a task that checks periodically whether a category sync is due.
///
/// The first check runs immediately.
pub fn spawn_category_sync(app: App, source: Arc<dyn RemoteConfigSource>) -> JoinHandle<()> {
    let hours = app.settings.remote.sync_interval_hours;
    let period = sync_interval(hours)
        .to_std()
        .unwrap_or(MAX_SYNC_CHECK)
        .clamp(MIN_SYNC_CHECK, MAX_SYNC_CHECK);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Some(report) = app.sync_categories_if_due(source.as_ref(), Utc::now()).await {
                debug!("Background category sync finished: {report:?}");
            }
        }
    })
}
