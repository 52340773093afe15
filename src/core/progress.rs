//! Goal progress calculation.
//!
//! A goal's current amount is the sum of the savings allocated to it. A goal
//! counts as complete when the user marked it complete or when the current
//! amount reaches the target. The manual flag always wins: a goal can be
//! complete while underfunded, but it can never be incomplete while funded.

use crate::{
    core::aggregator,
    entities::{Goal, Saving, goal, saving},
    errors::{Error, Result},
};
use sea_orm::prelude::*;
use std::cmp::Ordering;

/// Derived progress numbers for one goal.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalProgress {
    /// Goal the numbers belong to
    pub goal_id: i64,
    /// Sum of allocated savings
    pub current: f64,
    /// Target amount of the goal
    pub target: f64,
    /// `max(target - current, 0)`
    pub remaining: f64,
    /// `current / target` clamped to `[0, 1]`; `1.0` when the target is zero
    pub ratio: f64,
    /// The current amount reached the target
    pub reached: bool,
    /// The user marked the goal complete
    pub manual_complete: bool,
    /// `manual_complete || reached`
    pub is_complete: bool,
}

impl GoalProgress {
    /// Computes progress from raw amounts.
    #[must_use]
    pub fn from_amounts(goal_id: i64, target: f64, current: f64, manual_complete: bool) -> Self {
        let reached = target <= 0.0 || current >= target;
        let ratio = if target <= 0.0 {
            1.0
        } else {
            (current / target).clamp(0.0, 1.0)
        };

        Self {
            goal_id,
            current,
            target,
            remaining: (target - current).max(0.0),
            ratio,
            reached,
            manual_complete,
            is_complete: manual_complete || reached,
        }
    }

    /// Display percentage, 0-100.
    #[must_use]
    pub fn percent(&self) -> f64 {
        self.ratio * 100.0
    }
}

/// Computes progress for `goal`, picking its savings out of `savings`.
#[must_use]
pub fn calculate(goal: &goal::Model, savings: &[saving::Model]) -> GoalProgress {
    let current = total_for_goal(goal.id, savings);
    GoalProgress::from_amounts(goal.id, goal.target_amount, current, goal.completed)
}

/// Sum of all savings allocated to `goal_id`.
#[must_use]
pub fn total_for_goal(goal_id: i64, savings: &[saving::Model]) -> f64 {
    aggregator::sum(savings.iter().filter(|s| s.goal_id == Some(goal_id)))
}

/// Loads a goal and its savings and computes its progress.
pub async fn goal_progress(db: &DatabaseConnection, goal_id: i64) -> Result<GoalProgress> {
    let goal = Goal::find_by_id(goal_id)
        .one(db)
        .await?
        .ok_or(Error::GoalNotFound { id: goal_id })?;

    let savings = Saving::find()
        .filter(saving::Column::GoalId.eq(goal_id))
        .all(db)
        .await?;

    Ok(calculate(&goal, &savings))
}

/// A goal paired with its computed progress, as shown in goal lists.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalOverview {
    /// The goal row
    pub goal: goal::Model,
    /// Its derived progress
    pub progress: GoalProgress,
}

/// Pairs every goal with its progress.
#[must_use]
pub fn overview(goals: &[goal::Model], savings: &[saving::Model]) -> Vec<GoalOverview> {
    goals
        .iter()
        .map(|goal| GoalOverview {
            goal: goal.clone(),
            progress: calculate(goal, savings),
        })
        .collect()
}

/// Goals that can still receive a saving: not complete and with money left to reach.
#[must_use]
pub fn selectable_goals(overviews: Vec<GoalOverview>) -> Vec<GoalOverview> {
    overviews
        .into_iter()
        .filter(|o| !o.progress.is_complete && o.progress.remaining > 0.0)
        .collect()
}

/// Completion filter offered by the goal list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompletionFilter {
    /// Every goal
    #[default]
    All,
    /// Only complete goals
    Completed,
    /// Only goals still in progress
    Incomplete,
}

impl CompletionFilter {
    /// Whether `overview` passes the filter.
    #[must_use]
    pub const fn matches(self, overview: &GoalOverview) -> bool {
        match self {
            Self::All => true,
            Self::Completed => overview.progress.is_complete,
            Self::Incomplete => !overview.progress.is_complete,
        }
    }
}

/// Sort orders offered by the goal list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GoalSort {
    /// Smallest target first
    TargetAsc,
    /// Largest target first
    TargetDesc,
    /// Name A-Z
    NameAsc,
    /// Name Z-A
    NameDesc,
    /// Oldest first
    DateAsc,
    /// Newest first
    #[default]
    DateDesc,
    /// Closest to done first
    RemainingAsc,
    /// Furthest from done first
    RemainingDesc,
    /// Complete goals before incomplete ones
    CompletedFirst,
    /// Incomplete goals before complete ones
    IncompleteFirst,
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Sorts goal overviews in place. The sort is stable.
pub fn sort_goals(goals: &mut [GoalOverview], sort: GoalSort) {
    match sort {
        GoalSort::TargetAsc => goals.sort_by(|a, b| cmp_f64(a.goal.target_amount, b.goal.target_amount)),
        GoalSort::TargetDesc => goals.sort_by(|a, b| cmp_f64(b.goal.target_amount, a.goal.target_amount)),
        GoalSort::NameAsc => {
            goals.sort_by(|a, b| a.goal.name.to_lowercase().cmp(&b.goal.name.to_lowercase()));
        }
        GoalSort::NameDesc => {
            goals.sort_by(|a, b| b.goal.name.to_lowercase().cmp(&a.goal.name.to_lowercase()));
        }
        GoalSort::DateAsc => goals.sort_by_key(|o| o.goal.date_started),
        GoalSort::DateDesc => goals.sort_by(|a, b| b.goal.date_started.cmp(&a.goal.date_started)),
        GoalSort::RemainingAsc => {
            goals.sort_by(|a, b| cmp_f64(a.progress.remaining, b.progress.remaining));
        }
        GoalSort::RemainingDesc => {
            goals.sort_by(|a, b| cmp_f64(b.progress.remaining, a.progress.remaining));
        }
        GoalSort::CompletedFirst => goals.sort_by_key(|o| !o.progress.is_complete),
        GoalSort::IncompleteFirst => goals.sort_by_key(|o| o.progress.is_complete),
    }
}

/// Generates a text progress bar like `[████████░░] 80.0%`.
#[must_use]
pub fn format_progress_bar(progress: &GoalProgress, bar_length: Option<usize>) -> String {
    let length = bar_length.unwrap_or(10);

    // ratio is clamped to [0, 1] so the product stays within [0, length]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = (progress.ratio * length as f64).round() as usize;
    let empty = length.saturating_sub(filled);

    format!(
        "[{}{}] {:.1}%",
        "█".repeat(filled),
        "░".repeat(empty),
        progress.percent()
    )
}
