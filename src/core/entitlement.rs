//! Free tier gating.
//!
//! [`check`] is a pure function of the usage counts, the configured caps and
//! the entitlement state. It never prompts or purchases anything itself; a
//! [`GateDecision::RequireUpgrade`] only tells the caller to show the upgrade
//! flow instead of the create form.

use crate::{
    entities::{Category, Goal, Saving, category},
    errors::{Error, Result},
};
use sea_orm::{PaginatorTrait, prelude::*};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;

/// Weekly subscription product id
pub const WEEKLY_PRODUCT_ID: &str = "thinkTwiceWeekly";
/// Monthly subscription product id
pub const MONTHLY_PRODUCT_ID: &str = "ThinkTwiceMonthly";
/// Yearly subscription product id
pub const YEARLY_PRODUCT_ID: &str = "ThinkTwiceYearly";
/// One-time lifetime purchase product id
pub const LIFETIME_PRODUCT_ID: &str = "ThinkTwiceLifetime";

/// Every product id the app offers.
pub const PRODUCT_IDS: [&str; 4] = [
    WEEKLY_PRODUCT_ID,
    MONTHLY_PRODUCT_ID,
    YEARLY_PRODUCT_ID,
    LIFETIME_PRODUCT_ID,
];

/// Create actions subject to a free tier cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatedAction {
    /// Log a new saving
    CreateSaving,
    /// Start a new goal
    CreateGoal,
    /// Add a custom category
    CreateCategory,
}

impl fmt::Display for GatedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CreateSaving => "create a saving",
            Self::CreateGoal => "create a goal",
            Self::CreateCategory => "create a custom category",
        };
        f.write_str(text)
    }
}

/// Free tier caps. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FreeTierLimits {
    /// Maximum number of saving records
    pub max_savings: Option<u64>,
    /// Maximum number of goals
    pub max_goals: Option<u64>,
    /// Maximum number of user-created categories
    pub max_custom_categories: Option<u64>,
}

impl Default for FreeTierLimits {
    fn default() -> Self {
        Self {
            max_savings: Some(20),
            max_goals: Some(3),
            max_custom_categories: Some(6),
        }
    }
}

impl FreeTierLimits {
    /// Caps that never deny anything.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_savings: None,
            max_goals: None,
            max_custom_categories: None,
        }
    }

    /// The cap that applies to `action`.
    #[must_use]
    pub const fn limit_for(&self, action: GatedAction) -> Option<u64> {
        match action {
            GatedAction::CreateSaving => self.max_savings,
            GatedAction::CreateGoal => self.max_goals,
            GatedAction::CreateCategory => self.max_custom_categories,
        }
    }
}

/// How many gated records currently exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageCounts {
    /// Saving records
    pub savings: u64,
    /// Goals
    pub goals: u64,
    /// User-created categories
    pub custom_categories: u64,
}

impl UsageCounts {
    /// The count that `action` would increase.
    #[must_use]
    pub const fn count_for(&self, action: GatedAction) -> u64 {
        match action {
            GatedAction::CreateSaving => self.savings,
            GatedAction::CreateGoal => self.goals,
            GatedAction::CreateCategory => self.custom_categories,
        }
    }
}

/// Counts the gated records in the store.
pub async fn current_usage<C>(db: &C) -> Result<UsageCounts>
where
    C: ConnectionTrait,
{
    let savings = Saving::find().count(db).await?;
    let goals = Goal::find().count(db).await?;
    let custom_categories = Category::find()
        .filter(category::Column::IsPredefined.eq(false))
        .count(db)
        .await?;

    Ok(UsageCounts {
        savings,
        goals,
        custom_categories,
    })
}

/// Purchase status, derived from the verified entitlements of the purchase provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementState {
    /// Every verified product id
    pub purchased_product_ids: BTreeSet<String>,
    /// At least one verified entitlement exists
    pub has_active_subscription: bool,
    /// The lifetime product is owned
    pub has_lifetime: bool,
}

impl EntitlementState {
    /// The free tier state.
    #[must_use]
    pub fn free() -> Self {
        Self::default()
    }

    /// Derives the state from a list of verified product ids.
    #[must_use]
    pub fn from_purchased<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let purchased_product_ids: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        let has_lifetime = purchased_product_ids.contains(LIFETIME_PRODUCT_ID);
        Self {
            has_active_subscription: !purchased_product_ids.is_empty(),
            has_lifetime,
            purchased_product_ids,
        }
    }

    /// Whether free tier caps are lifted.
    #[must_use]
    pub const fn is_premium(&self) -> bool {
        self.has_active_subscription || self.has_lifetime
    }
}

/// Result of gating an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Proceed with the action
    Allow,
    /// Show the upgrade flow instead
    RequireUpgrade {
        /// The denied action
        action: GatedAction,
        /// The cap that was hit
        limit: u64,
        /// Records already in use
        current: u64,
    },
}

impl GateDecision {
    /// Whether the action may proceed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Converts a denial into [`Error::UpgradeRequired`].
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Allow => Ok(()),
            Self::RequireUpgrade {
                action,
                limit,
                current,
            } => Err(Error::UpgradeRequired {
                action,
                limit,
                current,
            }),
        }
    }
}

/// Decides whether `action` is allowed. A count equal to the cap denies.
#[must_use]
pub const fn check(
    action: GatedAction,
    counts: &UsageCounts,
    limits: &FreeTierLimits,
    entitlement: &EntitlementState,
) -> GateDecision {
    if entitlement.is_premium() {
        return GateDecision::Allow;
    }

    let current = counts.count_for(action);
    match limits.limit_for(action) {
        Some(limit) if current >= limit => GateDecision::RequireUpgrade {
            action,
            limit,
            current,
        },
        _ => GateDecision::Allow,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn counts(savings: u64, goals: u64, custom_categories: u64) -> UsageCounts {
        UsageCounts {
            savings,
            goals,
            custom_categories,
        }
    }

    #[test]
    fn test_free_tier_denies_goal_at_cap() {
        let limits = FreeTierLimits {
            max_goals: Some(3),
            ..FreeTierLimits::default()
        };
        let decision = check(
            GatedAction::CreateGoal,
            &counts(0, 3, 0),
            &limits,
            &EntitlementState::free(),
        );
        assert_eq!(
            decision,
            GateDecision::RequireUpgrade {
                action: GatedAction::CreateGoal,
                limit: 3,
                current: 3,
            }
        );
        assert!(!decision.is_allowed());
    }

    #[test]
    fn test_free_tier_allows_below_cap() {
        let limits = FreeTierLimits::default();
        let decision = check(
            GatedAction::CreateGoal,
            &counts(0, 2, 0),
            &limits,
            &EntitlementState::free(),
        );
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_subscription_always_allows() {
        let limits = FreeTierLimits {
            max_savings: Some(0),
            max_goals: Some(0),
            max_custom_categories: Some(0),
        };
        let premium = EntitlementState::from_purchased([MONTHLY_PRODUCT_ID]);
        for action in [
            GatedAction::CreateSaving,
            GatedAction::CreateGoal,
            GatedAction::CreateCategory,
        ] {
            assert!(check(action, &counts(1000, 1000, 1000), &limits, &premium).is_allowed());
        }
    }

    #[test]
    fn test_lifetime_detected() {
        let state = EntitlementState::from_purchased([LIFETIME_PRODUCT_ID]);
        assert!(state.has_lifetime);
        assert!(state.is_premium());

        let free = EntitlementState::from_purchased(Vec::<String>::new());
        assert!(!free.has_active_subscription);
        assert!(!free.is_premium());
    }

    #[test]
    fn test_unlimited_caps_allow() {
        let decision = check(
            GatedAction::CreateCategory,
            &counts(0, 0, 500),
            &FreeTierLimits::unlimited(),
            &EntitlementState::free(),
        );
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_denial_converts_to_error() {
        let decision = GateDecision::RequireUpgrade {
            action: GatedAction::CreateSaving,
            limit: 20,
            current: 20,
        };
        let err = decision.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Upgrade required to create a saving: limit of 20 reached (20 in use)"
        );
    }

    #[tokio::test]
    async fn test_current_usage_counts_only_custom_categories() -> Result<()> {
        let (db, goal) = setup_with_goal(100.0).await?;
        create_test_category(&db, "Predefined", true).await?;
        create_test_category(&db, "Mine", false).await?;
        create_test_saving(&db, "Coffee", 5.0, Some(goal.id)).await?;

        let usage = current_usage(&db).await?;
        assert_eq!(usage.savings, 1);
        assert_eq!(usage.goals, 1);
        assert_eq!(usage.custom_categories, 1);
        Ok(())
    }
}
