//! Form validation for new and edited savings and goals.
//!
//! Validation never fails with an error. It returns a [`ValidationResult`]
//! that drives the enabled state of the save button and the inline error
//! text, and the first failing rule determines the message.

use crate::{
    core::progress::GoalProgress,
    entities::saving,
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};

/// Tolerance used when comparing an amount against a remaining balance.
const AMOUNT_EPSILON: f64 = 1e-9;

/// Outcome of validating a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the form can be saved
    pub valid: bool,
    /// Inline error text, set when `valid` is false
    pub message: Option<String>,
}

impl ValidationResult {
    /// A passing result.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            valid: true,
            message: None,
        }
    }

    /// A failing result with `message`.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
        }
    }

    /// Converts a failing result into [`Error::Validation`].
    pub fn into_result(self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(Error::Validation {
                message: self.message.unwrap_or_default(),
            })
        }
    }
}

/// Raw input of the new/edit saving form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavingForm {
    /// Item name as typed
    pub name: String,
    /// Amount as typed
    pub amount: String,
    /// Selected category
    pub category_id: Option<i64>,
    /// Goal the saving is applied to
    pub goal_id: Option<i64>,
    /// Date of the saving
    pub date: Option<DateTime<Utc>>,
    /// Optional note
    pub note: Option<String>,
}

/// Raw input of the new/edit goal form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalForm {
    /// Goal name as typed
    pub name: String,
    /// Target amount as typed
    pub target_amount: String,
    /// Optional note
    pub note: Option<String>,
    /// Explicit manual completion toggle, when the user touched it
    pub completed: Option<bool>,
}

/// Parses a user-typed amount. Rejects empty, non-numeric and non-finite input.
#[must_use]
pub fn parse_amount(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Validates the saving form.
///
/// `goal` is the progress of the goal selected in the form, if any. A complete
/// goal only keeps the savings it already has. When editing, `editing` is the
/// stored saving; if it already counts toward the same goal its previous
/// amount is available again.
#[must_use]
pub fn validate_saving(
    form: &SavingForm,
    goal: Option<&GoalProgress>,
    editing: Option<&saving::Model>,
) -> ValidationResult {
    let Some(amount) = parse_amount(&form.amount) else {
        return ValidationResult::invalid("Please enter a valid amount.");
    };

    if amount <= 0.0 {
        return ValidationResult::invalid("Amount must be greater than zero.");
    }

    if form.name.trim().is_empty() {
        return ValidationResult::invalid("Please enter a name for the saving.");
    }

    if form.category_id.is_none() {
        return ValidationResult::invalid("Please select a category.");
    }

    if let Some(goal) = goal {
        let already_on_goal = editing.filter(|s| s.goal_id == Some(goal.goal_id));
        if goal.is_complete && already_on_goal.is_none() {
            return ValidationResult::invalid("This goal is already complete.");
        }

        let already_counted = already_on_goal.map_or(0.0, |s| s.amount);
        let remaining = (goal.target - goal.current + already_counted).max(0.0);

        if amount - remaining > AMOUNT_EPSILON {
            return ValidationResult::invalid(format!(
                "Amount exceeds the remaining goal amount. Maximum allowed: {remaining:.2}"
            ));
        }
    }

    ValidationResult::ok()
}

/// Validates the goal form.
///
/// `current_savings` is the aggregated amount of the goal being edited and
/// `None` for a new goal.
#[must_use]
pub fn validate_goal(form: &GoalForm, current_savings: Option<f64>) -> ValidationResult {
    let Some(target) = parse_amount(&form.target_amount) else {
        return ValidationResult::invalid("Please enter a valid target amount.");
    };

    if target <= 0.0 {
        return ValidationResult::invalid("Target amount must be greater than zero.");
    }

    if form.name.trim().is_empty() {
        return ValidationResult::invalid("Please enter a name for the goal.");
    }

    if let Some(current) = current_savings
        && current - target > AMOUNT_EPSILON
    {
        return ValidationResult::invalid(format!(
            "Target amount cannot be less than the current savings ({current:.2})."
        ));
    }

    ValidationResult::ok()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn saving_form(amount: &str, name: &str, category_id: Option<i64>) -> SavingForm {
        SavingForm {
            name: name.to_string(),
            amount: amount.to_string(),
            category_id,
            ..SavingForm::default()
        }
    }

    fn goal_form(target: &str, name: &str) -> GoalForm {
        GoalForm {
            name: name.to_string(),
            target_amount: target.to_string(),
            ..GoalForm::default()
        }
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("10.50"), Some(10.5));
        assert_eq!(parse_amount(" 3 "), Some(3.0));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("inf"), None);
        assert_eq!(parse_amount("NaN"), None);
    }

    #[test]
    fn test_saving_rejects_bad_input() {
        let zero = validate_saving(&saving_form("0", "Coffee", Some(1)), None, None);
        assert_eq!(zero.message.as_deref(), Some("Amount must be greater than zero."));

        let negative = validate_saving(&saving_form("-5", "Coffee", Some(1)), None, None);
        assert!(!negative.valid);

        let text = validate_saving(&saving_form("abc", "Coffee", Some(1)), None, None);
        assert_eq!(text.message.as_deref(), Some("Please enter a valid amount."));

        let no_name = validate_saving(&saving_form("10", "", Some(1)), None, None);
        assert_eq!(no_name.message.as_deref(), Some("Please enter a name for the saving."));

        let blank_name = validate_saving(&saving_form("10", "   ", Some(1)), None, None);
        assert!(!blank_name.valid);

        let no_category = validate_saving(&saving_form("10", "Coffee", None), None, None);
        assert_eq!(no_category.message.as_deref(), Some("Please select a category."));
    }

    #[test]
    fn test_saving_accepts_valid_form_without_goal() {
        let result = validate_saving(&saving_form("10.50", "Coffee", Some(1)), None, None);
        assert_eq!(result, ValidationResult::ok());
    }

    #[test]
    fn test_saving_checks_remaining_goal_balance() {
        let goal = GoalProgress::from_amounts(7, 50.0, 40.0, false);

        let mut form = saving_form("15", "Coffee", Some(1));
        form.goal_id = Some(7);
        let rejected = validate_saving(&form, Some(&goal), None);
        assert!(!rejected.valid);
        assert_eq!(
            rejected.message.as_deref(),
            Some("Amount exceeds the remaining goal amount. Maximum allowed: 10.00")
        );

        form.amount = "10".to_string();
        assert!(validate_saving(&form, Some(&goal), None).valid);
    }

    #[test]
    fn test_editing_saving_on_same_goal_reuses_its_amount() {
        let goal = GoalProgress::from_amounts(7, 50.0, 40.0, false);
        let stored = saving::Model {
            id: 1,
            name: "Lunch".to_string(),
            amount: 20.0,
            date: None,
            note: None,
            category_id: Some(1),
            goal_id: Some(7),
        };

        let mut form = saving_form("30", "Lunch", Some(1));
        form.goal_id = Some(7);
        assert!(validate_saving(&form, Some(&goal), Some(&stored)).valid);

        form.amount = "30.01".to_string();
        let rejected = validate_saving(&form, Some(&goal), Some(&stored));
        assert_eq!(
            rejected.message.as_deref(),
            Some("Amount exceeds the remaining goal amount. Maximum allowed: 30.00")
        );
    }

    #[test]
    fn test_complete_goal_takes_no_new_savings() {
        let marked = GoalProgress::from_amounts(7, 100.0, 20.0, true);
        let mut form = saving_form("5", "Coffee", Some(1));
        form.goal_id = Some(7);

        let rejected = validate_saving(&form, Some(&marked), None);
        assert_eq!(rejected.message.as_deref(), Some("This goal is already complete."));

        let moved = saving::Model {
            id: 1,
            name: "Coffee".to_string(),
            amount: 5.0,
            date: None,
            note: None,
            category_id: Some(1),
            goal_id: None,
        };
        assert!(!validate_saving(&form, Some(&marked), Some(&moved)).valid);

        let stays = saving::Model {
            goal_id: Some(7),
            ..moved
        };
        assert!(validate_saving(&form, Some(&marked), Some(&stays)).valid);
    }

    #[test]
    fn test_goal_rejects_bad_input() {
        let text = validate_goal(&goal_form("abc", "Bike"), None);
        assert_eq!(text.message.as_deref(), Some("Please enter a valid target amount."));

        let zero = validate_goal(&goal_form("0", "Bike"), None);
        assert_eq!(zero.message.as_deref(), Some("Target amount must be greater than zero."));

        let no_name = validate_goal(&goal_form("100", ""), None);
        assert_eq!(no_name.message.as_deref(), Some("Please enter a name for the goal."));

        assert!(validate_goal(&goal_form("100", "Bike"), None).valid);
    }

    #[test]
    fn test_goal_edit_cannot_drop_below_current_savings() {
        let rejected = validate_goal(&goal_form("30", "Bike"), Some(40.0));
        assert_eq!(
            rejected.message.as_deref(),
            Some("Target amount cannot be less than the current savings (40.00).")
        );

        assert!(validate_goal(&goal_form("40", "Bike"), Some(40.0)).valid);
        assert!(validate_goal(&goal_form("60", "Bike"), Some(40.0)).valid);
    }

    #[test]
    fn test_into_result() {
        assert!(ValidationResult::ok().into_result().is_ok());
        let err = ValidationResult::invalid("nope").into_result().unwrap_err();
        assert!(matches!(err, Error::Validation { message } if message == "nope"));
    }
}
