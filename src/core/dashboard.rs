//! Dashboard generation.
//!
//! Builds the home screen numbers from plain snapshots: today, this month and
//! lifetime totals, the per-month bar chart for the current year, one ring per
//! goal and the most recent savings. Everything is returned as structured data
//! plus a few text formatters used by the headless binary's log output.

use crate::{
    core::{
        aggregator::{self, DateRange, MissingDatePolicy, MonthTotal, SavingFilter, SavingSort},
        goal::get_all_goals,
        progress::{self, GoalOverview, GoalProgress, format_progress_bar},
        saving::get_all_savings,
    },
    entities::{goal, saving},
    errors::Result,
};
use chrono::{DateTime, Datelike, Utc};
use sea_orm::ConnectionTrait;
use std::fmt::Write;

/// Number of recent savings shown when the caller does not ask for a count.
pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// One goal completion ring.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalRing {
    /// Goal id
    pub goal_id: i64,
    /// Goal name
    pub name: String,
    /// Derived progress
    pub progress: GoalProgress,
}

impl From<&GoalOverview> for GoalRing {
    fn from(overview: &GoalOverview) -> Self {
        Self {
            goal_id: overview.goal.id,
            name: overview.goal.name.clone(),
            progress: overview.progress.clone(),
        }
    }
}

/// Everything the dashboard shows.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    /// Sum of savings dated today
    pub today_total: f64,
    /// Sum of savings dated this calendar month
    pub month_total: f64,
    /// Sum of every saving
    pub lifetime_total: f64,
    /// Label such as "October 2026"
    pub month_label: String,
    /// Twelve monthly buckets of the current year
    pub monthly_bars: Vec<MonthTotal>,
    /// One ring per goal, newest goal first
    pub goal_rings: Vec<GoalRing>,
    /// Newest savings first
    pub recent_savings: Vec<saving::Model>,
    /// Number of savings on record
    pub saving_count: usize,
}

/// Builds a dashboard from snapshots.
#[must_use]
pub fn build_dashboard(
    savings: &[saving::Model],
    goals: &[goal::Model],
    policy: MissingDatePolicy,
    now: DateTime<Utc>,
    recent_limit: Option<usize>,
) -> DashboardSummary {
    let today = SavingFilter::all().in_range(DateRange::day(now.date_naive()));
    let (today_total, _) = aggregator::filtered_total(savings, &today, policy, now);

    let month_total = DateRange::month(now.year(), now.month()).map_or(0.0, |range| {
        let this_month = SavingFilter::all().in_range(range);
        aggregator::filtered_total(savings, &this_month, policy, now).0
    });

    let mut recent: Vec<&saving::Model> = savings.iter().collect();
    aggregator::sort_savings(&mut recent, SavingSort::DateDesc, policy, now);
    let recent_savings = recent
        .into_iter()
        .take(recent_limit.unwrap_or(DEFAULT_RECENT_LIMIT))
        .cloned()
        .collect();

    let goal_rings = progress::overview(goals, savings)
        .iter()
        .map(GoalRing::from)
        .collect();

    DashboardSummary {
        today_total,
        month_total,
        lifetime_total: aggregator::sum(savings),
        month_label: now.format("%B %Y").to_string(),
        monthly_bars: aggregator::monthly_totals(savings, now.year(), policy, now),
        goal_rings,
        recent_savings,
        saving_count: savings.len(),
    }
}

/// Loads savings and goals and builds the dashboard.
pub async fn generate_dashboard<C>(
    db: &C,
    policy: MissingDatePolicy,
    now: DateTime<Utc>,
    recent_limit: Option<usize>,
) -> Result<DashboardSummary>
where
    C: ConnectionTrait,
{
    let savings = get_all_savings(db).await?;
    let goals = get_all_goals(db).await?;
    Ok(build_dashboard(&savings, &goals, policy, now, recent_limit))
}

/// Formats a money amount like "$12.34".
#[must_use]
pub fn format_amount(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", amount.abs())
    } else {
        format!("${amount:.2}")
    }
}

/// Multi-line plain text rendering of a dashboard.
#[must_use]
pub fn format_dashboard_summary(summary: &DashboardSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Today: {}", format_amount(summary.today_total));
    let _ = writeln!(
        out,
        "{}: {}",
        summary.month_label,
        format_amount(summary.month_total)
    );
    let _ = writeln!(
        out,
        "Lifetime: {} across {} savings",
        format_amount(summary.lifetime_total),
        summary.saving_count
    );

    for ring in &summary.goal_rings {
        let bar = format_progress_bar(&ring.progress, None);
        let mark = if ring.progress.is_complete { " (complete)" } else { "" };
        let _ = writeln!(out, "{} {bar}{mark}", ring.name);
    }

    out.trim_end().to_string()
}
