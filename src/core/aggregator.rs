//! Savings aggregation - filtering, summing, sorting and monthly buckets.
//!
//! Everything here is a pure function over a slice of saving models. The
//! filter predicates are independent of each other and combine with a logical
//! AND, so the order they are applied in never changes the result.
//!
//! Savings synced from another device may not carry a date. How those records
//! behave under a date filter is decided by [`MissingDatePolicy`] instead of
//! being silently defaulted.

use crate::entities::saving;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use std::cmp::Ordering;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// How savings without a date take part in date-based filtering and sorting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDatePolicy {
    /// Undated savings never match a date filter and sort as oldest
    #[default]
    Exclude,
    /// Undated savings are treated as if they happened at `now`
    TreatAsNow,
}

impl MissingDatePolicy {
    /// Resolves the date used for filtering a saving.
    #[must_use]
    pub fn effective_date(
        self,
        date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match (date, self) {
            (Some(date), _) => Some(date),
            (None, Self::TreatAsNow) => Some(now),
            (None, Self::Exclude) => None,
        }
    }
}

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// Inclusive lower bound
    pub start: DateTime<Utc>,
    /// Exclusive upper bound
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Creates a range from two instants.
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The UTC calendar day containing `date`.
    #[must_use]
    pub fn day(date: NaiveDate) -> Self {
        let start = Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN));
        Self::new(start, start + Duration::days(1))
    }

    /// The UTC calendar month `month` of `year`. Returns `None` for an invalid month.
    #[must_use]
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self::new(
            Utc.from_utc_datetime(&first.and_time(chrono::NaiveTime::MIN)),
            Utc.from_utc_datetime(&next.and_time(chrono::NaiveTime::MIN)),
        ))
    }

    /// Whether `instant` falls inside the range.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// Predicate over savings. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavingFilter {
    /// Only savings dated inside this range
    pub range: Option<DateRange>,
    /// Only savings in this calendar month (1-12) of any year
    pub month: Option<u32>,
    /// Only savings filed under this category
    pub category_id: Option<i64>,
    /// Only savings allocated to this goal
    pub goal_id: Option<i64>,
    /// Case-insensitive substring of the saving name
    pub search: Option<String>,
}

impl SavingFilter {
    /// A filter that matches every saving.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts to a date range.
    #[must_use]
    pub const fn in_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Restricts to a calendar month of any year. `0` means all months.
    #[must_use]
    pub const fn in_month(mut self, month: u32) -> Self {
        self.month = if month == 0 { None } else { Some(month) };
        self
    }

    /// Restricts to one category.
    #[must_use]
    pub const fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Restricts to one goal.
    #[must_use]
    pub const fn with_goal(mut self, goal_id: i64) -> Self {
        self.goal_id = Some(goal_id);
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

    /// Checks a single saving against every set predicate.
    #[must_use]
    pub fn matches(
        &self,
        saving: &saving::Model,
        policy: MissingDatePolicy,
        now: DateTime<Utc>,
    ) -> bool {
        if let Some(category_id) = self.category_id
            && saving.category_id != Some(category_id)
        {
            return false;
        }

        if let Some(goal_id) = self.goal_id
            && saving.goal_id != Some(goal_id)
        {
            return false;
        }

        if let Some(search) = &self.search
            && !saving.name.to_lowercase().contains(search.as_str())
        {
            return false;
        }

        if self.range.is_none() && self.month.is_none() {
            return true;
        }

        let Some(date) = policy.effective_date(saving.date, now) else {
            return false;
        };

        if let Some(range) = &self.range
            && !range.contains(date)
        {
            return false;
        }

        self.month.is_none_or(|month| date.month() == month)
    }
}

/// Total of a set of savings in one calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthTotal {
    /// Month number, 1-12
    pub month: u32,
    /// English month name
    pub name: &'static str,
    /// Sum of savings in the month
    pub amount: f64,
}

/// Sort orders offered by the savings list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SavingSort {
    /// Smallest amount first
    AmountAsc,
    /// Largest amount first
    AmountDesc,
    /// Name A-Z
    NameAsc,
    /// Name Z-A
    NameDesc,
    /// Oldest first
    DateAsc,
    /// Newest first
    #[default]
    DateDesc,
}

/// Sums the amounts of the given savings. Empty input yields `0.0`.
pub fn sum<'a, I>(savings: I) -> f64
where
    I: IntoIterator<Item = &'a saving::Model>,
{
    savings.into_iter().map(|s| s.amount).sum()
}

/// Returns the savings matching `filter`, preserving input order.
#[must_use]
pub fn filter<'a>(
    savings: &'a [saving::Model],
    filter: &SavingFilter,
    policy: MissingDatePolicy,
    now: DateTime<Utc>,
) -> Vec<&'a saving::Model> {
    savings
        .iter()
        .filter(|s| filter.matches(s, policy, now))
        .collect()
}

/// Returns the filtered sum together with the filtered list.
#[must_use]
pub fn filtered_total<'a>(
    savings: &'a [saving::Model],
    saving_filter: &SavingFilter,
    policy: MissingDatePolicy,
    now: DateTime<Utc>,
) -> (f64, Vec<&'a saving::Model>) {
    let matched = filter(savings, saving_filter, policy, now);
    (sum(matched.iter().copied()), matched)
}

/// Buckets savings of `year` by calendar month. Always returns twelve entries.
#[must_use]
pub fn monthly_totals(
    savings: &[saving::Model],
    year: i32,
    policy: MissingDatePolicy,
    now: DateTime<Utc>,
) -> Vec<MonthTotal> {
    let mut totals: Vec<MonthTotal> = MONTH_NAMES
        .iter()
        .zip(1..=12)
        .map(|(name, month)| MonthTotal {
            month,
            name,
            amount: 0.0,
        })
        .collect();

    for saving in savings {
        if let Some(date) = policy.effective_date(saving.date, now)
            && date.year() == year
            && let Some(bucket) = totals.get_mut(date.month0() as usize)
        {
            bucket.amount += saving.amount;
        }
    }

    totals
}

/// Sorts savings in place. Name comparisons ignore case.
pub fn sort_savings(
    savings: &mut [&saving::Model],
    sort: SavingSort,
    policy: MissingDatePolicy,
    now: DateTime<Utc>,
) {
    let by_amount = |a: &&saving::Model, b: &&saving::Model| {
        a.amount.partial_cmp(&b.amount).unwrap_or(Ordering::Equal)
    };
    let by_name = |a: &&saving::Model, b: &&saving::Model| {
        a.name.to_lowercase().cmp(&b.name.to_lowercase())
    };
    let by_date = |a: &&saving::Model, b: &&saving::Model| {
        policy
            .effective_date(a.date, now)
            .cmp(&policy.effective_date(b.date, now))
    };

    match sort {
        SavingSort::AmountAsc => savings.sort_by(by_amount),
        SavingSort::AmountDesc => savings.sort_by(|a, b| by_amount(b, a)),
        SavingSort::NameAsc => savings.sort_by(by_name),
        SavingSort::NameDesc => savings.sort_by(|a, b| by_name(b, a)),
        SavingSort::DateAsc => savings.sort_by(by_date),
        SavingSort::DateDesc => savings.sort_by(|a, b| by_date(b, a)),
    }
}
