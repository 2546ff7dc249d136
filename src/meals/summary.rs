//! Calendar-day windows and aggregates over a user's meals.
//!
//! Days are local to the caller, given as a fixed UTC offset in minutes.

use std::collections::BTreeMap;

use serde::Serialize;
use time::{macros::format_description, Date, Duration, OffsetDateTime, UtcOffset};

use super::repo_types::Meal;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

pub const MAX_RANGE_DAYS: i64 = 366;
pub const MAX_STATS_DAYS: u16 = 365;

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct DailyTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl DailyTotals {
    pub fn add(&mut self, m: &Meal) {
        self.calories += m.calories;
        self.protein += m.protein;
        self.carbs += m.carbs;
        self.fat += m.fat;
    }

    pub fn of<'a>(meals: impl IntoIterator<Item = &'a Meal>) -> Self {
        let mut t = Self::default();
        for m in meals {
            t.add(m);
        }
        t
    }

    /// Per-day mean over `days`; zero when there are no days.
    pub fn average_over(&self, days: usize) -> Self {
        if days == 0 {
            return Self::default();
        }
        let n = days as f64;
        Self {
            calories: self.calories / n,
            protein: self.protein / n,
            carbs: self.carbs / n,
            fat: self.fat / n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde(flatten)]
    pub totals: DailyTotals,
    pub meals: u32,
}

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 9998;
pub const MAX_OFFSET_MINUTES: i32 = 23 * 60 + 59;

pub fn parse_date(s: &str) -> Result<Date, String> {
    let date = Date::parse(s.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| format!("invalid date {s:?}; expected YYYY-MM-DD"))?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        return Err(format!("year must be between {MIN_YEAR} and {MAX_YEAR}"));
    }
    Ok(date)
}

pub fn format_date(d: Date) -> String {
    // `[year]-[month]-[day]` cannot fail for a valid Date
    d.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default()
}

pub fn parse_offset(minutes: Option<i32>) -> Result<UtcOffset, String> {
    let minutes = minutes.unwrap_or(0);
    if !(-MAX_OFFSET_MINUTES..=MAX_OFFSET_MINUTES).contains(&minutes) {
        return Err(format!(
            "tz_offset_minutes must be within ±{MAX_OFFSET_MINUTES}, got {minutes}"
        ));
    }
    UtcOffset::from_whole_seconds(minutes * 60).map_err(|e| e.to_string())
}

/// `[midnight, next midnight)` of `date` at `offset`.
pub fn day_window(
    date: Date,
    offset: UtcOffset,
) -> Result<(OffsetDateTime, OffsetDateTime), String> {
    let start = date.midnight().assume_offset(offset);
    let end = start
        .checked_add(Duration::DAY)
        .ok_or_else(|| format!("date {date} is out of range"))?;
    Ok((start, end))
}

/// Inclusive calendar range `from..=to`.
pub fn range_window(
    from: Date,
    to: Date,
    offset: UtcOffset,
) -> Result<(OffsetDateTime, OffsetDateTime), String> {
    if to < from {
        return Err("`to` must not be before `from`".into());
    }
    if (to - from).whole_days() >= MAX_RANGE_DAYS {
        return Err(format!("range may span at most {MAX_RANGE_DAYS} days"));
    }
    let (start, _) = day_window(from, offset)?;
    let (_, end) = day_window(to, offset)?;
    Ok((start, end))
}

/// The last `days` calendar days at `offset`, today included.
pub fn stats_window(
    now: OffsetDateTime,
    days: u16,
    offset: UtcOffset,
) -> Result<(Date, Date), String> {
    if days == 0 || days > MAX_STATS_DAYS {
        return Err(format!("days must be between 1 and {MAX_STATS_DAYS}"));
    }
    let today = now.to_offset(offset).date();
    let first = today - Duration::days(i64::from(days) - 1);
    Ok((first, today))
}

/// Groups meals by local calendar day, newest day first. Days without meals
/// are omitted.
pub fn summarize_by_day(meals: &[Meal], offset: UtcOffset) -> Vec<DaySummary> {
    let mut by_day: BTreeMap<Date, DaySummary> = BTreeMap::new();
    for m in meals {
        let date = m.created_at.to_offset(offset).date();
        let day = by_day.entry(date).or_insert_with(|| DaySummary {
            date,
            totals: DailyTotals::default(),
            meals: 0,
        });
        day.totals.add(m);
        day.meals += 1;
    }
    by_day.into_values().rev().collect()
}
