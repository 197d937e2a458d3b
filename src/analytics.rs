//! Completion statistics for one user.
//!
//! Counts look only at status and completion date, so archived tasks still
//! count towards history.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::{error::Result, store::TaskRepository};

pub const SERIES_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    /// `dd.mm`
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionStats {
    pub this_week: i64,
    pub this_month: i64,
    /// Oldest first, ending with `today`.
    pub daily: Vec<DailyCount>,
}

pub fn start_of_week(today: NaiveDate) -> NaiveDate {
    today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
}

pub fn start_of_month(today: NaiveDate) -> NaiveDate {
    today.with_day(1).unwrap_or(today)
}

pub async fn completion_stats(
    tasks: &TaskRepository,
    user_id: i64,
    today: NaiveDate,
) -> Result<CompletionStats> {
    let this_week = tasks
        .count_completed_between(user_id, start_of_week(today), today)
        .await?;
    let this_month = tasks
        .count_completed_between(user_id, start_of_month(today), today)
        .await?;

    let first_day = today - Duration::days(SERIES_DAYS - 1);
    let per_day = tasks.completions_by_day(user_id, first_day, today).await?;

    Ok(CompletionStats {
        this_week,
        this_month,
        daily: fill_series(first_day, today, per_day),
    })
}

/// Expand sparse per-day counts into one entry per day, zero-filled.
fn fill_series(from: NaiveDate, to: NaiveDate, counts: Vec<(NaiveDate, i64)>) -> Vec<DailyCount> {
    let counts: HashMap<NaiveDate, i64> = counts.into_iter().collect();
    from.iter_days()
        .take_while(|date| *date <= to)
        .map(|date| DailyCount {
            date,
            label: date.format("%d.%m").to_string(),
            count: counts.get(&date).copied().unwrap_or(0),
        })
        .collect()
}
