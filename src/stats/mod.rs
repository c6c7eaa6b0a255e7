//! Completion statistics and the dashboard summary
//!
//! Everything here is computed from task and reminder lists already loaded
//! for a scope. Days are local calendar days.

use std::collections::BTreeMap;
use anyhow::{anyhow, Result};
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use crate::models::{Quadrant, Reminder, Task};
use crate::utils::{day_bounds, local_day, start_of_day, to_local};

/// Days looked back when computing streaks
pub const STREAK_WINDOW_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QuadrantCount {
    pub total: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    /// Percentage rounded to one decimal
    pub completion_rate: f64,
    pub by_priority: BTreeMap<&'static str, QuadrantCount>,
}

impl PeriodStats {
    pub fn quadrant(&self, q: Quadrant) -> QuadrantCount {
        self.by_priority.get(q.as_str()).copied().unwrap_or_default()
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Tasks due within `[start, end]`
pub fn period_stats(tasks: &[Task], start: i64, end: i64) -> PeriodStats {
    let in_period: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.due_ts.map_or(false, |due| due >= start && due <= end))
        .collect();
    let total = in_period.len();
    let completed = in_period.iter().filter(|t| t.completed).count();

    let mut by_priority = BTreeMap::new();
    for q in Quadrant::all() {
        let mut count = QuadrantCount::default();
        for task in in_period.iter().filter(|t| t.priority == q) {
            count.total += 1;
            if task.completed {
                count.completed += 1;
            }
        }
        by_priority.insert(q.as_str(), count);
    }

    PeriodStats {
        total,
        completed,
        pending: total - completed,
        completion_rate: (percent(completed, total) * 10.0).round() / 10.0,
        by_priority,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyStat {
    pub date: NaiveDate,
    pub total: usize,
    pub completed: usize,
}

/// Per-day totals for tasks due since `now - days`, oldest day first
///
/// Days with no due tasks are absent.
pub fn daily_stats(tasks: &[Task], now: i64, days: i64) -> Vec<DailyStat> {
    let cutoff = days
        .checked_mul(86_400)
        .and_then(|span| now.checked_sub(span))
        .unwrap_or(i64::MIN);
    let mut by_day: BTreeMap<NaiveDate, DailyStat> = BTreeMap::new();
    for task in tasks {
        let Some(due) = task.due_ts.filter(|due| *due >= cutoff) else {
            continue;
        };
        let date = local_day(due);
        let stat = by_day.entry(date).or_insert(DailyStat { date, total: 0, completed: 0 });
        stat.total += 1;
        if task.completed {
            stat.completed += 1;
        }
    }
    by_day.into_values().collect()
}

/// Weighted score in 0..=100: 70% completion rate, 30% share of days with tasks
///
/// Days due in the future still count towards consistency, capped at every day.
pub fn productivity_score(daily: &[DailyStat], days: i64) -> i64 {
    if daily.is_empty() || days <= 0 {
        return 0;
    }
    let total: usize = daily.iter().map(|d| d.total).sum();
    let completed: usize = daily.iter().map(|d| d.completed).sum();
    let consistency = (daily.len() as f64 / days as f64).min(1.0);
    (percent(completed, total) * 0.7 + consistency * 100.0 * 0.3).round() as i64
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Streak {
    pub current: u32,
    pub max: u32,
}

/// Runs of consecutive days with at least one completed task
///
/// The current streak ends today, or yesterday when nothing has been
/// completed yet today.
pub fn streak(daily: &[DailyStat], today: NaiveDate) -> Streak {
    let active = |day: NaiveDate| daily.iter().any(|d| d.date == day && d.completed > 0);

    let mut max = 0;
    let mut run = 0;
    for offset in (0..STREAK_WINDOW_DAYS).rev() {
        if active(today - Duration::days(offset)) {
            run += 1;
            max = max.max(run);
        } else {
            run = 0;
        }
    }

    let mut current = 0;
    let mut day = if active(today) { today } else { today - Duration::days(1) };
    while current < STREAK_WINDOW_DAYS as u32 && active(day) {
        current += 1;
        day -= Duration::days(1);
    }

    Streak { current, max }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Day,
    Week,
    Month,
    Year,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Day => "day",
            TimeRange::Week => "week",
            TimeRange::Month => "month",
            TimeRange::Year => "year",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" | "today" => Some(TimeRange::Day),
            "week" => Some(TimeRange::Week),
            "month" => Some(TimeRange::Month),
            "year" => Some(TimeRange::Year),
            _ => None,
        }
    }

    /// First local day of the range containing `today`; weeks start on Sunday
    pub fn first_day(&self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            TimeRange::Day => Some(today),
            TimeRange::Week => Some(week_start(today)),
            TimeRange::Month => today.with_day(1),
            TimeRange::Year => NaiveDate::from_ymd_opt(today.year(), 1, 1),
        }
    }
}

fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(day.weekday().num_days_from_sunday() as i64)
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub range: TimeRange,
    pub created_in_range: usize,
    pub completed_in_range: usize,
    /// Whole percent of tasks created in range that are completed
    pub completion_rate: i64,
    pub distribution: BTreeMap<&'static str, usize>,
    pub completed_today: usize,
    pub due_today: usize,
    pub completed_this_week: usize,
    pub overdue: usize,
    pub rolled_tasks: usize,
    pub total_rollovers: i64,
    pub active_reminders: usize,
    pub reminders_today: usize,
}

pub fn dashboard(tasks: &[Task], reminders: &[Reminder], range: TimeRange, now: i64) -> Result<Dashboard> {
    let today = to_local(now).date_naive();
    let first = range
        .first_day(today)
        .ok_or_else(|| anyhow!("Cannot compute {} range for {}", range.as_str(), today))?;
    let range_start = start_of_day(first)?;
    let (today_start, today_end) = day_bounds(today)?;
    let week_from = start_of_day(week_start(today))?;
    let week_to = start_of_day(week_start(today) + Duration::days(7))?;

    let in_range: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.created_ts >= range_start && t.created_ts <= now)
        .collect();
    let created_in_range = in_range.len();
    let completed_in_range = in_range.iter().filter(|t| t.completed).count();

    let mut distribution = BTreeMap::new();
    for q in Quadrant::all() {
        distribution.insert(q.as_str(), tasks.iter().filter(|t| t.priority == q).count());
    }

    let completed_between = |from: i64, to: i64| {
        tasks
            .iter()
            .filter(|t| t.completed && t.completed_ts.map_or(false, |ts| ts >= from && ts < to))
            .count()
    };

    Ok(Dashboard {
        range,
        created_in_range,
        completed_in_range,
        completion_rate: percent(completed_in_range, created_in_range).round() as i64,
        distribution,
        completed_today: completed_between(today_start, today_end),
        due_today: tasks.iter().filter(|t| !t.completed && t.is_due_on(today)).count(),
        completed_this_week: completed_between(week_from, week_to),
        overdue: tasks.iter().filter(|t| t.is_overdue(now)).count(),
        rolled_tasks: tasks.iter().filter(|t| t.rollover_count > 0).count(),
        total_rollovers: tasks.iter().map(|t| t.rollover_count).sum(),
        active_reminders: reminders.iter().filter(|r| r.is_active(now)).count(),
        reminders_today: reminders
            .iter()
            .filter(|r| r.remind_ts >= today_start && r.remind_ts < today_end)
            .count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::local_ts;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn at(day: NaiveDate, h: u32) -> i64 {
        local_ts(&day.and_hms_opt(h, 0, 0).unwrap()).unwrap()
    }

    fn task(priority: Quadrant, due: Option<i64>, completed: bool) -> Task {
        let mut t = Task::new("t".to_string(), priority);
        t.due_ts = due;
        t.completed = completed;
        t.completed_ts = if completed { due } else { None };
        t
    }

    #[test]
    fn test_period_stats() {
        let day = d(2026, 3, 11);
        let tasks = vec![
            task(Quadrant::UrgentImportant, Some(at(day, 9)), true),
            task(Quadrant::UrgentImportant, Some(at(day, 10)), false),
            task(Quadrant::Neither, Some(at(day, 11)), true),
            task(Quadrant::Important, Some(at(d(2026, 4, 1), 9)), true),
            task(Quadrant::Important, None, true),
        ];
        let stats = period_stats(&tasks, at(day, 0), at(day, 23));
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completion_rate, 66.7);
        assert_eq!(stats.quadrant(Quadrant::UrgentImportant), QuadrantCount { total: 2, completed: 1 });
        assert_eq!(stats.quadrant(Quadrant::Important), QuadrantCount::default());
    }

    #[test]
    fn test_period_stats_empty() {
        let stats = period_stats(&[], 0, 100);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.completion_rate, 0.0);
        assert_eq!(stats.by_priority.len(), 4);
    }

    #[test]
    fn test_daily_stats_groups_by_local_day() {
        let today = d(2026, 3, 11);
        let now = at(today, 12);
        let tasks = vec![
            task(Quadrant::Urgent, Some(at(today, 8)), true),
            task(Quadrant::Urgent, Some(at(today, 20)), false),
            task(Quadrant::Urgent, Some(at(d(2026, 3, 9), 8)), true),
            task(Quadrant::Urgent, Some(at(d(2025, 1, 1), 8)), true),
        ];
        let daily = daily_stats(&tasks, now, 7);
        assert_eq!(
            daily,
            vec![
                DailyStat { date: d(2026, 3, 9), total: 1, completed: 1 },
                DailyStat { date: today, total: 2, completed: 1 },
            ]
        );
    }

    #[test]
    fn test_productivity_score() {
        let daily = vec![
            DailyStat { date: d(2026, 3, 9), total: 2, completed: 2 },
            DailyStat { date: d(2026, 3, 10), total: 2, completed: 0 },
        ];
        // rate 50% * 0.7 = 35, consistency 2/10 * 100 * 0.3 = 6
        assert_eq!(productivity_score(&daily, 10), 41);
        assert_eq!(productivity_score(&[], 10), 0);

        // More active days than the window (future due dates) cap at 100
        let busy: Vec<DailyStat> = (1..=5)
            .map(|day| DailyStat { date: d(2026, 3, day), total: 1, completed: 1 })
            .collect();
        assert_eq!(productivity_score(&busy, 2), 100);
    }

    #[test]
    fn test_daily_stats_huge_lookback_keeps_everything() {
        let mut task = Task::new("old".to_string(), Quadrant::UrgentImportant);
        task.due_ts = Some(0);
        let daily = daily_stats(&[task], 1_700_000_000, i64::MAX / 2);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].total, 1);
    }

    #[test]
    fn test_streak() {
        let today = d(2026, 3, 11);
        let stat = |day: u32, completed: usize| DailyStat { date: d(2026, 3, day), total: 1, completed };
        let daily = vec![stat(1, 1), stat(2, 1), stat(3, 1), stat(4, 0), stat(9, 1), stat(10, 1), stat(11, 1)];
        assert_eq!(streak(&daily, today), Streak { current: 3, max: 3 });

        // Nothing done yet today keeps yesterday's run alive
        let daily = vec![stat(1, 1), stat(2, 1), stat(3, 1), stat(4, 1), stat(10, 1)];
        assert_eq!(streak(&daily, today), Streak { current: 1, max: 4 });

        let daily = vec![stat(8, 1)];
        assert_eq!(streak(&daily, today), Streak { current: 0, max: 1 });
    }

    #[test]
    fn test_time_range_first_day() {
        let wed = d(2026, 3, 11);
        assert_eq!(TimeRange::Day.first_day(wed), Some(wed));
        assert_eq!(TimeRange::Week.first_day(wed), Some(d(2026, 3, 8)));
        assert_eq!(TimeRange::Week.first_day(d(2026, 3, 8)), Some(d(2026, 3, 8)));
        assert_eq!(TimeRange::Month.first_day(wed), Some(d(2026, 3, 1)));
        assert_eq!(TimeRange::Year.first_day(wed), Some(d(2026, 1, 1)));
        assert_eq!(TimeRange::from_str("Week"), Some(TimeRange::Week));
        assert_eq!(TimeRange::from_str("decade"), None);
    }

    #[test]
    fn test_dashboard() {
        let today = d(2026, 3, 11);
        let now = at(today, 12);

        let mut done_today = task(Quadrant::UrgentImportant, Some(at(today, 9)), true);
        done_today.created_ts = at(today, 8);
        let mut due_later_today = task(Quadrant::Important, Some(at(today, 18)), false);
        due_later_today.created_ts = at(d(2026, 3, 9), 8);
        let mut overdue = task(Quadrant::Urgent, Some(at(d(2026, 3, 10), 9)), false);
        overdue.created_ts = at(d(2026, 2, 1), 8);
        overdue.rollover_count = 2;
        let mut done_monday = task(Quadrant::Neither, Some(at(d(2026, 3, 9), 9)), true);
        done_monday.created_ts = at(d(2026, 3, 9), 8);
        done_monday.rollover_count = 1;
        let tasks = vec![done_today, due_later_today, overdue, done_monday];

        let reminders = vec![Reminder::new(1, at(today, 9)), Reminder::new(1, at(today, 15)), Reminder::new(2, at(d(2026, 3, 20), 9))];

        let dash = dashboard(&tasks, &reminders, TimeRange::Week, now).unwrap();
        assert_eq!(dash.created_in_range, 3);
        assert_eq!(dash.completed_in_range, 2);
        assert_eq!(dash.completion_rate, 67);
        assert_eq!(dash.distribution["UI"], 1);
        assert_eq!(dash.distribution["NUNI"], 1);
        assert_eq!(dash.completed_today, 1);
        assert_eq!(dash.due_today, 1);
        assert_eq!(dash.completed_this_week, 2);
        assert_eq!(dash.overdue, 1);
        assert_eq!(dash.rolled_tasks, 2);
        assert_eq!(dash.total_rollovers, 3);
        assert_eq!(dash.active_reminders, 2);
        assert_eq!(dash.reminders_today, 2);

        let day = dashboard(&tasks, &reminders, TimeRange::Day, now).unwrap();
        assert_eq!(day.created_in_range, 1);
        assert_eq!(day.completion_rate, 100);
    }
}
