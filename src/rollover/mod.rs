//! Daily rollover of overdue tasks
//!
//! An incomplete task whose due date falls on a local calendar day before
//! today is moved to today, keeping its time of day, and its rollover counter
//! goes up by one. Completed tasks and undated tasks are never touched.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use crate::repo::{Scope, SettingsRepo, TaskRepo};
use crate::utils::date::{local_day, start_of_day, with_day};

/// Settings key (per scope) holding the last local day rollover ran
pub const LAST_ROLLOVER_KEY: &str = "rollover.last";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolloverOutcome {
    /// Ids of tasks moved to today
    pub processed: Vec<i64>,
}

impl RolloverOutcome {
    pub fn count(&self) -> usize {
        self.processed.len()
    }
}

/// Roll every overdue incomplete task in `scope` forward to today
pub fn run(conn: &Connection, scope: Scope, now: i64) -> Result<RolloverOutcome> {
    let today = local_day(now);
    let cutoff = start_of_day(today)?;

    let tx = conn.unchecked_transaction()?;
    let mut outcome = RolloverOutcome::default();
    for task in TaskRepo::overdue(&tx, scope, cutoff)? {
        let (Some(id), Some(due)) = (task.id, task.due_ts) else {
            continue;
        };
        let new_due = with_day(due, today)?;
        TaskRepo::apply_rollover(&tx, id, new_due)?;
        outcome.processed.push(id);
    }
    tx.commit()?;

    if outcome.count() > 0 {
        log::info!("Rolled over {} task(s) to {}", outcome.count(), today);
    }
    Ok(outcome)
}

/// Run rollover at most once per local calendar day
///
/// Returns `None` when rollover already ran today.
pub fn run_daily(conn: &Connection, scope: Scope, now: i64) -> Result<Option<RolloverOutcome>> {
    let today = local_day(now);
    let key = scope.settings_key(LAST_ROLLOVER_KEY);
    if let Some(last) = SettingsRepo::get(conn, &key)? {
        if NaiveDate::parse_from_str(&last, "%Y-%m-%d").map_or(false, |d| d >= today) {
            return Ok(None);
        }
    }
    let outcome = run(conn, scope, now)?;
    SettingsRepo::set(conn, &key, &today.format("%Y-%m-%d").to_string())?;
    Ok(Some(outcome))
}
