// Status computation for `focus status`

use crate::auth;
use crate::models::Quadrant;
use crate::repo::{ReminderRepo, Scope, TaskRepo};
use crate::utils::{day_bounds, local_day};
use crate::vault::Vault;
use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    /// Email of the logged-in user, if any
    pub user: Option<String>,
    pub open: usize,
    pub open_by_priority: BTreeMap<&'static str, usize>,
    pub overdue: usize,
    pub due_today: usize,
    pub reminders_today: usize,
    /// `none`, `passphrase` or `recovery`
    pub vault: &'static str,
}

pub fn compute_status(conn: &Connection, scope: Scope, now: i64) -> Result<StatusSummary> {
    let tasks = TaskRepo::list(conn, scope)?;
    let today = local_day(now);
    let (start, end) = day_bounds(today)?;

    let open: Vec<_> = tasks.iter().filter(|t| !t.completed).collect();
    let mut open_by_priority = BTreeMap::new();
    for q in Quadrant::all() {
        open_by_priority.insert(q.as_str(), open.iter().filter(|t| t.priority == q).count());
    }

    let vault = match Vault::open(conn).method()? {
        Some(method) => method.as_str(),
        None => "none",
    };

    Ok(StatusSummary {
        user: auth::current_user(conn)?.map(|u| u.email),
        open: open.len(),
        open_by_priority,
        overdue: open.iter().filter(|t| t.is_overdue(now)).count(),
        due_today: open.iter().filter(|t| t.is_due_on(today)).count(),
        reminders_today: ReminderRepo::due_between(conn, scope, start, end)?.len(),
        vault,
    })
}

/// One line: open tasks per quadrant, then what needs attention today
pub fn format_status_line(status: &StatusSummary) -> String {
    let quadrants: Vec<String> = Quadrant::all()
        .iter()
        .map(|q| format!("{} {}", q.as_str(), status.open_by_priority.get(q.as_str()).copied().unwrap_or(0)))
        .collect();
    format!(
        "Open: {} ({}); Overdue: {}; Due today: {}; Reminders today: {}; User: {}; Vault: {}",
        status.open,
        quadrants.join(", "),
        status.overdue,
        status.due_today,
        status.reminders_today,
        status.user.as_deref().unwrap_or("anonymous"),
        status.vault
    )
}
