// Reminder commands

use clap::Subcommand;
use rusqlite::Connection;
use crate::auth::validate_email;
use crate::cli::commands::{confirm, load_task, print_json, Ledger};
use crate::cli::error::{user_error, validate_id, validate_task_id};
use crate::cli::output::{format_datetime, format_reminder_list};
use crate::models::{Reminder, Task};
use crate::repo::{ReminderRepo, Scope, TaskRepo, UserRepo};
use crate::utils::{day_bounds, local_day, parse_date_expr_at, parse_duration, to_local};
use anyhow::{anyhow, Result};

#[derive(Subcommand)]
pub enum RemindCommands {
    /// Add a reminder to a task
    Add {
        /// Task ID
        task_id: String,
        /// When to remind: a date expression (e.g., "tomorrow", "14:30", "+2h")
        /// or an offset from the due time (e.g., "due-1h", "due")
        #[arg(allow_hyphen_values = true)]
        when: String,
        /// Notification email (defaults to the logged-in user's email)
        #[arg(long)]
        email: Option<String>,
    },
    /// List reminders
    List {
        /// Only reminders of this task
        #[arg(long)]
        task: Option<String>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Change a reminder's time or email
    Modify {
        /// Reminder ID
        reminder_id: String,
        /// New time (same forms as `remind add`)
        #[arg(long, allow_hyphen_values = true)]
        when: Option<String>,
        /// New email; "none" removes it
        #[arg(long)]
        email: Option<String>,
    },
    /// Delete a reminder
    Delete {
        /// Reminder ID
        reminder_id: String,
        /// Delete without confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Show reminders coming up (default: the rest of today)
    Due {
        /// Look ahead this long instead (e.g., "2h", "3d")
        #[arg(long)]
        within: Option<String>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

/// Resolve a reminder time: `due`, `due-<duration>`, `due+<duration>` or a date expression
pub fn resolve_remind_ts(expr: &str, due_ts: Option<i64>, now: i64) -> Result<i64> {
    let expr = expr.trim();
    if let Some(offset) = expr.strip_prefix("due") {
        let due = due_ts.ok_or_else(|| anyhow!("Task has no due date to remind relative to"))?;
        return match offset.chars().next() {
            None => Ok(due),
            Some('-') => Ok(due - parse_duration(&offset[1..])?),
            Some('+') => Ok(due + parse_duration(&offset[1..])?),
            Some(_) => Err(anyhow!("Invalid reminder offset: {}", expr)),
        };
    }
    parse_date_expr_at(expr, to_local(now))
}

/// Email for a new reminder: explicit, else the logged-in user's, else none
fn reminder_email(conn: &Connection, scope: Scope, email: Option<String>) -> Result<Option<String>> {
    match email {
        Some(e) if e.eq_ignore_ascii_case("none") => Ok(None),
        Some(e) => match validate_email(&e) {
            Ok(e) => Ok(Some(e)),
            Err(err) => user_error(&err.to_string()),
        },
        None => match scope.user_id {
            Some(id) => Ok(UserRepo::get_by_id(conn, id)?.map(|u| u.email)),
            None => Ok(None),
        },
    }
}

/// Create a reminder for a task from a `when` expression
pub fn create_task_reminder(
    conn: &Connection,
    scope: Scope,
    task: &Task,
    when: &str,
    email: Option<String>,
) -> Result<Reminder> {
    let task_id = task.id.ok_or_else(|| anyhow!("Task has no id"))?;
    let now = chrono::Utc::now().timestamp();
    let remind_ts = match resolve_remind_ts(when, task.due_ts, now) {
        Ok(ts) => ts,
        Err(e) => user_error(&format!("Invalid reminder time '{}': {}", when, e)),
    };
    if remind_ts < now {
        log::warn!("Reminder for task {} is in the past ({})", task_id, format_datetime(remind_ts));
    }
    let email = reminder_email(conn, scope, email)?;
    ReminderRepo::create(conn, scope, task_id, remind_ts, email)
}

fn load_reminder(conn: &Connection, scope: Scope, id_str: &str) -> Result<Reminder> {
    let id = validate_id(id_str, "Reminder").unwrap_or_else(|e| user_error(&e));
    match ReminderRepo::get_by_id(conn, scope, id)? {
        Some(r) => Ok(r),
        None => user_error(&format!("Reminder {} not found", id)),
    }
}

/// Pair reminders with their task titles
fn with_titles(conn: &Connection, scope: Scope, reminders: Vec<Reminder>) -> Result<Vec<(Reminder, Option<String>)>> {
    reminders
        .into_iter()
        .map(|r| -> Result<(Reminder, Option<String>)> {
            let title = TaskRepo::get_by_id(conn, scope, r.task_id)?.map(|t| t.title);
            Ok((r, title))
        })
        .collect()
}

fn print_reminders(conn: &Connection, scope: Scope, reminders: Vec<Reminder>, json: bool, now: i64) -> Result<()> {
    let rows = with_titles(conn, scope, reminders)?;
    if json {
        let values: Vec<serde_json::Value> = rows
            .iter()
            .map(|(r, title)| -> Result<serde_json::Value> {
                let mut v = serde_json::to_value(r)?;
                if let Some(obj) = v.as_object_mut() {
                    obj.insert("task_title".to_string(), serde_json::json!(title));
                }
                Ok(v)
            })
            .collect::<Result<Vec<_>>>()?;
        return print_json(&values);
    }
    println!("{}", format_reminder_list(&rows, now));
    Ok(())
}

pub fn handle_remind(cmd: RemindCommands) -> Result<()> {
    let ledger = Ledger::open()?;
    let (conn, scope) = (&ledger.conn, ledger.scope);
    let now = chrono::Utc::now().timestamp();

    match cmd {
        RemindCommands::Add { task_id, when, email } => {
            let id = validate_task_id(&task_id).unwrap_or_else(|e| user_error(&e));
            let task = load_task(conn, scope, id)?;
            let r = create_task_reminder(conn, scope, &task, &when, email)?;
            let to = r.email.as_deref().map(|e| format!(" ({})", e)).unwrap_or_default();
            println!(
                "Created reminder {} for task {} at {}{}",
                r.id.unwrap_or(0),
                id,
                format_datetime(r.remind_ts),
                to
            );
            Ok(())
        }
        RemindCommands::List { task, json } => {
            let reminders = match task {
                Some(t) => {
                    let id = validate_task_id(&t).unwrap_or_else(|e| user_error(&e));
                    load_task(conn, scope, id)?;
                    ReminderRepo::list_for_task(conn, id)?
                }
                None => ReminderRepo::list(conn, scope)?,
            };
            print_reminders(conn, scope, reminders, json, now)
        }
        RemindCommands::Modify { reminder_id, when, email } => {
            if when.is_none() && email.is_none() {
                user_error("Nothing to modify. Use --when and/or --email.");
            }
            let reminder = load_reminder(conn, scope, &reminder_id)?;
            let id = reminder.id.unwrap_or(0);
            let remind_ts = match when {
                Some(w) => {
                    let due = TaskRepo::get_by_id(conn, scope, reminder.task_id)?.and_then(|t| t.due_ts);
                    Some(resolve_remind_ts(&w, due, now)
                        .unwrap_or_else(|e| user_error(&format!("Invalid reminder time '{}': {}", w, e))))
                }
                None => None,
            };
            let email = match email {
                Some(e) if e.eq_ignore_ascii_case("none") => Some(None),
                Some(e) => Some(Some(validate_email(&e).unwrap_or_else(|err| user_error(&err.to_string())))),
                None => None,
            };
            ReminderRepo::update(conn, id, remind_ts, email)?;
            println!("Modified reminder {}", id);
            Ok(())
        }
        RemindCommands::Delete { reminder_id, yes } => {
            let reminder = load_reminder(conn, scope, &reminder_id)?;
            let id = reminder.id.unwrap_or(0);
            if !yes && !confirm(&format!("Delete reminder {} ({})?", id, format_datetime(reminder.remind_ts)))? {
                println!("Cancelled.");
                return Ok(());
            }
            ReminderRepo::delete(conn, id)?;
            println!("Deleted reminder {}", id);
            Ok(())
        }
        RemindCommands::Due { within, json } => {
            let until = match within {
                Some(w) => now + parse_duration(&w).unwrap_or_else(|e| user_error(&e.to_string())),
                None => day_bounds(local_day(now))?.1,
            };
            let reminders = ReminderRepo::due_between(conn, scope, now, until)?;
            print_reminders(conn, scope, reminders, json, now)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_to_due() {
        let due = 1_700_000_000;
        assert_eq!(resolve_remind_ts("due", Some(due), 0).unwrap(), due);
        assert_eq!(resolve_remind_ts("due-1h", Some(due), 0).unwrap(), due - 3600);
        assert_eq!(resolve_remind_ts("due+30m", Some(due), 0).unwrap(), due + 1800);
        assert!(resolve_remind_ts("due-1h", None, 0).is_err());
        assert!(resolve_remind_ts("due*2", Some(due), 0).is_err());
    }

    #[test]
    fn test_resolve_date_expression() {
        let now = 1_700_000_000;
        assert_eq!(resolve_remind_ts("+2h", None, now).unwrap(), now + 7200);
        assert!(resolve_remind_ts("someday", None, now).is_err());
    }
}
