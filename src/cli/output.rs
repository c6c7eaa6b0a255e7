// Output formatting utilities

use crate::auth::admin::{UserStats, UserSummary};
use crate::models::{Quadrant, Reminder, Task};
use crate::stats::{DailyStat, Dashboard, PeriodStats, Streak};
use crate::utils::to_local;
use chrono::Local;
use std::io::IsTerminal;

// ANSI escape codes for terminal formatting
const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_RESET: &str = "\x1b[0m";
const ANSI_FG_RED: &str = "\x1b[31m";
const ANSI_FG_GREEN: &str = "\x1b[32m";
const ANSI_FG_YELLOW: &str = "\x1b[33m";
const ANSI_FG_BLUE: &str = "\x1b[34m";
const ANSI_FG_BRIGHT_BLACK: &str = "\x1b[90m";

/// Check if stdout is a terminal (TTY)
pub fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

/// Get terminal width dynamically
///
/// Uses the `terminal_size` crate, falling back to the COLUMNS environment
/// variable and a sensible default.
pub fn get_terminal_width() -> usize {
    if let Some((terminal_size::Width(w), _)) = terminal_size::terminal_size() {
        if w > 0 {
            return w as usize;
        }
    }

    if let Ok(cols) = std::env::var("COLUMNS") {
        if let Ok(width) = cols.parse::<usize>() {
            if width > 0 && width < 10000 {
                return width;
            }
        }
    }

    120
}

fn paint(text: &str, color: &str, tty: bool) -> String {
    if tty {
        format!("{}{}{}", color, text, ANSI_RESET)
    } else {
        text.to_string()
    }
}

fn bold_if_tty(text: &str, tty: bool) -> String {
    paint(text, ANSI_BOLD, tty)
}

/// Color used for a quadrant's header and code
fn quadrant_color(q: Quadrant) -> &'static str {
    match q {
        Quadrant::UrgentImportant => ANSI_FG_RED,
        Quadrant::Important => ANSI_FG_BLUE,
        Quadrant::Urgent => ANSI_FG_YELLOW,
        Quadrant::Neither => ANSI_FG_BRIGHT_BLACK,
    }
}

/// Format timestamp for display
pub fn format_timestamp(ts: i64) -> String {
    to_local(ts).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format a due or reminder time; end-of-day times show as the date alone
pub fn format_datetime(ts: i64) -> String {
    let dt = to_local(ts);
    if dt.format("%H:%M:%S").to_string() == "23:59:59" {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Format date for display (date only, no time)
pub fn format_date(ts: i64) -> String {
    to_local(ts).format("%Y-%m-%d").to_string()
}

/// Format date as relative time (e.g., "2 days ago", "in 3 days", "today")
pub fn format_relative_date(ts: i64) -> String {
    let today = Local::now().date_naive();
    let days_diff = (to_local(ts).date_naive() - today).num_days();

    match days_diff {
        d if d < -30 => format_date(ts),
        -1 => "yesterday".to_string(),
        d if d < 0 => format!("{} days ago", -d),
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        d if d <= 365 => format!("in {} days", d),
        _ => format_date(ts),
    }
}

/// Display state of a task: done, overdue or open
pub fn task_state(task: &Task, now: i64) -> &'static str {
    if task.completed {
        "done"
    } else if task.is_overdue(now) {
        "overdue"
    } else {
        "open"
    }
}

/// Truncate to a character count, marking the cut with ".."
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width <= 2 {
        return text.chars().take(width).collect();
    }
    let mut out: String = text.chars().take(width - 2).collect();
    out.push_str("..");
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskListColumn {
    Id,
    Priority,
    Title,
    Type,
    Due,
    Status,
    Rolled,
    Origin,
}

impl TaskListColumn {
    fn label(&self) -> &'static str {
        match self {
            TaskListColumn::Id => "ID",
            TaskListColumn::Priority => "Q",
            TaskListColumn::Title => "Title",
            TaskListColumn::Type => "Type",
            TaskListColumn::Due => "Due",
            TaskListColumn::Status => "Status",
            TaskListColumn::Rolled => "Rolled",
            TaskListColumn::Origin => "Origin",
        }
    }

    /// Lower number = kept longer when the terminal is narrow
    fn priority(&self) -> u8 {
        match self {
            TaskListColumn::Id | TaskListColumn::Title => 1,
            TaskListColumn::Priority => 2,
            TaskListColumn::Due => 3,
            TaskListColumn::Status => 4,
            TaskListColumn::Rolled => 5,
            TaskListColumn::Type => 6,
            TaskListColumn::Origin => 7,
        }
    }

    fn value(&self, task: &Task, now: i64, relative: bool) -> String {
        match self {
            TaskListColumn::Id => task.id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string()),
            TaskListColumn::Priority => task.priority.as_str().to_string(),
            TaskListColumn::Title => task.title.clone(),
            TaskListColumn::Type => task.task_type.as_str().to_string(),
            TaskListColumn::Due => match task.due_ts {
                Some(ts) if relative => format_relative_date(ts),
                Some(ts) => format_datetime(ts),
                None => String::new(),
            },
            TaskListColumn::Status => task_state(task, now).to_string(),
            TaskListColumn::Rolled => {
                if task.rollover_count > 0 {
                    format!("x{}", task.rollover_count)
                } else {
                    String::new()
                }
            }
            TaskListColumn::Origin => task.origin.as_str().to_string(),
        }
    }
}

const TASK_COLUMNS: [TaskListColumn; 8] = [
    TaskListColumn::Id,
    TaskListColumn::Priority,
    TaskListColumn::Title,
    TaskListColumn::Type,
    TaskListColumn::Due,
    TaskListColumn::Status,
    TaskListColumn::Rolled,
    TaskListColumn::Origin,
];

const TITLE_MIN_WIDTH: usize = 12;

#[derive(Debug, Clone, Copy, Default)]
pub struct TaskListOptions {
    pub relative: bool,
    /// Render for this width instead of the detected terminal width
    pub width: Option<usize>,
}

/// Format tasks as a table, hiding low-priority columns on narrow terminals
pub fn format_task_list_table(tasks: &[Task], now: i64, options: &TaskListOptions) -> String {
    if tasks.is_empty() {
        return "No tasks found.".to_string();
    }
    let tty = is_tty();

    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|t| TASK_COLUMNS.iter().map(|c| c.value(t, now, options.relative)).collect())
        .collect();

    let mut widths: Vec<usize> = TASK_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, c)| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .max()
                .unwrap_or(0)
                .max(c.label().len())
        })
        .collect();
    let title_idx = 2;
    widths[title_idx] = widths[title_idx].min(100);

    // Skip columns that are empty for every row
    let mut shown: Vec<usize> = (0..TASK_COLUMNS.len())
        .filter(|i| TASK_COLUMNS[*i].priority() <= 3 || rows.iter().any(|r| !r[*i].is_empty()))
        .collect();

    let target = options.width.unwrap_or_else(get_terminal_width);
    let total = |shown: &[usize], widths: &[usize]| -> usize {
        shown.iter().map(|i| widths[*i]).sum::<usize>() + shown.len().saturating_sub(1)
    };
    if total(&shown, &widths) > target {
        let excess = total(&shown, &widths) - target;
        widths[title_idx] = widths[title_idx].saturating_sub(excess).max(TITLE_MIN_WIDTH);
    }
    while total(&shown, &widths) > target {
        let candidate = shown
            .iter()
            .copied()
            .filter(|i| TASK_COLUMNS[*i].priority() > 3)
            .max_by_key(|i| TASK_COLUMNS[*i].priority());
        match candidate {
            Some(idx) => shown.retain(|i| *i != idx),
            None => break,
        }
    }

    let format_line = |cells: Vec<String>| -> String {
        cells.join(" ").trim_end().to_string()
    };

    let mut output = String::new();
    let header = format_line(
        shown.iter().map(|i| format!("{:<w$}", TASK_COLUMNS[*i].label(), w = widths[*i])).collect(),
    );
    output.push_str(&bold_if_tty(&header, tty));
    output.push('\n');
    output.push_str(&format_line(shown.iter().map(|i| "─".repeat(widths[*i])).collect()));
    output.push('\n');

    for (task, row) in tasks.iter().zip(rows.iter()) {
        let cells: Vec<String> = shown
            .iter()
            .map(|i| {
                let cell = format!("{:<w$}", truncate(&row[*i], widths[*i]), w = widths[*i]);
                match TASK_COLUMNS[*i] {
                    TaskListColumn::Priority => paint(&cell, quadrant_color(task.priority), tty),
                    TaskListColumn::Status if task.is_overdue(now) => paint(&cell, ANSI_FG_RED, tty),
                    TaskListColumn::Status if task.completed => paint(&cell, ANSI_FG_GREEN, tty),
                    _ => cell,
                }
            })
            .collect();
        output.push_str(&format_line(cells));
        output.push('\n');
    }
    output.push_str(&format!("\n{} task{}", tasks.len(), if tasks.len() == 1 { "" } else { "s" }));
    output
}

/// Detailed view of one task with its reminders
pub fn format_task_summary(task: &Task, reminders: &[Reminder], now: i64) -> String {
    let mut output = String::new();

    let header = format!(
        "Task {}: {}",
        task.id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string()),
        task.title
    );
    output.push_str(&header);
    output.push('\n');
    output.push_str(&"=".repeat(header.chars().count().max(60)));
    output.push_str("\n\n");

    output.push_str(&format!(
        "Quadrant:    {} ({}, {})\n",
        task.priority.as_str(),
        task.priority.label(),
        task.priority.action()
    ));
    output.push_str(&format!("Status:      {}\n", task_state(task, now)));
    match task.due_ts {
        Some(ts) => output.push_str(&format!("Due:         {} ({})\n", format_datetime(ts), format_relative_date(ts))),
        None => output.push_str("Due:         (none)\n"),
    }
    output.push_str(&format!("Type:        {}\n", task.task_type.as_str()));
    output.push_str(&format!("Origin:      {}\n", task.origin.as_str()));
    if let Some(uid) = &task.source_event_id {
        output.push_str(&format!("Event UID:   {}\n", uid));
    }
    if task.rollover_count > 0 {
        output.push_str(&format!("Rolled over: {} time{}\n", task.rollover_count, if task.rollover_count == 1 { "" } else { "s" }));
    }
    if let Some(ts) = task.completed_ts.filter(|_| task.completed) {
        output.push_str(&format!("Completed:   {}\n", format_timestamp(ts)));
    }
    output.push_str(&format!("Created:     {}\n", format_timestamp(task.created_ts)));
    output.push_str(&format!("Modified:    {}\n", format_timestamp(task.modified_ts)));
    output.push_str(&format!("UUID:        {}\n", task.uuid));

    if let Some(notes) = &task.notes {
        output.push_str("\nNotes:\n");
        for line in notes.lines() {
            output.push_str(&format!("  {}\n", line));
        }
    }

    if !reminders.is_empty() {
        output.push_str("\nReminders:\n");
        for r in reminders {
            let state = if r.is_active(now) { "" } else { " (past)" };
            let email = r.email.as_deref().map(|e| format!(" -> {}", e)).unwrap_or_default();
            output.push_str(&format!(
                "  [{}] {}{}{}\n",
                r.id.unwrap_or(0),
                format_datetime(r.remind_ts),
                email,
                state
            ));
        }
    }

    output
}

/// Open tasks grouped by quadrant, in matrix reading order
pub fn format_matrix(tasks: &[Task], now: i64) -> String {
    let tty = is_tty();
    let width = get_terminal_width().clamp(40, 100);
    let mut output = String::new();

    for q in Quadrant::all() {
        let in_quadrant: Vec<&Task> = tasks.iter().filter(|t| t.priority == q).collect();
        let header = format!("{} {} · {} ({})", q.as_str(), q.label(), q.action(), in_quadrant.len());
        output.push_str(&paint(&header, quadrant_color(q), tty));
        output.push('\n');
        output.push_str(&"─".repeat(header.chars().count().min(width)));
        output.push('\n');
        if in_quadrant.is_empty() {
            output.push_str("  (empty)\n");
        }
        for task in in_quadrant {
            let due = task
                .due_ts
                .map(|ts| format!("  due {}", format_datetime(ts)))
                .unwrap_or_default();
            let marker = if task.is_overdue(now) { " !" } else { "" };
            let id = task.id.map(|id| id.to_string()).unwrap_or_default();
            let title_width = width.saturating_sub(id.len() + due.len() + marker.len() + 4).max(TITLE_MIN_WIDTH);
            output.push_str(&format!("  {:>3} {}{}{}\n", id, truncate(&task.title, title_width), due, marker));
        }
        output.push('\n');
    }
    output.trim_end().to_string()
}

/// Reminders with the title of their task
pub fn format_reminder_list(reminders: &[(Reminder, Option<String>)], now: i64) -> String {
    if reminders.is_empty() {
        return "No reminders found.".to_string();
    }
    let tty = is_tty();
    let mut output = String::new();
    output.push_str(&bold_if_tty(&format!("{:<4} {:<5} {:<17} {:<28} {}", "ID", "Task", "When", "Email", "Title"), tty));
    output.push('\n');
    for (r, title) in reminders {
        let when = format_datetime(r.remind_ts);
        let when = if r.is_active(now) { when } else { format!("{} (past)", when) };
        output.push_str(&format!(
            "{:<4} {:<5} {:<17} {:<28} {}\n",
            r.id.unwrap_or(0),
            r.task_id,
            when,
            truncate(r.email.as_deref().unwrap_or("-"), 28),
            title.as_deref().unwrap_or("")
        ));
    }
    output.trim_end().to_string()
}

fn progress_bar(percent: f64, width: usize) -> String {
    let filled = ((percent / 100.0) * width as f64).round().clamp(0.0, width as f64) as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

pub fn format_period_stats(title: &str, stats: &PeriodStats) -> String {
    let mut output = String::new();
    output.push_str(&format!("{}\n", title));
    output.push_str(&format!(
        "  Total: {}  Completed: {}  Pending: {}\n",
        stats.total, stats.completed, stats.pending
    ));
    output.push_str(&format!(
        "  Completion: {:.1}% {}\n\n",
        stats.completion_rate,
        progress_bar(stats.completion_rate, 20)
    ));
    for q in Quadrant::all() {
        let count = stats.quadrant(q);
        output.push_str(&format!(
            "  {:<5} {:<28} {:>3}/{:<3}\n",
            q.as_str(),
            q.label(),
            count.completed,
            count.total
        ));
    }
    output.trim_end().to_string()
}

pub fn format_daily_stats(daily: &[DailyStat]) -> String {
    if daily.is_empty() {
        return "No tasks due in this period.".to_string();
    }
    let mut output = format!("{:<12} {:>5} {:>9}\n", "Date", "Tasks", "Completed");
    for day in daily {
        output.push_str(&format!("{:<12} {:>5} {:>9}\n", day.date.format("%Y-%m-%d"), day.total, day.completed));
    }
    output.trim_end().to_string()
}

pub fn format_streak(streak: &Streak) -> String {
    let days = |n: u32| if n == 1 { "day" } else { "days" };
    format!(
        "Current streak: {} {}\nLongest streak: {} {}",
        streak.current,
        days(streak.current),
        streak.max,
        days(streak.max)
    )
}

pub fn format_dashboard(dash: &Dashboard, score: i64, streak: &Streak) -> String {
    let mut output = String::new();
    output.push_str(&format!("Dashboard ({})\n\n", dash.range.as_str()));
    output.push_str(&format!(
        "Created this {}:   {} ({} completed, {}%) {}\n",
        dash.range.as_str(),
        dash.created_in_range,
        dash.completed_in_range,
        dash.completion_rate,
        progress_bar(dash.completion_rate as f64, 20)
    ));
    output.push_str(&format!("Productivity score: {}\n", score));
    output.push_str(&format!("Streak:             {} (best {})\n\n", streak.current, streak.max));

    output.push_str("Today\n");
    output.push_str(&format!("  Completed today:     {}\n", dash.completed_today));
    output.push_str(&format!("  Due today:           {}\n", dash.due_today));
    output.push_str(&format!("  Completed this week: {}\n", dash.completed_this_week));
    output.push_str(&format!("  Overdue:             {}\n\n", dash.overdue));

    output.push_str("Quadrants\n");
    for q in Quadrant::all() {
        output.push_str(&format!(
            "  {:<5} {:<28} {}\n",
            q.as_str(),
            q.label(),
            dash.distribution.get(q.as_str()).copied().unwrap_or(0)
        ));
    }
    output.push('\n');

    output.push_str(&format!(
        "Rollover: {} task{} rolled, {} total rollover{}\n",
        dash.rolled_tasks,
        if dash.rolled_tasks == 1 { "" } else { "s" },
        dash.total_rollovers,
        if dash.total_rollovers == 1 { "" } else { "s" }
    ));
    output.push_str(&format!(
        "Reminders: {} active, {} today",
        dash.active_reminders, dash.reminders_today
    ));
    output
}

pub fn format_user_list(users: &[UserSummary], stats: &UserStats) -> String {
    let tty = is_tty();
    let mut output = format!(
        "Users: {} total, {} active, {} admin{}\n\n",
        stats.total,
        stats.active,
        stats.admins,
        if stats.admins == 1 { "" } else { "s" }
    );
    if users.is_empty() {
        output.push_str("No users match.");
        return output;
    }
    output.push_str(&bold_if_tty(
        &format!(
            "{:<4} {:<20} {:<28} {:<6} {:<9} {:>6} {:<11} {}",
            "ID", "Name", "Email", "Role", "Status", "Tasks", "Joined", "Last login"
        ),
        tty,
    ));
    output.push('\n');
    for s in users {
        let u = &s.user;
        output.push_str(&format!(
            "{:<4} {:<20} {:<28} {:<6} {:<9} {:>6} {:<11} {}\n",
            u.id.unwrap_or(0),
            truncate(&u.name, 20),
            truncate(&u.email, 28),
            u.role.as_str(),
            u.status.as_str(),
            format!("{}/{}", s.completed, s.tasks),
            format_date(u.joined_ts),
            u.last_login_ts.map(format_timestamp).unwrap_or_else(|| "never".to_string())
        ));
    }
    output.trim_end().to_string()
}
