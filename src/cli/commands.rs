use clap::{Parser, Subcommand};
use rusqlite::Connection;
use crate::auth;
use crate::config::Config;
use crate::db::DbConnection;
use crate::models::{Quadrant, Task, TaskType};
use crate::repo::{NewTask, ReminderRepo, Scope, SettingsRepo, TaskPatch, TaskRepo};
use crate::cli::parser::{parse_task_args, join_title, ParsedTaskArgs};
use crate::cli::output::{format_matrix, format_task_list_table, format_task_summary, TaskListOptions};
use crate::cli::error::{user_error, validate_non_empty, parse_task_id_list};
use crate::cli::commands_account::{handle_account, AdminCommands};
use crate::cli::commands_remind::{create_task_reminder, handle_remind, RemindCommands};
use crate::cli::commands_stats::{handle_stats, handle_status, StatsCommands};
use crate::cli::commands_sync::{handle_backup, handle_drive, handle_ics, handle_team, handle_vault,
    BackupCommands, DriveCommands, IcsCommands, TeamCommands, VaultCommands};
use crate::utils::{parse_date_expr, fuzzy};
use crate::filter::{parse_filter, filter_tasks, FilterExpr, FilterTerm, StatusFilter};
use crate::rollover;
use crate::cli::abbrev;
use anyhow::{Context, Result};

#[derive(Parser)]
#[command(name = "focus")]
#[command(about = "Focus Matrix - Eisenhower matrix task manager with reminders, calendar sync and encrypted backup")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new task
    Add {
        /// Title and fields (e.g., "call dentist priority=UI due=tomorrow remind=due-1h")
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        /// Output the created task as JSON
        #[arg(long)]
        json: bool,
    },
    /// List tasks (open tasks unless a status filter is given)
    List {
        /// Filter arguments (e.g., "priority=UI,UNI due<=fri", "overdue or rolled")
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        filter: Vec<String>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
        /// Show due dates as relative time (e.g., "in 3 days")
        #[arg(long)]
        relative: bool,
    },
    /// Show detailed summary of task(s)
    Show {
        /// Task ID, list or range (e.g., 3, 1,4, 2-5)
        target: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Modify a task's title or fields
    Modify {
        /// Task ID
        target: String,
        /// New title words and/or fields (priority=, due=, notes=, type=, remind=, email=)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Mark task(s) as completed
    Done {
        /// Task ID, list or range
        target: String,
    },
    /// Reopen completed task(s)
    Undone {
        /// Task ID, list or range
        target: String,
    },
    /// Move task(s) to another quadrant
    Move {
        /// Task ID, list or range
        target: String,
        /// Quadrant code (UI, UNI, NUI, NUNI), q1-q4, or do/schedule/delegate/eliminate
        quadrant: String,
    },
    /// Permanently delete task(s) and their reminders
    Delete {
        /// Task ID, list or range
        target: String,
        /// Delete without confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Delete every task of the current user
    Clear {
        /// Delete without confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Show open tasks in the four quadrants
    Matrix {
        /// Include completed tasks
        #[arg(long)]
        all: bool,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Move overdue open tasks to today now
    Rollover,
    /// Reminder management commands
    Remind {
        #[command(subcommand)]
        subcommand: RemindCommands,
    },
    /// iCalendar import and export
    Ics {
        #[command(subcommand)]
        subcommand: IcsCommands,
    },
    /// Completion statistics
    Stats {
        #[command(subcommand)]
        subcommand: StatsCommands,
    },
    /// Show dashboard with system status
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Create an account
    Register {
        /// Display name
        name: String,
        /// Email address
        email: String,
        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Log in to an account
    Login {
        /// Email address
        email: String,
        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Log out
    Logout,
    /// Show the logged-in user
    Whoami {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Change your name or email
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Change your password
    Passwd {
        /// Current password (prompted when omitted)
        #[arg(long)]
        current: Option<String>,
        /// New password (prompted twice when omitted)
        #[arg(long = "new")]
        new_password: Option<String>,
    },
    /// Administrator dashboard
    Admin {
        #[command(subcommand)]
        subcommand: AdminCommands,
    },
    /// Encryption vault
    Vault {
        #[command(subcommand)]
        subcommand: VaultCommands,
    },
    /// Encrypted backup files
    Backup {
        #[command(subcommand)]
        subcommand: BackupCommands,
    },
    /// Encrypted Google Drive sync
    Drive {
        #[command(subcommand)]
        subcommand: DriveCommands,
    },
    /// Shared team folders on Google Drive
    Team {
        #[command(subcommand)]
        subcommand: TeamCommands,
    },
}

pub fn run() -> Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("focus {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    args = match abbrev::expand_command_abbreviations(args) {
        Ok(expanded) => expanded,
        Err(e) => {
            user_error(&e);
        }
    };

    // focus 3 -> focus show 3
    if args.len() == 1 && parse_task_id_list(&args[0]).is_ok() {
        args.insert(0, "show".to_string());
    }

    // No arguments shows the matrix
    if args.is_empty() {
        args.push("matrix".to_string());
    }

    let clap_args = std::iter::once("focus".to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>();
    let cli = match Cli::try_parse_from(clap_args) {
        Ok(cli) => cli,
        Err(e) => {
            e.print()?;
            if e.use_stderr() {
                std::process::exit(1);
            }
            return Ok(());
        }
    };

    handle_command(cli)
}

fn handle_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Add { args, json } => handle_task_add(args, json),
        Commands::List { filter, json, relative } => handle_task_list(filter, json, relative),
        Commands::Show { target, json } => handle_task_show(target, json),
        Commands::Modify { target, args } => handle_task_modify(target, args),
        Commands::Done { target } => handle_task_done(target, true),
        Commands::Undone { target } => handle_task_done(target, false),
        Commands::Move { target, quadrant } => handle_task_move(target, quadrant),
        Commands::Delete { target, yes } => handle_task_delete(target, yes),
        Commands::Clear { yes } => handle_task_clear(yes),
        Commands::Matrix { all, json } => handle_matrix(all, json),
        Commands::Rollover => handle_rollover(),
        Commands::Remind { subcommand } => handle_remind(subcommand),
        Commands::Ics { subcommand } => handle_ics(subcommand),
        Commands::Stats { subcommand } => handle_stats(subcommand),
        Commands::Status { json } => handle_status(json),
        Commands::Vault { subcommand } => handle_vault(subcommand),
        Commands::Backup { subcommand } => handle_backup(subcommand),
        Commands::Drive { subcommand } => handle_drive(subcommand),
        Commands::Team { subcommand } => handle_team(subcommand),
        account => handle_account(account),
    }
}

/// An open ledger with the configuration and the current user's scope
pub struct Ledger {
    pub conn: Connection,
    pub config: Config,
    pub scope: Scope,
}

impl Ledger {
    pub fn open() -> Result<Self> {
        let config = Config::load()?;
        for key in &config.unknown_keys {
            log::warn!("Unknown configuration key '{}' in {}", key, Config::config_path().display());
        }
        let conn = DbConnection::connect_at(&config.db_path())
            .context("Failed to connect to database")?;
        let scope = auth::current_scope(&conn)?;
        Ok(Self { conn, config, scope })
    }

    /// Open the ledger and apply the once-a-day automatic rollover
    pub fn open_for_tasks() -> Result<Self> {
        let ledger = Self::open()?;
        if ledger.config.rollover_auto {
            let now = chrono::Utc::now().timestamp();
            if let Some(outcome) = rollover::run_daily(&ledger.conn, ledger.scope, now)? {
                if outcome.count() > 0 {
                    eprintln!(
                        "Rolled over {} overdue task{} to today.",
                        outcome.count(),
                        if outcome.count() == 1 { "" } else { "s" }
                    );
                }
            }
        }
        Ok(ledger)
    }
}

/// Ask a yes/no question on stderr; anything but y/yes is a no
pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{} [y/N]: ", prompt);
    std::io::Write::flush(&mut std::io::stderr())
        .map_err(|e| anyhow::anyhow!("Failed to flush stderr: {}", e))?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)
        .map_err(|e| anyhow::anyhow!("Failed to read input: {}", e))?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Read a secret from a flag value or a prompt on stdin
pub(crate) fn read_secret(prompt: &str, given: Option<String>) -> Result<String> {
    if let Some(value) = given {
        return Ok(value);
    }
    eprint!("{}: ", prompt);
    std::io::Write::flush(&mut std::io::stderr())
        .map_err(|e| anyhow::anyhow!("Failed to flush stderr: {}", e))?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)
        .map_err(|e| anyhow::anyhow!("Failed to read input: {}", e))?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

pub(crate) fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse a quadrant or exit with a suggestion
pub(crate) fn parse_quadrant_arg(value: &str) -> Quadrant {
    if let Some(q) = Quadrant::from_str(value) {
        return q;
    }
    const NAMES: &[&str] = &["UI", "UNI", "NUI", "NUNI", "q1", "q2", "q3", "q4", "do", "schedule", "delegate", "eliminate"];
    match fuzzy::find_closest(value, NAMES, 2) {
        Some(s) => user_error(&format!("Invalid quadrant '{}'. Did you mean '{}'?", value, s)),
        None => user_error(&format!(
            "Invalid quadrant '{}'. Use UI, UNI, NUI, NUNI (or q1-q4, do/schedule/delegate/eliminate).",
            value
        )),
    }
}

fn parse_task_type_arg(value: &str) -> TaskType {
    TaskType::from_str(value).unwrap_or_else(|| match fuzzy::find_closest(value, TaskType::NAMES, 2) {
        Some(s) => user_error(&format!("Invalid task type '{}'. Did you mean '{}'?", value, s)),
        None => user_error(&format!("Invalid task type '{}'. Valid types: {}", value, TaskType::NAMES.join(", "))),
    })
}

/// Parse a due expression; `none` clears
fn parse_due_arg(value: &str) -> Option<i64> {
    if value.eq_ignore_ascii_case("none") {
        return None;
    }
    match parse_date_expr(value) {
        Ok(ts) => Some(ts),
        Err(e) => user_error(&format!("Invalid due date '{}': {}", value, e)),
    }
}

fn parse_fields(args: Vec<String>) -> ParsedTaskArgs {
    parse_task_args(args).unwrap_or_else(|e| user_error(&e.to_string()))
}

fn parse_ids(target: &str) -> Vec<i64> {
    parse_task_id_list(target).unwrap_or_else(|e| user_error(&e))
}

/// Load a task visible in `scope` or exit with a user error
pub(crate) fn load_task(conn: &Connection, scope: Scope, id: i64) -> Result<Task> {
    match TaskRepo::get_by_id(conn, scope, id)? {
        Some(task) => Ok(task),
        None => user_error(&format!("Task {} not found", id)),
    }
}

fn task_json(conn: &Connection, task: &Task) -> Result<serde_json::Value> {
    let reminders = match task.id {
        Some(id) => ReminderRepo::list_for_task(conn, id)?,
        None => Vec::new(),
    };
    let mut value = serde_json::to_value(task)?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert("reminders".to_string(), serde_json::to_value(&reminders)?);
    }
    Ok(value)
}

fn handle_task_add(args: Vec<String>, json: bool) -> Result<()> {
    if args.is_empty() {
        user_error("Task title is required. Usage: focus add <title> [priority=<q>] [due=<date>]");
    }
    let parsed = parse_fields(args);
    let title = join_title(&parsed.title);
    if let Err(e) = validate_non_empty(&title, "Task title") {
        user_error(&e);
    }

    let ledger = Ledger::open()?;
    let mut new = NewTask::new(title, parsed.priority.as_deref().map(parse_quadrant_arg).unwrap_or(Quadrant::Important));
    new.due_ts = parsed.due.as_deref().and_then(parse_due_arg);
    new.notes = parsed.notes.filter(|n| n != "none");
    if let Some(t) = parsed.task_type.as_deref() {
        new.task_type = parse_task_type_arg(t);
    }
    if parsed.email.is_some() && parsed.remind.is_none() {
        user_error("email= needs a reminder time (remind=<when>)");
    }

    let tx = ledger.conn.unchecked_transaction()?;
    let task = TaskRepo::create(&tx, ledger.scope, new)?;
    let reminder = match &parsed.remind {
        Some(when) => Some(create_task_reminder(&tx, ledger.scope, &task, when, parsed.email.clone())?),
        None => None,
    };
    tx.commit()?;

    if json {
        return print_json(&task_json(&ledger.conn, &task)?);
    }
    println!(
        "Created task {}: {} [{}]",
        task.id.unwrap_or(0),
        task.title,
        task.priority.as_str()
    );
    if let Some(r) = reminder {
        println!("Reminder {} set for {}", r.id.unwrap_or(0), crate::cli::output::format_datetime(r.remind_ts));
    }
    Ok(())
}

/// Add the default `status=open` unless the filter constrains status itself
fn with_default_status(filter: FilterExpr) -> FilterExpr {
    if filter.mentions_status() {
        return filter;
    }
    let open = FilterExpr::Term(FilterTerm::Status(StatusFilter::Open));
    match filter {
        FilterExpr::All => open,
        other => FilterExpr::And(vec![open, other]),
    }
}

fn handle_task_list(filter_args: Vec<String>, json: bool, relative: bool) -> Result<()> {
    let filter = parse_filter(filter_args).unwrap_or_else(|e| user_error(&format!("Filter error: {}", e)));
    let filter = with_default_status(filter);

    let ledger = Ledger::open_for_tasks()?;
    let now = chrono::Utc::now().timestamp();
    let tasks = filter_tasks(TaskRepo::list(&ledger.conn, ledger.scope)?, &filter, now);

    if json {
        let values = tasks
            .iter()
            .map(|t| task_json(&ledger.conn, t))
            .collect::<Result<Vec<_>>>()?;
        return print_json(&values);
    }
    println!("{}", format_task_list_table(&tasks, now, &TaskListOptions { relative, width: None }));
    Ok(())
}

fn handle_task_show(target: String, json: bool) -> Result<()> {
    let ids = parse_ids(&target);
    let ledger = Ledger::open_for_tasks()?;
    let now = chrono::Utc::now().timestamp();

    let mut values = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        let task = load_task(&ledger.conn, ledger.scope, *id)?;
        if json {
            values.push(task_json(&ledger.conn, &task)?);
            continue;
        }
        if i > 0 {
            println!();
        }
        let reminders = ReminderRepo::list_for_task(&ledger.conn, *id)?;
        print!("{}", format_task_summary(&task, &reminders, now));
    }
    if json {
        print_json(&values)?;
    }
    Ok(())
}

fn handle_task_modify(target: String, args: Vec<String>) -> Result<()> {
    let id = parse_ids(&target);
    if id.len() != 1 {
        user_error("modify takes a single task ID");
    }
    let id = id[0];
    let parsed = parse_fields(args);

    let mut patch = TaskPatch::default();
    let title = join_title(&parsed.title);
    if !title.trim().is_empty() {
        patch.title = Some(title);
    }
    patch.priority = parsed.priority.as_deref().map(parse_quadrant_arg);
    patch.due_ts = parsed.due.as_deref().map(parse_due_arg);
    patch.notes = parsed.notes.map(|n| if n == "none" { None } else { Some(n) });
    patch.task_type = parsed.task_type.as_deref().map(parse_task_type_arg);
    if patch.is_empty() && parsed.remind.is_none() {
        user_error("Nothing to modify. Give a new title or fields such as priority=, due=, notes=, type=, remind=");
    }
    if parsed.email.is_some() && parsed.remind.is_none() {
        user_error("email= needs a reminder time (remind=<when>); use 'focus remind modify' for existing reminders");
    }

    let ledger = Ledger::open()?;
    let task = load_task(&ledger.conn, ledger.scope, id)?;
    let tx = ledger.conn.unchecked_transaction()?;
    let task = if patch.is_empty() { task } else { TaskRepo::update(&tx, id, &patch)? };
    if let Some(when) = &parsed.remind {
        let r = create_task_reminder(&tx, ledger.scope, &task, when, parsed.email.clone())?;
        println!("Reminder {} set for {}", r.id.unwrap_or(0), crate::cli::output::format_datetime(r.remind_ts));
    }
    tx.commit()?;
    println!("Modified task {}: {} [{}]", id, task.title, task.priority.as_str());
    Ok(())
}

fn handle_task_done(target: String, done: bool) -> Result<()> {
    let ids = parse_ids(&target);
    let ledger = Ledger::open()?;
    for id in ids {
        let task = load_task(&ledger.conn, ledger.scope, id)?;
        if task.completed == done {
            println!("Task {} is already {}", id, if done { "completed" } else { "open" });
            continue;
        }
        TaskRepo::mark_done(&ledger.conn, id, done)?;
        if done {
            println!("Completed task {}: {}", id, task.title);
        } else {
            println!("Reopened task {}: {}", id, task.title);
        }
    }
    Ok(())
}

fn handle_task_move(target: String, quadrant: String) -> Result<()> {
    let ids = parse_ids(&target);
    let quadrant = parse_quadrant_arg(&quadrant);
    let ledger = Ledger::open()?;
    for id in ids {
        let task = load_task(&ledger.conn, ledger.scope, id)?;
        TaskRepo::move_priority(&ledger.conn, id, quadrant)?;
        println!("Moved task {} from {} to {} ({})", id, task.priority.as_str(), quadrant.as_str(), quadrant.label());
    }
    Ok(())
}

fn handle_task_delete(target: String, yes: bool) -> Result<()> {
    let ids = parse_ids(&target);
    let ledger = Ledger::open()?;
    let tasks = ids
        .iter()
        .map(|id| load_task(&ledger.conn, ledger.scope, *id))
        .collect::<Result<Vec<_>>>()?;

    for task in tasks {
        let id = task.id.unwrap_or(0);
        if !yes && !confirm(&format!("Delete task {} '{}'?", id, task.title))? {
            println!("Skipped task {}", id);
            continue;
        }
        TaskRepo::delete(&ledger.conn, id)?;
        println!("Deleted task {}: {}", id, task.title);
    }
    Ok(())
}

fn handle_task_clear(yes: bool) -> Result<()> {
    let ledger = Ledger::open()?;
    let count = TaskRepo::list(&ledger.conn, ledger.scope)?.len();
    if count == 0 {
        println!("No tasks to delete.");
        return Ok(());
    }
    if !yes && !confirm(&format!("Delete all {} task{}?", count, if count == 1 { "" } else { "s" }))? {
        println!("Cancelled.");
        return Ok(());
    }
    let deleted = TaskRepo::delete_all(&ledger.conn, ledger.scope)?;
    println!("Deleted {} task{}", deleted, if deleted == 1 { "" } else { "s" });
    Ok(())
}

fn handle_matrix(all: bool, json: bool) -> Result<()> {
    let ledger = Ledger::open_for_tasks()?;
    let now = chrono::Utc::now().timestamp();
    let tasks: Vec<Task> = TaskRepo::list(&ledger.conn, ledger.scope)?
        .into_iter()
        .filter(|t| all || !t.completed)
        .collect();

    if json {
        let mut map = serde_json::Map::new();
        for q in Quadrant::all() {
            let in_q: Vec<&Task> = tasks.iter().filter(|t| t.priority == q).collect();
            map.insert(q.as_str().to_string(), serde_json::to_value(in_q)?);
        }
        return print_json(&map);
    }
    println!("{}", format_matrix(&tasks, now));
    Ok(())
}

fn handle_rollover() -> Result<()> {
    let ledger = Ledger::open()?;
    let now = chrono::Utc::now().timestamp();
    let outcome = rollover::run(&ledger.conn, ledger.scope, now)?;
    let today = crate::utils::local_day(now).format("%Y-%m-%d").to_string();
    SettingsRepo::set(&ledger.conn, &ledger.scope.settings_key(rollover::LAST_ROLLOVER_KEY), &today)?;

    if outcome.count() == 0 {
        println!("No overdue tasks to roll over.");
    } else {
        let ids: Vec<String> = outcome.processed.iter().map(|id| id.to_string()).collect();
        println!(
            "Rolled over {} task{} to today: {}",
            outcome.count(),
            if outcome.count() == 1 { "" } else { "s" },
            ids.join(", ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_status_added_once() {
        let filter = with_default_status(FilterExpr::All);
        assert!(filter.mentions_status());

        let explicit = parse_filter(vec!["status=done".to_string()]).unwrap();
        let task = {
            let mut t = Task::new("x".to_string(), Quadrant::Urgent);
            t.completed = true;
            t
        };
        assert!(with_default_status(explicit).matches(&task, 0));
        let implicit = parse_filter(vec!["priority=NUI".to_string()]).unwrap();
        assert!(!with_default_status(implicit).matches(&task, 0));
    }
}
