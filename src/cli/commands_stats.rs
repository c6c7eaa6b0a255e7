// Statistics and status commands

use clap::Subcommand;
use crate::cli::commands::{print_json, Ledger};
use crate::cli::error::user_error;
use crate::cli::output::{format_daily_stats, format_dashboard, format_period_stats, format_streak};
use crate::cli::status::{compute_status, format_status_line};
use crate::repo::{ReminderRepo, TaskRepo};
use crate::stats::{self, TimeRange, STREAK_WINDOW_DAYS};
use crate::utils::{day_bounds, local_day, parse_day_expr_at, to_local, MAX_SPAN_DAYS};
use anyhow::Result;

/// Days covered by the dashboard's productivity score
const SCORE_DAYS: i64 = 30;

#[derive(Subcommand)]
pub enum StatsCommands {
    /// Dashboard for a time range
    #[command(alias = "dashboard")]
    Summary {
        /// day, week, month or year
        #[arg(long, default_value = "week")]
        range: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Completion of tasks due between two dates (inclusive)
    Period {
        /// First day (e.g., 2024-03-01, "-7d", "monday")
        #[arg(allow_hyphen_values = true)]
        start: String,
        /// Last day
        #[arg(allow_hyphen_values = true)]
        end: String,
        #[arg(long)]
        json: bool,
    },
    /// Tasks due and completed per day
    Daily {
        /// Days to look back
        #[arg(long, default_value_t = 7)]
        days: i64,
        #[arg(long)]
        json: bool,
    },
    /// Productivity score (0-100)
    Score {
        #[arg(long, default_value_t = SCORE_DAYS)]
        days: i64,
    },
    /// Current and longest completion streaks
    Streak,
}

fn parse_range(value: &str) -> TimeRange {
    TimeRange::from_str(value)
        .unwrap_or_else(|| user_error(&format!("Invalid range '{}'. Use day, week, month or year.", value)))
}

fn check_days(days: i64) {
    if days <= 0 {
        user_error("--days must be a positive number");
    }
    if days > MAX_SPAN_DAYS {
        user_error(&format!("--days cannot exceed {}", MAX_SPAN_DAYS));
    }
}

pub fn handle_stats(cmd: StatsCommands) -> Result<()> {
    let ledger = Ledger::open()?;
    let tasks = TaskRepo::list(&ledger.conn, ledger.scope)?;
    let now = chrono::Utc::now().timestamp();
    let today = local_day(now);

    match cmd {
        StatsCommands::Summary { range, json } => {
            let range = parse_range(&range);
            let reminders = ReminderRepo::list(&ledger.conn, ledger.scope)?;
            let dashboard = stats::dashboard(&tasks, &reminders, range, now)?;
            let score = stats::productivity_score(&stats::daily_stats(&tasks, now, SCORE_DAYS), SCORE_DAYS);
            let streak = stats::streak(&stats::daily_stats(&tasks, now, STREAK_WINDOW_DAYS), today);
            if json {
                print_json(&serde_json::json!({
                    "dashboard": dashboard,
                    "productivity_score": score,
                    "streak": streak,
                }))?;
            } else {
                println!("{}", format_dashboard(&dashboard, score, &streak));
            }
        }
        StatsCommands::Period { start, end, json } => {
            let local_now = to_local(now);
            let first = parse_day_expr_at(&start, local_now)
                .unwrap_or_else(|e| user_error(&format!("Invalid start date '{}': {}", start, e)));
            let last = parse_day_expr_at(&end, local_now)
                .unwrap_or_else(|e| user_error(&format!("Invalid end date '{}': {}", end, e)));
            if last < first {
                user_error("End date is before start date");
            }
            let (from, _) = day_bounds(first)?;
            let (_, until) = day_bounds(last)?;
            let period = stats::period_stats(&tasks, from, until - 1);
            if json {
                print_json(&period)?;
            } else {
                let title = format!("Tasks due {} to {}", first.format("%Y-%m-%d"), last.format("%Y-%m-%d"));
                println!("{}", format_period_stats(&title, &period));
            }
        }
        StatsCommands::Daily { days, json } => {
            check_days(days);
            let daily = stats::daily_stats(&tasks, now, days);
            if json {
                print_json(&daily)?;
            } else {
                println!("{}", format_daily_stats(&daily));
            }
        }
        StatsCommands::Score { days } => {
            check_days(days);
            let score = stats::productivity_score(&stats::daily_stats(&tasks, now, days), days);
            println!("Productivity score ({} days): {}", days, score);
        }
        StatsCommands::Streak => {
            let streak = stats::streak(&stats::daily_stats(&tasks, now, STREAK_WINDOW_DAYS), today);
            println!("{}", format_streak(&streak));
        }
    }
    Ok(())
}

pub fn handle_status(json: bool) -> Result<()> {
    let ledger = Ledger::open_for_tasks()?;
    let now = chrono::Utc::now().timestamp();
    let status = compute_status(&ledger.conn, ledger.scope, now)?;
    if json {
        print_json(&status)?;
    } else {
        println!("{}", format_status_line(&status));
    }
    Ok(())
}
