// Calendar, vault, backup and Google Drive commands

use clap::Subcommand;
use std::path::{Path, PathBuf};
use crate::backup::{self, BackupFile, BackupKey, RestoreSummary};
use crate::cli::commands::{confirm, read_secret, Ledger};
use crate::cli::error::{user_error, validate_non_empty};
use crate::cli::output::{format_datetime, format_task_list_table, TaskListOptions};
use crate::config;
use crate::drive::{self, DriveClient, DriveError, DriveRole};
use crate::ics;
use crate::repo::TaskRepo;
use crate::utils::MAX_SPAN_DAYS;
use crate::vault::{Vault, VaultMethod};
use anyhow::{Context, Result};

#[derive(Subcommand)]
pub enum IcsCommands {
    /// Import events from an .ics file as tasks
    Import {
        /// Path to the .ics file
        file: PathBuf,
        /// Import every event, not only the upcoming window
        #[arg(long)]
        all: bool,
        /// Days ahead to import (default: ics.window_days, 30)
        #[arg(long)]
        window_days: Option<i64>,
        /// Show what would be imported without creating tasks
        #[arg(long)]
        dry_run: bool,
    },
    /// Export tasks with a due date as an .ics calendar
    Export {
        /// Output file (default: stdout)
        file: Option<PathBuf>,
        /// Only incomplete tasks
        #[arg(long)]
        open: bool,
    },
}

#[derive(Subcommand)]
pub enum VaultCommands {
    /// Create the vault with a passphrase
    Init {
        /// Passphrase (default: FOCUS_VAULT_PASSPHRASE or prompt)
        #[arg(long)]
        passphrase: Option<String>,
    },
    /// Show whether the vault is set up and how it unlocks
    Status,
    /// Check a passphrase against the vault
    Unlock {
        #[arg(long)]
        passphrase: Option<String>,
    },
    /// Export or import the recovery code
    Recovery {
        /// Print the recovery code
        #[arg(long, conflicts_with = "import")]
        export: bool,
        /// Unlock (or set up) the vault from a recovery code
        #[arg(long, value_name = "CODE")]
        import: Option<String>,
        /// Passphrase used to unlock before exporting
        #[arg(long)]
        passphrase: Option<String>,
    },
    /// Replace the vault key with one derived from a new passphrase
    Rotate {
        /// Current passphrase
        #[arg(long)]
        passphrase: Option<String>,
        /// New passphrase
        #[arg(long = "new")]
        new_passphrase: Option<String>,
    },
    /// Remove the vault and its key
    Wipe {
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Write an encrypted backup of your tasks and reminders
    Export {
        /// Output file
        path: PathBuf,
        #[arg(long)]
        passphrase: Option<String>,
        /// Unlock with a recovery code instead of the passphrase
        #[arg(long)]
        recovery_code: Option<String>,
    },
    /// Replace your tasks and reminders with the contents of a backup
    Import {
        /// Backup file
        path: PathBuf,
        #[arg(long, conflicts_with = "recovery_code")]
        passphrase: Option<String>,
        #[arg(long)]
        recovery_code: Option<String>,
        /// Replace without confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum DriveCommands {
    /// Upload encrypted tasks and reminders to the Drive folder
    Push {
        /// Drive folder ID (default: team folder or drive.folder)
        #[arg(long)]
        folder: Option<String>,
        /// Passphrase the files are encrypted with
        #[arg(long)]
        passphrase: Option<String>,
    },
    /// Replace local tasks and reminders with the Drive copy
    Pull {
        #[arg(long)]
        folder: Option<String>,
        #[arg(long)]
        passphrase: Option<String>,
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum TeamCommands {
    /// Create a shared team folder on Drive
    Create {
        /// Team name
        name: String,
        /// Passphrase shared with team members
        #[arg(long)]
        passphrase: Option<String>,
    },
    /// Share the team folder with someone
    Invite {
        /// Member email
        email: String,
        /// reader or writer
        #[arg(long, default_value = "writer")]
        role: String,
        #[arg(long)]
        folder: Option<String>,
    },
    /// List team folders shared with you
    List {
        /// Only folders whose name contains this text
        #[arg(long)]
        query: Option<String>,
    },
}

/// Flag value, then FOCUS_VAULT_PASSPHRASE, then a prompt
fn passphrase_from(given: Option<String>, prompt: &str) -> Result<String> {
    let passphrase = match given.or_else(config::env_passphrase) {
        Some(p) => p,
        None => read_secret(prompt, None)?,
    };
    if passphrase.is_empty() {
        user_error("Passphrase cannot be empty");
    }
    Ok(passphrase)
}

/// Unlock with a recovery code if given or required, else with the passphrase
fn unlock_vault(vault: &mut Vault, passphrase: Option<String>, recovery_code: Option<String>) -> Result<()> {
    match vault.method()? {
        None => user_error("Vault is not initialized. Run 'focus vault init' first."),
        Some(VaultMethod::Recovery) => {
            let code = read_secret("Recovery code", recovery_code)?;
            vault.import_recovery_code(code.trim())
        }
        Some(VaultMethod::Passphrase) => match recovery_code {
            Some(code) => vault.import_recovery_code(code.trim()),
            None => vault.unlock_with_passphrase(&passphrase_from(passphrase, "Vault passphrase")?),
        },
    }
}

fn require_file(path: &Path) {
    if !path.is_file() {
        user_error(&format!("File not found: {}", path.display()));
    }
}

fn print_restore_summary(summary: &RestoreSummary) {
    println!(
        "Restored {} task{} and {} reminder{}.",
        summary.tasks,
        if summary.tasks == 1 { "" } else { "s" },
        summary.reminders,
        if summary.reminders == 1 { "" } else { "s" }
    );
    if summary.orphaned_reminders > 0 {
        eprintln!(
            "Warning: skipped {} reminder(s) whose task is not in the backup.",
            summary.orphaned_reminders
        );
    }
}

pub fn handle_ics(cmd: IcsCommands) -> Result<()> {
    match cmd {
        IcsCommands::Import { file, all, window_days, dry_run } => {
            handle_ics_import(&file, all, window_days, dry_run)
        }
        IcsCommands::Export { file, open } => handle_ics_export(file.as_deref(), open),
    }
}

fn handle_ics_import(file: &Path, all: bool, window_days: Option<i64>, dry_run: bool) -> Result<()> {
    require_file(file);
    let ledger = Ledger::open()?;
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read calendar file: {}", file.display()))?;
    let events = ics::parse_calendar(&text).unwrap_or_else(|e| user_error(&e.to_string()));

    let now = chrono::Utc::now().timestamp();
    let days = window_days.unwrap_or(ledger.config.ics_window_days);
    if days < 0 {
        user_error("--window-days cannot be negative");
    }
    if days > MAX_SPAN_DAYS {
        user_error(&format!("--window-days cannot exceed {}", MAX_SPAN_DAYS));
    }
    let found = events.len();
    let events = if all { events } else { ics::within_window(events, now, days) };
    if events.len() < found {
        eprintln!("Skipping {} event(s) outside the next {} day(s).", found - events.len(), days);
    }
    if events.is_empty() {
        println!("No events to import.");
        return Ok(());
    }

    if dry_run {
        for event in &events {
            let duplicate = TaskRepo::exists_source_event(&ledger.conn, ledger.scope, &event.uid)?;
            println!(
                "{}  {}{}",
                format_datetime(event.start),
                event.summary,
                if duplicate { "  (already imported)" } else { "" }
            );
        }
        return Ok(());
    }

    let summary = ics::import_events(&ledger.conn, ledger.scope, &events)?;
    if !summary.imported.is_empty() {
        println!("{}", format_task_list_table(&summary.imported, now, &TaskListOptions::default()));
    }
    println!(
        "Imported {} event{} as tasks.",
        summary.imported.len(),
        if summary.imported.len() == 1 { "" } else { "s" }
    );
    if !summary.duplicates.is_empty() {
        println!("Skipped {} already imported.", summary.duplicates.len());
    }
    Ok(())
}

fn handle_ics_export(file: Option<&Path>, open: bool) -> Result<()> {
    let ledger = Ledger::open()?;
    let mut tasks = TaskRepo::list(&ledger.conn, ledger.scope)?;
    if open {
        tasks.retain(|t| !t.completed);
    }
    let now = chrono::Utc::now().timestamp();
    let calendar = ics::write_calendar(&tasks, now);
    match file {
        Some(path) => {
            std::fs::write(path, &calendar)
                .with_context(|| format!("Failed to write calendar file: {}", path.display()))?;
            let exported = tasks.iter().filter(|t| t.due_ts.is_some()).count();
            println!("Exported {} task(s) to {}.", exported, path.display());
        }
        None => print!("{}", calendar),
    }
    Ok(())
}

pub fn handle_vault(cmd: VaultCommands) -> Result<()> {
    let ledger = Ledger::open()?;
    let mut vault = Vault::open(&ledger.conn);

    match cmd {
        VaultCommands::Init { passphrase } => {
            if vault.is_initialized()? {
                user_error("Vault is already initialized. Use 'focus vault rotate' to change the passphrase.");
            }
            let (first, second) = match passphrase.or_else(config::env_passphrase) {
                Some(p) => (p.clone(), p),
                None => (
                    read_secret("New vault passphrase", None)?,
                    read_secret("Repeat passphrase", None)?,
                ),
            };
            if first.is_empty() {
                user_error("Passphrase cannot be empty");
            }
            if first != second {
                user_error("Passphrases do not match");
            }
            vault.init_with_passphrase(&first)?;
            println!("Vault initialized.");
            println!("Run 'focus vault recovery --export' and keep the code somewhere safe.");
        }
        VaultCommands::Status => match vault.method()? {
            None => println!("Vault: not initialized"),
            Some(method) => println!("Vault: initialized ({})", method.as_str()),
        },
        VaultCommands::Unlock { passphrase } => {
            if vault.method()? == Some(VaultMethod::Recovery) {
                user_error("This vault has no passphrase. Use 'focus vault recovery --import CODE'.");
            }
            unlock_vault(&mut vault, passphrase, None)?;
            println!("Passphrase accepted.");
        }
        VaultCommands::Recovery { export, import, passphrase } => {
            if let Some(code) = import {
                let fresh = !vault.is_initialized()?;
                vault.import_recovery_code(code.trim())?;
                if fresh {
                    println!("Vault set up from recovery code.");
                } else {
                    println!("Recovery code accepted.");
                }
            } else if export {
                unlock_vault(&mut vault, passphrase, None)?;
                println!("{}", vault.export_recovery_code()?);
                eprintln!("Anyone with this code can decrypt your backups.");
            } else {
                user_error("Specify --export or --import CODE");
            }
        }
        VaultCommands::Rotate { passphrase, new_passphrase } => {
            unlock_vault(&mut vault, passphrase, None)?;
            let new_passphrase = read_secret("New vault passphrase", new_passphrase)?;
            if let Err(e) = validate_non_empty(&new_passphrase, "Passphrase") {
                user_error(&e);
            }
            vault.rotate_key(&new_passphrase)?;
            println!("Vault key rotated. Export a new recovery code; the old one no longer unlocks this vault.");
        }
        VaultCommands::Wipe { yes } => {
            if !vault.is_initialized()? {
                println!("Vault is not initialized.");
                return Ok(());
            }
            if !yes && !confirm("Wipe the vault? Existing backups will need the old passphrase or recovery code.")? {
                println!("Cancelled.");
                return Ok(());
            }
            vault.wipe()?;
            println!("Vault wiped.");
        }
    }
    Ok(())
}

pub fn handle_backup(cmd: BackupCommands) -> Result<()> {
    let ledger = Ledger::open()?;
    let now = chrono::Utc::now().timestamp();

    match cmd {
        BackupCommands::Export { path, passphrase, recovery_code } => {
            let mut vault = Vault::open(&ledger.conn);
            unlock_vault(&mut vault, passphrase, recovery_code)?;
            let snapshot = backup::snapshot(&ledger.conn, ledger.scope, now)?;
            BackupFile::seal(&vault, &snapshot)?.write(&path)?;
            println!(
                "Backed up {} task(s) and {} reminder(s) to {}.",
                snapshot.tasks.len(),
                snapshot.reminders.len(),
                path.display()
            );
        }
        BackupCommands::Import { path, passphrase, recovery_code, yes } => {
            require_file(&path);
            let file = BackupFile::read(&path)?;
            let snapshot = match recovery_code {
                Some(code) => file.open(BackupKey::RecoveryCode(code.trim()))?,
                None => file.open(BackupKey::Passphrase(&passphrase_from(passphrase, "Backup passphrase")?))?,
            };
            if !yes {
                let prompt = format!(
                    "Replace all your tasks and reminders with {} task(s) from {}?",
                    snapshot.tasks.len(),
                    format_datetime(snapshot.exported_at)
                );
                if !confirm(&prompt)? {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            print_restore_summary(&backup::restore(&ledger.conn, ledger.scope, &snapshot)?);
        }
    }
    Ok(())
}

fn drive_client(ledger: &Ledger) -> Result<DriveClient> {
    let token = ledger.config.drive_token.as_deref().ok_or(DriveError::MissingToken)?;
    Ok(DriveClient::new(&ledger.config.drive_api_base, token)?)
}

pub fn handle_drive(cmd: DriveCommands) -> Result<()> {
    let ledger = Ledger::open()?;
    let client = drive_client(&ledger)?;
    let now = chrono::Utc::now().timestamp();

    match cmd {
        DriveCommands::Push { folder, passphrase } => {
            let folder = drive::resolve_folder(&ledger.conn, &ledger.config, ledger.scope, folder.as_deref())?;
            let passphrase = passphrase_from(passphrase, "Sync passphrase")?;
            let summary = drive::push(&ledger.conn, &client, ledger.scope, &folder, &passphrase, now)?;
            println!("Pushed {} task(s) and {} reminder(s) to Drive.", summary.tasks, summary.reminders);
        }
        DriveCommands::Pull { folder, passphrase, yes } => {
            let folder = drive::resolve_folder(&ledger.conn, &ledger.config, ledger.scope, folder.as_deref())?;
            let passphrase = passphrase_from(passphrase, "Sync passphrase")?;
            if !yes && !confirm("Replace all your tasks and reminders with the Drive copy?")? {
                println!("Cancelled.");
                return Ok(());
            }
            print_restore_summary(&drive::pull(&ledger.conn, &client, ledger.scope, &folder, &passphrase, now)?);
        }
    }
    Ok(())
}

pub fn handle_team(cmd: TeamCommands) -> Result<()> {
    let ledger = Ledger::open()?;
    let client = drive_client(&ledger)?;

    match cmd {
        TeamCommands::Create { name, passphrase } => {
            if let Err(e) = validate_non_empty(&name, "Team name") {
                user_error(&e);
            }
            let passphrase = passphrase_from(passphrase, "Team passphrase")?;
            let now = chrono::Utc::now().timestamp();
            let folder = drive::create_team(&ledger.conn, &client, ledger.scope, name.trim(), &passphrase, now)?;
            println!("Created team '{}' (folder {}).", name.trim(), folder);
            println!("Share the passphrase with members out of band, then run 'focus team invite <email>'.");
        }
        TeamCommands::Invite { email, role, folder } => {
            let role = DriveRole::from_str(&role)
                .unwrap_or_else(|| user_error(&format!("Invalid role '{}'. Use reader or writer.", role)));
            let email = crate::auth::validate_email(&email).unwrap_or_else(|e| user_error(&e.to_string()));
            let folder = drive::resolve_folder(&ledger.conn, &ledger.config, ledger.scope, folder.as_deref())?;
            drive::invite_member(&client, &folder, &email, role)?;
            println!("Invited {} as {}.", email, role.as_str());
        }
        TeamCommands::List { query } => {
            let folders = client.list_shared_team_folders(query.as_deref())?;
            if folders.is_empty() {
                println!("No shared team folders.");
                return Ok(());
            }
            let name_width = folders.iter().map(|f| f.name.chars().count()).max().unwrap_or(0).max(4);
            println!("{:<width$}  {:<28}  {}", "Name", "Owner", "ID", width = name_width);
            for folder in &folders {
                let owner = folder
                    .owners
                    .first()
                    .and_then(|o| o.email_address.as_deref().or(o.display_name.as_deref()))
                    .unwrap_or("");
                println!("{:<width$}  {:<28}  {}", folder.name, owner, folder.id, width = name_width);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(subcommand)]
        vault: VaultCommands,
    }

    #[test]
    fn test_recovery_export_conflicts_with_import() {
        let parsed = Harness::try_parse_from(["t", "recovery", "--export", "--import", "abc"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_rotate_accepts_new_flag() {
        let parsed = Harness::try_parse_from(["t", "rotate", "--passphrase", "old", "--new", "fresh"]).unwrap();
        match parsed.vault {
            VaultCommands::Rotate { passphrase, new_passphrase } => {
                assert_eq!(passphrase.as_deref(), Some("old"));
                assert_eq!(new_passphrase.as_deref(), Some("fresh"));
            }
            _ => panic!("expected rotate"),
        }
    }

    #[test]
    fn test_passphrase_flag_wins() {
        assert_eq!(passphrase_from(Some("flag".to_string()), "unused").unwrap(), "flag");
    }
}
