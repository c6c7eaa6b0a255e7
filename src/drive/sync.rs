use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use crate::backup::{self, ReminderSnapshot, RestoreSummary, Snapshot, SNAPSHOT_VERSION};
use crate::config::Config;
use crate::drive::{DriveClient, DriveError, DriveRole, REMINDERS_FILE, TASKS_FILE, TEAM_FILE};
use crate::models::Task;
use crate::repo::{Scope, SettingsRepo};
use crate::vault::Envelope;

/// Folder chosen by `team create`, stored per scope
pub const FOLDER_SETTING: &str = "drive.folder_id";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMeta {
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    pub version: u32,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub tasks: usize,
    pub reminders: usize,
}

/// Folder to sync with: explicit flag, then the scope's team folder, then `drive.folder`
pub fn resolve_folder(conn: &Connection, config: &Config, scope: Scope, explicit: Option<&str>) -> Result<String> {
    if let Some(folder) = explicit {
        return Ok(folder.to_string());
    }
    if let Some(folder) = SettingsRepo::get(conn, &scope.settings_key(FOLDER_SETTING))? {
        return Ok(folder);
    }
    config
        .drive_folder
        .clone()
        .ok_or_else(|| DriveError::MissingFolder.into())
}

fn file_setting(scope: Scope, folder_id: &str, name: &str) -> String {
    scope.settings_key(&format!("drive.file.{}.{}", folder_id, name))
}

/// Known file id from settings, else a lookup by name
fn locate(conn: &Connection, client: &DriveClient, scope: Scope, folder_id: &str, name: &str) -> Result<Option<String>> {
    if let Some(id) = SettingsRepo::get(conn, &file_setting(scope, folder_id, name))? {
        return Ok(Some(id));
    }
    Ok(client.find_file(folder_id, name)?.map(|f| f.id))
}

fn upload<T: Serialize>(
    conn: &Connection,
    client: &DriveClient,
    scope: Scope,
    folder_id: &str,
    name: &str,
    value: &T,
    passphrase: &str,
) -> Result<()> {
    let envelope = Envelope::seal(value, passphrase)?;
    let existing = locate(conn, client, scope, folder_id, name)?;
    let id = client.create_or_update_json_file(existing.as_deref(), name, &envelope.to_json()?, Some(folder_id))?;
    SettingsRepo::set(conn, &file_setting(scope, folder_id, name), &id)?;
    Ok(())
}

fn download<T: for<'de> Deserialize<'de>>(
    conn: &Connection,
    client: &DriveClient,
    scope: Scope,
    folder_id: &str,
    name: &str,
    passphrase: &str,
) -> Result<T> {
    let id = locate(conn, client, scope, folder_id, name)?
        .ok_or_else(|| DriveError::NotFound(name.to_string()))?;
    let text = client.read_json_file(&id)?;
    let envelope = Envelope::from_json(&text).with_context(|| format!("Failed to parse {}", name))?;
    Ok(envelope.open(passphrase).with_context(|| format!("Failed to decrypt {}", name))?)
}

/// Encrypt the scope's tasks and reminders into the folder
pub fn push(
    conn: &Connection,
    client: &DriveClient,
    scope: Scope,
    folder_id: &str,
    passphrase: &str,
    now: i64,
) -> Result<SyncSummary> {
    let snapshot = backup::snapshot(conn, scope, now)?;
    upload(conn, client, scope, folder_id, TASKS_FILE, &snapshot.tasks, passphrase)?;
    upload(conn, client, scope, folder_id, REMINDERS_FILE, &snapshot.reminders, passphrase)?;
    log::info!(
        "Pushed {} task(s) and {} reminder(s) to Drive folder {}",
        snapshot.tasks.len(),
        snapshot.reminders.len(),
        folder_id
    );
    Ok(SyncSummary {
        tasks: snapshot.tasks.len(),
        reminders: snapshot.reminders.len(),
    })
}

/// Download, decrypt and replace the scope's tasks and reminders
pub fn pull(
    conn: &Connection,
    client: &DriveClient,
    scope: Scope,
    folder_id: &str,
    passphrase: &str,
    now: i64,
) -> Result<RestoreSummary> {
    let tasks: Vec<Task> = download(conn, client, scope, folder_id, TASKS_FILE, passphrase)?;
    let reminders: Vec<ReminderSnapshot> = download(conn, client, scope, folder_id, REMINDERS_FILE, passphrase)?;
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        exported_at: now,
        tasks,
        reminders,
    };
    backup::restore(conn, scope, &snapshot)
}

/// Create a team folder with encrypted metadata and empty task/reminder files
///
/// The new folder becomes the scope's default sync folder.
pub fn create_team(
    conn: &Connection,
    client: &DriveClient,
    scope: Scope,
    name: &str,
    passphrase: &str,
    now: i64,
) -> Result<String> {
    let folder = client.create_folder(name, None)?;
    let meta = TeamMeta {
        name: name.to_string(),
        created_at: now,
        version: 1,
    };
    let empty: Vec<serde_json::Value> = Vec::new();
    for (file, body) in [
        (TEAM_FILE, Envelope::seal(&meta, passphrase)?),
        (TASKS_FILE, Envelope::seal(&empty, passphrase)?),
        (REMINDERS_FILE, Envelope::seal(&empty, passphrase)?),
    ] {
        client.create_or_update_json_file(None, file, &body.to_json()?, Some(&folder.id))?;
    }
    SettingsRepo::set(conn, &scope.settings_key(FOLDER_SETTING), &folder.id)?;
    log::info!("Created team folder {} ({})", name, folder.id);
    Ok(folder.id)
}

pub fn invite_member(client: &DriveClient, folder_id: &str, email: &str, role: DriveRole) -> Result<()> {
    client.set_permission(folder_id, email, role)?;
    log::info!("Invited {} as {} to {}", email, role.as_str(), folder_id);
    Ok(())
}
