//! Encrypted backup of one scope's tasks and reminders

use anyhow::{anyhow, bail, Context, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use crate::models::{Reminder, Task};
use crate::repo::{ReminderRepo, Scope, TaskRepo};
use crate::vault::{crypto, EncryptedRecord, Vault};

pub const SNAPSHOT_VERSION: u32 = 1;
pub const BACKUP_FORMAT: &str = "focus-matrix-backup";

/// Reminder keyed by its task's uuid so it survives id changes on restore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderSnapshot {
    pub uuid: String,
    pub task_uuid: String,
    pub remind_ts: i64,
    #[serde(default)]
    pub email: Option<String>,
    pub created_ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub exported_at: i64,
    pub tasks: Vec<Task>,
    pub reminders: Vec<ReminderSnapshot>,
}

/// On-disk backup: plaintext header around a vault-sealed snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupFile {
    pub format: String,
    pub version: u32,
    pub created_at: i64,
    pub record: EncryptedRecord,
}

/// How to open a backup
pub enum BackupKey<'a> {
    Passphrase(&'a str),
    RecoveryCode(&'a str),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub tasks: usize,
    pub reminders: usize,
    pub orphaned_reminders: usize,
}

/// Capture every task and reminder in a scope
pub fn snapshot(conn: &Connection, scope: Scope, now: i64) -> Result<Snapshot> {
    let tasks = TaskRepo::list(conn, scope)?;
    let uuids: HashMap<i64, String> = tasks
        .iter()
        .filter_map(|t| t.id.map(|id| (id, t.uuid.clone())))
        .collect();

    let mut reminders = Vec::new();
    for reminder in ReminderRepo::list(conn, scope)? {
        let Some(task_uuid) = uuids.get(&reminder.task_id) else {
            continue;
        };
        reminders.push(ReminderSnapshot {
            uuid: reminder.uuid,
            task_uuid: task_uuid.clone(),
            remind_ts: reminder.remind_ts,
            email: reminder.email,
            created_ts: reminder.created_ts,
        });
    }

    Ok(Snapshot {
        version: SNAPSHOT_VERSION,
        exported_at: now,
        tasks,
        reminders,
    })
}

/// Replace the scope's tasks and reminders with a snapshot in one transaction
pub fn restore(conn: &Connection, scope: Scope, snapshot: &Snapshot) -> Result<RestoreSummary> {
    if snapshot.version > SNAPSHOT_VERSION {
        bail!(
            "Backup version {} is newer than supported version {}",
            snapshot.version,
            SNAPSHOT_VERSION
        );
    }
    let tx = conn.unchecked_transaction()?;
    let ids: HashMap<String, i64> = TaskRepo::replace_all_in(&tx, scope, &snapshot.tasks)?
        .into_iter()
        .collect();

    let mut summary = RestoreSummary {
        tasks: snapshot.tasks.len(),
        ..Default::default()
    };
    let mut reminders = Vec::new();
    for r in &snapshot.reminders {
        match ids.get(&r.task_uuid) {
            Some(task_id) => reminders.push(Reminder {
                id: None,
                uuid: r.uuid.clone(),
                user_id: scope.user_id,
                task_id: *task_id,
                remind_ts: r.remind_ts,
                email: r.email.clone(),
                created_ts: r.created_ts,
            }),
            None => {
                log::warn!("Reminder {} refers to a task not in the backup, skipping", r.uuid);
                summary.orphaned_reminders += 1;
            }
        }
    }
    summary.reminders = ReminderRepo::replace_all_in(&tx, scope, &reminders)?;
    tx.commit()?;

    log::info!("Restored {} task(s) and {} reminder(s)", summary.tasks, summary.reminders);
    Ok(summary)
}

impl BackupFile {
    /// Seal a snapshot with an unlocked vault
    pub fn seal(vault: &Vault, snapshot: &Snapshot) -> Result<Self> {
        Ok(Self {
            format: BACKUP_FORMAT.to_string(),
            version: SNAPSHOT_VERSION,
            created_at: snapshot.exported_at,
            record: vault.encrypt_record(snapshot)?,
        })
    }

    pub fn open(&self, key: BackupKey<'_>) -> Result<Snapshot> {
        let snapshot: Snapshot = match key {
            BackupKey::Passphrase(passphrase) => self.record.open_with_passphrase(passphrase)?,
            BackupKey::RecoveryCode(code) => self.record.open_with_key(&crypto::key_from_b64(code)?)?,
        };
        Ok(snapshot)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write backup file: {}", path.display()))
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read backup file: {}", path.display()))?;
        let file: BackupFile = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Not a Focus Matrix backup: {}", e))?;
        if file.format != BACKUP_FORMAT {
            bail!("Not a Focus Matrix backup (format '{}')", file.format);
        }
        Ok(file)
    }
}
