//! Google Drive v3 storage for encrypted backups and team folders
//!
//! Files are written as envelope JSON (see `vault::envelope`), so Drive only
//! ever sees ciphertext.

pub mod client;
pub mod sync;

pub use client::{DriveClient, DriveFile, DriveRole};
pub use sync::{create_team, invite_member, pull, push, resolve_folder, SyncSummary, TeamMeta};

use thiserror::Error;

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
pub const TASKS_FILE: &str = "tasks.enc.json";
pub const REMINDERS_FILE: &str = "reminders.enc.json";
pub const TEAM_FILE: &str = "team.enc.json";

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Drive request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{op} failed: HTTP {status}: {body}")]
    Status {
        op: &'static str,
        status: u16,
        body: String,
    },
    #[error("no Drive access token (set drive.token in ~/.focus/rc or FOCUS_DRIVE_TOKEN)")]
    MissingToken,
    #[error("no Drive folder selected (pass --folder, set drive.folder, or create a team)")]
    MissingFolder,
    #[error("file '{0}' not found in the Drive folder")]
    NotFound(String),
    #[error("unexpected Drive response: {0}")]
    Decode(String),
}
