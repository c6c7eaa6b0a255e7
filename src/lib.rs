//! Focus Matrix - an Eisenhower matrix task manager for the command line
//!
//! This library provides the core functionality for Focus Matrix, including:
//! - Configuration and the SQLite ledger (connection + migrations)
//! - Data models for tasks, reminders and users
//! - Repository layer for data access, scoped per user
//! - Daily rollover of overdue tasks
//! - iCalendar import/export
//! - Passphrase vault (PBKDF2 + AES-GCM) and encrypted backups
//! - Google Drive backup and team folders
//! - Mock authentication and the admin user dashboard
//! - Productivity statistics
//! - CLI command parsing and execution
//!
//! # Example
//!
//! ```no_run
//! use focus_matrix::cli::run;
//!
//! fn main() {
//!     if let Err(e) = run() {
//!         eprintln!("Error: {}", e);
//!         std::process::exit(1);
//!     }
//! }
//! ```

pub mod config;
pub mod db;
pub mod models;
pub mod repo;
pub mod cli;
pub mod utils;
pub mod filter;
pub mod rollover;
pub mod ics;
pub mod vault;
pub mod backup;
pub mod drive;
pub mod auth;
pub mod stats;
