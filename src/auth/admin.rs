//! Administrator operations over the user table

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use super::{validate_email, AuthError};
use crate::models::{Role, User, UserStatus};
use crate::repo::{TaskRepo, UserRepo};

/// Search and filter options for the user list
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// Case-insensitive substring of name or email
    pub search: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

impl UserQuery {
    pub fn matches(&self, user: &User) -> bool {
        if let Some(search) = &self.search {
            let needle = search.trim().to_lowercase();
            if !user.name.to_lowercase().contains(&needle) && !user.email.to_lowercase().contains(&needle) {
                return false;
            }
        }
        self.role.map_or(true, |r| user.role == r) && self.status.map_or(true, |s| user.status == s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: User,
    pub tasks: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub total: usize,
    pub active: usize,
    pub admins: usize,
}

/// Field changes applied by `update_user`
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

pub fn list_users(conn: &Connection, query: &UserQuery) -> Result<Vec<UserSummary>> {
    let mut out = Vec::new();
    for user in UserRepo::list(conn)?.into_iter().filter(|u| query.matches(u)) {
        let (tasks, completed) = match user.id {
            Some(id) => TaskRepo::counts_for_user(conn, id)?,
            None => (0, 0),
        };
        out.push(UserSummary { user, tasks, completed });
    }
    Ok(out)
}

/// Counts over all users, ignoring any list filter
pub fn user_stats(conn: &Connection) -> Result<UserStats> {
    let users = UserRepo::list(conn)?;
    Ok(UserStats {
        total: users.len(),
        active: users.iter().filter(|u| u.is_active()).count(),
        admins: users.iter().filter(|u| u.is_admin()).count(),
    })
}

fn load(conn: &Connection, id: i64) -> Result<User> {
    Ok(UserRepo::get_by_id(conn, id)?.ok_or(AuthError::UserNotFound(id))?)
}

/// Would this change leave the ledger without an active administrator role holder
fn removes_last_admin(conn: &Connection, user: &User, new_role: Role) -> Result<bool> {
    Ok(user.is_admin() && new_role != Role::Admin && UserRepo::count_admins(conn)? <= 1)
}

pub fn update_user(conn: &Connection, acting: &User, id: i64, changes: &UserUpdate) -> Result<User> {
    let mut user = load(conn, id)?;
    if let Some(name) = &changes.name {
        if name.trim().is_empty() {
            return Err(AuthError::EmptyName.into());
        }
        user.name = name.trim().to_string();
    }
    if let Some(email) = &changes.email {
        let email = validate_email(email)?;
        if let Some(other) = UserRepo::get_by_email(conn, &email)? {
            if other.id != user.id {
                return Err(AuthError::EmailTaken(email).into());
            }
        }
        user.email = email;
    }
    if let Some(role) = changes.role {
        if acting.id == user.id && role != Role::Admin && user.is_admin() {
            return Err(AuthError::SelfAction("demote").into());
        }
        if removes_last_admin(conn, &user, role)? {
            return Err(AuthError::LastAdmin.into());
        }
        user.role = role;
    }
    if let Some(status) = changes.status {
        if acting.id == user.id && status != UserStatus::Active {
            return Err(AuthError::SelfAction("deactivate").into());
        }
        user.status = status;
    }
    UserRepo::update(conn, &user)?;
    log::info!("Admin {} updated user {}", acting.email, user.email);
    Ok(user)
}

/// Flip a user between active and inactive
pub fn toggle_status(conn: &Connection, acting: &User, id: i64) -> Result<User> {
    if acting.id == Some(id) {
        return Err(AuthError::SelfAction("deactivate").into());
    }
    let mut user = load(conn, id)?;
    user.status = user.status.toggled();
    UserRepo::update(conn, &user)?;
    log::info!("User {} is now {}", user.email, user.status.as_str());
    Ok(user)
}

/// Delete a user together with their tasks and reminders
pub fn delete_user(conn: &Connection, acting: &User, id: i64) -> Result<User> {
    if acting.id == Some(id) {
        return Err(AuthError::SelfAction("delete").into());
    }
    let user = load(conn, id)?;
    if removes_last_admin(conn, &user, Role::User)? {
        return Err(AuthError::LastAdmin.into());
    }
    UserRepo::delete(conn, id)?;
    log::info!("Admin {} deleted user {}", acting.email, user.email);
    Ok(user)
}
