//! Local accounts: registration, login session, profile and password changes
//!
//! This is a single-machine account layer. The session is the id of the
//! logged-in user stored in the ledger settings; tasks are scoped by it.

pub mod admin;

use anyhow::Result;
use rusqlite::Connection;
use sha2::Sha256;
use thiserror::Error;
use crate::models::{normalize_email, Role, User};
use crate::repo::{Scope, SettingsRepo, UserRepo};
use crate::vault::crypto::{b64_decode, b64_encode, random_salt, KEY_LEN, PBKDF2_ITERATIONS};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const SESSION_KEY: &str = "session.user_id";
const HASH_SCHEME: &str = "pbkdf2-sha256";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("name cannot be empty")]
    EmptyName,
    #[error("invalid email address: '{0}'")]
    InvalidEmail(String),
    #[error("an account with email {0} already exists")]
    EmailTaken(String),
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("current password is incorrect")]
    WrongPassword,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("account is inactive; contact an administrator")]
    Inactive,
    #[error("not logged in (run 'focus login')")]
    NotLoggedIn,
    #[error("this action requires an administrator")]
    Forbidden,
    #[error("user {0} not found")]
    UserNotFound(i64),
    #[error("cannot remove the last administrator")]
    LastAdmin,
    #[error("you cannot {0} your own account")]
    SelfAction(&'static str),
}

/// Hash a password as `pbkdf2-sha256$<iterations>$<salt>$<hash>`
pub fn hash_password(password: &str) -> String {
    let salt = random_salt();
    let hash = pbkdf2_hash(password, &salt, PBKDF2_ITERATIONS);
    format!("{}${}${}${}", HASH_SCHEME, PBKDF2_ITERATIONS, b64_encode(&salt), b64_encode(&hash))
}

fn pbkdf2_hash(password: &str, salt: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let mut out = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let parts: Vec<&str> = stored.split('$').collect();
    let [scheme, iterations, salt, hash] = parts.as_slice() else {
        return false;
    };
    if *scheme != HASH_SCHEME {
        return false;
    }
    let (Ok(iterations), Ok(salt), Ok(expected)) = (iterations.parse::<u32>(), b64_decode(salt), b64_decode(hash)) else {
        return false;
    };
    let actual = pbkdf2_hash(password, &salt, iterations);
    // Constant-time comparison
    expected.len() == actual.len()
        && expected.iter().zip(actual.iter()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

pub fn validate_email(email: &str) -> Result<String, AuthError> {
    let email = normalize_email(email);
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail(email))
    }
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

/// Create an account; the first account on a ledger becomes an administrator
pub fn register(conn: &Connection, name: &str, email: &str, password: &str) -> Result<User> {
    if name.trim().is_empty() {
        return Err(AuthError::EmptyName.into());
    }
    let email = validate_email(email)?;
    validate_password(password)?;
    if UserRepo::get_by_email(conn, &email)?.is_some() {
        return Err(AuthError::EmailTaken(email).into());
    }
    let role = if UserRepo::count(conn)? == 0 { Role::Admin } else { Role::User };
    let user = UserRepo::create(conn, name, &email, &hash_password(password), role)?;
    log::info!("Registered {} as {}", user.email, user.role.as_str());
    Ok(user)
}

/// Check credentials and start a session
pub fn login(conn: &Connection, email: &str, password: &str, now: i64) -> Result<User> {
    let user = UserRepo::get_by_email(conn, email)?
        .filter(|u| verify_password(password, &u.password_hash))
        .ok_or(AuthError::InvalidCredentials)?;
    if !user.is_active() {
        return Err(AuthError::Inactive.into());
    }
    let id = user.id.ok_or(AuthError::InvalidCredentials)?;
    UserRepo::touch_login(conn, id, now)?;
    SettingsRepo::set(conn, SESSION_KEY, &id.to_string())?;
    log::info!("Logged in as {}", user.email);
    Ok(User { last_login_ts: Some(now), ..user })
}

/// End the session, returning who was logged in
pub fn logout(conn: &Connection) -> Result<Option<User>> {
    let user = current_user(conn)?;
    SettingsRepo::delete(conn, SESSION_KEY)?;
    Ok(user)
}

/// Logged-in user, if the session still points at an active account
pub fn current_user(conn: &Connection) -> Result<Option<User>> {
    let Some(raw) = SettingsRepo::get(conn, SESSION_KEY)? else {
        return Ok(None);
    };
    let user = match raw.parse::<i64>() {
        Ok(id) => UserRepo::get_by_id(conn, id)?,
        Err(_) => None,
    };
    match user {
        Some(u) if u.is_active() => Ok(Some(u)),
        _ => {
            log::warn!("Dropping stale session for user {}", raw);
            SettingsRepo::delete(conn, SESSION_KEY)?;
            Ok(None)
        }
    }
}

/// Scope for the current session (anonymous when logged out)
pub fn current_scope(conn: &Connection) -> Result<Scope> {
    Ok(Scope {
        user_id: current_user(conn)?.and_then(|u| u.id),
    })
}

pub fn require_user(conn: &Connection) -> Result<User> {
    Ok(current_user(conn)?.ok_or(AuthError::NotLoggedIn)?)
}

pub fn require_admin(conn: &Connection) -> Result<User> {
    let user = require_user(conn)?;
    if !user.is_admin() {
        return Err(AuthError::Forbidden.into());
    }
    Ok(user)
}

/// Change the session user's name and/or email
pub fn update_profile(conn: &Connection, user_id: i64, name: Option<&str>, email: Option<&str>) -> Result<User> {
    let mut user = UserRepo::get_by_id(conn, user_id)?.ok_or(AuthError::UserNotFound(user_id))?;
    if let Some(name) = name {
        if name.trim().is_empty() {
            return Err(AuthError::EmptyName.into());
        }
        user.name = name.trim().to_string();
    }
    if let Some(email) = email {
        let email = validate_email(email)?;
        if let Some(other) = UserRepo::get_by_email(conn, &email)? {
            if other.id != user.id {
                return Err(AuthError::EmailTaken(email).into());
            }
        }
        user.email = email;
    }
    UserRepo::update(conn, &user)?;
    Ok(user)
}

/// Verify the current password, then store a new one
pub fn change_password(conn: &Connection, user_id: i64, current: &str, new: &str, confirm: &str) -> Result<()> {
    let mut user = UserRepo::get_by_id(conn, user_id)?.ok_or(AuthError::UserNotFound(user_id))?;
    if !verify_password(current, &user.password_hash) {
        return Err(AuthError::WrongPassword.into());
    }
    validate_password(new)?;
    if new != confirm {
        return Err(AuthError::PasswordMismatch.into());
    }
    user.password_hash = hash_password(new);
    UserRepo::update(conn, &user)?;
    log::info!("Password changed for {}", user.email);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::models::UserStatus;

    fn auth_error(err: anyhow::Error) -> AuthError {
        err.downcast::<AuthError>().expect("expected an AuthError")
    }

    #[test]
    fn test_hash_and_verify() {
        let stored = hash_password("s3cret!");
        assert!(stored.starts_with("pbkdf2-sha256$100000$"));
        assert!(verify_password("s3cret!", &stored));
        assert!(!verify_password("s3cret?", &stored));
        assert!(!verify_password("s3cret!", "plaintext"));
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email(" Bob@Example.org ").unwrap(), "bob@example.org");
        for bad in ["bob", "@x.io", "bob@localhost", "bob@.io", "bo b@x.io"] {
            assert!(validate_email(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_first_user_is_admin() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let first = register(&conn, "Ann", "ann@x.io", "password1").unwrap();
        let second = register(&conn, "Ben", "ben@x.io", "password2").unwrap();
        assert_eq!(first.role, Role::Admin);
        assert_eq!(second.role, Role::User);
    }

    #[test]
    fn test_register_rules() {
        let conn = DbConnection::connect_in_memory().unwrap();
        register(&conn, "Ann", "ann@x.io", "password1").unwrap();
        assert!(matches!(auth_error(register(&conn, "Ann 2", "ANN@x.io", "password1").unwrap_err()), AuthError::EmailTaken(_)));
        assert!(matches!(auth_error(register(&conn, "Cy", "cy@x.io", "12345").unwrap_err()), AuthError::WeakPassword));
        assert!(matches!(auth_error(register(&conn, " ", "cy@x.io", "123456").unwrap_err()), AuthError::EmptyName));
    }

    #[test]
    fn test_login_logout_session() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let ann = register(&conn, "Ann", "ann@x.io", "password1").unwrap();
        assert!(current_user(&conn).unwrap().is_none());
        assert_eq!(current_scope(&conn).unwrap(), Scope::anonymous());

        assert!(matches!(auth_error(login(&conn, "ann@x.io", "wrong-pass", 1).unwrap_err()), AuthError::InvalidCredentials));
        assert!(matches!(auth_error(login(&conn, "nobody@x.io", "password1", 1).unwrap_err()), AuthError::InvalidCredentials));

        let user = login(&conn, "ANN@x.io", "password1", 42).unwrap();
        assert_eq!(user.last_login_ts, Some(42));
        assert_eq!(current_scope(&conn).unwrap(), Scope::user(ann.id.unwrap()));

        let out = logout(&conn).unwrap().unwrap();
        assert_eq!(out.email, "ann@x.io");
        assert!(current_user(&conn).unwrap().is_none());
    }

    #[test]
    fn test_inactive_user_cannot_login_and_loses_session() {
        let conn = DbConnection::connect_in_memory().unwrap();
        register(&conn, "Ann", "ann@x.io", "password1").unwrap();
        let mut ann = login(&conn, "ann@x.io", "password1", 1).unwrap();

        ann.status = UserStatus::Inactive;
        UserRepo::update(&conn, &ann).unwrap();
        assert!(current_user(&conn).unwrap().is_none());
        assert!(matches!(auth_error(login(&conn, "ann@x.io", "password1", 2).unwrap_err()), AuthError::Inactive));
    }

    #[test]
    fn test_change_password() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let ann = register(&conn, "Ann", "ann@x.io", "password1").unwrap();
        let id = ann.id.unwrap();
        assert!(matches!(auth_error(change_password(&conn, id, "nope", "newpass1", "newpass1").unwrap_err()), AuthError::WrongPassword));
        assert!(matches!(auth_error(change_password(&conn, id, "password1", "short", "short").unwrap_err()), AuthError::WeakPassword));
        assert!(matches!(auth_error(change_password(&conn, id, "password1", "newpass1", "newpass2").unwrap_err()), AuthError::PasswordMismatch));
        change_password(&conn, id, "password1", "newpass1", "newpass1").unwrap();
        login(&conn, "ann@x.io", "newpass1", 1).unwrap();
    }

    #[test]
    fn test_update_profile() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let ann = register(&conn, "Ann", "ann@x.io", "password1").unwrap();
        register(&conn, "Ben", "ben@x.io", "password1").unwrap();
        let id = ann.id.unwrap();

        let updated = update_profile(&conn, id, Some("Ann Lee"), Some("Ann.Lee@x.io")).unwrap();
        assert_eq!(updated.name, "Ann Lee");
        assert_eq!(updated.email, "ann.lee@x.io");
        assert!(matches!(auth_error(update_profile(&conn, id, None, Some("ben@x.io")).unwrap_err()), AuthError::EmailTaken(_)));
    }
}
