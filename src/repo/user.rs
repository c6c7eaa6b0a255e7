use rusqlite::{Connection, OptionalExtension, Row};
use crate::models::{normalize_email, Role, User, UserStatus};
use anyhow::{Context, Result};

const USER_COLUMNS: &str = "id, uuid, name, email, password_hash, role, status, joined_ts, last_login_ts";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: Some(row.get(0)?),
        uuid: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        password_hash: row.get(4)?,
        role: Role::from_str(&row.get::<_, String>(5)?).unwrap_or(Role::User),
        status: UserStatus::from_str(&row.get::<_, String>(6)?).unwrap_or(UserStatus::Active),
        joined_ts: row.get(7)?,
        last_login_ts: row.get(8)?,
    })
}

pub struct UserRepo;

impl UserRepo {
    pub fn create(
        conn: &Connection,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User> {
        let user = User {
            id: None,
            uuid: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            email: normalize_email(email),
            password_hash: password_hash.to_string(),
            role,
            status: UserStatus::Active,
            joined_ts: chrono::Utc::now().timestamp(),
            last_login_ts: None,
        };
        conn.execute(
            "INSERT INTO users (uuid, name, email, password_hash, role, status, joined_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                user.uuid,
                user.name,
                user.email,
                user.password_hash,
                user.role.as_str(),
                user.status.as_str(),
                user.joined_ts,
            ],
        )
        .with_context(|| format!("Failed to create user: {}", user.email))?;
        let id = conn.last_insert_rowid();
        log::debug!("Created user {} ({})", id, user.role.as_str());
        Ok(User { id: Some(id), ..user })
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        Ok(conn.query_row(&sql, [id], user_from_row).optional()?)
    }

    pub fn get_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
        Ok(conn
            .query_row(&sql, [normalize_email(email)], user_from_row)
            .optional()?)
    }

    /// All users, oldest first
    pub fn list(conn: &Connection) -> Result<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY joined_ts, id", USER_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], user_from_row)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    /// Persist name, email, password hash, role and status
    pub fn update(conn: &Connection, user: &User) -> Result<()> {
        let id = user.id.context("Cannot update a user without an id")?;
        conn.execute(
            "UPDATE users SET name = ?1, email = ?2, password_hash = ?3, role = ?4, status = ?5
             WHERE id = ?6",
            rusqlite::params![
                user.name,
                normalize_email(&user.email),
                user.password_hash,
                user.role.as_str(),
                user.status.as_str(),
                id,
            ],
        )
        .with_context(|| format!("Failed to update user {}", id))?;
        Ok(())
    }

    pub fn touch_login(conn: &Connection, id: i64, ts: i64) -> Result<()> {
        conn.execute(
            "UPDATE users SET last_login_ts = ?1 WHERE id = ?2",
            rusqlite::params![ts, id],
        )?;
        Ok(())
    }

    /// Delete a user; their tasks and reminders cascade
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM users WHERE id = ?1", [id])
            .with_context(|| format!("Failed to delete user {}", id))?;
        log::debug!("Deleted user {}", id);
        Ok(())
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    pub fn count_admins(conn: &Connection) -> Result<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = 'admin'",
            [],
            |row| row.get(0),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;

    #[test]
    fn test_create_normalizes_email() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let user = UserRepo::create(&conn, " Alice ", "Alice@Example.com", "h", Role::Admin).unwrap();
        assert_eq!(user.name, "Alice");
        assert_eq!(user.email, "alice@example.com");

        let found = UserRepo::get_by_email(&conn, "ALICE@example.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.password_hash, "h");
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let conn = DbConnection::connect_in_memory().unwrap();
        UserRepo::create(&conn, "A", "a@x.io", "h", Role::User).unwrap();
        assert!(UserRepo::create(&conn, "B", "A@X.io", "h", Role::User).is_err());
    }

    #[test]
    fn test_counts_update_delete() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let admin = UserRepo::create(&conn, "A", "a@x.io", "h", Role::Admin).unwrap();
        let mut user = UserRepo::create(&conn, "B", "b@x.io", "h", Role::User).unwrap();
        assert_eq!(UserRepo::count(&conn).unwrap(), 2);
        assert_eq!(UserRepo::count_admins(&conn).unwrap(), 1);

        user.status = UserStatus::Inactive;
        user.role = Role::Admin;
        UserRepo::update(&conn, &user).unwrap();
        let loaded = UserRepo::get_by_id(&conn, user.id.unwrap()).unwrap().unwrap();
        assert_eq!(loaded.status, UserStatus::Inactive);
        assert_eq!(UserRepo::count_admins(&conn).unwrap(), 2);

        UserRepo::delete(&conn, admin.id.unwrap()).unwrap();
        assert_eq!(UserRepo::list(&conn).unwrap().len(), 1);
    }
}
