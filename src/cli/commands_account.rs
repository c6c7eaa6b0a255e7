// Account and administrator commands

use clap::Subcommand;
use crate::auth::{self, admin, AuthError};
use crate::cli::commands::{confirm, print_json, read_secret, Commands, Ledger};
use crate::cli::error::{user_error, validate_id};
use crate::cli::output::{format_date, format_datetime, format_user_list};
use crate::models::{Role, User, UserStatus};
use anyhow::Result;

#[derive(Subcommand)]
pub enum AdminCommands {
    /// List users with task counts
    Users {
        /// Match name or email
        #[arg(long)]
        search: Option<String>,
        /// user or admin
        #[arg(long)]
        role: Option<String>,
        /// active or inactive
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Change a user's name, email, role or status
    Modify {
        /// User ID
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Activate or deactivate a user
    Toggle {
        /// User ID
        id: String,
    },
    /// Delete a user and all their tasks and reminders
    Delete {
        /// User ID
        id: String,
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

/// Turn account rule violations into user errors; anything else propagates
fn check<T>(result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => match e.downcast_ref::<AuthError>() {
            Some(auth_err) => user_error(&capitalize(&auth_err.to_string())),
            None => Err(e),
        },
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn parse_role(value: &str) -> Role {
    Role::from_str(value).unwrap_or_else(|| user_error(&format!("Invalid role '{}'. Use user or admin.", value)))
}

fn parse_status(value: &str) -> UserStatus {
    UserStatus::from_str(value)
        .unwrap_or_else(|| user_error(&format!("Invalid status '{}'. Use active or inactive.", value)))
}

fn user_id(user: &User) -> i64 {
    user.id.unwrap_or_default()
}

/// New password from the flag, or prompted twice
fn new_password(given: Option<String>) -> Result<(String, String)> {
    match given {
        Some(p) => Ok((p.clone(), p)),
        None => Ok((read_secret("New password", None)?, read_secret("Confirm password", None)?)),
    }
}

pub fn handle_account(cmd: Commands) -> Result<()> {
    let ledger = Ledger::open()?;
    let conn = &ledger.conn;
    let now = chrono::Utc::now().timestamp();

    match cmd {
        Commands::Register { name, email, password } => {
            let (password, confirmation) = new_password(password)?;
            if password != confirmation {
                user_error("Passwords do not match");
            }
            let first = crate::repo::UserRepo::count(conn)? == 0;
            let user = check(auth::register(conn, &name, &email, &password))?;
            println!("Registered {} <{}> (user {}).", user.name, user.email, user_id(&user));
            if first {
                println!("This is the first account, so it is an administrator.");
            }
            println!("Run 'focus login {}' to start using it.", user.email);
        }
        Commands::Login { email, password } => {
            let password = read_secret("Password", password)?;
            let user = check(auth::login(conn, &email, &password, now))?;
            println!("Logged in as {} <{}>.", user.name, user.email);
        }
        Commands::Logout => match auth::logout(conn)? {
            Some(user) => println!("Logged out {}.", user.email),
            None => println!("Not logged in."),
        },
        Commands::Whoami { json } => {
            let user = auth::current_user(conn)?;
            if json {
                print_json(&user)?;
            } else {
                match user {
                    Some(u) => {
                        println!("{} <{}>", u.name, u.email);
                        println!("Role:       {}", u.role.as_str());
                        println!("Joined:     {}", format_date(u.joined_ts));
                        if let Some(ts) = u.last_login_ts {
                            println!("Last login: {}", format_datetime(ts));
                        }
                    }
                    None => println!("Not logged in (using the anonymous task list)."),
                }
            }
        }
        Commands::Profile { name, email } => {
            let user = check(auth::require_user(conn))?;
            if name.is_none() && email.is_none() {
                user_error("Nothing to change. Use --name and/or --email.");
            }
            let user = check(auth::update_profile(conn, user_id(&user), name.as_deref(), email.as_deref()))?;
            println!("Profile updated: {} <{}>.", user.name, user.email);
        }
        Commands::Passwd { current, new_password: new } => {
            let user = check(auth::require_user(conn))?;
            let current = read_secret("Current password", current)?;
            let (new, confirmation) = new_password(new)?;
            check(auth::change_password(conn, user_id(&user), &current, &new, &confirmation))?;
            println!("Password changed.");
        }
        Commands::Admin { subcommand } => {
            let acting = check(auth::require_admin(conn))?;
            handle_admin(&ledger, &acting, subcommand)?;
        }
        _ => anyhow::bail!("Not an account command"),
    }
    Ok(())
}

fn parse_user_id(id: &str) -> i64 {
    validate_id(id, "User").unwrap_or_else(|e| user_error(&e))
}

fn handle_admin(ledger: &Ledger, acting: &User, cmd: AdminCommands) -> Result<()> {
    let conn = &ledger.conn;
    match cmd {
        AdminCommands::Users { search, role, status, json } => {
            let query = admin::UserQuery {
                search,
                role: role.as_deref().map(parse_role),
                status: status.as_deref().map(parse_status),
            };
            let users = admin::list_users(conn, &query)?;
            let stats = admin::user_stats(conn)?;
            if json {
                print_json(&serde_json::json!({ "stats": stats, "users": users }))?;
            } else {
                println!("{}", format_user_list(&users, &stats));
            }
        }
        AdminCommands::Modify { id, name, email, role, status } => {
            let id = parse_user_id(&id);
            let changes = admin::UserUpdate {
                name,
                email,
                role: role.as_deref().map(parse_role),
                status: status.as_deref().map(parse_status),
            };
            if changes.name.is_none() && changes.email.is_none() && changes.role.is_none() && changes.status.is_none() {
                user_error("Nothing to change. Use --name, --email, --role or --status.");
            }
            let user = check(admin::update_user(conn, acting, id, &changes))?;
            println!(
                "Updated user {}: {} <{}>, {}, {}.",
                id,
                user.name,
                user.email,
                user.role.as_str(),
                user.status.as_str()
            );
        }
        AdminCommands::Toggle { id } => {
            let id = parse_user_id(&id);
            let user = check(admin::toggle_status(conn, acting, id))?;
            println!("User {} ({}) is now {}.", id, user.email, user.status.as_str());
        }
        AdminCommands::Delete { id, yes } => {
            let id = parse_user_id(&id);
            if !yes {
                let target = crate::repo::UserRepo::get_by_id(conn, id)?
                    .unwrap_or_else(|| user_error(&format!("User {} not found", id)));
                if !confirm(&format!("Delete {} and all their tasks?", target.email))? {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            let user = check(admin::delete_user(conn, acting, id))?;
            println!("Deleted user {} ({}).", id, user.email);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("invalid email or password"), "Invalid email or password");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_check_passes_other_errors_through() {
        let err = check::<()>(Err(anyhow::anyhow!("Failed to open database"))).unwrap_err();
        assert_eq!(err.to_string(), "Failed to open database");
    }

    #[test]
    fn test_new_password_from_flag_confirms_itself() {
        let (a, b) = new_password(Some("hunter22".to_string())).unwrap();
        assert_eq!(a, b);
    }
}
