pub mod task;
pub mod reminder;
pub mod user;
pub mod settings;

pub use task::*;
pub use reminder::*;
pub use user::*;
pub use settings::*;

/// Owner whose tasks and reminders a query sees
///
/// `user_id: None` is the anonymous scope used when nobody is logged in.
/// Queries compare with `user_id IS ?` so NULL matches NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scope {
    pub user_id: Option<i64>,
}

impl Scope {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn user(id: i64) -> Self {
        Self { user_id: Some(id) }
    }

    /// Settings key namespaced to this scope
    pub fn settings_key(&self, base: &str) -> String {
        match self.user_id {
            Some(id) => format!("{}.{}", base, id),
            None => base.to_string(),
        }
    }
}
