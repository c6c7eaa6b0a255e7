pub mod abbrev;
pub mod commands;
pub mod commands_account;
pub mod commands_remind;
pub mod commands_stats;
pub mod commands_sync;
pub mod error;
pub mod output;
pub mod parser;
pub mod status;

pub use commands::*;
pub use parser::*;
pub use output::*;
pub use error::*;
