// Core data models for Focus Matrix
// These structs represent the domain entities

pub mod task;
pub mod reminder;
pub mod user;

pub use task::*;
pub use reminder::*;
pub use user::*;
