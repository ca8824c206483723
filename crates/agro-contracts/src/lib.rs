pub mod chat;
pub mod events;
pub mod forms;
pub mod modules;
pub mod prompts;
pub mod reports;
pub mod schema;
