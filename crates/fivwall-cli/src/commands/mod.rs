pub mod add;
pub mod auth_cmd;
pub mod clear;
pub mod common;
pub mod completions;
pub mod config;
pub mod delete;
pub mod edit;
pub mod export;
pub mod import;
pub mod list;
pub mod search_history;
pub mod sync;
