pub mod codeowners;
pub mod config;
pub mod errors;
pub mod host;
pub mod notify;
pub mod orchestrator;
pub mod selector;
pub mod state;
pub mod ui;
