//! CLI command implementations.
//!
//! | Module    | Commands handled              |
//! |-----------|-------------------------------|
//! | `rotate`  | `Rotate`                      |
//! | `notify`  | `Notify`                      |
//! | `config`  | `Config show`, `Config validate` |
//! | `state`   | `State show`                  |

pub mod config;
pub mod notify;
pub mod rotate;
pub mod state;

pub use config::cmd_config;
pub use notify::cmd_notify;
pub use rotate::cmd_rotate;
pub use state::cmd_state;
