//! titanlift - workout session tracker
//!
//! Logs sets against a live workout, flags personal records and keeps
//! routines in step with what was actually lifted.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod exercises;
pub mod records;
pub mod routine;
pub mod session;
pub mod tui;

pub use config::Config;
pub use db::Database;
pub use error::{ClientError, SessionError};
pub use session::Session;
