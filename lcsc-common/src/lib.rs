//! # LCSC Common Library
//!
//! Shared code for the light-curve classification scheduler:
//! - Error type used across all crates
//! - Task status model and stellar class labels
//! - Result and diagnostics record types
//! - Backlog file resolution
//! - Database open/init and the scheduler-owned schema

pub mod classes;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod status;

pub use classes::StellarClass;
pub use error::{Error, Result};
pub use status::TaskStatus;
