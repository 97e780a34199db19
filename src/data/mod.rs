//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations
//! - Mirrored relationship sets

mod database;
mod models;
pub mod relation;

pub use database::Database;
pub use models::*;
pub use relation::RelationSet;
