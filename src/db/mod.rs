//! Database module for the SQLite instrument metadata cache.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - Repository layer for cached metadata

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
