//! Core types and shared functionality for covidmap.
//!
//! This crate provides:
//! - Memoization cache with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheService, MemoCache};
pub use config::{AppConfig, CaseCleaning, ConfigError};
pub use error::Error;
