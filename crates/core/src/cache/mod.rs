//! SQLite-backed memoization cache.
//!
//! This module provides a persistent key-value store for pipeline results
//! using SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Keys derived from a namespace and the call's arguments (SHA-256)
//! - Per-entry expiry (TTL)
//! - An entry-count bound with least-recently-used eviction
//! - Automatic schema migrations and WAL mode

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memo;
pub mod migrations;
pub mod service;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::MemoEntryMeta;
pub use memo::MemoCache;
pub use service::{BOUNDARIES_NAMESPACE, CacheService, DATASETS_NAMESPACE};
