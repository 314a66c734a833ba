#![forbid(unsafe_code)]

//! Library behind the showarchive binaries: a small pipeline that pulls video
//! metadata for a stand-up show from the YouTube Data API, enriches it with a
//! per-show cast heuristic, and persists it to a local SQLite database.

pub mod cast;
pub mod config;
pub mod logger;
pub mod processor;
pub mod store;
pub mod youtube;
