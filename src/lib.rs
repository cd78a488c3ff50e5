//! Cafescout library
//!
//! Exposes the cache, scraping, storage and analysis modules for the binary
//! and for integration tests.

pub mod app;
pub mod cache;
pub mod charts;
pub mod cli;
pub mod config;
pub mod data;
pub mod stats;
pub mod storage;
