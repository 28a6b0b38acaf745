//! Voyage track processing
//!
//! Simplifies recorded GPS tracks, tags trips with the sea regions they pass
//! through, and keeps trip and user distance statistics up to date.

pub mod aggregator;
pub mod config;
pub mod database;
pub mod errors;
pub mod geometry;
pub mod models;
pub mod regions;
pub mod scheduler;
pub mod simplifier;
pub mod store;
pub mod users;
