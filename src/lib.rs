//! quickcap - quick-capture tasks, notes and focus sessions
//!
//! A JSON API over SQLite for capturing records, tracking pomodoro focus
//! work and reviewing the week, plus terminal helpers that share its
//! database.

pub mod api;
pub mod config;
pub mod confirm;
pub mod db;
pub mod error;
pub mod focus;
pub mod fragmented;
pub mod models;
pub mod notes;
pub mod progress;
pub mod report;
