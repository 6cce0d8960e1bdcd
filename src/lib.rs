//! Task tracking with natural-language due dates and recurring tasks.

pub mod commands;
pub mod config;
pub mod dates;
pub mod error;
pub mod logging;
pub mod materialize;
pub mod models;
pub mod parser;
pub mod recurrence;
pub mod storage;
pub mod tui;
