//! CLI command handlers

pub mod complete;
pub mod embed;
pub mod providers;
