//! Command-line surface.

pub mod app;
pub mod commands;

mod discover;
mod explain;
mod list;
mod monitor;
mod run;
