//! Questline: agentic end-to-end testing from the terminal.
//!
//! Flows are discovered from application source code, cached in a catalog,
//! and executed step by step against a live browser over the DevTools
//! protocol - a text adventure where the dungeon is your web app.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod output;
