//! Unattended match automation.
//!
//! This module provides:
//! - Input simulation for driving the game menus and turns
//! - Screen-state classification from recognized text
//! - The session state machine and its runner
//! - Result extraction and the CSV results log

pub mod config;
pub mod csv_writer;
pub mod detection;
pub mod extract;
pub mod input;
pub mod runner;
pub mod state;

pub use config::{get_config, init_config, AutomationConfig};
pub use runner::run_session;
