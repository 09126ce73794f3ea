//! Formatting and logging helpers shared by the tool commands

pub mod format;
pub mod logging;
