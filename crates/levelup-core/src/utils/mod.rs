//! Formatting helpers for terminal display.

pub mod format;

pub use format::{format_date, progress_bar, truncate_string};
