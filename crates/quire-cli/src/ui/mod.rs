//! # CLI UI Module
//!
//! Styling and formatting layer for Quire CLI output.
//!
//! Output is plain text that reads without colors (`NO_COLOR` and non-TTY
//! output disable them); commands that list things also take `--json`.
//!
//! ## Module Structure
//!
//! - `style`: `--color` handling, status lines, tab and version names
//! - `format`: Utility formatters (time, truncation, previews)
//! - `table`: Table rendering with comfy-table

pub mod format;
pub mod style;
pub mod table;

pub use style::{ColorMode, Status, Style};
