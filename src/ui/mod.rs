//! Terminal UI module using ratatui.
//!
//! This module provides the TUI rendering and input handling:
//!
//! - `render`: Main frame rendering and layout
//! - `input`: Keyboard event handling
//! - `selector`: Prefecture grid and category buttons
//! - `chart`: Population chart, loading gauge and prompt
//! - `styles`: Color schemes and text styling

pub mod chart;
pub mod input;
pub mod render;
pub mod selector;
pub mod styles;
