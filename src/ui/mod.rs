//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`prompts`] - The `ask` capability behind prompt-backed options
//! - [`output`] - Verbosity and user-facing messages
//!
//! # Design
//!
//! All terminal interaction outside handler output goes through this module
//! so that quiet and non-interactive modes are honored in one place.

pub mod output;
pub mod prompts;
