//! core
//!
//! Domain types shared by every layer.
//!
//! # Modules
//!
//! - [`entry`] - One tag occurrence (positional + named values)
//! - [`descriptor`] - Invokable units and their tags
//! - [`flags`] - Parameter flag bitset and symbol tables
//! - [`io`] - Invocation input and output
//! - [`lock`] - Per-command run lock
//! - [`config`] - Configuration loading

pub mod config;
pub mod descriptor;
pub mod entry;
pub mod flags;
pub mod io;
pub mod lock;
