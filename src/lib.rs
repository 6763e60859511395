//! cmdtag - commands declared by tags
//!
//! cmdtag turns descriptors (invokable units carrying tag metadata) into
//! command-line commands: parameters, interactive prompts, plugin hooks and
//! process fan-out are all declared as tags and compiled once at startup.
//!
//! # Architecture
//!
//! Data flows one way:
//!
//! ```text
//! discovery -> compile -> console -> (per invocation) engine -> handler / pool
//! ```
//!
//! - [`core`] - Descriptors, tag entries, flags, config, run locks, I/O
//! - [`discovery`] - Sources of descriptors (catalog, manifests, cache)
//! - [`compile`] - Descriptors to commands
//! - [`console`] - Registration, argv parsing, abbreviations, built-ins
//! - [`engine`] - Plugins, prompts, dispatch and the worker pool
//! - [`app`] - Wiring of the layers above
//! - [`cli`] - The `cmdtag` binary
//! - [`ui`] - Prompting and user-facing output
//!
//! # Invariants
//!
//! 1. Configuration errors surface at compile time, before any command runs
//! 2. Plugins run before prompts, prompts before dispatch
//! 3. Compiling is pure; caching lives in discovery
//! 4. The pool-managing process never runs a spawnable handler itself

pub mod app;
pub mod cli;
pub mod compile;
pub mod console;
pub mod core;
pub mod discovery;
pub mod engine;
pub mod ui;
