//! core::io
//!
//! Invocation input and output handed to handlers.
//!
//! # Input
//!
//! [`Input`] holds the parsed values of one invocation, keyed by parameter
//! name. Absent values are stored as `null`. Array parameters hold arrays of
//! strings; switches hold booleans; everything else holds a string.
//!
//! # Output
//!
//! [`Output`] is a line-oriented sink. Production code writes to stdout;
//! tests use [`Output::capture`] to read back what a handler wrote.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::ui::output::Verbosity;

/// Parsed values for one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Input {
    command: String,
    arguments: BTreeMap<String, Value>,
    options: BTreeMap<String, Value>,
    interactive: bool,
    worker_id: Option<usize>,
}

impl Input {
    /// Create an empty input for `command`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Name of the command being run.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Builder form of [`Input::set_argument`].
    pub fn with_argument(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set_argument(name, value);
        self
    }

    /// Builder form of [`Input::set_option`].
    pub fn with_option(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set_option(name, value);
        self
    }

    /// Builder form of [`Input::set_interactive`].
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn set_argument(&mut self, name: &str, value: impl Into<Value>) {
        self.arguments.insert(name.to_string(), value.into());
    }

    pub fn set_option(&mut self, name: &str, value: impl Into<Value>) {
        self.options.insert(name.to_string(), value.into());
    }

    /// Argument value, or `None` when absent.
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name).filter(|v| !v.is_null())
    }

    /// Option value, or `None` when absent.
    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name).filter(|v| !v.is_null())
    }

    /// Argument as text (scalars only).
    pub fn argument_text(&self, name: &str) -> Option<String> {
        self.argument(name).and_then(crate::core::entry::value_text)
    }

    /// Option as text (scalars only). Empty strings count as absent.
    pub fn option_text(&self, name: &str) -> Option<String> {
        self.option(name).and_then(crate::core::entry::value_text)
    }

    /// Option as a list of strings. Scalars become one-element lists.
    pub fn option_list(&self, name: &str) -> Vec<String> {
        list(self.option(name))
    }

    /// Argument as a list of strings. Scalars become one-element lists.
    pub fn argument_list(&self, name: &str) -> Vec<String> {
        list(self.argument(name))
    }

    /// Switch option; absent means `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.option(name)
            .is_some_and(crate::core::entry::is_truthy)
    }

    /// All arguments in name order.
    pub fn arguments(&self) -> &BTreeMap<String, Value> {
        &self.arguments
    }

    /// All options in name order.
    pub fn options(&self) -> &BTreeMap<String, Value> {
        &self.options
    }

    /// Whether missing prompt values may be asked for.
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    /// Worker number when running inside a spawned worker process.
    pub fn worker_id(&self) -> Option<usize> {
        self.worker_id
    }

    pub fn set_worker_id(&mut self, worker_id: Option<usize>) {
        self.worker_id = worker_id;
    }
}

fn list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(crate::core::entry::value_text)
            .collect(),
        Some(other) => crate::core::entry::value_text(other).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Line-oriented output sink.
pub struct Output {
    sink: Box<dyn Write + Send>,
    verbosity: Verbosity,
}

impl Output {
    /// Write to any sink.
    pub fn new(sink: impl Write + Send + 'static, verbosity: Verbosity) -> Self {
        Self {
            sink: Box::new(sink),
            verbosity,
        }
    }

    /// Write to stdout.
    pub fn stdout(verbosity: Verbosity) -> Self {
        Self::new(io::stdout(), verbosity)
    }

    /// Write into a shared in-memory buffer.
    pub fn capture() -> (Self, Captured) {
        let captured = Captured::default();
        let output = Self::new(captured.clone(), Verbosity::Normal);
        (output, captured)
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Write one line. Always written, regardless of verbosity.
    pub fn line(&mut self, text: impl Display) -> io::Result<()> {
        writeln!(self.sink, "{}", text)?;
        self.sink.flush()
    }

    /// Write one line unless running quiet.
    pub fn info(&mut self, text: impl Display) -> io::Result<()> {
        if self.verbosity == Verbosity::Quiet {
            return Ok(());
        }
        self.line(text)
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output")
            .field("verbosity", &self.verbosity)
            .finish_non_exhaustive()
    }
}

/// Shared buffer behind [`Output::capture`].
#[derive(Debug, Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    /// Everything written so far, as UTF-8 (lossy).
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
