//! console
//!
//! The console engine that compiled commands are registered with.
//!
//! # Architecture
//!
//! ```text
//! register(name) -> set_description / set_definition / set_code
//!         |
//! build() -> clap::Command (one subcommand per registration)
//!         |
//! dispatch(matches) -> Input -> code(input, output) -> exit code
//! ```
//!
//! The console owns argv parsing, help text and usage errors; it knows
//! nothing about tags, plugins or prompts. Two built-ins are added when no
//! registration already uses their name: `list` and `completion`.
//!
//! # Lookup
//!
//! [`Console::find`] accepts abbreviations: each `:`-separated segment may be
//! shortened to a prefix, so `s:g` finds `something:group`.

pub mod builtin;
pub mod params;

use std::ffi::OsString;
use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::ArgMatches;
use thiserror::Error;

use crate::compile::ParamSpec;
use crate::core::io::{Input, Output};

/// Code attached to a registration. Returns the process exit code.
pub type CodeFn = dyn Fn(&mut Input, &mut Output) -> Result<i32> + Send + Sync;

/// Errors from command lookup and registration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("command '{name}' is not defined")]
    NotFound { name: String },

    #[error("command '{name}' is ambiguous; did you mean one of: {}", .candidates.join(", "))]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },

    #[error("command '{name}' is registered more than once")]
    Duplicate { name: String },

    #[error("invalid definition for '{command}': {message}")]
    InvalidDefinition { command: String, message: String },
}

/// Per-invocation settings decided by the binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunContext {
    /// Whether missing prompt values may be asked for.
    pub interactive: bool,
    /// Worker number when this process is a spawned worker.
    pub worker_id: Option<usize>,
}

/// One registered command.
#[derive(Clone)]
pub struct Registration {
    name: String,
    description: String,
    definition: Vec<ParamSpec>,
    code: Option<Arc<CodeFn>>,
}

impl Registration {
    fn new(name: String) -> Self {
        Self {
            description: String::new(),
            definition: Vec::new(),
            code: None,
            name,
        }
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = description.into();
        self
    }

    pub fn set_definition(&mut self, definition: Vec<ParamSpec>) -> &mut Self {
        self.definition = definition;
        self
    }

    pub fn set_code<F>(&mut self, code: F) -> &mut Self
    where
        F: Fn(&mut Input, &mut Output) -> Result<i32> + Send + Sync + 'static,
    {
        self.code = Some(Arc::new(code));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn definition(&self) -> &[ParamSpec] {
        &self.definition
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("definition", &self.definition)
            .field("code", &self.code.is_some())
            .finish()
    }
}

/// A set of registered commands behind one binary name.
#[derive(Debug, Clone)]
pub struct Console {
    bin_name: String,
    about: String,
    registrations: Vec<Registration>,
}

impl Console {
    pub fn new(bin_name: impl Into<String>) -> Self {
        Self {
            bin_name: bin_name.into(),
            about: String::new(),
            registrations: Vec::new(),
        }
    }

    /// Top-level help text.
    pub fn with_about(mut self, about: impl Into<String>) -> Self {
        self.about = about.into();
        self
    }

    pub fn bin_name(&self) -> &str {
        &self.bin_name
    }

    /// Start a registration. Duplicates are reported by [`Console::build`].
    pub fn register(&mut self, name: impl Into<String>) -> &mut Registration {
        self.registrations.push(Registration::new(name.into()));
        let last = self.registrations.len() - 1;
        &mut self.registrations[last]
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// Registration by exact name.
    pub fn get(&self, name: &str) -> Option<&Registration> {
        self.registrations.iter().find(|r| r.name == name)
    }

    /// Every invokable name: registrations, then active built-ins.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.registrations.iter().map(|r| r.name.as_str()).collect();
        names.extend(self.builtins());
        names
    }

    /// Built-ins not shadowed by a registration.
    pub fn builtins(&self) -> Vec<&'static str> {
        builtin::NAMES
            .iter()
            .copied()
            .filter(|name| self.get(name).is_none())
            .collect()
    }

    /// Resolve `name` exactly, or as an abbreviation of exactly one name.
    pub fn find(&self, name: &str) -> Result<String, ConsoleError> {
        let names = self.names();
        if names.contains(&name) {
            return Ok(name.to_string());
        }

        let mut candidates: Vec<String> = names
            .into_iter()
            .filter(|candidate| abbreviates(name, candidate))
            .map(str::to_string)
            .collect();

        match candidates.len() {
            0 => Err(ConsoleError::NotFound {
                name: name.to_string(),
            }),
            1 => Ok(candidates.remove(0)),
            _ => Err(ConsoleError::Ambiguous {
                name: name.to_string(),
                candidates,
            }),
        }
    }

    /// Rewrite an abbreviated command name in `args` to its full name.
    ///
    /// The command name is the first argument after the program name that
    /// does not start with `-`. Unknown names are left for clap to report.
    pub fn resolve_args(&self, args: Vec<OsString>) -> Result<Vec<OsString>, ConsoleError> {
        let mut args = args;
        let position = args
            .iter()
            .skip(1)
            .position(|arg| !arg.to_string_lossy().starts_with('-'))
            .map(|i| i + 1);

        if let Some(i) = position {
            let typed = args[i].to_string_lossy().into_owned();
            if typed == "help" && self.get("help").is_none() {
                return Ok(args);
            }
            match self.find(&typed) {
                Ok(full) => {
                    if full != typed {
                        tracing::debug!(typed = %typed, command = %full, "resolved abbreviation");
                    }
                    args[i] = full.into();
                }
                Err(ConsoleError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(args)
    }

    /// Build the clap command tree.
    pub fn build(&self) -> Result<clap::Command, ConsoleError> {
        let mut root = clap::Command::new(self.bin_name.clone())
            .version(env!("CARGO_PKG_VERSION"))
            .subcommand_required(true)
            .arg_required_else_help(true);
        if !self.about.is_empty() {
            root = root.about(self.about.clone());
        }

        let mut seen = std::collections::BTreeSet::new();
        for registration in &self.registrations {
            if !seen.insert(registration.name.as_str()) {
                return Err(ConsoleError::Duplicate {
                    name: registration.name.clone(),
                });
            }
            params::validate(&registration.name, &registration.definition)?;

            let mut sub = clap::Command::new(registration.name.clone());
            if !registration.description.is_empty() {
                sub = sub.about(registration.description.clone());
            }
            for param in &registration.definition {
                sub = sub.arg(params::to_arg(param));
            }
            root = root.subcommand(sub);
        }

        for name in self.builtins() {
            root = root.subcommand(builtin::command(name));
        }
        Ok(root)
    }

    /// Run the command selected by `matches`.
    pub fn dispatch(&self, matches: &ArgMatches, output: &mut Output, context: RunContext) -> Result<i32> {
        let Some((name, sub)) = matches.subcommand() else {
            bail!("no command given");
        };

        let Some(registration) = self.get(name) else {
            return builtin::run(self, name, sub, output);
        };

        let code = registration
            .code
            .as_ref()
            .ok_or_else(|| anyhow!("command '{}' has no code attached", name))?;

        let mut input = params::to_input(name, &registration.definition, sub);
        input.set_interactive(context.interactive);
        input.set_worker_id(context.worker_id);

        tracing::debug!(command = name, interactive = context.interactive, "dispatching");
        code(&mut input, output)
    }

    /// Resolve, parse and dispatch `args` (program name first).
    ///
    /// Help and version requests are written to `output` and return 0.
    pub fn run<I, T>(&self, args: I, output: &mut Output, context: RunContext) -> Result<i32>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args = self.resolve_args(args.into_iter().map(Into::into).collect())?;
        match self.build()?.try_get_matches_from(args) {
            Ok(matches) => self.dispatch(&matches, output, context),
            Err(e) if !e.use_stderr() => {
                output.line(e.render())?;
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// True when every `:`-segment of `typed` is a prefix of the matching
/// segment of `name`.
fn abbreviates(typed: &str, name: &str) -> bool {
    let typed: Vec<&str> = typed.split(':').collect();
    let parts: Vec<&str> = name.split(':').collect();
    typed.len() <= parts.len()
        && typed
            .iter()
            .zip(&parts)
            .all(|(prefix, part)| part.starts_with(prefix))
}
