//! core::descriptor
//!
//! Invokable units and their tag metadata.
//!
//! # Architecture
//!
//! A [`Descriptor`] is what discovery produces: something that can be invoked
//! with an [`Input`] and an [`Output`], plus the ordered tag entries declared
//! on it. Descriptors are created once per discovery pass and are read-only
//! afterwards; they are shared as `Arc<dyn Descriptor>`.
//!
//! [`Definition`] is the in-process registration record. Tags are declared
//! explicitly at startup instead of being recovered from doc comments:
//!
//! ```
//! use cmdtag::core::descriptor::{tag, Definition, Descriptor};
//! use cmdtag::core::entry::AnnotationEntry;
//!
//! let greet = Definition::command("greet", |input, output| {
//!     let name = input.argument_text("name").unwrap_or_default();
//!     output.line(format!("hello {name}"))?;
//!     Ok(())
//! })
//! .tag(tag::CLI, AnnotationEntry::with_args(["greet", "Say hello"]))
//! .tag(tag::ARGUMENT, AnnotationEntry::with_args(["name", "REQUIRED"]));
//!
//! assert!(greet.has_any(&[tag::CLI]));
//! assert_eq!(greet.entries(tag::ARGUMENT).len(), 1);
//! ```
//!
//! # Tag names
//!
//! Tag names are case-insensitive; they are stored lower-cased.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Result};

use super::entry::AnnotationEntry;
use super::io::{Input, Output};

/// Well-known tag names.
pub mod tag {
    /// Defines a command: `cli(name, description?)`.
    pub const CLI: &str = "cli";
    /// Declares a positional argument: `argument(name, flags?, hint?)`.
    pub const ARGUMENT: &str = "argument";
    /// Declares an option: `option(name, flags?, hint?, default = ..)`.
    pub const OPTION: &str = "option";
    /// Declares an interactive fallback: `prompt(option, question, secret =, validate =)`.
    pub const PROMPT: &str = "prompt";
    /// Marks a plugin hook: `cli_plugin(tag)`.
    pub const CLI_PLUGIN: &str = "cli_plugin";
    /// Fan out into worker processes.
    pub const SPAWNABLE: &[&str] = &["spawnable", "spawn"];
    /// Replace workers as they exit.
    pub const RESPAWN: &[&str] = &["respawn", "respawnable"];
    /// Refuse to run while another invocation of the same command holds its lock.
    pub const ONCE: &[&str] = &["once", "one"];
}

/// Handler for a command descriptor.
pub type CommandFn = dyn Fn(&Input, &mut Output) -> Result<()> + Send + Sync;

/// Handler for a plugin descriptor. Receives the command being run.
pub type HookFn = dyn Fn(&dyn Descriptor, &Input, &mut Output) -> Result<()> + Send + Sync;

/// An invokable unit with tag metadata.
pub trait Descriptor: Send + Sync + fmt::Debug {
    /// Identifier used in logs and errors.
    fn id(&self) -> &str;

    /// Every tag name present on this descriptor.
    fn tags(&self) -> BTreeSet<String>;

    /// Entries declared under `tag`, in declaration order.
    fn entries(&self, tag: &str) -> Vec<&AnnotationEntry>;

    /// True when any of `tags` is present.
    fn has_any(&self, tags: &[&str]) -> bool {
        let own = self.tags();
        tags.iter().any(|t| own.contains(&t.to_ascii_lowercase()))
    }

    /// Run the command handler.
    fn invoke(&self, input: &Input, output: &mut Output) -> Result<()>;

    /// Run as a plugin hook for `target`.
    ///
    /// Defaults to [`Descriptor::invoke`] for descriptors that do not care
    /// about the target.
    fn invoke_hook(&self, target: &dyn Descriptor, input: &Input, output: &mut Output) -> Result<()> {
        let _ = target;
        self.invoke(input, output)
    }
}

#[derive(Clone)]
enum Handler {
    Command(Arc<CommandFn>),
    Hook(Arc<HookFn>),
}

/// A descriptor declared in code (or built from a manifest).
#[derive(Clone)]
pub struct Definition {
    id: String,
    tags: Vec<(String, AnnotationEntry)>,
    handler: Handler,
}

impl Definition {
    /// Declare a command handler.
    pub fn command<F>(id: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Input, &mut Output) -> Result<()> + Send + Sync + 'static,
    {
        Self::from_command_fn(id, Arc::new(handler))
    }

    /// Declare a command from a shared handler.
    pub fn from_command_fn(id: impl Into<String>, handler: Arc<CommandFn>) -> Self {
        Self {
            id: id.into(),
            tags: Vec::new(),
            handler: Handler::Command(handler),
        }
    }

    /// Declare a plugin hook handler.
    pub fn plugin<F>(id: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&dyn Descriptor, &Input, &mut Output) -> Result<()> + Send + Sync + 'static,
    {
        Self::from_hook_fn(id, Arc::new(hook))
    }

    /// Declare a plugin from a shared hook.
    pub fn from_hook_fn(id: impl Into<String>, hook: Arc<HookFn>) -> Self {
        Self {
            id: id.into(),
            tags: Vec::new(),
            handler: Handler::Hook(hook),
        }
    }

    /// Add one tag entry.
    pub fn tag(mut self, name: &str, entry: AnnotationEntry) -> Self {
        self.tags.push((name.to_ascii_lowercase(), entry));
        self
    }

    /// Add a bare marker tag such as `spawnable`.
    pub fn mark(self, name: &str) -> Self {
        self.tag(name, AnnotationEntry::new())
    }

    /// Wrap into the shared form discovery hands out.
    pub fn shared(self) -> Arc<dyn Descriptor> {
        Arc::new(self)
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.handler {
            Handler::Command(_) => "command",
            Handler::Hook(_) => "plugin",
        };
        f.debug_struct("Definition")
            .field("id", &self.id)
            .field("kind", &kind)
            .field("tags", &self.tags)
            .finish()
    }
}

impl Descriptor for Definition {
    fn id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> BTreeSet<String> {
        self.tags.iter().map(|(name, _)| name.clone()).collect()
    }

    fn entries(&self, tag: &str) -> Vec<&AnnotationEntry> {
        let tag = tag.to_ascii_lowercase();
        self.tags
            .iter()
            .filter(|(name, _)| *name == tag)
            .map(|(_, entry)| entry)
            .collect()
    }

    fn invoke(&self, input: &Input, output: &mut Output) -> Result<()> {
        match &self.handler {
            Handler::Command(f) => f(input, output),
            Handler::Hook(_) => bail!("'{}' is a plugin hook, not a command", self.id),
        }
    }

    fn invoke_hook(&self, target: &dyn Descriptor, input: &Input, output: &mut Output) -> Result<()> {
        match &self.handler {
            Handler::Hook(f) => f(target, input, output),
            Handler::Command(f) => f(input, output),
        }
    }
}
