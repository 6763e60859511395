//! compile::plugins
//!
//! Plugin hooks keyed by the tag name they react to.
//!
//! # Matching
//!
//! A descriptor tagged `cli_plugin("audited")` is a hook for every command
//! that itself carries an `audited` tag. The registry is built once during
//! compilation; each command gets its matching hooks resolved by exact
//! (lower-cased) name.
//!
//! Hooks run in registration order, before prompts and before the handler.
//! A failing hook aborts the command.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use super::error::CompileError;
use crate::core::descriptor::{tag, Descriptor};
use crate::core::io::{Input, Output};

/// One registered hook.
#[derive(Clone)]
pub struct PluginCallable {
    name: String,
    descriptor: Arc<dyn Descriptor>,
}

impl PluginCallable {
    /// Tag name this hook reacts to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of the hook's own descriptor.
    pub fn id(&self) -> &str {
        self.descriptor.id()
    }

    /// Run the hook for `target`.
    pub fn call(&self, target: &dyn Descriptor, input: &Input, output: &mut Output) -> Result<()> {
        self.descriptor.invoke_hook(target, input, output)
    }
}

impl fmt::Debug for PluginCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCallable")
            .field("name", &self.name)
            .field("id", &self.descriptor.id())
            .finish()
    }
}

/// Registered hooks in registration order.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    hooks: Vec<PluginCallable>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every `cli_plugin` entry found on `descriptors`.
    pub fn load(descriptors: &[Arc<dyn Descriptor>]) -> Result<Self, CompileError> {
        let mut registry = Self::new();
        for descriptor in descriptors {
            for (index, entry) in descriptor.entries(tag::CLI_PLUGIN).into_iter().enumerate() {
                let name = entry
                    .positional_text(0)
                    .ok_or_else(|| CompileError::UnnamedEntry {
                        descriptor: descriptor.id().to_string(),
                        tag: tag::CLI_PLUGIN.to_string(),
                        index,
                    })?;
                registry.register(name, descriptor.clone());
            }
        }
        Ok(registry)
    }

    /// Register one hook under `name`.
    pub fn register(&mut self, name: impl Into<String>, descriptor: Arc<dyn Descriptor>) {
        let name = name.into().to_ascii_lowercase();
        tracing::debug!(plugin = descriptor.id(), tag = %name, "registered plugin");
        self.hooks.push(PluginCallable { name, descriptor });
    }

    /// Hooks registered under `name`, in registration order.
    #[cfg(test)]
    pub(crate) fn hooks(&self, name: &str) -> Vec<&PluginCallable> {
        let name = name.to_ascii_lowercase();
        self.hooks.iter().filter(|h| h.name == name).collect()
    }

    /// Hooks whose name is one of `descriptor`'s tags, in registration order.
    pub fn matching(&self, descriptor: &dyn Descriptor) -> Vec<PluginCallable> {
        let tags = descriptor.tags();
        self.hooks
            .iter()
            .filter(|h| tags.contains(&h.name))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
