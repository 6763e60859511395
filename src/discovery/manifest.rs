//! discovery::manifest
//!
//! Descriptors declared in `*.cmd.toml` files.
//!
//! # Format
//!
//! ```toml
//! [[unit]]
//! handler = "greet"            # or `hook = "audit"` for a plugin
//! id = "greeting"              # optional, defaults to the handler name
//!
//! [[unit.tag]]
//! name = "cli"
//! args = ["demo:greet", "Say hello"]
//!
//! [[unit.tag]]
//! name = "option"
//! args = ["greeting", "VALUE_IS_ARRAY"]
//! named = { default = ["hi"] }
//! ```
//!
//! Handlers are code: a manifest only binds tag metadata to a closure that
//! was registered in a [`HandlerTable`] under the same name.
//!
//! # Ordering
//!
//! Directories are scanned in the order given. Within a directory files are
//! visited recursively in file-name order; units keep their order in the
//! file.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use serde_json::{Map, Value};
use walkdir::WalkDir;

use super::{Discovery, DiscoveryError};
use crate::core::descriptor::{CommandFn, Definition, Descriptor, HookFn};
use crate::core::entry::AnnotationEntry;
use crate::core::io::{Input, Output};

/// File suffix that marks a manifest.
pub const MANIFEST_SUFFIX: &str = ".cmd.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default)]
    unit: Vec<UnitDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnitDecl {
    id: Option<String>,
    handler: Option<String>,
    hook: Option<String>,
    #[serde(default)]
    tag: Vec<TagDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TagDecl {
    name: String,
    #[serde(default)]
    args: Vec<Value>,
    #[serde(default)]
    named: Map<String, Value>,
}

/// Named command handlers and plugin hooks that manifests can refer to.
#[derive(Clone, Default)]
pub struct HandlerTable {
    commands: BTreeMap<String, Arc<CommandFn>>,
    hooks: BTreeMap<String, Arc<HookFn>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command handler under `name`.
    pub fn command<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&Input, &mut Output) -> Result<()> + Send + Sync + 'static,
    {
        self.commands.insert(name.into(), Arc::new(handler));
        self
    }

    /// Register a plugin hook under `name`.
    pub fn hook<F>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn(&dyn Descriptor, &Input, &mut Output) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.insert(name.into(), Arc::new(hook));
        self
    }

    pub fn command_names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    pub fn hook_names(&self) -> Vec<&str> {
        self.hooks.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("commands", &self.command_names())
            .field("hooks", &self.hook_names())
            .finish()
    }
}

/// Scans directories for manifests.
#[derive(Debug, Clone)]
pub struct ManifestDiscovery {
    handlers: HandlerTable,
}

impl ManifestDiscovery {
    pub fn new(handlers: HandlerTable) -> Self {
        Self { handlers }
    }

    /// Manifest files under `dir`, in visiting order.
    pub fn manifests(dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
        if !dir.is_dir() {
            return Err(DiscoveryError::MissingDirectory(dir.to_path_buf()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| DiscoveryError::Read {
                path: e.path().unwrap_or(dir).to_path_buf(),
                message: e.to_string(),
            })?;
            let is_manifest = entry.file_type().is_file()
                && entry.file_name().to_string_lossy().ends_with(MANIFEST_SUFFIX);
            if is_manifest {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Parse one manifest into descriptors.
    pub fn load(&self, path: &Path) -> Result<Vec<Arc<dyn Descriptor>>, DiscoveryError> {
        let contents = fs::read_to_string(path).map_err(|e| DiscoveryError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let manifest: Manifest = toml::from_str(&contents).map_err(|e| DiscoveryError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut descriptors = Vec::with_capacity(manifest.unit.len());
        for (index, unit) in manifest.unit.into_iter().enumerate() {
            descriptors.push(self.unit(path, index, unit)?);
        }
        tracing::debug!(path = %path.display(), units = descriptors.len(), "loaded manifest");
        Ok(descriptors)
    }

    fn unit(&self, path: &Path, index: usize, unit: UnitDecl) -> Result<Arc<dyn Descriptor>, DiscoveryError> {
        let mut definition = match (unit.handler, unit.hook) {
            (Some(handler), None) => {
                let f = self.handlers.commands.get(&handler).ok_or_else(|| {
                    DiscoveryError::UnknownHandler {
                        path: path.to_path_buf(),
                        kind: "handler",
                        name: handler.clone(),
                    }
                })?;
                Definition::from_command_fn(unit.id.unwrap_or(handler), f.clone())
            }
            (None, Some(hook)) => {
                let f = self.handlers.hooks.get(&hook).ok_or_else(|| {
                    DiscoveryError::UnknownHandler {
                        path: path.to_path_buf(),
                        kind: "hook",
                        name: hook.clone(),
                    }
                })?;
                Definition::from_hook_fn(unit.id.unwrap_or(hook), f.clone())
            }
            _ => {
                return Err(DiscoveryError::Parse {
                    path: path.to_path_buf(),
                    message: format!("unit #{} needs exactly one of `handler` or `hook`", index + 1),
                })
            }
        };

        for tag in unit.tag {
            definition = definition.tag(
                &tag.name,
                AnnotationEntry {
                    args: tag.args,
                    named: tag.named,
                },
            );
        }
        Ok(definition.shared())
    }
}

impl Discovery for ManifestDiscovery {
    fn scan(&self, directories: &[PathBuf]) -> Result<Vec<Arc<dyn Descriptor>>, DiscoveryError> {
        let mut descriptors = Vec::new();
        for dir in directories {
            for file in Self::manifests(dir)? {
                descriptors.extend(self.load(&file)?);
            }
        }
        tracing::debug!(directories = directories.len(), descriptors = descriptors.len(), "manifest scan");
        Ok(descriptors)
    }
}
