//! discovery
//!
//! Producers of descriptors.
//!
//! # Contract
//!
//! A [`Discovery`] turns a set of directories into an ordered sequence of
//! descriptors. Descriptors are created once per scan and never mutated.
//!
//! # Sources
//!
//! - [`Catalog`] - descriptors registered in code; ignores directories
//! - [`ManifestDiscovery`] - `*.cmd.toml` manifests bound to named handlers
//! - [`CachedDiscovery`] - memoizes another source by directory set
//! - [`Chain`] - concatenates several sources in order

pub mod cache;
pub mod catalog;
pub mod manifest;

pub use cache::CachedDiscovery;
pub use catalog::Catalog;
pub use manifest::{HandlerTable, ManifestDiscovery, MANIFEST_SUFFIX};

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::core::descriptor::Descriptor;

/// Errors from discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A configured directory does not exist.
    #[error("discovery directory not found: {0}")]
    MissingDirectory(PathBuf),

    /// Walking or reading failed.
    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// A manifest is not valid TOML or does not match the schema.
    #[error("invalid manifest {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A manifest unit names a handler nobody registered.
    #[error("{path}: unknown {kind} '{name}'")]
    UnknownHandler {
        path: PathBuf,
        kind: &'static str,
        name: String,
    },
}

/// Something that produces descriptors from directories.
pub trait Discovery: Send + Sync {
    /// Scan `directories`, returning descriptors in a stable order.
    fn scan(&self, directories: &[PathBuf]) -> Result<Vec<Arc<dyn Descriptor>>, DiscoveryError>;
}

impl<D: Discovery + ?Sized> Discovery for Arc<D> {
    fn scan(&self, directories: &[PathBuf]) -> Result<Vec<Arc<dyn Descriptor>>, DiscoveryError> {
        (**self).scan(directories)
    }
}

/// Several sources, scanned in order.
#[derive(Default)]
pub struct Chain {
    sources: Vec<Box<dyn Discovery>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl Discovery + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Discovery for Chain {
    fn scan(&self, directories: &[PathBuf]) -> Result<Vec<Arc<dyn Descriptor>>, DiscoveryError> {
        let mut all = Vec::new();
        for source in &self.sources {
            all.extend(source.scan(directories)?);
        }
        Ok(all)
    }
}
