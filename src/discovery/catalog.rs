//! discovery::catalog
//!
//! Descriptors registered in code at startup.

use std::path::PathBuf;
use std::sync::Arc;

use super::{Discovery, DiscoveryError};
use crate::core::descriptor::{Definition, Descriptor};

/// An in-process registration table.
///
/// Scanning returns the registered descriptors in registration order and
/// ignores the directories it is given.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    descriptors: Vec<Arc<dyn Descriptor>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition.
    pub fn add(&mut self, definition: Definition) -> &mut Self {
        self.descriptors.push(definition.shared());
        self
    }

    /// Register an already shared descriptor.
    pub fn push(&mut self, descriptor: Arc<dyn Descriptor>) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl FromIterator<Definition> for Catalog {
    fn from_iter<I: IntoIterator<Item = Definition>>(iter: I) -> Self {
        Self {
            descriptors: iter.into_iter().map(Definition::shared).collect(),
        }
    }
}

impl Discovery for Catalog {
    fn scan(&self, _directories: &[PathBuf]) -> Result<Vec<Arc<dyn Descriptor>>, DiscoveryError> {
        Ok(self.descriptors.clone())
    }
}
