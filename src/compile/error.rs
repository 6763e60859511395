//! compile::error
//!
//! Configuration errors raised while compiling descriptors into commands.
//!
//! These are fatal at startup: a command with a bad declaration is never
//! registered.

use thiserror::Error;

use crate::core::flags::FlagError;

/// Errors from the compile phase.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    /// A tag entry that needs a name has none.
    #[error("{descriptor}: {tag} entry #{index} has no name")]
    UnnamedEntry {
        descriptor: String,
        tag: String,
        index: usize,
    },

    /// A flag string contains an unknown symbol.
    #[error("{descriptor}: parameter '{param}': {source}")]
    UnknownFlag {
        descriptor: String,
        param: String,
        #[source]
        source: FlagError,
    },

    /// A prompt references a validator that is not in the table.
    #[error("{descriptor}: prompt '{option}' references unknown validator '{validator}'")]
    UnknownValidator {
        descriptor: String,
        option: String,
        validator: String,
    },

    /// Two parameters of one command share a name.
    #[error("{descriptor}: parameter '{name}' is declared more than once")]
    DuplicateParam { descriptor: String, name: String },
}

impl CompileError {
    /// The unknown flag token, when this is an [`CompileError::UnknownFlag`].
    pub fn flag_token(&self) -> Option<&str> {
        match self {
            CompileError::UnknownFlag { source, .. } => Some(&source.token),
            _ => None,
        }
    }
}
