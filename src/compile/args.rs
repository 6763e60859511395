//! compile::args
//!
//! Builds typed parameter specs from `argument` and `option` entries.
//!
//! # Entry shape
//!
//! ```text
//! argument(name, flags?, hint?)
//! option(name, flags?, hint?, default = value)
//! ```
//!
//! - `name` is required.
//! - `flags` is a pipe-delimited symbol list resolved against the kind's
//!   table (see [`crate::core::flags`]).
//! - `hint` defaults to the name.
//! - For options, a `default` forces `OPTIONAL` (and drops `REQUIRED` and
//!   `NO_VALUE`).
//!
//! # Hint shorthand
//!
//! `argument("name", "The user name")` has exactly two positional values and
//! a second value that is a single token but not a flag symbol. That token is
//! taken as the hint instead of failing. Anything else that does not resolve
//! is an error naming the token.

use serde_json::Value;

use super::error::CompileError;
use crate::core::descriptor::Descriptor;
use crate::core::entry::AnnotationEntry;
use crate::core::flags::{self, ParamFlags, ParamKind};

/// A compiled argument or option.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub flags: ParamFlags,
    pub hint: String,
    pub default: Option<Value>,
}

impl ParamSpec {
    /// A positional argument.
    pub fn argument(name: impl Into<String>, flags: ParamFlags, hint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Argument,
            flags,
            hint: hint.into(),
            default: None,
        }
    }

    /// A named option.
    pub fn option(
        name: impl Into<String>,
        flags: ParamFlags,
        hint: impl Into<String>,
        default: Option<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Option,
            flags,
            hint: hint.into(),
            default,
        }
    }

    /// True for arguments that must be given / options that need a value.
    pub fn is_required(&self) -> bool {
        self.flags.contains(ParamFlags::REQUIRED)
    }

    pub fn is_array(&self) -> bool {
        self.flags.contains(ParamFlags::IS_ARRAY)
    }

    /// True for options that accept a value.
    ///
    /// Options declared without any flags are switches.
    pub fn takes_value(&self) -> bool {
        match self.kind {
            ParamKind::Argument => true,
            ParamKind::Option => {
                !self.flags.contains(ParamFlags::NO_VALUE)
                    && self
                        .flags
                        .intersects(ParamFlags::REQUIRED | ParamFlags::OPTIONAL | ParamFlags::IS_ARRAY)
            }
        }
    }
}

/// Build every parameter of `kind` declared on `descriptor`, in declaration
/// order.
pub fn build(descriptor: &dyn Descriptor, kind: ParamKind) -> Result<Vec<ParamSpec>, CompileError> {
    descriptor
        .entries(kind.tag())
        .into_iter()
        .enumerate()
        .map(|(index, entry)| build_one(descriptor, entry, kind, index))
        .collect()
}

fn build_one(
    descriptor: &dyn Descriptor,
    entry: &AnnotationEntry,
    kind: ParamKind,
    index: usize,
) -> Result<ParamSpec, CompileError> {
    let name = entry
        .positional_text(0)
        .ok_or_else(|| CompileError::UnnamedEntry {
            descriptor: descriptor.id().to_string(),
            tag: kind.tag().to_string(),
            index,
        })?;

    let mut hint = entry.positional_text(2);
    let mut flags = ParamFlags::empty();

    if let Some(text) = entry.positional_text(1) {
        match flags::resolve(kind, &text) {
            Ok(resolved) => flags = resolved,
            Err(_) if is_hint_shorthand(entry, &text) => hint = Some(text),
            Err(source) => {
                return Err(CompileError::UnknownFlag {
                    descriptor: descriptor.id().to_string(),
                    param: name,
                    source,
                })
            }
        }
    }

    let hint = hint.unwrap_or_else(|| name.clone());

    let default = match kind {
        ParamKind::Option => entry.get("default").map(|value| {
            flags.remove(ParamFlags::REQUIRED | ParamFlags::NO_VALUE);
            flags.insert(ParamFlags::OPTIONAL);
            normalize_default(value, flags)
        }),
        ParamKind::Argument => None,
    };

    tracing::trace!(
        descriptor = descriptor.id(),
        %kind,
        name = %name,
        flags = ?flags,
        "built parameter"
    );

    Ok(match kind {
        ParamKind::Argument => ParamSpec::argument(name, flags, hint),
        ParamKind::Option => ParamSpec::option(name, flags, hint, default),
    })
}

/// Exactly two positional values, no explicit hint, and a single token.
fn is_hint_shorthand(entry: &AnnotationEntry, text: &str) -> bool {
    entry.len() == 2 && flags::tokens(text).len() == 1
}

/// Array options get array defaults; a scalar default becomes one element.
fn normalize_default(value: &Value, flags: ParamFlags) -> Value {
    match value {
        Value::Array(_) => value.clone(),
        scalar if flags.contains(ParamFlags::IS_ARRAY) => Value::Array(vec![scalar.clone()]),
        scalar => scalar.clone(),
    }
}
