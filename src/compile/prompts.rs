//! compile::prompts
//!
//! Binds `prompt` entries to options with an interactive fallback.
//!
//! # Entry shape
//!
//! ```text
//! prompt(option, question?, secret = bool, validate = "validator")
//! ```
//!
//! Every prompt also declares a value-required option of the same name, so
//! it can always be answered non-interactively. When the option is already
//! declared by an `option` entry, the prompt binds to that option instead.
//!
//! Validators are looked up by name in a [`ValidatorTable`] at compile time.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::args::ParamSpec;
use super::error::CompileError;
use crate::core::descriptor::{tag, Descriptor};
use crate::core::flags::{ParamFlags, ParamKind};

/// Predicate over a resolved prompt value.
pub type CheckFn = dyn Fn(&str) -> bool + Send + Sync;

/// A named validator.
#[derive(Clone)]
pub struct Validator {
    name: String,
    check: Arc<CheckFn>,
}

impl Validator {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when `value` is acceptable.
    pub fn check(&self, value: &str) -> bool {
        (self.check)(value)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Validator").field(&self.name).finish()
    }
}

impl PartialEq for Validator {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Fixed table of validators available to `prompt(..., validate = ...)`.
#[derive(Clone, Default)]
pub struct ValidatorTable {
    entries: BTreeMap<String, Arc<CheckFn>>,
}

impl ValidatorTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in validators:
    ///
    /// - `non_empty`: at least one non-whitespace character
    /// - `integer`: parses as `i64`
    /// - `number`: parses as `f64`
    /// - `alphanumeric`: ASCII letters and digits only, non-empty
    /// - `identifier`: letters, digits, `_` or `-`, not starting with a digit
    /// - `email`: one `@` with non-empty local part and a dotted domain
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.register("non_empty", |v| !v.trim().is_empty());
        table.register("integer", |v| v.trim().parse::<i64>().is_ok());
        table.register("number", |v| v.trim().parse::<f64>().is_ok());
        table.register("alphanumeric", |v| {
            !v.is_empty() && v.chars().all(|c| c.is_ascii_alphanumeric())
        });
        table.register("identifier", |v| {
            let mut chars = v.chars();
            chars
                .next()
                .is_some_and(|c| c.is_alphabetic() || c == '_')
                && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        });
        table.register("email", |v| match v.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.split('.').count() >= 2
                    && domain.split('.').all(|part| !part.is_empty())
            }
            None => false,
        });
        table
    }

    /// Add or replace a validator.
    pub fn register<F>(&mut self, name: impl Into<String>, check: F) -> &mut Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(check));
        self
    }

    pub fn get(&self, name: &str) -> Option<Validator> {
        self.entries.get(name).map(|check| Validator {
            name: name.to_string(),
            check: check.clone(),
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for ValidatorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// A compiled prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    /// Option the prompt fills in.
    pub option: String,
    /// Question shown when the option is missing.
    pub question: String,
    /// Suppress echo while typing.
    pub hidden: bool,
    pub validator: Option<Validator>,
}

/// Build the prompts of `descriptor`, appending one value-required option
/// per prompt to `params` unless an option of that name already exists.
pub fn build(
    descriptor: &dyn Descriptor,
    validators: &ValidatorTable,
    params: &mut Vec<ParamSpec>,
) -> Result<Vec<PromptSpec>, CompileError> {
    let mut prompts: Vec<PromptSpec> = Vec::new();

    for (index, entry) in descriptor.entries(tag::PROMPT).into_iter().enumerate() {
        let option = entry
            .positional_text(0)
            .ok_or_else(|| CompileError::UnnamedEntry {
                descriptor: descriptor.id().to_string(),
                tag: tag::PROMPT.to_string(),
                index,
            })?;

        if prompts.iter().any(|p| p.option == option) {
            return Err(CompileError::DuplicateParam {
                descriptor: descriptor.id().to_string(),
                name: option,
            });
        }

        let validator = match entry.get_text("validate") {
            Some(name) => Some(validators.get(&name).ok_or_else(|| {
                CompileError::UnknownValidator {
                    descriptor: descriptor.id().to_string(),
                    option: option.clone(),
                    validator: name,
                }
            })?),
            None => None,
        };

        let question = entry
            .positional_text(1)
            .unwrap_or_else(|| format!("{}:", option));

        match params.iter().find(|p| p.name == option) {
            Some(existing) if existing.kind == ParamKind::Option => {}
            Some(_) => {
                return Err(CompileError::DuplicateParam {
                    descriptor: descriptor.id().to_string(),
                    name: option,
                })
            }
            None => params.push(ParamSpec::option(
                option.clone(),
                ParamFlags::REQUIRED,
                question.clone(),
                None,
            )),
        }

        prompts.push(PromptSpec {
            option,
            question,
            hidden: entry.is_set("secret"),
            validator,
        });
    }

    Ok(prompts)
}
