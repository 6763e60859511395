//! core::flags
//!
//! Parameter flag bitset and the per-kind symbol tables.
//!
//! # Symbols
//!
//! Declarations spell flags as pipe-delimited symbols, e.g.
//! `VALUE_REQUIRED|VALUE_IS_ARRAY`. Each parameter kind has its own fixed
//! table:
//!
//! | Kind       | Symbols                                                       |
//! |------------|---------------------------------------------------------------|
//! | `argument` | `REQUIRED`, `OPTIONAL`, `IS_ARRAY`                            |
//! | `option`   | `VALUE_NONE`, `VALUE_REQUIRED`, `VALUE_OPTIONAL`, `VALUE_IS_ARRAY` |
//!
//! Tokens are trimmed and upper-cased before lookup, so `" value_required "`
//! resolves like `VALUE_REQUIRED`. Empty tokens are ignored.

use std::fmt;

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Resolved parameter flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParamFlags: u8 {
        /// Argument must be supplied / option requires a value.
        const REQUIRED = 1;
        /// Argument may be omitted / option value may be omitted.
        const OPTIONAL = 1 << 1;
        /// Parameter accepts multiple values.
        const IS_ARRAY = 1 << 2;
        /// Option is a switch and takes no value.
        const NO_VALUE = 1 << 3;
    }
}

/// Kind of a compiled parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Positional argument.
    Argument,
    /// Named `--option`.
    Option,
}

const ARGUMENT_SYMBOLS: &[(&str, ParamFlags)] = &[
    ("REQUIRED", ParamFlags::REQUIRED),
    ("OPTIONAL", ParamFlags::OPTIONAL),
    ("IS_ARRAY", ParamFlags::IS_ARRAY),
];

const OPTION_SYMBOLS: &[(&str, ParamFlags)] = &[
    ("VALUE_NONE", ParamFlags::NO_VALUE),
    ("VALUE_REQUIRED", ParamFlags::REQUIRED),
    ("VALUE_OPTIONAL", ParamFlags::OPTIONAL),
    ("VALUE_IS_ARRAY", ParamFlags::IS_ARRAY),
];

impl ParamKind {
    /// Tag name that declares parameters of this kind.
    pub fn tag(self) -> &'static str {
        match self {
            ParamKind::Argument => crate::core::descriptor::tag::ARGUMENT,
            ParamKind::Option => crate::core::descriptor::tag::OPTION,
        }
    }

    /// Symbol table for this kind.
    pub fn symbols(self) -> &'static [(&'static str, ParamFlags)] {
        match self {
            ParamKind::Argument => ARGUMENT_SYMBOLS,
            ParamKind::Option => OPTION_SYMBOLS,
        }
    }

    /// Look up one already-normalized symbol.
    pub fn lookup(self, symbol: &str) -> Option<ParamFlags> {
        self.symbols()
            .iter()
            .find(|(name, _)| *name == symbol)
            .map(|(_, flags)| *flags)
    }

    /// Comma-separated list of valid symbols, for error messages.
    pub fn valid_symbols(self) -> String {
        self.symbols()
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// An unknown symbol in a flag string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} flag '{token}' (valid: {valid})")]
pub struct FlagError {
    /// Kind the flag string was resolved for.
    pub kind: ParamKind,
    /// The offending token, trimmed but otherwise as written.
    pub token: String,
    /// The valid symbols for `kind`.
    pub valid: String,
}

/// Split a flag string into its non-empty, trimmed tokens.
pub fn tokens(text: &str) -> Vec<&str> {
    text.split('|')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Resolve a pipe-delimited flag string for `kind`.
///
/// The result is the OR of every symbol's value. The first unknown token
/// fails the whole string.
///
/// # Example
///
/// ```
/// use cmdtag::core::flags::{resolve, ParamFlags, ParamKind};
///
/// let flags = resolve(ParamKind::Option, "VALUE_REQUIRED | value_is_array").unwrap();
/// assert_eq!(flags, ParamFlags::REQUIRED | ParamFlags::IS_ARRAY);
///
/// let err = resolve(ParamKind::Argument, "REQUIRED|BOGUS").unwrap_err();
/// assert_eq!(err.token, "BOGUS");
/// ```
pub fn resolve(kind: ParamKind, text: &str) -> Result<ParamFlags, FlagError> {
    let mut flags = ParamFlags::empty();
    for token in tokens(text) {
        match kind.lookup(&token.to_ascii_uppercase()) {
            Some(bits) => flags |= bits,
            None => {
                return Err(FlagError {
                    kind,
                    token: token.to_string(),
                    valid: kind.valid_symbols(),
                })
            }
        }
    }
    Ok(flags)
}
