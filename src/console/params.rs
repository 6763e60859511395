//! console::params
//!
//! Mapping between compiled parameters and clap arguments.
//!
//! | ParamSpec                       | clap                                  |
//! |---------------------------------|---------------------------------------|
//! | argument                        | positional, `required` if REQUIRED    |
//! | argument IS_ARRAY               | positional, one or more values        |
//! | option without value flags      | `--name`, `SetTrue`                   |
//! | option IS_ARRAY                 | `--name <v>`, repeatable              |
//! | option OPTIONAL                 | `--name [<v>]`                        |
//! | option REQUIRED                 | `--name <v>`                          |
//!
//! Options are never mandatory on the command line: a value-required option
//! only means that `--name` must be followed by a value.

use clap::{Arg, ArgAction, ArgMatches};
use serde_json::Value;

use super::ConsoleError;
use crate::compile::ParamSpec;
use crate::core::entry::value_text;
use crate::core::flags::{ParamFlags, ParamKind};
use crate::core::io::Input;

/// Check positional ordering: required before optional, arrays last.
pub fn validate(command: &str, params: &[ParamSpec]) -> Result<(), ConsoleError> {
    let mut seen_optional = false;
    let mut seen_array = false;

    for param in params.iter().filter(|p| p.kind == ParamKind::Argument) {
        if seen_array {
            return Err(ConsoleError::InvalidDefinition {
                command: command.to_string(),
                message: format!("argument '{}' follows an array argument", param.name),
            });
        }
        if param.is_required() && seen_optional {
            return Err(ConsoleError::InvalidDefinition {
                command: command.to_string(),
                message: format!(
                    "required argument '{}' follows an optional one",
                    param.name
                ),
            });
        }
        seen_optional |= !param.is_required();
        seen_array |= param.is_array();
    }
    Ok(())
}

/// Build the clap argument for one parameter.
pub fn to_arg(param: &ParamSpec) -> Arg {
    match param.kind {
        ParamKind::Argument => argument(param),
        ParamKind::Option => option(param),
    }
}

fn argument(param: &ParamSpec) -> Arg {
    let arg = Arg::new(param.name.clone())
        .value_name(param.name.to_uppercase())
        .help(param.hint.clone())
        .required(param.is_required())
        .value_parser(clap::value_parser!(String));

    if param.is_array() {
        arg.num_args(1..).action(ArgAction::Append)
    } else {
        arg.action(ArgAction::Set)
    }
}

fn option(param: &ParamSpec) -> Arg {
    let arg = Arg::new(param.name.clone())
        .long(param.name.clone())
        .help(param.hint.clone());

    if !param.takes_value() || param.flags.contains(ParamFlags::NO_VALUE) {
        return arg.action(ArgAction::SetTrue);
    }

    let arg = arg
        .value_name(param.name.to_uppercase())
        .value_parser(clap::value_parser!(String));

    if param.is_array() {
        let defaults = param.default.as_ref().map(texts).unwrap_or_default();
        let arg = arg.action(ArgAction::Append).num_args(1);
        return if defaults.is_empty() {
            arg
        } else {
            arg.default_values(defaults)
        };
    }

    let arg = arg.action(ArgAction::Set);
    let arg = if param.flags.contains(ParamFlags::OPTIONAL) {
        arg.num_args(0..=1).default_missing_value("")
    } else {
        arg.num_args(1)
    };
    match param.default.as_ref().and_then(value_text) {
        Some(default) => arg.default_value(default),
        None => arg,
    }
}

fn texts(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_text).collect(),
        other => value_text(other).into_iter().collect(),
    }
}

/// Read parsed values into an [`Input`]. Missing values become `null`.
pub fn to_input(command: &str, params: &[ParamSpec], matches: &ArgMatches) -> Input {
    let mut input = Input::new(command);

    for param in params {
        let id = param.name.as_str();
        let value = if param.kind == ParamKind::Option
            && (!param.takes_value() || param.flags.contains(ParamFlags::NO_VALUE))
        {
            Value::Bool(matches.get_flag(id))
        } else if param.is_array() {
            match matches.get_many::<String>(id) {
                Some(values) => Value::Array(values.cloned().map(Value::String).collect()),
                None => Value::Null,
            }
        } else {
            matches
                .get_one::<String>(id)
                .cloned()
                .map(Value::String)
                .unwrap_or(Value::Null)
        };

        match param.kind {
            ParamKind::Argument => input.set_argument(id, value),
            ParamKind::Option => input.set_option(id, value),
        }
    }

    input
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Command;
    use serde_json::json;

    fn parse(params: &[ParamSpec], args: &[&str]) -> Input {
        let mut cmd = Command::new("test").no_binary_name(true);
        for param in params {
            cmd = cmd.arg(to_arg(param));
        }
        let matches = cmd.try_get_matches_from(args).unwrap();
        to_input("test", params, &matches)
    }

    fn greeting() -> Vec<ParamSpec> {
        vec![
            ParamSpec::argument("name", ParamFlags::REQUIRED, "name"),
            ParamSpec::option(
                "greeting",
                ParamFlags::OPTIONAL | ParamFlags::IS_ARRAY,
                "greeting",
                Some(json!(["hi"])),
            ),
        ]
    }

    #[test]
    fn array_default_applies_when_omitted() {
        let input = parse(&greeting(), &["Bob"]);
        assert_eq!(input.argument_text("name").as_deref(), Some("Bob"));
        assert_eq!(input.option("greeting"), Some(&json!(["hi"])));
    }

    #[test]
    fn repeated_array_option_replaces_default() {
        let input = parse(&greeting(), &["Bob", "--greeting", "yo", "--greeting=hey"]);
        assert_eq!(input.option_list("greeting"), vec!["yo", "hey"]);
    }

    #[test]
    fn missing_required_argument_is_rejected() {
        let mut cmd = Command::new("test").no_binary_name(true);
        for param in greeting() {
            cmd = cmd.arg(to_arg(&param));
        }
        assert!(cmd.try_get_matches_from(Vec::<&str>::new()).is_err());
    }

    #[test]
    fn switches_and_value_options() {
        let params = vec![
            ParamSpec::option("force", ParamFlags::empty(), "force", None),
            ParamSpec::option("into", ParamFlags::REQUIRED, "into", None),
            ParamSpec::option("workers", ParamFlags::OPTIONAL, "n", Some(json!(1))),
        ];

        let input = parse(&params, &["--force", "--into", "/tmp"]);
        assert_eq!(input.option("force"), Some(&json!(true)));
        assert_eq!(input.option_text("into").as_deref(), Some("/tmp"));
        assert_eq!(input.option_text("workers").as_deref(), Some("1"));

        let input = parse(&params, &["--workers=3"]);
        assert_eq!(input.option("force"), Some(&json!(false)));
        assert_eq!(input.option("into"), None);
        assert_eq!(input.option_text("workers").as_deref(), Some("3"));
    }

    #[test]
    fn array_argument_collects_rest() {
        let params = vec![ParamSpec::argument(
            "paths",
            ParamFlags::IS_ARRAY,
            "paths",
        )];
        let input = parse(&params, &["a", "b", "--", "-c"]);
        assert_eq!(input.argument_list("paths"), vec!["a", "b", "-c"]);

        let input = parse(&params, &[]);
        assert_eq!(input.argument("paths"), None);
    }

    #[test]
    fn positional_ordering_is_validated() {
        let bad = vec![
            ParamSpec::argument("a", ParamFlags::OPTIONAL, "a"),
            ParamSpec::argument("b", ParamFlags::REQUIRED, "b"),
        ];
        assert!(matches!(
            validate("x", &bad),
            Err(ConsoleError::InvalidDefinition { .. })
        ));

        let bad = vec![
            ParamSpec::argument("a", ParamFlags::IS_ARRAY, "a"),
            ParamSpec::argument("b", ParamFlags::OPTIONAL, "b"),
        ];
        assert!(validate("x", &bad).is_err());

        assert!(validate("x", &greeting()).is_ok());
    }
}
