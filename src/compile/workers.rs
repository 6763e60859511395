//! compile::workers
//!
//! Worker fan-out policy from `spawnable` / `respawn` tags.

use serde_json::Value;

use super::args::ParamSpec;
use crate::core::descriptor::{tag, Descriptor};
use crate::core::flags::ParamFlags;

/// Name of the implicit option on spawnable commands.
pub const WORKERS_OPTION: &str = "workers";

/// How a command fans out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerPolicy {
    /// Run through the worker pool instead of calling the handler directly.
    pub enabled: bool,
    /// Replace every worker that exits.
    pub respawn_on_exit: bool,
}

/// Read the policy off a descriptor's tags.
pub fn resolve(descriptor: &dyn Descriptor) -> WorkerPolicy {
    WorkerPolicy {
        enabled: descriptor.has_any(tag::SPAWNABLE),
        respawn_on_exit: descriptor.has_any(tag::RESPAWN),
    }
}

/// The `--workers <n>` option added to spawnable commands.
pub fn workers_option() -> ParamSpec {
    ParamSpec::option(
        WORKERS_OPTION,
        ParamFlags::OPTIONAL,
        "Spawn the command this many times",
        Some(Value::from(1)),
    )
}
