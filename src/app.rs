//! app
//!
//! Wires discovery, compilation, execution and the console together.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use cmdtag::app::App;
//! use cmdtag::core::descriptor::{tag, Definition};
//! use cmdtag::core::entry::AnnotationEntry;
//! use cmdtag::core::io::Output;
//! use cmdtag::console::RunContext;
//! use cmdtag::discovery::Catalog;
//!
//! let mut catalog = Catalog::new();
//! catalog.add(
//!     Definition::command("hello", |_, output| {
//!         output.line("hello")?;
//!         Ok(())
//!     })
//!     .tag(tag::CLI, AnnotationEntry::with_args(["hello"])),
//! );
//!
//! let console = App::new(catalog).prepare()?;
//! let (mut output, captured) = Output::capture();
//! console.run(["cmdtag", "hello"], &mut output, RunContext::default())?;
//! assert_eq!(captured.contents(), "hello\n");
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::compile::{Command, CommandCompiler, ValidatorTable};
use crate::console::{Console, RunContext};
use crate::core::io::Output;
use crate::discovery::Discovery;
use crate::engine::{ExecutionWrapper, ProcessSpawner};
use crate::ui::prompts::TerminalAsker;

/// Default binary name used for help and completion.
pub const BIN_NAME: &str = "cmdtag";

/// A command-line application assembled from discovered descriptors.
pub struct App {
    discovery: Box<dyn Discovery>,
    directories: Vec<PathBuf>,
    compiler: CommandCompiler,
    wrapper: ExecutionWrapper,
    bin_name: String,
    about: String,
}

impl App {
    /// App over `discovery`, prompting on the terminal and spawning workers
    /// by re-executing the current binary.
    pub fn new(discovery: impl Discovery + 'static) -> Self {
        let spawner = ProcessSpawner::from_env()
            .unwrap_or_else(|_| ProcessSpawner::new(BIN_NAME, Vec::new()));
        Self {
            discovery: Box::new(discovery),
            directories: Vec::new(),
            compiler: CommandCompiler::new(),
            wrapper: ExecutionWrapper::new(Arc::new(TerminalAsker), Arc::new(spawner)),
            bin_name: BIN_NAME.to_string(),
            about: String::new(),
        }
    }

    /// Add a directory to scan.
    pub fn add_directory(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.directories.push(dir.into());
        self
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    pub fn with_validators(mut self, validators: ValidatorTable) -> Self {
        self.compiler = CommandCompiler::with_validators(validators);
        self
    }

    pub fn with_wrapper(mut self, wrapper: ExecutionWrapper) -> Self {
        self.wrapper = wrapper;
        self
    }

    pub fn with_bin_name(mut self, bin_name: impl Into<String>) -> Self {
        self.bin_name = bin_name.into();
        self
    }

    pub fn with_about(mut self, about: impl Into<String>) -> Self {
        self.about = about.into();
        self
    }

    pub fn wrapper(&self) -> &ExecutionWrapper {
        &self.wrapper
    }

    /// Scan and compile. Every call starts from scratch; caching belongs
    /// to the discovery source.
    pub fn compile(&self) -> Result<Vec<Command>> {
        let descriptors = self.discovery.scan(&self.directories)?;
        let commands = self.compiler.compile(&descriptors)?;
        tracing::debug!(
            descriptors = descriptors.len(),
            commands = commands.len(),
            "compiled commands"
        );
        Ok(commands)
    }

    /// Compile and register every command with a fresh console.
    pub fn prepare(&self) -> Result<Console> {
        let mut console = Console::new(self.bin_name.clone()).with_about(self.about.clone());

        for command in self.compile()? {
            let command = Arc::new(command);
            let wrapper = self.wrapper.clone();
            let run = command.clone();
            console
                .register(command.name.clone())
                .set_description(command.description.clone())
                .set_definition(command.params.clone())
                .set_code(move |input, output| {
                    Ok(wrapper.invoke(&run, input, output)?.exit_code())
                });
        }

        Ok(console)
    }

    /// Prepare a console and run `args` (program name first) through it.
    pub fn run<I, T>(&self, args: I, output: &mut Output, context: RunContext) -> Result<i32>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        self.prepare()?.run(args, output, context)
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("directories", &self.directories)
            .field("bin_name", &self.bin_name)
            .field("wrapper", &self.wrapper)
            .finish_non_exhaustive()
    }
}
