use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use monohost::{
    runtime::config::{DEFAULT_ASSEMBLIES_PATH, DEFAULT_DEBUGGER_LOG, DEFAULT_DEBUGGER_PORT},
    DebuggerAgent, HostConfig, InvokeStrategy,
};

/// monohost - boot the Mono runtime and call into a managed assembly
#[derive(Debug, Parser)]
#[command(name = "monohost", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    /// Path to the managed assembly to load.
    #[arg(
        value_name = "FILE",
        default_value = "TestAssembly/TestAssembly/bin/Debug/TestAssembly.dll"
    )]
    pub path: PathBuf,

    /// Namespace of the type to instantiate.
    #[arg(long, default_value = "MyAssembly")]
    pub namespace: String,

    /// Name of the type to instantiate.
    #[arg(long, default_value = "AnotherClass")]
    pub class: String,

    /// Value passed to both managed methods.
    #[arg(long, default_value_t = 5.0, allow_negative_numbers = true)]
    pub value: f32,

    /// Which invocation strategies to exercise.
    #[arg(long, value_enum, default_value_t = StrategySelection::Both)]
    pub strategy: StrategySelection,

    #[command(flatten)]
    pub runtime: RuntimeOptions,
}

/// Options shared by every run.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit the run report as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Options that configure the embedded runtime.
#[derive(Debug, Parser)]
pub struct RuntimeOptions {
    /// Path of the runtime shared library (overrides MONOHOST_RUNTIME_LIB).
    #[arg(long, value_name = "LIB")]
    pub runtime_lib: Option<PathBuf>,

    /// Directory the runtime searches for framework assemblies.
    #[arg(long, value_name = "DIR", default_value = DEFAULT_ASSEMBLIES_PATH)]
    pub assemblies_path: PathBuf,

    /// Port the soft debugger agent listens on.
    #[arg(long, value_name = "PORT", default_value_t = DEFAULT_DEBUGGER_PORT)]
    pub debugger_port: u16,

    /// Start without the soft debugger agent.
    #[arg(long)]
    pub no_debugger: bool,

    /// Do not wait for a debugger client before running managed code.
    #[arg(long)]
    pub no_suspend: bool,

    /// Log file of the debugger agent.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_DEBUGGER_LOG)]
    pub debugger_log: PathBuf,
}

/// Strategies selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategySelection {
    /// The runtime strategy on the reflective method, then the thunk strategy on the thunk method
    Both,
    /// Only `CalledViaRuntimeInvoke`
    Runtime,
    /// Only `CalledViaUnmanagedThunk`
    Thunk,
}

impl StrategySelection {
    /// The (method name, strategy) pairs to run, in order.
    pub fn calls(self) -> &'static [(&'static str, InvokeStrategy)] {
        const RUNTIME: (&str, InvokeStrategy) = ("CalledViaRuntimeInvoke", InvokeStrategy::Runtime);
        const THUNK: (&str, InvokeStrategy) = ("CalledViaUnmanagedThunk", InvokeStrategy::Thunk);

        match self {
            StrategySelection::Both => &[RUNTIME, THUNK],
            StrategySelection::Runtime => &[RUNTIME],
            StrategySelection::Thunk => &[THUNK],
        }
    }
}

impl RuntimeOptions {
    /// Maps the flags onto a runtime configuration.
    pub fn host_config(&self) -> HostConfig {
        let mut config = if self.no_debugger {
            HostConfig::without_debugger()
        } else {
            HostConfig::default().with_debugger(
                DebuggerAgent::default()
                    .with_port(self.debugger_port)
                    .with_suspend(!self.no_suspend)
                    .with_log_file(Some(self.debugger_log.clone())),
            )
        }
        .with_assemblies_path(self.assemblies_path.clone());

        if let Some(lib) = &self.runtime_lib {
            config = config.with_runtime_library(lib);
        }

        config
    }
}
