//! Host configuration.
//!
//! [`HostConfig`] collects everything the bootstrapper needs before the runtime starts: where
//! the runtime library and its class libraries live, how the two execution domains are named,
//! whether debug symbols are attached, and how the soft debugger agent listens for a client.
//!
//! The defaults reproduce a development setup: the runtime's class libraries under
//! `mono/lib`, and a debugger agent listening on `127.0.0.1:2550` that suspends the process
//! until a debugger attaches.
//!
//! # Examples
//!
//! ```rust
//! use monohost::{DebuggerAgent, HostConfig};
//!
//! // CI run: no debugger, no waiting
//! let config = HostConfig::without_debugger().with_assemblies_path("/usr/lib/mono");
//! assert!(config.jit_options().is_empty());
//!
//! // Debug run on a custom port, without blocking at startup
//! let config = HostConfig::default()
//!     .with_debugger(DebuggerAgent::default().with_port(55555).with_suspend(false));
//! assert!(config.jit_options()[0].contains("address=127.0.0.1:55555"));
//! ```

use std::{
    fmt,
    net::{Ipv4Addr, SocketAddrV4},
    path::{Path, PathBuf},
};

use crate::Result;

/// Default port of the soft debugger agent
pub const DEFAULT_DEBUGGER_PORT: u16 = 2550;

/// Default log file of the soft debugger agent
pub const DEFAULT_DEBUGGER_LOG: &str = "logs/MonoDebugger.log";

/// Default search path for the runtime's class libraries
pub const DEFAULT_ASSEMBLIES_PATH: &str = "mono/lib";

/// Transport used by the soft debugger agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum Transport {
    /// TCP socket transport
    #[strum(to_string = "dt_socket")]
    DtSocket,
}

/// Settings of the runtime's soft debugger agent.
///
/// Rendered into the `--debugger-agent=...` option handed to the JIT before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerAgent {
    /// Transport between agent and debugger client
    pub transport: Transport,
    /// Address the agent binds to (server) or connects to (client). The agent splits host
    /// and port at the first `:`, so only IPv4 addresses can be expressed.
    pub address: SocketAddrV4,
    /// `true` to listen for a debugger client, `false` to connect out to one
    pub server: bool,
    /// `true` to block at startup until a debugger client is attached
    pub suspend: bool,
    /// Agent log verbosity
    pub log_level: u8,
    /// Agent log file, `None` for the runtime's default
    pub log_file: Option<PathBuf>,
}

impl Default for DebuggerAgent {
    fn default() -> Self {
        DebuggerAgent {
            transport: Transport::DtSocket,
            address: SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_DEBUGGER_PORT),
            server: true,
            suspend: true,
            log_level: 3,
            log_file: Some(PathBuf::from(DEFAULT_DEBUGGER_LOG)),
        }
    }
}

impl DebuggerAgent {
    /// Sets the port, keeping the bind address
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.address.set_port(port);
        self
    }

    /// Sets the full socket address
    #[must_use]
    pub fn with_address(mut self, address: SocketAddrV4) -> Self {
        self.address = address;
        self
    }

    /// Sets whether the runtime waits for a debugger client at startup
    #[must_use]
    pub fn with_suspend(mut self, suspend: bool) -> Self {
        self.suspend = suspend;
        self
    }

    /// Sets the agent log file
    #[must_use]
    pub fn with_log_file(mut self, log_file: Option<PathBuf>) -> Self {
        self.log_file = log_file;
        self
    }

    /// Renders the agent option string understood by the JIT's option parser.
    pub fn to_option(&self) -> String {
        self.to_string()
    }

    /// Creates the directory of the agent log file, the runtime does not.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the directory cannot be created.
    pub fn prepare(&self) -> Result<()> {
        if let Some(parent) = self
            .log_file
            .as_deref()
            .and_then(Path::parent)
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent)?;
        }

        Ok(())
    }
}

fn yes_no(flag: bool) -> char {
    if flag {
        'y'
    } else {
        'n'
    }
}

impl fmt::Display for DebuggerAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "--debugger-agent=transport={},address={},server={},suspend={},loglevel={}",
            self.transport,
            self.address,
            yes_no(self.server),
            yes_no(self.suspend),
            self.log_level
        )?;

        if let Some(log_file) = &self.log_file {
            write!(f, ",logfile={}", log_file.display())?;
        }

        Ok(())
    }
}

/// Configuration of the embedded runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Runtime shared library; `None` tries the environment and default names
    pub runtime_library: Option<PathBuf>,
    /// Search path for the runtime's class libraries
    pub assemblies_path: Option<PathBuf>,
    /// Runtime configuration directory (`etc`); when set, the library and configuration
    /// directories are registered together before the search path
    pub config_dir: Option<PathBuf>,
    /// Name of the root domain created by the JIT
    pub root_domain_name: String,
    /// Name of the secondary domain that assemblies are loaded into
    pub script_domain_name: String,
    /// Soft debugger agent, `None` to run without one
    pub debugger: Option<DebuggerAgent>,
    /// Use soft breakpoints (required by the soft debugger on most platforms)
    pub soft_breakpoints: bool,
    /// Initialise the debug subsystem and attach portable PDBs found next to assemblies
    pub debug_symbols: bool,
    /// Check that an image is a managed PE before handing it to the runtime
    pub verify_images: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            runtime_library: None,
            assemblies_path: Some(PathBuf::from(DEFAULT_ASSEMBLIES_PATH)),
            config_dir: None,
            root_domain_name: "MonoHostRuntime".to_string(),
            script_domain_name: "MonoHostScripts".to_string(),
            debugger: Some(DebuggerAgent::default()),
            soft_breakpoints: true,
            debug_symbols: true,
            verify_images: true,
        }
    }
}

impl HostConfig {
    /// Default configuration without the debugger agent and soft breakpoints.
    ///
    /// Debug symbols are still attached so managed stack traces carry file and line numbers.
    pub fn without_debugger() -> Self {
        HostConfig {
            debugger: None,
            soft_breakpoints: false,
            ..Default::default()
        }
    }

    /// Sets the runtime shared library
    #[must_use]
    pub fn with_runtime_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.runtime_library = Some(path.into());
        self
    }

    /// Sets the class library search path
    #[must_use]
    pub fn with_assemblies_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.assemblies_path = Some(path.into());
        self
    }

    /// Sets the runtime configuration directory
    #[must_use]
    pub fn with_config_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(path.into());
        self
    }

    /// Sets or clears the debugger agent
    #[must_use]
    pub fn with_debugger(mut self, debugger: impl Into<Option<DebuggerAgent>>) -> Self {
        self.debugger = debugger.into();
        self
    }

    /// Enables or disables debug symbol support
    #[must_use]
    pub fn with_debug_symbols(mut self, enabled: bool) -> Self {
        self.debug_symbols = enabled;
        self
    }

    /// Sets the domain names
    #[must_use]
    pub fn with_domain_names(mut self, root: impl Into<String>, scripts: impl Into<String>) -> Self {
        self.root_domain_name = root.into();
        self.script_domain_name = scripts.into();
        self
    }

    /// Options for the JIT's option parser, in the order they are passed.
    pub fn jit_options(&self) -> Vec<String> {
        let mut options = Vec::with_capacity(2);

        if let Some(debugger) = &self.debugger {
            options.push(debugger.to_option());
        }

        if self.soft_breakpoints {
            options.push("--soft-breakpoints".to_string());
        }

        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_agent_option() {
        assert_eq!(
            DebuggerAgent::default().to_option(),
            "--debugger-agent=transport=dt_socket,address=127.0.0.1:2550,server=y,suspend=y,loglevel=3,logfile=logs/MonoDebugger.log"
        );
    }

    #[test]
    fn agent_option_without_log_file() {
        let agent = DebuggerAgent::default()
            .with_port(4711)
            .with_suspend(false)
            .with_log_file(None);

        assert_eq!(
            agent.to_option(),
            "--debugger-agent=transport=dt_socket,address=127.0.0.1:4711,server=y,suspend=n,loglevel=3"
        );
    }

    #[test]
    fn agent_option_with_address() {
        let agent = DebuggerAgent::default()
            .with_address(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 7), 9000))
            .with_port(9001);

        assert!(agent
            .to_option()
            .starts_with("--debugger-agent=transport=dt_socket,address=10.0.0.7:9001,server=y"));
    }

    #[test]
    fn default_jit_options() {
        let options = HostConfig::default().jit_options();

        assert_eq!(options.len(), 2);
        assert!(options[0].starts_with("--debugger-agent=transport=dt_socket"));
        assert_eq!(options[1], "--soft-breakpoints");
    }

    #[test]
    fn without_debugger() {
        let config = HostConfig::without_debugger();

        assert!(config.jit_options().is_empty());
        assert!(config.debug_symbols);
        assert_eq!(
            config.assemblies_path.as_deref(),
            Some(Path::new(DEFAULT_ASSEMBLIES_PATH))
        );
    }

    #[test]
    fn transport_round_trip() {
        assert_eq!(Transport::DtSocket.to_string(), "dt_socket");
        assert_eq!("dt_socket".parse::<Transport>().unwrap(), Transport::DtSocket);
    }

    #[test]
    fn prepare_creates_log_directory() {
        let dir = std::env::temp_dir().join(format!("monohost_agent_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let agent = DebuggerAgent::default().with_log_file(Some(dir.join("logs/agent.log")));
        agent.prepare().unwrap();
        assert!(dir.join("logs").is_dir());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn prepare_without_directory() {
        let agent = DebuggerAgent::default().with_log_file(Some(PathBuf::from("agent.log")));
        agent.prepare().unwrap();
    }
}
