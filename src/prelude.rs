//! # monohost Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the monohost library. Import this module to get quick access to everything needed
//! to boot the runtime, load an assembly and call into it.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all monohost operations
pub use crate::Error;

/// The result type used throughout monohost
pub use crate::Result;

// ================================================================================================
// Configuration
// ================================================================================================

/// Runtime configuration
pub use crate::runtime::config::{DebuggerAgent, HostConfig};

// ================================================================================================
// Runtime and Handles
// ================================================================================================

/// The embedded runtime and its handles
pub use crate::runtime::{Assembly, Class, Domain, Method, Object, Runtime};

/// Invocation strategy and argument types
pub use crate::runtime::{InvokeStrategy, NativeArg};

// ================================================================================================
// Files
// ================================================================================================

/// Byte sources and the byte reader
pub use crate::file::{read_bytes, Backend};

/// Debug symbols
pub use crate::file::symbols::{DebugSymbols, SymbolFormat};
