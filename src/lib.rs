// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
// - 'file/physical.rs' uses mmap to map a file into memory
// - 'runtime/*' calls into the runtime's C embedding API

//! # monohost
//!
//! Embed the Mono managed runtime in a native process. `monohost` loads the runtime's shared
//! library at startup, boots it with an optional soft debugger agent, loads compiled .NET
//! assemblies together with their portable debug symbols, and invokes managed methods either
//! reflectively or through direct unmanaged thunks.
//!
//! ## Features
//!
//! - **Checked bootstrap** - every step of starting the runtime reports failure as an [`Error`]
//! - **Typed handles** - domains, assemblies, classes, objects and methods only exist after a
//!   successful lookup, and cannot outlive the [`Runtime`]
//! - **Scoped buffers** - assembly and symbol bytes are memory-mapped and released
//!   deterministically
//! - **Debugging** - soft debugger agent configuration and portable PDB attachment
//! - **Two calling conventions** - one [`Method::invoke`] with an [`InvokeStrategy`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use monohost::prelude::*;
//!
//! let runtime = Runtime::new(HostConfig::without_debugger())?;
//! let domain = runtime.script_domain();
//!
//! let assembly = domain.load_assembly("TestAssembly.dll")?;
//! let class = assembly.class("MyAssembly", "AnotherClass")?;
//! let instance = domain.instantiate(&class)?;
//!
//! let method = class.method("CalledViaRuntimeInvoke", 1)?;
//! method.invoke(&instance, 5.0f32, InvokeStrategy::Runtime)?;
//! # Ok::<(), monohost::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - Byte reader, PE preflight and debug symbol location; no runtime required
//! - [`runtime`] - Runtime library binding, bootstrap, domains, assemblies and invocation
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Runtime Library
//!
//! The runtime is opened at run time, so building `monohost` does not require it. The library is
//! taken from [`HostConfig::runtime_library`], the `MONOHOST_RUNTIME_LIB` environment variable,
//! or the platform's default names, in that order.
//!
//! ## Error Handling
//!
//! ```rust,no_run
//! use monohost::{Error, HostConfig, Runtime};
//!
//! let runtime = Runtime::new(HostConfig::without_debugger())?;
//! let assembly = runtime.script_domain().load_assembly("TestAssembly.dll")?;
//!
//! match assembly.class("MyAssembly", "Missing") {
//!     Ok(class) => println!("Found {}", class.full_name()),
//!     Err(Error::ClassNotFound { namespace, name }) => println!("No {namespace}.{name}"),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! # Ok::<(), monohost::Error>(())
//! ```
//!
//! ## Development and Testing
//!
//! ```bash
//! cargo test
//!
//! # End-to-end tests need the runtime and the compiled demo assembly
//! MONOHOST_RUNTIME_LIB=/usr/lib/libmonosgen-2.0.so.1 cargo test --test mono
//!
//! # Fuzz the image and symbol parsers
//! cargo +nightly fuzz run image --release
//! ```

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use monohost::prelude::*;
///
/// let runtime = Runtime::new(HostConfig::default())?;
/// # Ok::<(), monohost::Error>(())
/// ```
pub mod prelude;

/// Assembly and symbol file access.
///
/// Everything in this module works without the runtime: reading images into owned buffers,
/// verifying that they are managed PE files, and finding and classifying debug symbols.
///
/// # Key Types
///
/// - [`file::Backend`] - Byte source trait, with [`file::Physical`] and [`file::Memory`]
/// - [`file::read_bytes`] - Reads a whole file, rejecting missing and empty files
/// - [`file::inspect_image`] - Checks for a CLR runtime header
/// - [`file::symbols::locate`] - Finds `<assembly>.pdb` or `<assembly-stem>.pdb`
pub mod file;

/// The embedded runtime and its handles.
///
/// See [`runtime::Runtime`] for the bootstrap sequence.
pub mod runtime;

pub use error::Error;

/// The generic Result type used throughout monohost.
pub type Result<T> = std::result::Result<T, Error>;

pub use runtime::{
    config::{DebuggerAgent, HostConfig, Transport},
    Assembly, Class, Domain, ImageOpenStatus, InvokeStrategy, Method, NativeArg, Object, Runtime,
};
