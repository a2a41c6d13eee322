//! The embedded managed runtime.
//!
//! [`Runtime`] boots the runtime once per process and owns its two execution domains: the root
//! domain created by the JIT, and a secondary script domain that is made current on the
//! calling thread and receives the host's assemblies. Everything else in this module is a typed
//! handle borrowed from the [`Runtime`]:
//!
//! - [`Domain`] - an execution domain; loads assemblies and allocates objects
//! - [`Assembly`] - a loaded assembly, with its debug symbols if they were found
//! - [`Class`] - a type resolved by namespace and name
//! - [`Object`] - a managed object, pinned for as long as the handle lives
//! - [`Method`] - a method resolved by name and arity, invocable through an [`InvokeStrategy`]
//!
//! Handles can only be produced by successful lookups, so a null pointer never escapes the
//! embedding API. Their lifetimes are tied to the runtime, which makes it impossible to use one
//! after shutdown.
//!
//! # Thread Affinity
//!
//! The runtime registers the bootstrapping thread as its main thread and activates the script
//! domain on it. [`Runtime`] and all handles are neither `Send` nor `Sync`, so every managed
//! call happens on that thread.
//!
//! # Examples
//!
//! ```rust,no_run
//! use monohost::{HostConfig, InvokeStrategy, Runtime};
//!
//! let runtime = Runtime::new(HostConfig::without_debugger())?;
//! let domain = runtime.script_domain();
//!
//! let assembly = domain.load_assembly("TestAssembly/TestAssembly/bin/Debug/TestAssembly.dll")?;
//! let class = assembly.class("MyAssembly", "AnotherClass")?;
//! let instance = domain.instantiate(&class)?;
//!
//! class
//!     .method("CalledViaRuntimeInvoke", 1)?
//!     .invoke(&instance, 5.0f32, InvokeStrategy::Runtime)?;
//! class
//!     .method("CalledViaUnmanagedThunk", 1)?
//!     .invoke(&instance, 5.0f32, InvokeStrategy::Thunk)?;
//! # Ok::<(), monohost::Error>(())
//! ```

pub mod api;
pub mod config;

mod assembly;
mod class;
mod domain;
mod exception;
mod method;

pub use assembly::{Assembly, ImageOpenStatus};
pub use class::{Class, Object};
pub use domain::Domain;
pub use method::{InvokeStrategy, Method, NativeArg};

use std::{
    ffi::{c_char, c_int, CStr, CString},
    path::Path,
    ptr::{self, NonNull},
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{
    runtime::{
        api::{MonoApi, MonoDomain, MONO_DEBUG_FORMAT_MONO},
        config::HostConfig,
    },
    Error, Result,
};

/// Set once the runtime has been started; the runtime cannot be started twice per process.
static STARTED: AtomicBool = AtomicBool::new(false);

/// Converts a host string into a C string for the runtime.
pub(crate) fn c_string(value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| Error::InvalidName(value.to_string()))
}

/// Converts a path into a C string for the runtime without altering its bytes.
///
/// On Unix the raw bytes of the path are passed through. Elsewhere the path must be valid
/// Unicode.
pub(crate) fn c_path(path: &Path) -> Result<CString> {
    let invalid = || Error::InvalidName(path.display().to_string());

    #[cfg(unix)]
    let bytes = {
        use std::os::unix::ffi::OsStrExt;
        path.as_os_str().as_bytes()
    };
    #[cfg(not(unix))]
    let bytes = path.to_str().ok_or_else(invalid)?.as_bytes();

    CString::new(bytes).map_err(|_| invalid())
}

/// Copies a runtime-owned C string. Null yields an empty string.
///
/// # Safety
/// `value` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn from_c_string(value: *const c_char) -> String {
    if value.is_null() {
        return String::new();
    }

    CStr::from_ptr(value).to_string_lossy().into_owned()
}

/// The embedded managed runtime.
///
/// Created once per process by [`Runtime::new`]. Dropping it unloads the script domain and shuts
/// the JIT down; the runtime cannot be restarted afterwards.
pub struct Runtime {
    api: MonoApi,
    config: HostConfig,
    root: NonNull<MonoDomain>,
    scripts: NonNull<MonoDomain>,
    /// Option strings handed to the JIT, kept alive for the runtime's lifetime
    _jit_options: Vec<CString>,
}

impl Runtime {
    /// Boots the runtime.
    ///
    /// Steps, in order: load the runtime library; register the library search path; hand the
    /// debugger agent and soft-breakpoint options to the JIT; initialise the debug subsystem;
    /// start the JIT and create the root domain; register the root domain with the debugger;
    /// register the calling thread as the runtime's main thread; create the script domain and
    /// make it current on this thread.
    ///
    /// With a suspending debugger agent configured, this call blocks until a debugger client
    /// attaches.
    ///
    /// # Errors
    /// - [`crate::Error::RuntimeLibrary`] / [`crate::Error::MissingSymbol`] if the runtime
    ///   library is unusable
    /// - [`crate::Error::AlreadyInitialized`] if a runtime was already started in this process
    /// - [`crate::Error::InvalidName`] if a configured path or name contains a NUL byte
    /// - [`crate::Error::FileError`] if the debugger log directory cannot be created
    /// - [`crate::Error::RuntimeInit`], [`crate::Error::DomainCreate`],
    ///   [`crate::Error::DomainSet`] if the runtime fails to start
    pub fn new(config: HostConfig) -> Result<Runtime> {
        let api = MonoApi::load(config.runtime_library.as_deref())?;

        let assemblies_path = config
            .assemblies_path
            .as_deref()
            .map(c_path)
            .transpose()?;
        let config_dir = config
            .config_dir
            .as_deref()
            .map(c_path)
            .transpose()?;
        let root_name = c_string(&config.root_domain_name)?;
        let script_name = c_string(&config.script_domain_name)?;
        let jit_options = config
            .jit_options()
            .iter()
            .map(|option| c_string(option))
            .collect::<Result<Vec<_>>>()?;

        if let Some(debugger) = &config.debugger {
            debugger.prepare()?;
        }

        if STARTED.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyInitialized);
        }

        log::info!("Starting managed runtime from {}", api.path().display());

        unsafe {
            if let (Some(lib_dir), Some(config_dir)) = (&assemblies_path, &config_dir) {
                (api.mono_set_dirs)(lib_dir.as_ptr(), config_dir.as_ptr());
            }

            if let Some(path) = &assemblies_path {
                log::debug!("Assemblies search path: {}", path.to_string_lossy());
                (api.mono_set_assemblies_path)(path.as_ptr());
            }

            if !jit_options.is_empty() {
                for option in &jit_options {
                    log::debug!("JIT option: {}", option.to_string_lossy());
                }

                let mut argv: Vec<*mut c_char> = jit_options
                    .iter()
                    .map(|option| option.as_ptr().cast_mut())
                    .collect();
                (api.mono_jit_parse_options)(argv.len() as c_int, argv.as_mut_ptr());
            }

            if config.debug_symbols {
                (api.mono_debug_init)(MONO_DEBUG_FORMAT_MONO);
            }

            if let Some(debugger) = config.debugger.as_ref().filter(|agent| agent.suspend) {
                log::info!(
                    "Waiting for a debugger client on {} before continuing",
                    debugger.address
                );
            }

            let root = NonNull::new((api.mono_jit_init)(root_name.as_ptr()))
                .ok_or_else(|| Error::RuntimeInit(config.root_domain_name.clone()))?;
            log::debug!("Root domain `{}` created", config.root_domain_name);

            if config.debug_symbols {
                (api.mono_debug_domain_create)(root.as_ptr());
            }

            (api.mono_thread_set_main)((api.mono_thread_current)());

            let scripts = NonNull::new((api.mono_domain_create_appdomain)(
                script_name.as_ptr().cast_mut(),
                ptr::null_mut(),
            ))
            .ok_or_else(|| Error::DomainCreate(config.script_domain_name.clone()))?;

            let runtime = Runtime {
                api,
                config,
                root,
                scripts,
                _jit_options: jit_options,
            };

            runtime.script_domain().activate()?;
            log::info!(
                "Managed runtime ready, domain `{}` active",
                runtime.config.script_domain_name
            );

            Ok(runtime)
        }
    }

    /// The configuration the runtime was started with
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// The resolved embedding API
    pub fn api(&self) -> &MonoApi {
        &self.api
    }

    /// The root domain, alive for the whole process
    pub fn root_domain(&self) -> Domain<'_> {
        Domain::new(self, self.root, &self.config.root_domain_name)
    }

    /// The script domain that host assemblies are loaded into
    pub fn script_domain(&self) -> Domain<'_> {
        Domain::new(self, self.scripts, &self.config.script_domain_name)
    }

    /// Handle for a raw domain reported by the runtime, named if it is one of ours.
    pub(crate) fn domain_from_raw(&self, raw: NonNull<MonoDomain>) -> Domain<'_> {
        if raw == self.scripts {
            self.script_domain()
        } else if raw == self.root {
            self.root_domain()
        } else {
            Domain::new(self, raw, "<foreign>")
        }
    }

    /// The domain that is current on the calling thread.
    ///
    /// Returns `None` if the current domain is neither of the runtime's domains.
    pub fn active_domain(&self) -> Option<Domain<'_>> {
        let current = unsafe { (self.api.mono_domain_get)() };

        if current == self.scripts.as_ptr() {
            Some(self.script_domain())
        } else if current == self.root.as_ptr() {
            Some(self.root_domain())
        } else {
            None
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        log::debug!("Shutting down managed runtime");

        unsafe {
            if (self.api.mono_domain_set)(self.root.as_ptr(), 1) != 0 {
                (self.api.mono_domain_unload)(self.scripts.as_ptr());
            } else {
                log::warn!(
                    "Could not activate root domain, leaving `{}` loaded",
                    self.config.script_domain_name
                );
            }

            (self.api.mono_jit_cleanup)(self.root.as_ptr());
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("library", &self.api.path())
            .field("root", &self.config.root_domain_name)
            .field("scripts", &self.config.script_domain_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_string_rejects_interior_nul() {
        assert!(matches!(c_string("My\0Domain"), Err(Error::InvalidName(_))));
        assert_eq!(c_string("MyDomain").unwrap().as_bytes(), b"MyDomain");
    }

    #[test]
    fn c_path_rejects_interior_nul() {
        assert!(matches!(
            c_path(Path::new("mono\0/lib")),
            Err(Error::InvalidName(_))
        ));
        assert_eq!(c_path(Path::new("mono/lib")).unwrap().as_bytes(), b"mono/lib");
    }

    #[cfg(unix)]
    #[test]
    fn c_path_keeps_non_utf8_bytes() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let raw = b"bin/Test\xffAssembly.dll";
        let path = Path::new(OsStr::from_bytes(raw));
        assert_eq!(c_path(path).unwrap().as_bytes(), raw);
    }

    #[test]
    fn from_c_string_null() {
        assert_eq!(unsafe { from_c_string(ptr::null()) }, "");

        let value = CString::new("AnotherClass").unwrap();
        assert_eq!(unsafe { from_c_string(value.as_ptr()) }, "AnotherClass");
    }

    #[test]
    fn missing_runtime_library_is_reported() {
        let config =
            HostConfig::without_debugger().with_runtime_library("/nonexistent/libmonosgen-2.0.so");

        assert!(matches!(
            Runtime::new(config),
            Err(Error::RuntimeLibrary { .. })
        ));
        assert!(!STARTED.load(Ordering::SeqCst));
    }
}
