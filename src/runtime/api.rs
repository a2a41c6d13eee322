//! Binding to the runtime's embedding API.
//!
//! The runtime is not linked at build time. Its shared library is opened with `libloading` when
//! the host boots, and every entry point the host uses is resolved up front into a
//! [`MonoApi`] table, so a missing symbol is reported once, at startup, instead of at the first
//! call that needs it.
//!
//! The library lookup order is:
//!
//! 1. an explicit path from [`crate::HostConfig::runtime_library`]
//! 2. the `MONOHOST_RUNTIME_LIB` environment variable
//! 3. the platform's default library names ([`DEFAULT_LIBRARY_NAMES`])

use std::{
    ffi::{c_char, c_int, c_void},
    marker::{PhantomData, PhantomPinned},
    path::{Path, PathBuf},
};

use libloading::Library;

use crate::{Error, Result};

/// Environment variable naming the runtime shared library
pub const RUNTIME_LIBRARY_ENV: &str = "MONOHOST_RUNTIME_LIB";

/// Library names tried when no explicit runtime library is configured
#[cfg(target_os = "windows")]
pub const DEFAULT_LIBRARY_NAMES: &[&str] = &["mono-2.0-sgen.dll", "monosgen-2.0.dll"];
/// Library names tried when no explicit runtime library is configured
#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY_NAMES: &[&str] = &[
    "libmonosgen-2.0.1.dylib",
    "libmonosgen-2.0.dylib",
    "/Library/Frameworks/Mono.framework/Versions/Current/lib/libmonosgen-2.0.dylib",
];
/// Library names tried when no explicit runtime library is configured
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const DEFAULT_LIBRARY_NAMES: &[&str] = &["libmonosgen-2.0.so.1", "libmonosgen-2.0.so"];

/// `mono_bool`
pub type MonoBool = i32;

/// `MONO_DEBUG_FORMAT_MONO`
pub const MONO_DEBUG_FORMAT_MONO: c_int = 1;

macro_rules! opaque_types {
    ($($(#[$doc:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            #[repr(C)]
            pub struct $name {
                _data: [u8; 0],
                _marker: PhantomData<(*mut u8, PhantomPinned)>,
            }
        )*
    };
}

opaque_types!(
    /// `MonoDomain`
    MonoDomain,
    /// `MonoThread`
    MonoThread,
    /// `MonoImage`
    MonoImage,
    /// `MonoAssembly`
    MonoAssembly,
    /// `MonoClass`
    MonoClass,
    /// `MonoMethod`
    MonoMethod,
    /// `MonoObject`, also used for `MonoException`
    MonoObject,
    /// `MonoString`
    MonoString,
    /// `MonoDebugHandle`
    MonoDebugHandle,
    /// `MonoMethodSignature`
    MonoMethodSignature,
    /// `MonoType`
    MonoType,
);

/// `MonoTypeEnum` codes of the types a host can pass or expect across the boundary.
pub mod type_code {
    use std::ffi::c_int;

    /// `MONO_TYPE_VOID`
    pub const VOID: c_int = 0x01;
    /// `MONO_TYPE_I1`
    pub const I1: c_int = 0x04;
    /// `MONO_TYPE_U1`
    pub const U1: c_int = 0x05;
    /// `MONO_TYPE_I2`
    pub const I2: c_int = 0x06;
    /// `MONO_TYPE_U2`
    pub const U2: c_int = 0x07;
    /// `MONO_TYPE_I4`
    pub const I4: c_int = 0x08;
    /// `MONO_TYPE_U4`
    pub const U4: c_int = 0x09;
    /// `MONO_TYPE_I8`
    pub const I8: c_int = 0x0a;
    /// `MONO_TYPE_U8`
    pub const U8: c_int = 0x0b;
    /// `MONO_TYPE_R4`
    pub const R4: c_int = 0x0c;
    /// `MONO_TYPE_R8`
    pub const R8: c_int = 0x0d;
}

macro_rules! mono_api {
    ($(fn $name:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty)?;)*) => {
        /// Entry points of the runtime's embedding API, resolved from its shared library.
        ///
        /// The library stays loaded for as long as the table exists.
        #[allow(missing_docs)]
        pub struct MonoApi {
            $(pub $name: unsafe extern "C" fn($($arg: $ty),*) $(-> $ret)?,)*
            path: PathBuf,
            _library: Library,
        }

        impl MonoApi {
            fn resolve(library: Library, path: PathBuf) -> Result<MonoApi> {
                $(
                    let $name = unsafe {
                        *library
                            .get::<unsafe extern "C" fn($($ty),*) $(-> $ret)?>(
                                concat!(stringify!($name), "\0").as_bytes(),
                            )
                            .map_err(|_| Error::MissingSymbol(stringify!($name)))?
                    };
                )*

                Ok(MonoApi {
                    $($name,)*
                    path,
                    _library: library,
                })
            }
        }
    };
}

mono_api! {
    fn mono_set_dirs(assembly_dir: *const c_char, config_dir: *const c_char);
    fn mono_set_assemblies_path(path: *const c_char);
    fn mono_jit_parse_options(argc: c_int, argv: *mut *mut c_char);
    fn mono_debug_init(format: c_int);
    fn mono_jit_init(file: *const c_char) -> *mut MonoDomain;
    fn mono_jit_cleanup(domain: *mut MonoDomain);
    fn mono_debug_domain_create(domain: *mut MonoDomain);
    fn mono_thread_current() -> *mut MonoThread;
    fn mono_thread_set_main(thread: *mut MonoThread);
    fn mono_domain_create_appdomain(friendly_name: *mut c_char, configuration_file: *mut c_char) -> *mut MonoDomain;
    fn mono_domain_set(domain: *mut MonoDomain, force: MonoBool) -> MonoBool;
    fn mono_domain_get() -> *mut MonoDomain;
    fn mono_domain_unload(domain: *mut MonoDomain);
    fn mono_image_open_from_data_full(data: *mut c_char, data_len: u32, need_copy: MonoBool, status: *mut c_int, refonly: MonoBool) -> *mut MonoImage;
    fn mono_image_close(image: *mut MonoImage);
    fn mono_debug_open_image_from_memory(image: *mut MonoImage, raw_contents: *const u8, size: c_int) -> *mut MonoDebugHandle;
    fn mono_assembly_load_from_full(image: *mut MonoImage, fname: *const c_char, status: *mut c_int, refonly: MonoBool) -> *mut MonoAssembly;
    fn mono_assembly_get_image(assembly: *mut MonoAssembly) -> *mut MonoImage;
    fn mono_class_from_name(image: *mut MonoImage, name_space: *const c_char, name: *const c_char) -> *mut MonoClass;
    fn mono_class_get_name(klass: *mut MonoClass) -> *const c_char;
    fn mono_class_get_namespace(klass: *mut MonoClass) -> *const c_char;
    fn mono_class_get_method_from_name(klass: *mut MonoClass, name: *const c_char, param_count: c_int) -> *mut MonoMethod;
    fn mono_class_is_valuetype(klass: *mut MonoClass) -> MonoBool;
    fn mono_method_signature(method: *mut MonoMethod) -> *mut MonoMethodSignature;
    fn mono_signature_is_instance(sig: *mut MonoMethodSignature) -> MonoBool;
    fn mono_signature_get_params(sig: *mut MonoMethodSignature, iter: *mut *mut c_void) -> *mut MonoType;
    fn mono_signature_get_return_type(sig: *mut MonoMethodSignature) -> *mut MonoType;
    fn mono_type_get_type(ty: *mut MonoType) -> c_int;
    fn mono_type_is_byref(ty: *mut MonoType) -> MonoBool;
    fn mono_object_new(domain: *mut MonoDomain, klass: *mut MonoClass) -> *mut MonoObject;
    fn mono_object_get_class(obj: *mut MonoObject) -> *mut MonoClass;
    fn mono_object_get_domain(obj: *mut MonoObject) -> *mut MonoDomain;
    fn mono_object_isinst(obj: *mut MonoObject, klass: *mut MonoClass) -> *mut MonoObject;
    fn mono_object_unbox(obj: *mut MonoObject) -> *mut c_void;
    fn mono_object_to_string(obj: *mut MonoObject, exc: *mut *mut MonoObject) -> *mut MonoString;
    fn mono_string_to_utf8(string: *mut MonoString) -> *mut c_char;
    fn mono_free(ptr: *mut c_void);
    fn mono_gchandle_new(obj: *mut MonoObject, pinned: MonoBool) -> u32;
    fn mono_gchandle_free(gchandle: u32);
    fn mono_runtime_invoke(method: *mut MonoMethod, obj: *mut c_void, params: *mut *mut c_void, exc: *mut *mut MonoObject) -> *mut MonoObject;
    fn mono_method_get_unmanaged_thunk(method: *mut MonoMethod) -> *mut c_void;
}

impl MonoApi {
    /// Opens the runtime library and resolves all entry points.
    ///
    /// # Arguments
    /// * `explicit` - Library path to use instead of the environment and default names
    ///
    /// # Errors
    /// - [`crate::Error::RuntimeLibrary`] if no candidate library could be opened
    /// - [`crate::Error::MissingSymbol`] if the opened library lacks an entry point
    pub fn load(explicit: Option<&Path>) -> Result<MonoApi> {
        let candidates = library_candidates(explicit, std::env::var_os(RUNTIME_LIBRARY_ENV));

        let mut last_error = None;
        for candidate in &candidates {
            match unsafe { Library::new(candidate) } {
                Ok(library) => {
                    log::debug!("Opened runtime library {}", candidate.display());
                    return MonoApi::resolve(library, candidate.clone());
                }
                Err(error) => {
                    log::debug!("Runtime library {} unavailable: {}", candidate.display(), error);
                    last_error = Some(error);
                }
            }
        }

        let tried = candidates
            .iter()
            .map(|candidate| candidate.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");

        match last_error {
            Some(source) => Err(Error::RuntimeLibrary { tried, source }),
            None => Err(Error::MissingSymbol("<runtime library>")),
        }
    }

    /// Path or name of the library the table was resolved from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Builds the ordered list of runtime library candidates.
///
/// An explicit path wins outright, then the environment override, then the default names.
pub fn library_candidates(
    explicit: Option<&Path>,
    env_override: Option<std::ffi::OsString>,
) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }

    if let Some(path) = env_override.filter(|value| !value.is_empty()) {
        return vec![PathBuf::from(path)];
    }

    DEFAULT_LIBRARY_NAMES.iter().map(PathBuf::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_library_wins() {
        let candidates = library_candidates(
            Some(Path::new("/opt/mono/lib/libmonosgen-2.0.so")),
            Some("/elsewhere/libmono.so".into()),
        );
        assert_eq!(
            candidates,
            vec![PathBuf::from("/opt/mono/lib/libmonosgen-2.0.so")]
        );
    }

    #[test]
    fn environment_override() {
        let candidates = library_candidates(None, Some("/elsewhere/libmono.so".into()));
        assert_eq!(candidates, vec![PathBuf::from("/elsewhere/libmono.so")]);
    }

    #[test]
    fn empty_environment_is_ignored() {
        let candidates = library_candidates(None, Some("".into()));
        assert_eq!(candidates.len(), DEFAULT_LIBRARY_NAMES.len());
        assert_eq!(candidates[0], PathBuf::from(DEFAULT_LIBRARY_NAMES[0]));
    }

    #[test]
    fn missing_library() {
        let result = MonoApi::load(Some(Path::new("/nonexistent/libmonosgen-2.0.so")));
        match result {
            Err(Error::RuntimeLibrary { tried, .. }) => {
                assert_eq!(tried, "/nonexistent/libmonosgen-2.0.so");
            }
            _ => panic!("Expected RuntimeLibrary error"),
        }
    }
}
