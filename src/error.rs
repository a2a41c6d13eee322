use std::path::PathBuf;

use thiserror::Error;

use crate::runtime::ImageOpenStatus;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every step of hosting the managed runtime, from reading the assembly bytes up to invoking a
/// managed method, reports its failure through one of these variants. Null handles and ignored
/// status codes of the embedding API are turned into explicit errors at the call boundary.
///
/// # Error Categories
///
/// ## File Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::ImageTooLarge`] - Image does not fit the runtime's 32-bit size arguments
///
/// ## Image Errors
/// - [`Error::GoblinErr`] - PE parsing errors from goblin crate
/// - [`Error::Malformed`] - PE file without the structures a managed image needs
/// - [`Error::ImageOpen`] - The runtime refused to open the image
/// - [`Error::AssemblyLoad`] - The runtime refused to load the assembly from the image
///
/// ## Runtime Errors
/// - [`Error::RuntimeLibrary`] - The runtime shared library could not be loaded
/// - [`Error::MissingSymbol`] - An embedding entry point is missing from the library
/// - [`Error::AlreadyInitialized`] - The runtime was already started in this process
/// - [`Error::RuntimeInit`], [`Error::DomainCreate`], [`Error::DomainSet`] - Bootstrap failures
///
/// ## Resolution and Invocation Errors
/// - [`Error::ClassNotFound`] - Type lookup by namespace and name failed
/// - [`Error::MethodNotFound`] - Method lookup by name and arity failed
/// - [`Error::ArityMismatch`] - Method invoked with the wrong number of arguments
/// - [`Error::ObjectAlloc`] - Object allocation in the domain failed
/// - [`Error::SignatureMismatch`] - Argument, return or receiver does not fit the method
/// - [`Error::ThunkUnavailable`] - No unmanaged thunk could be created for a method
/// - [`Error::NullHandle`] - The runtime returned null where a handle is guaranteed
/// - [`Error::UnboxMismatch`] - Boxed value read as the wrong type
/// - [`Error::ManagedException`] - Managed code raised an exception
///
/// # Examples
///
/// ```rust,no_run
/// use monohost::{Error, HostConfig, Runtime};
///
/// let runtime = Runtime::new(HostConfig::without_debugger())?;
/// match runtime.script_domain().load_assembly("TestAssembly.dll") {
///     Ok(assembly) => println!("Loaded {}", assembly.path().display()),
///     Err(Error::FileError(io_err)) => eprintln!("I/O error: {}", io_err),
///     Err(Error::ImageOpen { path, status }) => {
///         eprintln!("{} is not a loadable image: {}", path.display(), status)
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok::<(), monohost::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // File Errors
    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while opening or mapping assembly and
    /// symbol files, such as missing files or permission issues.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Provided input was empty.
    ///
    /// Returned by the byte reader for zero-length files, and by image inspection for
    /// empty buffers.
    #[error("Provided input was empty")]
    Empty,

    /// The image is larger than the runtime can accept.
    ///
    /// The embedding API takes 32-bit lengths for in-memory images.
    #[error("Image of {0} bytes exceeds the runtime's 4 GiB limit")]
    ImageTooLarge(usize),

    // Image Errors
    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// The file is damaged or is not a managed image.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The runtime could not open an in-memory image from the assembly bytes.
    #[error("Failed to open image {}: {status}", path.display())]
    ImageOpen {
        /// Path the image bytes were read from
        path: PathBuf,
        /// Status reported by the runtime
        status: ImageOpenStatus,
    },

    /// The runtime opened the image but could not turn it into an assembly.
    #[error("Failed to load assembly {}: {status}", path.display())]
    AssemblyLoad {
        /// Path of the assembly
        path: PathBuf,
        /// Status reported by the runtime
        status: ImageOpenStatus,
    },

    // Runtime Errors
    /// The runtime shared library could not be loaded.
    ///
    /// Carries the list of candidates that were tried, and the loader error of the last one.
    #[error("Could not load the runtime library (tried {tried}): {source}")]
    RuntimeLibrary {
        /// Comma separated list of library names or paths that were tried
        tried: String,
        /// Loader error of the last candidate
        #[source]
        source: libloading::Error,
    },

    /// An embedding entry point is missing from the runtime library.
    #[error("Runtime library does not export `{0}`")]
    MissingSymbol(&'static str),

    /// The runtime was already started in this process.
    ///
    /// The managed runtime can only be initialised once per process, even after it has been
    /// shut down.
    #[error("The managed runtime has already been initialized in this process")]
    AlreadyInitialized,

    /// The JIT failed to start and create the root domain.
    #[error("Failed to initialize the JIT with root domain `{0}`")]
    RuntimeInit(String),

    /// The runtime failed to create a secondary domain.
    #[error("Failed to create application domain `{0}`")]
    DomainCreate(String),

    /// The runtime refused to make a domain current on this thread.
    #[error("Failed to activate application domain `{0}`")]
    DomainSet(String),

    /// A string passed to the runtime contains an interior NUL byte.
    #[error("Invalid name passed to the runtime - {0:?}")]
    InvalidName(String),

    // Resolution and Invocation Errors
    /// No type with the given namespace and name exists in the assembly.
    #[error("Failed to find class {namespace}.{name}")]
    ClassNotFound {
        /// Namespace that was searched
        namespace: String,
        /// Type name that was searched
        name: String,
    },

    /// No method with the given name and parameter count exists on the type.
    #[error("Failed to find method {class}::{name} with {params} parameter(s)")]
    MethodNotFound {
        /// Full name of the declaring type
        class: String,
        /// Method name that was searched
        name: String,
        /// Parameter count that was searched
        params: i32,
    },

    /// The runtime could not allocate an instance of the type.
    #[error("Failed to allocate an instance of {0}")]
    ObjectAlloc(String),

    /// A method was invoked with a different number of arguments than it was resolved with.
    #[error("{method} takes {params} parameter(s), {given} given")]
    ArityMismatch {
        /// Full name of the method
        method: String,
        /// Parameter count the method was resolved with
        params: i32,
        /// Number of arguments supplied
        given: usize,
    },

    /// A boxed value was read as a different type than it holds.
    #[error("Cannot unbox {found} as {expected}")]
    UnboxMismatch {
        /// Managed type name matching the requested native type
        expected: &'static str,
        /// Managed type name of the boxed object
        found: String,
    },

    /// The call does not fit the method's declared signature.
    ///
    /// Checked before any managed code runs, since a mismatched native call cannot be detected
    /// afterwards.
    #[error("Signature mismatch calling {method}: {reason}")]
    SignatureMismatch {
        /// Full name of the method
        method: String,
        /// What did not match
        reason: String,
    },

    /// The runtime returned a null handle from a query that cannot fail for live objects.
    #[error("Runtime returned a null handle from `{0}`")]
    NullHandle(&'static str),

    /// The runtime could not provide a native thunk for the method.
    #[error("Failed to create an unmanaged thunk for {0}")]
    ThunkUnavailable(String),

    /// Managed code raised an exception during an invocation.
    ///
    /// # Fields
    ///
    /// * `class` - Full type name of the exception
    /// * `message` - The exception's `ToString()` rendering
    #[error("Managed exception {class}: {message}")]
    ManagedException {
        /// Full type name of the thrown exception
        class: String,
        /// Result of `ToString()` on the exception, if it could be obtained
        message: String,
    },
}
