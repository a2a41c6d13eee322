//! Assembly and symbol file access.
//!
//! This module provides everything the host needs before it talks to the managed runtime:
//! reading image bytes from disk into an owned buffer, checking that those bytes are a
//! managed PE image, and finding the companion debug symbol file of an assembly.
//!
//! # Key Components
//!
//! - [`crate::file::Backend`] - Trait for byte sources (memory-mapped files, memory buffers)
//! - [`crate::file::read_bytes`] - The byte reader used for assemblies and symbol files
//! - [`crate::file::inspect_image`] - PE preflight check for a CLR runtime header
//! - [`crate::file::symbols`] - Debug symbol location and format detection
//!
//! # Ownership
//!
//! Buffers returned by [`crate::file::read_bytes`] own their data. The assembly loader hands the
//! bytes to the runtime with copy semantics and drops the buffer as soon as the image has been
//! opened, so no buffer outlives its last use.
//!
//! # Examples
//!
//! ```rust,no_run
//! use monohost::file::{inspect_image, read_bytes, Backend};
//!
//! let data = read_bytes("TestAssembly.dll")?;
//! let info = inspect_image(data.data())?;
//! println!("CLR header at RVA 0x{:x}, {} bytes", info.clr_rva, info.clr_size);
//! # Ok::<(), monohost::Error>(())
//! ```

pub mod symbols;

mod memory;
mod physical;

pub use memory::Memory;
pub use physical::Physical;

use std::path::Path;

use crate::{Error::Empty, Result};
use goblin::pe::PE;

/// A complete image or symbol file held by the host.
///
/// The assembly loader only needs the bytes as one contiguous slice, which it hands to the
/// runtime.
pub trait Backend: Send + Sync {
    /// The whole buffer
    fn data(&self) -> &[u8];

    /// Length of the buffer in bytes
    fn len(&self) -> usize {
        self.data().len()
    }

    /// `true` if the buffer holds no data
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads a whole file into an owned buffer.
///
/// The file is memory-mapped read-only; the returned [`Physical`] owns the mapping and releases
/// it when dropped. Its length is exactly the file length at the time of the call.
///
/// # Arguments
///
/// * `path` - Path of the file to read.
///
/// # Errors
///
/// - [`crate::Error::FileError`] if the file cannot be opened or mapped
/// - [`crate::Error::Empty`] if the file has zero length
///
/// # Examples
///
/// ```rust,no_run
/// use monohost::file::{read_bytes, Backend};
///
/// let bytes = read_bytes("TestAssembly.dll")?;
/// assert!(!bytes.is_empty());
/// # Ok::<(), monohost::Error>(())
/// ```
pub fn read_bytes(path: impl AsRef<Path>) -> Result<Physical> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(Empty);
    }

    let data = Physical::from_std_file(&file)?;
    log::debug!("Read {} bytes from {}", data.len(), path.display());
    Ok(data)
}

/// Information about a managed PE image, collected before it is handed to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// RVA of the CLR runtime header
    pub clr_rva: u32,
    /// Size of the CLR runtime header
    pub clr_size: u32,
    /// `true` for PE32+ images
    pub pe32_plus: bool,
    /// `true` if the image is a library (DLL)
    pub is_dll: bool,
}

/// Checks that `data` is a PE image carrying a CLR runtime header.
///
/// The runtime reports a non-managed file only through a terse status code; this check fails
/// early with a precise reason instead.
///
/// # Errors
///
/// - [`crate::Error::Empty`] for an empty buffer
/// - [`crate::Error::GoblinErr`] if the data is not a PE file
/// - [`crate::Error::Malformed`] if the PE has no optional header or no CLR runtime header
pub fn inspect_image(data: &[u8]) -> Result<ImageInfo> {
    if data.is_empty() {
        return Err(Empty);
    }

    let pe = PE::parse(data)?;
    let Some(optional_header) = pe.header.optional_header else {
        return Err(malformed_error!("File does not have an OptionalHeader"));
    };

    let Some((clr_rva, clr_size)) = optional_header
        .data_directories
        .get_clr_runtime_header()
        .as_ref()
        .map(|dir| (dir.virtual_address, dir.size))
    else {
        return Err(malformed_error!(
            "File does not have a CLR runtime header directory"
        ));
    };

    if clr_rva == 0 || clr_size == 0 {
        return Err(malformed_error!(
            "CLR runtime header directory is empty (rva: 0x{:x}, size: {})",
            clr_rva,
            clr_size
        ));
    }

    Ok(ImageInfo {
        clr_rva,
        clr_size,
        pe32_plus: pe.is_64,
        is_dll: pe.is_lib,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn temp_file(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("monohost_{}_{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn read_bytes_missing_file() {
        let result = read_bytes("/nonexistent/path/to/TestAssembly.dll");
        match result {
            Err(Error::FileError(io_error)) => {
                assert_eq!(io_error.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected FileError"),
        }
    }

    #[test]
    fn read_bytes_empty_file() {
        let path = temp_file("read_empty.bin", b"");

        assert!(matches!(read_bytes(&path), Err(Error::Empty)));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn read_bytes_exact_contents() {
        let contents: Vec<u8> = (0..=255u8).cycle().take(4099).collect();
        let path = temp_file("read_exact.bin", &contents);

        let data = read_bytes(&path).unwrap();
        assert_eq!(data.len(), contents.len());
        assert_eq!(data.data(), contents.as_slice());

        drop(data);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn inspect_empty() {
        assert!(matches!(inspect_image(&[]), Err(Error::Empty)));
    }

    #[test]
    fn inspect_not_pe() {
        let result = inspect_image(b"this is certainly not a portable executable");
        assert!(matches!(result, Err(Error::GoblinErr(_))));
    }

    #[test]
    fn inspect_truncated_dos_header() {
        let result = inspect_image(b"MZ\x90\x00");
        assert!(result.is_err());
    }
}
