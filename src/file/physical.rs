//! Memory-mapped files.
//!
//! Assemblies and symbol files are mapped read-only rather than copied into the heap. The
//! runtime copies image bytes when it opens them, after which the mapping is released by
//! dropping the [`Physical`] value.

use super::Backend;
use crate::{Error::FileError, Result};

use memmap2::Mmap;
use std::{fs, path::Path};

/// A read-only mapping of a file on disk.
///
/// The mapping lives exactly as long as the value, which gives the byte reader scoped
/// ownership of the file contents.
#[derive(Debug)]
pub struct Physical {
    data: Mmap,
}

impl Physical {
    /// Maps the file at `path`.
    ///
    /// Zero-length files are accepted here; [`crate::file::read_bytes`] rejects them.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = fs::File::open(path).map_err(FileError)?;
        Self::from_std_file(&file)
    }

    /// Maps an already opened file.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if mapping fails.
    pub fn from_std_file(file: &fs::File) -> Result<Physical> {
        // SAFETY: the mapping is read-only and the file must not be truncated while mapped
        let data = unsafe { Mmap::map(file) }.map_err(FileError)?;

        Ok(Physical { data })
    }
}

impl Backend for Physical {
    fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_file_contents() {
        let path = std::env::temp_dir().join(format!("monohost_{}_map.dll", std::process::id()));
        let header = [0x4D, 0x5A, 0x90, 0x00, 0x03, 0x00, 0x00, 0x00];
        std::fs::write(&path, header).unwrap();

        let image = Physical::new(&path).unwrap();
        assert_eq!(image.len(), header.len());
        assert!(image.data().starts_with(b"MZ"));
        assert_eq!(image.data(), &header);

        drop(image);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file() {
        match Physical::new("/nonexistent/TestAssembly.dll") {
            Err(FileError(error)) => assert_eq!(error.kind(), std::io::ErrorKind::NotFound),
            other => panic!("Expected FileError, got {other:?}"),
        }
    }
}
