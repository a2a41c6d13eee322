//! Debug symbol location and format detection.
//!
//! A compiled assembly usually ships with a companion program database. Two naming
//! conventions are in use, and they are tried in a fixed order:
//!
//! 1. the full assembly path with `.pdb` appended (`bin/Game.dll.pdb`)
//! 2. the assembly path with its extension replaced (`bin/Game.pdb`)
//!
//! The runtime only understands portable PDBs, which start with the ECMA-335 metadata root
//! signature. Classic Windows PDBs (MSF containers) are recognised so they can be reported
//! and skipped instead of being handed to the runtime.
//!
//! # Examples
//!
//! ```rust,no_run
//! use monohost::file::symbols::{locate, DebugSymbols};
//!
//! if let Some(path) = locate("bin/Debug/TestAssembly.dll") {
//!     let symbols = DebugSymbols::load(&path)?;
//!     println!("{} ({})", symbols.path().display(), symbols.format());
//! }
//! # Ok::<(), monohost::Error>(())
//! ```

use std::{
    fmt,
    path::{Path, PathBuf},
};

use super::{read_bytes, Backend, Physical};
use crate::Result;

/// Signature of the ECMA-335 metadata root ("BSJB"), which opens every portable PDB
pub const PORTABLE_PDB_MAGIC: &[u8; 4] = b"BSJB";

/// Prefix shared by the MSF container headers of classic Windows PDBs
pub const WINDOWS_PDB_MAGIC: &[u8] = b"Microsoft C/C++ ";

/// Returns the two candidate symbol paths for `assembly`, in lookup order.
///
/// For an assembly without an extension both candidates are identical.
pub fn candidates(assembly: impl AsRef<Path>) -> [PathBuf; 2] {
    let assembly = assembly.as_ref();

    let mut appended = assembly.as_os_str().to_owned();
    appended.push(".pdb");

    [PathBuf::from(appended), assembly.with_extension("pdb")]
}

/// Finds the debug symbol file belonging to `assembly`.
///
/// Returns the first candidate from [`candidates`] that exists on disk, or `None` if neither
/// does.
pub fn locate(assembly: impl AsRef<Path>) -> Option<PathBuf> {
    candidates(assembly)
        .into_iter()
        .find(|candidate| candidate.exists())
}

/// Container format of a symbol file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SymbolFormat {
    /// Portable PDB, consumable by the runtime
    #[strum(to_string = "portable pdb")]
    Portable,
    /// Classic Windows PDB (MSF container), not consumable by the runtime
    #[strum(to_string = "windows pdb")]
    Windows,
    /// Anything else
    #[strum(to_string = "unknown")]
    Unknown,
}

impl SymbolFormat {
    /// Classifies symbol data by its leading signature.
    pub fn detect(data: &[u8]) -> SymbolFormat {
        if data.starts_with(PORTABLE_PDB_MAGIC) {
            SymbolFormat::Portable
        } else if data.starts_with(WINDOWS_PDB_MAGIC) {
            SymbolFormat::Windows
        } else {
            SymbolFormat::Unknown
        }
    }

    /// `true` if the runtime can attach symbols of this format to an image.
    pub fn is_supported(self) -> bool {
        self == SymbolFormat::Portable
    }
}

/// Symbol data read from disk.
///
/// Owns the symbol bytes; the assembly keeps this alive for as long as the symbols are
/// registered with the runtime's debugger subsystem.
pub struct DebugSymbols {
    path: PathBuf,
    format: SymbolFormat,
    data: Physical,
}

impl DebugSymbols {
    /// Reads the symbol file at `path` and detects its format.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be read, or
    /// [`crate::Error::Empty`] if it has zero length.
    pub fn load(path: impl AsRef<Path>) -> Result<DebugSymbols> {
        let path = path.as_ref();
        let data = read_bytes(path)?;
        let format = SymbolFormat::detect(data.data());

        Ok(DebugSymbols {
            path: path.to_path_buf(),
            format,
            data,
        })
    }

    /// Locates and reads the symbols of `assembly`.
    ///
    /// Returns `Ok(None)` if no candidate file exists.
    ///
    /// # Errors
    /// Propagates read failures of an existing candidate.
    pub fn for_assembly(assembly: impl AsRef<Path>) -> Result<Option<DebugSymbols>> {
        match locate(assembly) {
            Some(path) => Ok(Some(DebugSymbols::load(path)?)),
            None => Ok(None),
        }
    }

    /// Path the symbols were read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Detected container format
    pub fn format(&self) -> SymbolFormat {
        self.format
    }

    /// Raw symbol bytes
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }
}

impl fmt::Debug for DebugSymbols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugSymbols")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fresh scratch directory holding `x/y.dll`
    fn scratch(name: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir()
            .join(format!("monohost_symbols_{}_{}", std::process::id(), name))
            .join("x");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let assembly = dir.join("y.dll");
        std::fs::write(&assembly, b"MZ").unwrap();
        (dir, assembly)
    }

    #[test]
    fn candidate_order() {
        let [first, second] = candidates("x/y.dll");
        assert_eq!(first, PathBuf::from("x/y.dll.pdb"));
        assert_eq!(second, PathBuf::from("x/y.pdb"));
    }

    #[test]
    fn candidate_without_extension() {
        let [first, second] = candidates("x/y");
        assert_eq!(first, PathBuf::from("x/y.pdb"));
        assert_eq!(second, PathBuf::from("x/y.pdb"));
    }

    #[test]
    fn prefers_appended_name() {
        let (dir, assembly) = scratch("both");
        std::fs::write(dir.join("y.dll.pdb"), PORTABLE_PDB_MAGIC).unwrap();
        std::fs::write(dir.join("y.pdb"), PORTABLE_PDB_MAGIC).unwrap();

        assert_eq!(locate(&assembly), Some(dir.join("y.dll.pdb")));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn falls_back_to_replaced_extension() {
        let (dir, assembly) = scratch("replaced");
        std::fs::write(dir.join("y.pdb"), PORTABLE_PDB_MAGIC).unwrap();

        assert_eq!(locate(&assembly), Some(dir.join("y.pdb")));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn not_found() {
        let (dir, assembly) = scratch("none");

        assert_eq!(locate(&assembly), None);
        assert!(DebugSymbols::for_assembly(&assembly).unwrap().is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn load_detects_format() {
        let (dir, assembly) = scratch("load");
        let mut portable = PORTABLE_PDB_MAGIC.to_vec();
        portable.extend_from_slice(&[0x01, 0x00, 0x01, 0x00]);
        std::fs::write(dir.join("y.pdb"), &portable).unwrap();

        let symbols = DebugSymbols::for_assembly(&assembly).unwrap().unwrap();
        assert_eq!(symbols.path(), dir.join("y.pdb").as_path());
        assert_eq!(symbols.format(), SymbolFormat::Portable);
        assert_eq!(symbols.data(), portable.as_slice());

        drop(symbols);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn detect() {
        assert_eq!(
            SymbolFormat::detect(b"BSJB\x01\x00\x01\x00"),
            SymbolFormat::Portable
        );
        assert_eq!(
            SymbolFormat::detect(b"Microsoft C/C++ MSF 7.00\r\n\x1aDS\0\0\0"),
            SymbolFormat::Windows
        );
        assert_eq!(SymbolFormat::detect(b"BSJ"), SymbolFormat::Unknown);
        assert_eq!(SymbolFormat::detect(&[]), SymbolFormat::Unknown);

        assert!(SymbolFormat::Portable.is_supported());
        assert!(!SymbolFormat::Windows.is_supported());
        assert_eq!(SymbolFormat::Windows.to_string(), "windows pdb");
    }
}
