//! Assembly loading.
//!
//! Images are opened from a byte buffer the host read itself, not from a path the runtime
//! resolves. The runtime copies the buffer, so the caller's bytes can be released as soon as
//! [`Assembly`] is constructed. Portable debug symbols found next to the assembly are attached
//! to the image before the assembly is loaded from it.

use std::{
    ffi::c_int,
    fmt,
    path::{Path, PathBuf},
    ptr::NonNull,
};

use crate::{
    file::{
        inspect_image,
        symbols::DebugSymbols,
        Backend, ImageInfo,
    },
    runtime::{
        api::{MonoApi, MonoAssembly, MonoImage},
        c_path, c_string, Class, Runtime,
    },
    Error, Result,
};

/// Status reported by the runtime when opening an image or loading an assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOpenStatus {
    /// `MONO_IMAGE_OK`
    Ok,
    /// `MONO_IMAGE_ERROR_ERRNO`
    ErrorErrno,
    /// `MONO_IMAGE_MISSING_ASSEMBLYREF`
    MissingAssemblyRef,
    /// `MONO_IMAGE_IMAGE_INVALID`
    ImageInvalid,
    /// `MONO_IMAGE_NOT_SUPPORTED`
    NotSupported,
    /// A status code this host does not know
    Unknown(i32),
}

impl From<c_int> for ImageOpenStatus {
    fn from(value: c_int) -> Self {
        match value {
            0 => ImageOpenStatus::Ok,
            1 => ImageOpenStatus::ErrorErrno,
            2 => ImageOpenStatus::MissingAssemblyRef,
            3 => ImageOpenStatus::ImageInvalid,
            4 => ImageOpenStatus::NotSupported,
            other => ImageOpenStatus::Unknown(other),
        }
    }
}

impl fmt::Display for ImageOpenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageOpenStatus::Ok => f.write_str("success"),
            ImageOpenStatus::ErrorErrno => f.write_str("system error while reading the image"),
            ImageOpenStatus::MissingAssemblyRef => {
                f.write_str("a referenced assembly could not be found")
            }
            ImageOpenStatus::ImageInvalid => f.write_str("not a valid CIL image"),
            ImageOpenStatus::NotSupported => f.write_str("image not supported by this runtime"),
            ImageOpenStatus::Unknown(code) => write!(f, "unknown image status {code}"),
        }
    }
}

/// Closes the intermediate image once the assembly holds its own reference.
struct ImageGuard<'a> {
    api: &'a MonoApi,
    raw: NonNull<MonoImage>,
}

impl Drop for ImageGuard<'_> {
    fn drop(&mut self) {
        unsafe { (self.api.mono_image_close)(self.raw.as_ptr()) };
    }
}

/// An assembly loaded into one of the runtime's domains.
///
/// Keeps the debug symbols that were attached to its image alive.
pub struct Assembly<'rt> {
    runtime: &'rt Runtime,
    raw: NonNull<MonoAssembly>,
    path: PathBuf,
    image_info: Option<ImageInfo>,
    symbols: Option<DebugSymbols>,
}

impl<'rt> Assembly<'rt> {
    pub(crate) fn load(runtime: &'rt Runtime, path: &Path, image: &dyn Backend) -> Result<Self> {
        let api = runtime.api();
        let config = runtime.config();

        let len = u32::try_from(image.len()).map_err(|_| Error::ImageTooLarge(image.len()))?;
        if len == 0 {
            return Err(Error::Empty);
        }

        let image_info = if config.verify_images {
            let info = inspect_image(image.data())?;
            log::debug!(
                "{}: CLR header at RVA 0x{:x} ({} bytes), {}",
                path.display(),
                info.clr_rva,
                info.clr_size,
                if info.pe32_plus { "PE32+" } else { "PE32" }
            );
            Some(info)
        } else {
            None
        };

        let fname = c_path(path)?;

        let mut status: c_int = 0;
        let raw_image = unsafe {
            (api.mono_image_open_from_data_full)(
                image.data().as_ptr().cast_mut().cast(),
                len,
                1,
                &mut status,
                0,
            )
        };
        let Some(raw_image) = NonNull::new(raw_image) else {
            return Err(Error::ImageOpen {
                path: path.to_path_buf(),
                status: status.into(),
            });
        };
        let guard = ImageGuard {
            api,
            raw: raw_image,
        };

        let symbols = if config.debug_symbols {
            Self::attach_symbols(api, &guard, path)?
        } else {
            None
        };

        let mut status: c_int = 0;
        let raw = unsafe {
            (api.mono_assembly_load_from_full)(guard.raw.as_ptr(), fname.as_ptr(), &mut status, 0)
        };
        let Some(raw) = NonNull::new(raw) else {
            return Err(Error::AssemblyLoad {
                path: path.to_path_buf(),
                status: status.into(),
            });
        };
        drop(guard);

        log::info!(
            "Loaded assembly {}{}",
            path.display(),
            if symbols.is_some() { " with debug symbols" } else { "" }
        );

        Ok(Assembly {
            runtime,
            raw,
            path: path.to_path_buf(),
            image_info,
            symbols,
        })
    }

    fn attach_symbols(
        api: &MonoApi,
        image: &ImageGuard<'_>,
        path: &Path,
    ) -> Result<Option<DebugSymbols>> {
        let Some(symbols) = DebugSymbols::for_assembly(path)? else {
            log::debug!("No debug symbols found for {}", path.display());
            return Ok(None);
        };

        if !symbols.format().is_supported() {
            log::warn!(
                "Skipping debug symbols {}: {} is not supported by the runtime",
                symbols.path().display(),
                symbols.format()
            );
            return Ok(None);
        }

        let Ok(size) = c_int::try_from(symbols.data().len()) else {
            log::warn!(
                "Skipping debug symbols {}: file too large",
                symbols.path().display()
            );
            return Ok(None);
        };

        let handle = unsafe {
            (api.mono_debug_open_image_from_memory)(
                image.raw.as_ptr(),
                symbols.data().as_ptr(),
                size,
            )
        };

        if handle.is_null() {
            log::warn!(
                "Runtime rejected debug symbols {}",
                symbols.path().display()
            );
            return Ok(None);
        }

        log::debug!(
            "Attached {} ({}, {} bytes)",
            symbols.path().display(),
            symbols.format(),
            size
        );
        Ok(Some(symbols))
    }

    /// Path the assembly was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PE information collected while verifying the image, if verification was enabled
    pub fn image_info(&self) -> Option<&ImageInfo> {
        self.image_info.as_ref()
    }

    /// Debug symbols attached to the assembly's image
    pub fn symbols(&self) -> Option<&DebugSymbols> {
        self.symbols.as_ref()
    }

    /// Resolves a type of this assembly by namespace and name.
    ///
    /// Nested types are not addressable this way.
    ///
    /// # Errors
    /// - [`crate::Error::InvalidName`] if a name contains a NUL byte
    /// - [`crate::Error::ClassNotFound`] if the assembly defines no such type
    pub fn class(&self, namespace: &str, name: &str) -> Result<Class<'rt>> {
        let api = self.runtime.api();
        let c_namespace = c_string(namespace)?;
        let c_name = c_string(name)?;

        let raw = unsafe {
            let image = (api.mono_assembly_get_image)(self.raw.as_ptr());
            (api.mono_class_from_name)(image, c_namespace.as_ptr(), c_name.as_ptr())
        };

        NonNull::new(raw)
            .map(|raw| Class::new(self.runtime, raw))
            .ok_or_else(|| Error::ClassNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }
}

impl fmt::Debug for Assembly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assembly")
            .field("path", &self.path)
            .field("image_info", &self.image_info)
            .field("symbols", &self.symbols)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ImageOpenStatus::from(0), ImageOpenStatus::Ok);
        assert_eq!(ImageOpenStatus::from(1), ImageOpenStatus::ErrorErrno);
        assert_eq!(ImageOpenStatus::from(2), ImageOpenStatus::MissingAssemblyRef);
        assert_eq!(ImageOpenStatus::from(3), ImageOpenStatus::ImageInvalid);
        assert_eq!(ImageOpenStatus::from(4), ImageOpenStatus::NotSupported);
        assert_eq!(ImageOpenStatus::from(42), ImageOpenStatus::Unknown(42));
    }

    #[test]
    fn status_in_error_message() {
        let error = Error::ImageOpen {
            path: PathBuf::from("TestAssembly.dll"),
            status: ImageOpenStatus::ImageInvalid,
        };
        assert_eq!(
            error.to_string(),
            "Failed to open image TestAssembly.dll: not a valid CIL image"
        );

        assert_eq!(
            ImageOpenStatus::Unknown(9).to_string(),
            "unknown image status 9"
        );
    }
}
