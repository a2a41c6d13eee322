//! Execution domains.
//!
//! A [`Domain`] is a borrowed handle to one of the runtime's two domains. Everything that
//! creates managed state (loading an assembly, allocating an object) goes through a domain,
//! which becomes current on the calling thread before the runtime is asked to do the work.

use std::{fmt, path::Path, ptr::NonNull};

use crate::{
    file::{read_bytes, Backend},
    runtime::{api::MonoDomain, Assembly, Class, Object, Runtime},
    Error, Result,
};

/// An execution domain of the runtime.
///
/// Domains are owned by the [`Runtime`]; this is a borrowed handle. Loading assemblies and
/// allocating objects always happens in an explicit domain, which is made current on the
/// calling thread first when necessary.
#[derive(Clone, Copy)]
pub struct Domain<'rt> {
    runtime: &'rt Runtime,
    raw: NonNull<MonoDomain>,
    name: &'rt str,
}

impl<'rt> Domain<'rt> {
    pub(crate) fn new(runtime: &'rt Runtime, raw: NonNull<MonoDomain>, name: &'rt str) -> Self {
        Domain { runtime, raw, name }
    }

    /// Name the domain was created with
    pub fn name(&self) -> &'rt str {
        self.name
    }

    /// The runtime owning this domain
    pub fn runtime(&self) -> &'rt Runtime {
        self.runtime
    }

    /// Activates this domain unless it is already current.
    pub(crate) fn enter(&self) -> Result<()> {
        if self.is_active() {
            return Ok(());
        }

        self.activate()
    }

    /// `true` if this domain is current on the calling thread
    pub fn is_active(&self) -> bool {
        unsafe { (self.runtime.api().mono_domain_get)() == self.raw.as_ptr() }
    }

    /// Makes this domain current on the calling thread.
    ///
    /// # Errors
    /// Returns [`crate::Error::DomainSet`] if the runtime refuses the switch.
    pub fn activate(&self) -> Result<()> {
        if unsafe { (self.runtime.api().mono_domain_set)(self.raw.as_ptr(), 1) } == 0 {
            return Err(Error::DomainSet(self.name.to_string()));
        }

        log::debug!("Domain `{}` is now active", self.name);
        Ok(())
    }

    /// Reads an assembly from disk and loads it into this domain.
    ///
    /// See [`Domain::load_assembly_from`] for the loading steps.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] or [`crate::Error::Empty`] if the file cannot be
    /// read, and any error of [`Domain::load_assembly_from`].
    pub fn load_assembly(&self, path: impl AsRef<Path>) -> Result<Assembly<'rt>> {
        let path = path.as_ref();
        let data = read_bytes(path)?;

        self.load_assembly_from(path, &data)
    }

    /// Loads an assembly from bytes the host already holds.
    ///
    /// `path` names the assembly towards the runtime and is used to locate its debug symbols.
    /// The image is opened with copy semantics, so `image` may be dropped right after this
    /// call returns.
    ///
    /// # Errors
    /// - [`crate::Error::DomainSet`] if this domain cannot be made current
    /// - [`crate::Error::GoblinErr`] / [`crate::Error::Malformed`] if image verification is
    ///   enabled and the bytes are not a managed PE image
    /// - [`crate::Error::ImageTooLarge`], [`crate::Error::ImageOpen`],
    ///   [`crate::Error::AssemblyLoad`] if the runtime rejects the image
    pub fn load_assembly_from(
        &self,
        path: impl AsRef<Path>,
        image: &dyn Backend,
    ) -> Result<Assembly<'rt>> {
        self.enter()?;

        Assembly::load(self.runtime, path.as_ref(), image)
    }

    /// Allocates an instance of `class` in this domain and runs its parameterless constructor.
    ///
    /// The domain is made current first. The constructor is invoked like any other method, so
    /// an exception thrown by it is reported instead of aborting the process. Value types are
    /// allocated zeroed without a constructor call.
    ///
    /// # Errors
    /// - [`crate::Error::DomainSet`] if this domain cannot be made current
    /// - [`crate::Error::ObjectAlloc`] if the runtime cannot allocate the object
    /// - [`crate::Error::MethodNotFound`] if a reference type has no parameterless constructor
    /// - [`crate::Error::ManagedException`] if the constructor throws
    pub fn instantiate(&self, class: &Class<'rt>) -> Result<Object<'rt>> {
        self.enter()?;

        let api = self.runtime.api();
        let raw = unsafe { (api.mono_object_new)(self.raw.as_ptr(), class.as_ptr()) };
        let Some(raw) = NonNull::new(raw) else {
            return Err(Error::ObjectAlloc(class.full_name()));
        };
        let object = Object::pin(self.runtime, raw);

        if !class.is_value_type() {
            class.method(".ctor", 0)?.invoke_unit(Some(&object))?;
        }

        log::debug!("Instantiated {} in `{}`", class.full_name(), self.name);
        Ok(object)
    }
}

impl PartialEq for Domain<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl fmt::Debug for Domain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain").field("name", &self.name).finish()
    }
}
