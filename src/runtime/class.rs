//! Managed types and objects.

use std::{ffi::c_int, fmt, ptr::NonNull};

use crate::{
    runtime::{
        api::{MonoClass, MonoObject},
        c_string, from_c_string, Domain, Method, NativeArg, Runtime,
    },
    Error, Result,
};

/// A managed type, resolved from an assembly's metadata.
#[derive(Clone, Copy)]
pub struct Class<'rt> {
    runtime: &'rt Runtime,
    raw: NonNull<MonoClass>,
}

impl<'rt> Class<'rt> {
    pub(crate) fn new(runtime: &'rt Runtime, raw: NonNull<MonoClass>) -> Self {
        Class { runtime, raw }
    }

    pub(crate) fn as_ptr(&self) -> *mut MonoClass {
        self.raw.as_ptr()
    }

    /// Simple name of the type
    pub fn name(&self) -> String {
        unsafe { from_c_string((self.runtime.api().mono_class_get_name)(self.raw.as_ptr())) }
    }

    /// Namespace of the type, empty for the global namespace
    pub fn namespace(&self) -> String {
        unsafe {
            from_c_string((self.runtime.api().mono_class_get_namespace)(
                self.raw.as_ptr(),
            ))
        }
    }

    /// `true` for value types (structs and enums)
    pub fn is_value_type(&self) -> bool {
        unsafe { (self.runtime.api().mono_class_is_valuetype)(self.raw.as_ptr()) != 0 }
    }

    /// `Namespace.Name`, or just the name for types in the global namespace
    pub fn full_name(&self) -> String {
        let namespace = self.namespace();
        if namespace.is_empty() {
            self.name()
        } else {
            format!("{}.{}", namespace, self.name())
        }
    }

    /// Resolves a method of this type by name and parameter count.
    ///
    /// # Errors
    /// - [`crate::Error::InvalidName`] if `name` contains a NUL byte
    /// - [`crate::Error::MethodNotFound`] if no such method exists
    pub fn method(&self, name: &str, param_count: i32) -> Result<Method<'rt>> {
        let c_name = c_string(name)?;

        let raw = unsafe {
            (self.runtime.api().mono_class_get_method_from_name)(
                self.raw.as_ptr(),
                c_name.as_ptr(),
                param_count as c_int,
            )
        };

        NonNull::new(raw)
            .map(|raw| Method::new(self.runtime, *self, raw, name, param_count))
            .ok_or_else(|| Error::MethodNotFound {
                class: self.full_name(),
                name: name.to_string(),
                params: param_count,
            })
    }
}

impl PartialEq for Class<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl fmt::Debug for Class<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Class").field(&self.full_name()).finish()
    }
}

/// A managed object.
///
/// The object belongs to the garbage collector. The handle holds a pinned GC handle, which keeps
/// the object alive and at a fixed address until the handle is dropped.
pub struct Object<'rt> {
    runtime: &'rt Runtime,
    raw: NonNull<MonoObject>,
    gchandle: u32,
}

impl<'rt> Object<'rt> {
    /// Pins `raw` and wraps it.
    pub(crate) fn pin(runtime: &'rt Runtime, raw: NonNull<MonoObject>) -> Self {
        let gchandle = unsafe { (runtime.api().mono_gchandle_new)(raw.as_ptr(), 1) };
        Object {
            runtime,
            raw,
            gchandle,
        }
    }

    pub(crate) fn as_ptr(&self) -> *mut MonoObject {
        self.raw.as_ptr()
    }

    /// Runtime type of the object
    ///
    /// # Errors
    /// Returns [`crate::Error::NullHandle`] if the runtime reports no class.
    pub fn class(&self) -> Result<Class<'rt>> {
        let raw = unsafe { (self.runtime.api().mono_object_get_class)(self.raw.as_ptr()) };

        NonNull::new(raw)
            .map(|raw| Class::new(self.runtime, raw))
            .ok_or(Error::NullHandle("mono_object_get_class"))
    }

    /// Domain the object was allocated in
    ///
    /// # Errors
    /// Returns [`crate::Error::NullHandle`] if the runtime reports no domain.
    pub fn domain(&self) -> Result<Domain<'rt>> {
        let raw = unsafe { (self.runtime.api().mono_object_get_domain)(self.raw.as_ptr()) };

        NonNull::new(raw)
            .map(|raw| self.runtime.domain_from_raw(raw))
            .ok_or(Error::NullHandle("mono_object_get_domain"))
    }

    /// `true` if the object is an instance of `class` or of a type derived from it
    pub fn is_instance_of(&self, class: &Class<'rt>) -> bool {
        let cast = unsafe {
            (self.runtime.api().mono_object_isinst)(self.raw.as_ptr(), class.as_ptr())
        };
        !cast.is_null()
    }

    /// Reads the value out of a boxed value type.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnboxMismatch`] if the object is not a boxed `A`.
    pub fn unbox<A: NativeArg>(&self) -> Result<A> {
        let found = self.class()?.full_name();
        if found != A::MANAGED_TYPE {
            return Err(Error::UnboxMismatch {
                expected: A::MANAGED_TYPE,
                found,
            });
        }

        let value = unsafe { (self.runtime.api().mono_object_unbox)(self.raw.as_ptr()) };
        Ok(unsafe { value.cast::<A>().read_unaligned() })
    }
}

impl Drop for Object<'_> {
    fn drop(&mut self) {
        unsafe { (self.runtime.api().mono_gchandle_free)(self.gchandle) };
    }
}

impl fmt::Debug for Object<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class().map(|class| class.full_name()).ok())
            .field("gchandle", &self.gchandle)
            .finish()
    }
}
