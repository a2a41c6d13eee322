//! Conversion of managed exceptions into [`crate::Error::ManagedException`].

use std::{ffi::c_void, ptr::{self, NonNull}};

use crate::{
    runtime::{api::MonoObject, Object, Runtime},
    Error, Result,
};

/// Turns the exception output of an invocation into a result.
///
/// A null `exception` means the call completed normally.
pub(crate) fn check(runtime: &Runtime, exception: *mut MonoObject) -> Result<()> {
    let Some(raw) = NonNull::new(exception) else {
        return Ok(());
    };

    let exception = Object::pin(runtime, raw);
    let class = exception
        .class()
        .map(|class| class.full_name())
        .unwrap_or_else(|_| "System.Exception".to_string());
    let message = describe(runtime, &exception).unwrap_or_else(|| class.clone());

    log::debug!("Managed exception {}: {}", class, message);
    Err(Error::ManagedException { class, message })
}

/// `ToString()` of the exception, `None` if that itself fails.
fn describe(runtime: &Runtime, exception: &Object<'_>) -> Option<String> {
    let api = runtime.api();

    let mut nested = ptr::null_mut();
    let string = unsafe { (api.mono_object_to_string)(exception.as_ptr(), &mut nested) };
    if string.is_null() || !nested.is_null() {
        return None;
    }

    unsafe {
        let utf8 = (api.mono_string_to_utf8)(string);
        if utf8.is_null() {
            return None;
        }

        let message = super::from_c_string(utf8);
        (api.mono_free)(utf8.cast::<c_void>());
        Some(message)
    }
}
