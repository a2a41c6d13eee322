//! Method invocation.
//!
//! A [`Method`] is invoked through one of two [`InvokeStrategy`] values. Before any managed
//! code runs, the call is checked against the method's declared signature: the receiver must
//! be an instance of the declaring type, and the argument's managed type must be exactly the
//! declared parameter type. A native call through a mismatched signature cannot be detected
//! after the fact, so these checks are not optional.

use std::{
    ffi::{c_int, c_void},
    fmt,
    ptr::{self, NonNull},
};

use crate::{
    runtime::{
        api::{type_code, MonoMethod, MonoMethodSignature, MonoObject},
        exception, Class, Object, Runtime,
    },
    Error, Result,
};

mod sealed {
    pub trait Sealed {}
}

/// A value that can be passed to a managed method, boxed or unboxed.
///
/// Implemented for the primitive types whose managed and native representations are
/// identical. Sealed; `bool` is left out because its managed and native sizes differ.
pub trait NativeArg: Copy + sealed::Sealed {
    /// Full name of the corresponding managed type
    const MANAGED_TYPE: &'static str;
    /// `MonoTypeEnum` code of the corresponding managed type
    const TYPE_CODE: c_int;
}

macro_rules! native_args {
    ($($ty:ty => $managed:literal, $code:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}
            impl NativeArg for $ty {
                const MANAGED_TYPE: &'static str = $managed;
                const TYPE_CODE: c_int = type_code::$code;
            }
        )*
    };
}

native_args! {
    f32 => "System.Single", R4,
    f64 => "System.Double", R8,
    i8 => "System.SByte", I1,
    u8 => "System.Byte", U1,
    i16 => "System.Int16", I2,
    u16 => "System.UInt16", U2,
    i32 => "System.Int32", I4,
    u32 => "System.UInt32", U4,
    i64 => "System.Int64", I8,
    u64 => "System.UInt64", U8,
}

/// How a managed method is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum InvokeStrategy {
    /// Generic reflective call: arguments are passed by address through the runtime's
    /// invocation entry point, return values come back boxed.
    #[default]
    Runtime,
    /// Direct call through a native thunk bound to the method: arguments are passed unboxed,
    /// nothing is returned. Only instance methods declared `void M(A)` qualify.
    Thunk,
}

/// Native signature of a thunk for an instance method `void M(A)`.
type Thunk<A> = unsafe extern "system" fn(*mut MonoObject, A, *mut *mut MonoObject);

/// A method resolved by name and parameter count.
#[derive(Clone)]
pub struct Method<'rt> {
    runtime: &'rt Runtime,
    class: Class<'rt>,
    raw: NonNull<MonoMethod>,
    name: String,
    param_count: i32,
}

impl<'rt> Method<'rt> {
    pub(crate) fn new(
        runtime: &'rt Runtime,
        class: Class<'rt>,
        raw: NonNull<MonoMethod>,
        name: &str,
        param_count: i32,
    ) -> Self {
        Method {
            runtime,
            class,
            raw,
            name: name.to_string(),
            param_count,
        }
    }

    /// Name the method was resolved by
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter count the method was resolved by
    pub fn param_count(&self) -> i32 {
        self.param_count
    }

    /// Declaring type
    pub fn class(&self) -> Class<'rt> {
        self.class
    }

    /// `Namespace.Type::Method`
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.class.full_name(), self.name)
    }

    /// `true` if the method takes a `this` argument
    ///
    /// # Errors
    /// Returns [`crate::Error::NullHandle`] if the runtime cannot produce the signature.
    pub fn is_instance(&self) -> Result<bool> {
        let signature = self.signature()?;
        Ok(unsafe { (self.runtime.api().mono_signature_is_instance)(signature.as_ptr()) } != 0)
    }

    fn signature(&self) -> Result<NonNull<MonoMethodSignature>> {
        let raw = unsafe { (self.runtime.api().mono_method_signature)(self.raw.as_ptr()) };
        NonNull::new(raw).ok_or(Error::NullHandle("mono_method_signature"))
    }

    fn mismatch(&self, reason: impl Into<String>) -> Error {
        Error::SignatureMismatch {
            method: self.full_name(),
            reason: reason.into(),
        }
    }

    fn expect_params(&self, given: usize) -> Result<()> {
        if usize::try_from(self.param_count) != Ok(given) {
            return Err(Error::ArityMismatch {
                method: self.full_name(),
                params: self.param_count,
                given,
            });
        }

        Ok(())
    }

    /// Instance methods need a target of the declaring type; static methods ignore it.
    fn check_receiver(&self, target: Option<&Object<'rt>>) -> Result<()> {
        if !self.is_instance()? {
            return Ok(());
        }

        match target {
            None => Err(self.mismatch("instance method called without a target")),
            Some(object) if !object.is_instance_of(&self.class) => {
                let found = object.class()?.full_name();
                Err(self.mismatch(format!(
                    "target is a {}, not a {}",
                    found,
                    self.class.full_name()
                )))
            }
            Some(_) => Ok(()),
        }
    }

    /// The single declared parameter must be exactly `A`, passed by value.
    fn check_param<A: NativeArg>(&self, signature: NonNull<MonoMethodSignature>) -> Result<()> {
        let api = self.runtime.api();

        let mut iter = ptr::null_mut();
        let param = unsafe { (api.mono_signature_get_params)(signature.as_ptr(), &mut iter) };
        if param.is_null() {
            return Err(self.mismatch("declares no parameters"));
        }

        if unsafe { (api.mono_type_is_byref)(param) } != 0 {
            return Err(self.mismatch("parameter is passed by reference"));
        }

        if unsafe { (api.mono_type_get_type)(param) } != A::TYPE_CODE {
            return Err(self.mismatch(format!("parameter is not a {}", A::MANAGED_TYPE)));
        }

        Ok(())
    }

    /// A thunk is bound as `void (this, A, exc)`.
    fn check_thunk(&self, signature: NonNull<MonoMethodSignature>) -> Result<()> {
        let api = self.runtime.api();

        if !self.is_instance()? {
            return Err(self.mismatch("thunks are only bound for instance methods"));
        }

        let ret = unsafe { (api.mono_signature_get_return_type)(signature.as_ptr()) };
        if ret.is_null() || unsafe { (api.mono_type_get_type)(ret) } != type_code::VOID {
            return Err(self.mismatch("thunks are only bound for methods returning void"));
        }

        Ok(())
    }

    /// Makes the target's domain current before managed code runs on it.
    fn enter_domain(&self, target: Option<&Object<'rt>>) -> Result<()> {
        match target {
            Some(object) => object.domain()?.enter(),
            None => Ok(()),
        }
    }

    /// Invokes the method on `target` with a single argument.
    ///
    /// With [`InvokeStrategy::Runtime`] the method's return value is returned, boxed, if it
    /// has one. [`InvokeStrategy::Thunk`] always returns `None`. The target's domain is made
    /// current first.
    ///
    /// # Errors
    /// - [`crate::Error::ArityMismatch`] if the method was not resolved with one parameter
    /// - [`crate::Error::SignatureMismatch`] if `target` is not of the declaring type, the
    ///   parameter is not exactly `A`, or a thunk is requested for a static or non-void method
    /// - [`crate::Error::ThunkUnavailable`] if the runtime cannot provide a thunk
    /// - [`crate::Error::ManagedException`] if the method throws
    pub fn invoke<A: NativeArg>(
        &self,
        target: &Object<'rt>,
        arg: A,
        strategy: InvokeStrategy,
    ) -> Result<Option<Object<'rt>>> {
        self.expect_params(1)?;

        let signature = self.signature()?;
        self.check_receiver(Some(target))?;
        self.check_param::<A>(signature)?;
        if strategy == InvokeStrategy::Thunk {
            self.check_thunk(signature)?;
        }

        self.enter_domain(Some(target))?;
        log::debug!("Invoking {} via {}", self.full_name(), strategy);

        match strategy {
            InvokeStrategy::Runtime => {
                let mut value = arg;
                let mut params = [ptr::addr_of_mut!(value).cast::<c_void>()];
                self.runtime_invoke(Some(target), &mut params)
            }
            InvokeStrategy::Thunk => {
                self.thunk_invoke(target, arg)?;
                Ok(None)
            }
        }
    }

    /// Invokes a parameterless method through the runtime's invocation entry point.
    ///
    /// `target` is `None` for static methods.
    ///
    /// # Errors
    /// - [`crate::Error::ArityMismatch`] if the method was not resolved without parameters
    /// - [`crate::Error::SignatureMismatch`] if an instance method gets no target, or a target
    ///   of another type
    /// - [`crate::Error::ManagedException`] if the method throws
    pub fn invoke_unit(&self, target: Option<&Object<'rt>>) -> Result<Option<Object<'rt>>> {
        self.expect_params(0)?;
        self.check_receiver(target)?;

        self.enter_domain(target)?;
        log::debug!("Invoking {} via {}", self.full_name(), InvokeStrategy::Runtime);

        self.runtime_invoke(target, &mut [])
    }

    fn runtime_invoke(
        &self,
        target: Option<&Object<'rt>>,
        params: &mut [*mut c_void],
    ) -> Result<Option<Object<'rt>>> {
        let api = self.runtime.api();
        let this = target.map_or(ptr::null_mut(), |object| object.as_ptr().cast::<c_void>());
        let params = if params.is_empty() {
            ptr::null_mut()
        } else {
            params.as_mut_ptr()
        };

        let mut exception = ptr::null_mut();
        let ret = unsafe {
            (api.mono_runtime_invoke)(self.raw.as_ptr(), this, params, &mut exception)
        };
        exception::check(self.runtime, exception)?;

        Ok(NonNull::new(ret).map(|raw| Object::pin(self.runtime, raw)))
    }

    fn thunk_invoke<A: NativeArg>(&self, target: &Object<'rt>, arg: A) -> Result<()> {
        let api = self.runtime.api();

        let raw = unsafe { (api.mono_method_get_unmanaged_thunk)(self.raw.as_ptr()) };
        if raw.is_null() {
            return Err(Error::ThunkUnavailable(self.full_name()));
        }

        // SAFETY: `check_param` and `check_thunk` established that the method is an instance
        // method declared `void M(A)`, which is exactly the thunk's native signature.
        let thunk: Thunk<A> = unsafe { std::mem::transmute_copy(&raw) };

        let mut exception = ptr::null_mut();
        unsafe { thunk(target.as_ptr(), arg, &mut exception) };
        exception::check(self.runtime, exception)
    }
}

impl fmt::Debug for Method<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.full_name())
            .field("param_count", &self.param_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names() {
        assert_eq!(InvokeStrategy::Runtime.to_string(), "runtime");
        assert_eq!(InvokeStrategy::Thunk.to_string(), "thunk");
        assert_eq!("thunk".parse::<InvokeStrategy>().unwrap(), InvokeStrategy::Thunk);
        assert!("boxed".parse::<InvokeStrategy>().is_err());
        assert_eq!(InvokeStrategy::default(), InvokeStrategy::Runtime);
    }

    #[test]
    fn type_codes() {
        assert_eq!(<f32 as NativeArg>::TYPE_CODE, 0x0c);
        assert_eq!(<f64 as NativeArg>::TYPE_CODE, 0x0d);
        assert_eq!(<i32 as NativeArg>::TYPE_CODE, 0x08);
        assert_eq!(<u64 as NativeArg>::TYPE_CODE, 0x0b);
        assert_ne!(<i64 as NativeArg>::TYPE_CODE, <f64 as NativeArg>::TYPE_CODE);
    }

    #[test]
    fn managed_type_names() {
        assert_eq!(<f32 as NativeArg>::MANAGED_TYPE, "System.Single");
        assert_eq!(<f64 as NativeArg>::MANAGED_TYPE, "System.Double");
        assert_eq!(<i32 as NativeArg>::MANAGED_TYPE, "System.Int32");
        assert_eq!(<u64 as NativeArg>::MANAGED_TYPE, "System.UInt64");
    }
}
