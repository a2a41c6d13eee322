//! End-to-end tests against an installed Mono runtime.
//!
//! The runtime can only be started once per process, so everything that needs it runs inside a
//! single test. The test is skipped when the runtime library cannot be loaded or when the demo
//! assembly under `demos/TestAssembly` has not been built.
//!
//! Environment:
//! - `MONOHOST_RUNTIME_LIB` - path of `libmonosgen-2.0` if it is not on the loader path
//! - `MONOHOST_ASSEMBLIES_PATH` - class library directory, if not the runtime's built-in default
//! - `MONOHOST_TEST_ASSEMBLY` - path of the compiled demo assembly

use monohost::{
    file::{
        read_bytes,
        symbols::{self, SymbolFormat},
    },
    Error, HostConfig, InvokeStrategy, Runtime,
};
use std::{
    env,
    path::{Path, PathBuf},
};

const VALUE: f32 = 5.0;

fn demo_assembly() -> PathBuf {
    env::var_os("MONOHOST_TEST_ASSEMBLY")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("demos/TestAssembly/bin/Debug/TestAssembly.dll")
        })
}

fn config() -> HostConfig {
    let mut config = HostConfig::without_debugger();
    config.assemblies_path = env::var_os("MONOHOST_ASSEMBLIES_PATH").map(PathBuf::from);
    config
}

#[test]
fn test_embedded_runtime() {
    let path = demo_assembly();
    if !path.exists() {
        println!("Skipping: demo assembly not built at {}", path.display());
        return;
    }

    let runtime = match Runtime::new(config()) {
        Ok(runtime) => runtime,
        Err(Error::RuntimeLibrary { tried, .. }) => {
            println!("Skipping: no runtime library (tried {tried})");
            return;
        }
        Err(e) => panic!("Runtime failed to start: {e}"),
    };

    // Second bootstrap in the same process is refused
    assert!(matches!(
        Runtime::new(config()),
        Err(Error::AlreadyInitialized)
    ));

    let domain = runtime.script_domain();
    assert_eq!(runtime.active_domain(), Some(domain));
    assert_eq!(domain.name(), "MonoHostScripts");
    assert_eq!(runtime.root_domain().name(), "MonoHostRuntime");

    let assembly = domain.load_assembly(&path).unwrap();
    assert_eq!(assembly.path(), path.as_path());
    assert!(assembly.image_info().is_some_and(|info| info.clr_size > 0));
    match symbols::locate(&path) {
        Some(pdb) => {
            let attached = assembly.symbols().expect("portable symbols are attached");
            assert_eq!(attached.path(), pdb.as_path());
            assert_eq!(attached.format(), SymbolFormat::Portable);
        }
        None => assert!(assembly.symbols().is_none()),
    }

    // Resolution failures
    assert!(matches!(
        assembly.class("MyAssembly", "NoSuchClass"),
        Err(Error::ClassNotFound { .. })
    ));
    let class = assembly.class("MyAssembly", "AnotherClass").unwrap();
    assert_eq!(class.full_name(), "MyAssembly.AnotherClass");
    assert!(matches!(
        class.method("CalledViaRuntimeInvoke", 2),
        Err(Error::MethodNotFound { params: 2, .. })
    ));

    // Instantiation enters the target domain even when another one is current
    runtime.root_domain().activate().unwrap();
    let instance = domain.instantiate(&class).unwrap();
    assert_eq!(runtime.active_domain(), Some(domain));
    assert_eq!(instance.class().unwrap(), class);
    assert_eq!(instance.domain().unwrap(), domain);

    let get_my_var = class.method("GetMyVar", 0).unwrap();
    let observe = || -> f32 {
        get_my_var
            .invoke_unit(Some(&instance))
            .unwrap()
            .expect("GetMyVar returns a boxed float")
            .unbox::<f32>()
            .unwrap()
    };

    // Reflective invocation
    let runtime_invoke = class.method("CalledViaRuntimeInvoke", 1).unwrap();
    assert!(runtime_invoke
        .invoke(&instance, VALUE, InvokeStrategy::Runtime)
        .unwrap()
        .is_none());
    assert_eq!(observe(), VALUE);

    // Thunk invocation
    let thunk_invoke = class.method("CalledViaUnmanagedThunk", 1).unwrap();
    assert!(thunk_invoke
        .invoke(&instance, VALUE * 2.0, InvokeStrategy::Thunk)
        .unwrap()
        .is_none());
    assert_eq!(observe(), VALUE * 2.0);

    // Calls run in the domain that owns the target
    runtime.root_domain().activate().unwrap();
    assert_eq!(observe(), VALUE * 2.0);
    assert_eq!(runtime.active_domain(), Some(domain));

    // Signatures are checked before any call is made
    assert!(matches!(
        thunk_invoke.invoke(&instance, 1i64, InvokeStrategy::Thunk),
        Err(Error::SignatureMismatch { .. })
    ));
    assert!(matches!(
        runtime_invoke.invoke(&instance, 1.0f64, InvokeStrategy::Runtime),
        Err(Error::SignatureMismatch { .. })
    ));
    assert!(matches!(
        get_my_var.invoke_unit(None),
        Err(Error::SignatureMismatch { .. })
    ));
    let unrelated = domain
        .instantiate(&assembly.class("MyAssembly", "MyClass").unwrap())
        .unwrap();
    assert!(!unrelated.is_instance_of(&class));
    match get_my_var.invoke_unit(Some(&unrelated)) {
        Err(Error::SignatureMismatch { method, reason }) => {
            assert_eq!(method, "MyAssembly.AnotherClass::GetMyVar");
            assert!(reason.contains("MyAssembly.MyClass"), "{reason}");
        }
        other => panic!("expected a signature mismatch, got {other:?}"),
    }
    assert_eq!(observe(), VALUE * 2.0);

    // Only `void M(A)` instance methods are called through a thunk
    let echo = class.method("Echo", 1).unwrap();
    assert!(matches!(
        echo.invoke(&instance, VALUE, InvokeStrategy::Thunk),
        Err(Error::SignatureMismatch { .. })
    ));
    let echoed = echo
        .invoke(&instance, VALUE, InvokeStrategy::Runtime)
        .unwrap()
        .expect("Echo returns a boxed float");
    assert_eq!(echoed.unbox::<f32>().unwrap(), VALUE);

    // Boxed values are type checked
    let boxed = get_my_var.invoke_unit(Some(&instance)).unwrap().unwrap();
    assert!(matches!(
        boxed.unbox::<f64>(),
        Err(Error::UnboxMismatch {
            expected: "System.Double",
            ..
        })
    ));

    // Arity is checked before any call is made
    assert!(matches!(
        get_my_var.invoke(&instance, VALUE, InvokeStrategy::Runtime),
        Err(Error::ArityMismatch { params: 0, given: 1, .. })
    ));

    // Managed exceptions surface as errors
    let throws = class.method("Throws", 0).unwrap();
    match throws.invoke_unit(Some(&instance)) {
        Err(Error::ManagedException { class, message }) => {
            assert_eq!(class, "System.InvalidOperationException");
            assert!(message.contains("Thrown from managed code"), "{message}");
        }
        other => panic!("expected a managed exception, got {other:?}"),
    }
    let throws_with = class.method("ThrowsWith", 1).unwrap();
    for strategy in [InvokeStrategy::Thunk, InvokeStrategy::Runtime] {
        match throws_with.invoke(&instance, VALUE, strategy) {
            Err(Error::ManagedException { class, message }) => {
                assert_eq!(class, "System.ArgumentOutOfRangeException");
                assert!(message.contains("Thrown from a thunk"), "{message}");
            }
            other => panic!("expected a managed exception via {strategy}, got {other:?}"),
        }
    }

    // A throwing constructor fails instantiation instead of the process
    let faulty = assembly.class("MyAssembly", "Faulty").unwrap();
    match domain.instantiate(&faulty) {
        Err(Error::ManagedException { class, message }) => {
            assert_eq!(class, "System.InvalidOperationException");
            assert!(message.contains("Thrown from a constructor"), "{message}");
        }
        other => panic!("expected a managed exception, got {other:?}"),
    }

    // Non-portable symbols next to an assembly are skipped
    let copy_dir = env::temp_dir().join(format!("monohost_msf_{}", std::process::id()));
    std::fs::create_dir_all(&copy_dir).unwrap();
    let copy = copy_dir.join("TestAssembly.dll");
    std::fs::copy(&path, &copy).unwrap();
    std::fs::write(
        copy_dir.join("TestAssembly.dll.pdb"),
        b"Microsoft C/C++ MSF 7.00\r\n\x1aDS\0\0\0",
    )
    .unwrap();
    let copied = domain.load_assembly(&copy).unwrap();
    assert!(copied.symbols().is_none());
    std::fs::remove_dir_all(&copy_dir).unwrap();

    // Images the runtime cannot open are rejected before they reach it
    let not_an_image = env::temp_dir().join(format!("monohost_not_pe_{}.dll", std::process::id()));
    std::fs::write(&not_an_image, b"definitely not a PE file").unwrap();
    let bytes = read_bytes(&not_an_image).unwrap();
    assert!(domain.load_assembly_from(&not_an_image, &bytes).is_err());
    std::fs::remove_file(&not_an_image).unwrap();
}
