#![no_main]

use libfuzzer_sys::fuzz_target;
use monohost::file::{inspect_image, symbols};

fuzz_target!(|data: &[u8]| {
    if let Ok(info) = inspect_image(data) {
        assert!(info.clr_rva != 0 && info.clr_size != 0);
    }

    let _ = symbols::SymbolFormat::detect(data);

    // Arbitrary bytes as an assembly path
    let path = String::from_utf8_lossy(data);
    let [appended, replaced] = symbols::candidates(path.as_ref());
    assert!(appended.to_string_lossy().ends_with(".pdb"));
    assert!(replaced.as_os_str().len() <= appended.as_os_str().len());
});
