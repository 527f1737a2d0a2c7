//! Regenerate the C header for `marker-bridge-ffi`.
//!
//! Usage: `generate-ffi-header [OUT]`, defaulting to `include/marker_bridge.h`
//! inside the crate directory.

use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let crate_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let out = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| crate_dir.join("include").join("marker_bridge.h"));

    let bindings = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("MARKER_BRIDGE_H")
        .with_pragma_once(false)
        .with_sys_include("stdbool.h")
        .with_sys_include("stdint.h")
        .with_sys_include("stddef.h")
        .with_no_includes()
        .with_documentation(true)
        .generate()?;

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    bindings.write_to_file(&out);
    println!("wrote {}", out.display());
    Ok(())
}
