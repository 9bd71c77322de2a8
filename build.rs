// Licensed under the Apache-2.0 license

fn main() {
    // Only the firmware image needs the linker script.
    if std::env::var_os("CARGO_FEATURE_RT").is_none() {
        return;
    }

    // Put `memory.x` in our output directory and ensure it's on the linker search path.
    let out = std::env::var("OUT_DIR").unwrap();
    let out_dir = std::path::Path::new(&out);
    std::fs::copy("memory.x", out_dir.join("memory.x")).unwrap();
    println!("cargo:rustc-link-search={out}");
    println!("cargo:rerun-if-changed=memory.x");

    println!("cargo:rustc-link-arg-bins=-Tlink.x");
}
