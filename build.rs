//! Build script for the LoRaWAN node firmware
//!
//! Handles:
//! - Memory layout configuration
//! - defmt linker script for the embedded binary

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Host test builds have no linker scripts to pass along
    if std::env::var_os("CARGO_FEATURE_EMBEDDED").is_none() {
        return;
    }

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
}
