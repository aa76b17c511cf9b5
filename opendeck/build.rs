//! Puts `memory.x` on the linker search path and adds the cortex-m-rt and
//! defmt linker scripts unless `.cargo/config.toml` already passed them.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let out = PathBuf::from(env::var_os("OUT_DIR").unwrap_or_default());
    if fs::write(out.join("memory.x"), include_bytes!("memory.x")).is_ok() {
        println!("cargo:rustc-link-search={}", out.display());
    }
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");

    // Avoid duplicate script definitions when building from this directory
    let rustflags = env::var("CARGO_ENCODED_RUSTFLAGS").unwrap_or_default();
    if !rustflags.contains("link.x") {
        println!("cargo:rustc-link-arg=-Tlink.x");
    }
    if !rustflags.contains("link-rp.x") {
        println!("cargo:rustc-link-arg=-Tlink-rp.x");
    }
    if !rustflags.contains("defmt.x") {
        println!("cargo:rustc-link-arg=-Tdefmt.x");
    }
    if !rustflags.contains("--nmagic") {
        println!("cargo:rustc-link-arg=--nmagic");
    }
}
