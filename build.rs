// build.rs

use std::env;
use std::path::PathBuf;

fn main() {
    // Pick the SDK flavour the same way the upstream import libraries are named
    let library = env::var("VMPROTECT_SDK_LIB").unwrap_or_else(|_| default_library_name());

    // Exported so the crate can report which library it was configured for
    println!("cargo:rustc-env=VMPROTECT_SDK_LIB={}", library);

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=VMPROTECT_SDK_DIR");
    println!("cargo:rerun-if-env-changed=VMPROTECT_SDK_LIB");
    println!("cargo:rustc-check-cfg=cfg(vmprotect_stand_in)");

    // `stand-in` wins over `native`, so `cargo test --features stand-in` needs
    // no SDK on disk
    let stand_in_requested = env::var_os("CARGO_FEATURE_STAND_IN").is_some();
    let native_requested = env::var_os("CARGO_FEATURE_NATIVE").is_some();
    if stand_in_requested || !native_requested {
        if !stand_in_requested {
            println!("cargo:warning=neither `native` nor `stand-in` is enabled, entry points resolve to the in-process stand-in");
        }
        println!("cargo:rustc-cfg=vmprotect_stand_in");
        return;
    }

    let search_dir = match env::var_os("VMPROTECT_SDK_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let manifest = env::var_os("CARGO_MANIFEST_DIR").unwrap_or_default();
            PathBuf::from(manifest).join("bin")
        }
    };

    if !search_dir.is_dir() {
        println!(
            "cargo:warning=VMProtect SDK directory {} does not exist, linking may fail (set VMPROTECT_SDK_DIR, or build with --features stand-in)",
            search_dir.display()
        );
    }

    println!("cargo:rustc-link-search=native={}", search_dir.display());
    println!("cargo:rustc-link-lib=dylib={}", library);
}

// 64-bit targets use VMProtectSDK64, everything else VMProtectSDK32
fn default_library_name() -> String {
    match env::var("CARGO_CFG_TARGET_POINTER_WIDTH").as_deref() {
        Ok("64") => "VMProtectSDK64".to_string(),
        _ => "VMProtectSDK32".to_string(),
    }
}
