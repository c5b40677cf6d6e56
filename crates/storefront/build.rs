//! Build script for storefront crate.
//!
//! Hashes the precached static assets so the service worker cache name
//! changes whenever any of them does.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Files listed in the service worker precache, relative to the crate root.
const HASHED_ASSETS: &[&str] = &[
    "static/css/main.css",
    "static/js/app.js",
    "templates/pwa/service-worker.js",
    "templates/pwa/offline.html",
];

fn main() {
    hash_assets();
}

/// Hash the precached assets into `ASSET_HASH` for use with `env!("ASSET_HASH")`.
fn hash_assets() {
    let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") else {
        println!("cargo:rustc-env=ASSET_HASH=dev");
        return;
    };

    let mut hasher = Sha256::new();
    for asset in HASHED_ASSETS {
        let path = Path::new(&manifest_dir).join(asset);
        println!("cargo:rerun-if-changed={}", path.display());

        match fs::read(&path) {
            Ok(content) => {
                hasher.update(asset.as_bytes());
                hasher.update(&content);
            }
            Err(e) => println!("cargo:warning=Could not read {asset}: {e}"),
        }
    }

    let hash = format!("{:x}", hasher.finalize());
    let short_hash = hash.get(..8).unwrap_or("dev");

    println!("cargo:rustc-env=ASSET_HASH={short_hash}");
}
