use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use rkyv::{rancor::Error as RkyvError, to_bytes};
use zstd::bulk::compress as zstd_compress;

#[allow(dead_code)]
#[path = "src/data.rs"]
mod data;
#[allow(dead_code)]
#[path = "src/raw.rs"]
mod raw;

use data::{BundledCollection, BundledStore, Language};

// The bundle is tiny; favour a quick rebuild over the last few bytes.
const BUNDLE_COMPRESSION_LEVEL: i32 = 6;

fn main() -> Result<(), Box<dyn Error>> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    println!("cargo:rerun-if-changed=src/data.rs");
    println!("cargo:rerun-if-changed=src/raw.rs");

    let mut store = BundledStore::default();
    for language in Language::ALL {
        store
            .collections
            .push(load_bundled_collection(&manifest_dir, language)?);
    }
    write_bundle(&store, &out_dir)?;
    Ok(())
}

fn load_bundled_collection(
    manifest_dir: &Path,
    language: Language,
) -> Result<BundledCollection, Box<dyn Error>> {
    let path = manifest_dir.join("data").join(language.data_file_name());
    println!("cargo:rerun-if-changed={}", path.display());
    if !path.exists() {
        panic!(
            "Missing {}. Every language needs a bundled fallback collection.",
            path.display()
        );
    }
    let bytes = fs::read(&path)?;
    let normalized = raw::parse_collection(&bytes, language)
        .map_err(|err| format!("{} is not a valid collection: {err}", path.display()))?;
    for id in &normalized.duplicate_ids {
        println!(
            "cargo:warning={}: duplicate id {id} dropped",
            path.display()
        );
    }
    if normalized.synthesized_ids > 0 {
        println!(
            "cargo:warning={}: {} records had no id",
            path.display(),
            normalized.synthesized_ids
        );
    }
    Ok(BundledCollection {
        language,
        entries: normalized.entries,
    })
}

fn write_bundle(store: &BundledStore, out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let archived = to_bytes::<RkyvError>(store)
        .map_err(|err| format!("Failed to serialize bundled store: {err}"))?;
    let compressed = zstd_compress(archived.as_slice(), BUNDLE_COMPRESSION_LEVEL)?;
    let bundle_path = out_dir.join("bundled.rkyv.zst");
    fs::write(&bundle_path, compressed)?;
    println!("cargo:rustc-env=LEXICON_BUNDLE={}", bundle_path.display());
    Ok(())
}
