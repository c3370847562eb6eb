use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use async_zip::Compression;
use goomod_lib::fs_utils::{encode_size, list_files};
use goomod_lib::{Goomod, PackageManifest};

fn build_goomod(base_dir: &Path, manifest: &PackageManifest) -> Result<Goomod> {
    Goomod::from_manifest(base_dir, manifest)
        .with_context(|| format!("building package {:?}", manifest.id))
}

/// Prints what `generate` would produce without touching the filesystem.
pub fn dry_run(base_dir: &Path, manifest: &PackageManifest) -> Result<()> {
    let goomod = build_goomod(base_dir, manifest)?;
    let paths = goomod.paths(manifest.output.as_deref(), manifest.work_dir.as_deref());

    println!("{}", serde_yaml::to_string(manifest)?);
    println!("Scratch directory: {}", paths.work_dir.display());
    println!("Archive: {}", paths.archive.display());
    println!("Levels: {}", goomod.level_count());

    if let Some(resources) = goomod.image_resources() {
        let mut total: u64 = 0;
        for file in list_files(resources.folder())? {
            total += fs::metadata(&file)?.len();
        }
        println!("Images: {} ({})", resources.len(), encode_size(total));
        for (path, id) in resources.iter() {
            println!("  {id} -> {path}");
        }
    }
    tracing::info!(package = %manifest.id, "dry run finished, nothing written");
    Ok(())
}

pub fn generate_within_tokio(
    base_dir: &Path,
    manifest: &PackageManifest,
    store: bool,
) -> Result<()> {
    let mut goomod = build_goomod(base_dir, manifest)?;
    if store {
        goomod.set_compression(Compression::Stored);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all() // Enables both IO and time drivers
        .build()?;
    let paths = runtime
        .block_on(goomod.generate(manifest.output.as_deref(), manifest.work_dir.as_deref()))
        .with_context(|| format!("generating package {:?}", manifest.id))?;

    tracing::info!(
        archive = %paths.archive.display(),
        scratch = %paths.work_dir.display(),
        "package created"
    );
    Ok(())
}
