use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub mod archive;
pub mod descriptor;
pub mod error;
pub mod fs_utils;
pub mod level;
pub mod resources;
pub mod xml;

pub use descriptor::{GeneratePaths, Goomod, GoomodArgs, GoomodType, Version};
pub use error::{GoomodError, Result};
pub use level::{Level, Ocd, OcdKind};
pub use resources::ImageResources;

/// A level as described in a package manifest.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LevelManifest {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub ocd: Option<Ocd>,
}

/// On-disk description of a package, read from YAML or JSON.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PackageManifest {
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<GoomodType>,
    pub version: Option<Vec<u32>>,
    pub description: String,
    pub author: String,
    pub levels: Vec<LevelManifest>,
    /// Image folder, relative to the base directory.
    pub images: Option<String>,
    /// Archive base name; the package id when unset.
    pub output: Option<String>,
    /// Scratch folder name; `<id>_goomod` when unset.
    pub work_dir: Option<String>,
}

impl PackageManifest {
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(GoomodError::InvalidManifest("id must not be empty".to_string()));
        }
        if let Some(version) = &self.version {
            if version.is_empty() {
                return Err(GoomodError::InvalidManifest(
                    "version needs at least one component".to_string(),
                ));
            }
        }
        if let Some(level) = self
            .levels
            .iter()
            .find(|l| !fs_utils::is_single_component(&l.id))
        {
            return Err(GoomodError::InvalidManifest(format!(
                "level id {:?} must be a plain directory name",
                level.id
            )));
        }
        Ok(())
    }
}

impl From<&LevelManifest> for Level {
    fn from(manifest: &LevelManifest) -> Self {
        let mut level = Level::new(manifest.id.as_str());
        if let Some(name) = &manifest.name {
            level = level.with_name(name.as_str());
        }
        if let Some(description) = &manifest.description {
            level = level.with_description(description.as_str());
        }
        if let Some(ocd) = manifest.ocd {
            level = level.with_ocd(ocd);
        }
        level
    }
}

impl Goomod {
    /// Builds a descriptor from a manifest: metadata, levels in manifest
    /// order, and the image folder if one is named.
    pub fn from_manifest(base_dir: impl Into<PathBuf>, manifest: &PackageManifest) -> Result<Self> {
        manifest.validate()?;

        let version = manifest.version.clone().map(Version::new).transpose()?;
        let mut goomod = Goomod::new(
            base_dir,
            GoomodArgs {
                id: manifest.id.clone(),
                name: manifest.name.clone(),
                kind: manifest.kind,
                version,
                description: manifest.description.clone(),
                author: manifest.author.clone(),
            },
        );

        for level in &manifest.levels {
            goomod.append_level(level.into());
        }
        if let Some(images) = &manifest.images {
            goomod.register_image_resources(images)?;
        }
        Ok(goomod)
    }
}
