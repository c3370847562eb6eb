use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use async_zip::Compression;
use serde::{Deserialize, Serialize};

use crate::archive::zip_folder;
use crate::error::{GoomodError, Result};
use crate::fs_utils::{copy_dir_all, ensure_parent_dir, is_single_component};
use crate::level::Level;
use crate::resources::ImageResources;
use crate::xml::Element;

pub const ADDIN_SPEC_VERSION: &str = "1.1";
pub const ARCHIVE_EXTENSION: &str = "goomod";

/// Kind of package, as written to the `<type>` element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoomodType {
    #[default]
    #[serde(rename = "mod")]
    Generic,
    #[serde(rename = "level")]
    Levels,
}

impl GoomodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoomodType::Generic => "mod",
            GoomodType::Levels => "level",
        }
    }
}

impl fmt::Display for GoomodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dotted version with at least one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version(Vec<u32>);

impl Version {
    pub fn new(components: Vec<u32>) -> Result<Self> {
        if components.is_empty() {
            return Err(GoomodError::InvalidManifest(
                "version needs at least one component".to_string(),
            ));
        }
        Ok(Self(components))
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl Default for Version {
    fn default() -> Self {
        Self(vec![0])
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

/// Required metadata plus the optional fields that have defaults.
#[derive(Debug, Clone, Default)]
pub struct GoomodArgs {
    pub id: String,
    pub name: Option<String>,
    pub kind: Option<GoomodType>,
    pub version: Option<Version>,
    pub description: String,
    pub author: String,
}

/// Output locations for one `generate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratePaths {
    pub work_dir: PathBuf,
    pub archive: PathBuf,
}

/// Package metadata that writes itself out as a `.goomod` archive.
#[derive(Debug, Clone)]
pub struct Goomod {
    id: String,
    pub name: String,
    pub kind: GoomodType,
    pub version: Version,
    pub description: String,
    pub author: String,

    base_dir: PathBuf,
    image_resources: Option<ImageResources>,
    levels: Vec<Level>,
    compression: Compression,
}

impl Goomod {
    pub fn new(base_dir: impl Into<PathBuf>, args: GoomodArgs) -> Self {
        Self {
            name: args.name.unwrap_or_else(|| args.id.clone()),
            id: args.id,
            kind: args.kind.unwrap_or_default(),
            version: args.version.unwrap_or_default(),
            description: args.description,
            author: args.author,
            base_dir: base_dir.into(),
            image_resources: None,
            levels: Vec::new(),
            compression: Compression::Deflate,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn image_resources(&self) -> Option<&ImageResources> {
        self.image_resources.as_ref()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn set_compression(&mut self, compression: Compression) {
        self.compression = compression;
    }

    /// Scans `folder` (relative to the base directory) for images. Can only
    /// be done once per descriptor.
    pub fn register_image_resources(&mut self, folder: impl AsRef<Path>) -> Result<()> {
        if self.image_resources.is_some() {
            return Err(GoomodError::Redefinition("image resources"));
        }
        let folder = self.base_dir.join(folder);
        let resources = ImageResources::scan(&self.id, folder)?;
        tracing::debug!(
            count = resources.len(),
            folder = %resources.folder().display(),
            "registered image resources"
        );
        self.image_resources = Some(resources);
        Ok(())
    }

    /// Levels are written in the order they are appended. Duplicate ids are
    /// not checked.
    pub fn append_level(&mut self, level: Level) {
        self.levels.push(level);
    }

    /// Resolves the scratch directory and archive path under the base
    /// directory. `None` selects `<id>` and `<id>_goomod` respectively.
    pub fn paths(&self, output_name: Option<&str>, work_dir_name: Option<&str>) -> GeneratePaths {
        let output_name = output_name.unwrap_or(&self.id);
        GeneratePaths {
            work_dir: self.base_dir.join(self.work_dir_name(work_dir_name)),
            archive: self
                .base_dir
                .join(format!("{output_name}.{ARCHIVE_EXTENSION}")),
        }
    }

    fn work_dir_name(&self, work_dir_name: Option<&str>) -> String {
        match work_dir_name {
            Some(name) => name.to_string(),
            None => format!("{}_goomod", self.id),
        }
    }

    /// Rejects layouts where rebuilding the scratch directory would delete
    /// or recurse into user files, and level ids that would escape
    /// `compile/res/levels`.
    fn check_layout(&self, work_dir_name: Option<&str>, work_dir: &Path) -> Result<()> {
        let name = self.work_dir_name(work_dir_name);
        if !is_single_component(&name) {
            return Err(GoomodError::InvalidManifest(format!(
                "scratch folder {name:?} must be a plain directory name"
            )));
        }
        if let Some(resources) = &self.image_resources {
            let images = without_cur_dir(resources.folder());
            let scratch = without_cur_dir(work_dir);
            if images.starts_with(&scratch) || scratch.starts_with(&images) {
                return Err(GoomodError::InvalidManifest(format!(
                    "scratch folder {} overlaps image folder {}",
                    work_dir.display(),
                    images.display()
                )));
            }
        }
        if let Some(level) = self.levels.iter().find(|l| !is_single_component(l.id())) {
            return Err(GoomodError::InvalidManifest(format!(
                "level id {:?} must be a plain directory name",
                level.id()
            )));
        }
        Ok(())
    }

    pub fn addin_document(&self) -> Element {
        let mut addin = Element::new("addin")
            .attr("spec-version", ADDIN_SPEC_VERSION)
            .child(Element::new("id").text(self.id.as_str()))
            .child(Element::new("name").text(self.name.as_str()))
            .child(Element::new("type").text(self.kind.as_str()))
            .child(Element::new("version").text(self.version.to_string()))
            .child(Element::new("description").text(self.description.as_str()))
            .child(Element::new("author").text(self.author.as_str()));

        if self.kind == GoomodType::Levels && !self.levels.is_empty() {
            let mut levels = Element::new("levels");
            for level in &self.levels {
                levels.push(level.to_addin_element());
            }
            addin.push(levels);
        }
        addin
    }

    /// Writes the staging tree and archives it. The scratch directory is
    /// rebuilt from scratch and left on disk afterwards; an existing archive
    /// is replaced.
    pub async fn generate(
        &self,
        output_name: Option<&str>,
        work_dir_name: Option<&str>,
    ) -> Result<GeneratePaths> {
        let paths = self.paths(output_name, work_dir_name);
        let work_dir = &paths.work_dir;
        self.check_layout(work_dir_name, work_dir)?;

        if work_dir.exists() {
            tracing::debug!(dir = %work_dir.display(), "removing stale scratch directory");
            fs::remove_dir_all(work_dir)?;
        }
        fs::create_dir_all(work_dir)?;

        fs::write(
            work_dir.join("addin.xml"),
            self.addin_document().to_pretty_string()?,
        )?;

        if let Some(resources) = &self.image_resources {
            copy_dir_all(
                resources.folder(),
                &work_dir.join("override").join("res").join("images"),
            )?;

            let xsl_path = work_dir
                .join("merge")
                .join("properties")
                .join("resources.xml.xsl");
            ensure_parent_dir(&xsl_path)?;
            fs::write(&xsl_path, resources.merge_transform().to_pretty_string()?)?;
        }

        for level in &self.levels {
            write_level_placeholders(work_dir, level)?;
        }

        if paths.archive.exists() {
            fs::remove_file(&paths.archive)?;
        }
        zip_folder(work_dir, &paths.archive, self.compression).await?;

        tracing::info!(archive = %paths.archive.display(), "goomod written");
        Ok(paths)
    }
}

fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn write_level_placeholders(work_dir: &Path, level: &Level) -> Result<()> {
    let level_dir = work_dir
        .join("compile")
        .join("res")
        .join("levels")
        .join(level.id());
    fs::create_dir_all(&level_dir)?;

    fs::write(
        level_dir.join(format!("{}.level.xml", level.id())),
        Element::new("level").to_pretty_string()?,
    )?;
    fs::write(
        level_dir.join(format!("{}.scene.xml", level.id())),
        Element::new("scene").to_pretty_string()?,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{Ocd, OcdKind};

    fn args(id: &str) -> GoomodArgs {
        GoomodArgs {
            id: id.to_string(),
            description: "d".to_string(),
            author: "a".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults() {
        let goomod = Goomod::new("/tmp", args("mymod"));
        assert_eq!(goomod.name, "mymod");
        assert_eq!(goomod.kind, GoomodType::Generic);
        assert_eq!(goomod.version.to_string(), "0");
    }

    #[test]
    fn version_is_dot_joined() {
        let version = Version::new(vec![1, 2, 0]).unwrap();
        assert_eq!(version.to_string(), "1.2.0");
        assert!(Version::new(vec![]).is_err());
    }

    #[test]
    fn default_paths() {
        let goomod = Goomod::new("/base", args("mymod"));
        let paths = goomod.paths(None, None);
        assert_eq!(paths.work_dir, PathBuf::from("/base/mymod_goomod"));
        assert_eq!(paths.archive, PathBuf::from("/base/mymod.goomod"));

        let paths = goomod.paths(Some("release"), Some("stage"));
        assert_eq!(paths.work_dir, PathBuf::from("/base/stage"));
        assert_eq!(paths.archive, PathBuf::from("/base/release.goomod"));
    }

    #[test]
    fn addin_child_order() {
        let goomod = Goomod::new("/tmp", args("mymod"));
        let doc = goomod.addin_document();
        let names: Vec<_> = doc.children().iter().map(Element::name).collect();
        assert_eq!(
            names,
            vec!["id", "name", "type", "version", "description", "author"]
        );
        assert_eq!(doc.attribute("spec-version"), Some("1.1"));
    }

    #[test]
    fn levels_only_listed_for_level_packs() {
        let mut goomod = Goomod::new("/tmp", args("pack"));
        goomod.append_level(Level::new("one"));
        assert!(goomod.addin_document().find("levels").is_none());

        goomod.kind = GoomodType::Levels;
        goomod.append_level(Level::new("two").with_ocd(Ocd::new(OcdKind::Moves, 5)));
        let doc = goomod.addin_document();
        let levels = doc.find("levels").unwrap();
        let dirs: Vec<_> = levels
            .children()
            .iter()
            .map(|l| l.find("dir").and_then(Element::text_content).unwrap())
            .collect();
        assert_eq!(dirs, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn scratch_folder_must_not_be_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("precious.txt"), b"keep").unwrap();
        let goomod = Goomod::new(dir.path(), args("mymod"));

        for name in ["", ".", "..", "nested/stage"] {
            let err = goomod.generate(None, Some(name)).await.unwrap_err();
            assert!(matches!(err, GoomodError::InvalidManifest(_)), "{name:?}");
        }
        assert!(dir.path().join("precious.txt").is_file());
    }

    #[tokio::test]
    async fn scratch_folder_must_not_overlap_images() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("images")).unwrap();
        fs::write(dir.path().join("images/logo.png"), b"logo").unwrap();

        let mut goomod = Goomod::new(dir.path(), args("mymod"));
        goomod.register_image_resources("images").unwrap();
        let err = goomod.generate(None, Some("images")).await.unwrap_err();
        assert!(matches!(err, GoomodError::InvalidManifest(_)));
        assert!(dir.path().join("images/logo.png").is_file());

        let mut whole_base = Goomod::new(dir.path(), args("other"));
        whole_base.register_image_resources(".").unwrap();
        let err = whole_base.generate(None, None).await.unwrap_err();
        assert!(matches!(err, GoomodError::InvalidManifest(_)));
        assert!(!dir.path().join("other_goomod").exists());
    }

    #[test]
    fn cur_dir_components_are_ignored_when_comparing() {
        assert_eq!(without_cur_dir(Path::new(".")), PathBuf::new());
        assert_eq!(without_cur_dir(Path::new("./a/./b")), PathBuf::from("a/b"));
        let scratch = without_cur_dir(Path::new("mymod_goomod"));
        assert!(scratch.starts_with(without_cur_dir(Path::new("."))));
    }

    #[tokio::test]
    async fn level_ids_cannot_leave_level_folder() {
        let dir = tempfile::tempdir().unwrap();
        let mut goomod = Goomod::new(dir.path(), args("mymod"));
        goomod.append_level(Level::new("../escape"));

        let err = goomod.generate(None, None).await.unwrap_err();
        assert!(matches!(err, GoomodError::InvalidManifest(_)));
        assert!(!dir.path().join("mymod_goomod").exists());
    }

    #[test]
    fn image_resources_are_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("images")).unwrap();

        let mut goomod = Goomod::new(dir.path(), args("mymod"));
        goomod.register_image_resources("images").unwrap();
        let err = goomod.register_image_resources("images").unwrap_err();
        assert!(matches!(err, GoomodError::Redefinition(_)));
    }
}
