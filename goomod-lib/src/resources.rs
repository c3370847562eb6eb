//! Image resource discovery and the XSL merge document built from it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{fs, io};

use walkdir::WalkDir;

use crate::error::Result;
use crate::xml::Element;

const XSL_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Transform";
const IMAGE_ROOT: &str = "./res/images";

/// Maps each image's relative path (extension stripped) to its generated
/// resource identifier. Iterates in path order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageResources {
    folder: PathBuf,
    entries: BTreeMap<String, String>,
}

impl ImageResources {
    /// Scans `folder` recursively. Directories are skipped.
    pub fn scan(package_id: &str, folder: impl Into<PathBuf>) -> Result<Self> {
        let folder = folder.into();
        if !fs::metadata(&folder)?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", folder.display()),
            )
            .into());
        }

        let mut entries = BTreeMap::new();

        for entry in WalkDir::new(&folder).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            let relative = relative_key(&folder, entry.path());
            let id = resource_id(package_id, &relative);
            tracing::debug!(path = %relative, id = %id, "found image resource");
            entries.insert(relative, id);
        }

        Ok(Self { folder, entries })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, relative_path: &str) -> Option<&str> {
        self.entries.get(relative_path).map(String::as_str)
    }

    /// `(relative path, identifier)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Builds the transform merged into the game's `properties/resources.xml`:
    /// an identity copy, plus the registered images appended to the
    /// `common` resource group.
    pub fn merge_transform(&self) -> Element {
        let identity = Element::new("xsl:template")
            .attr("match", "@* | node()")
            .child(
                Element::new("xsl:copy")
                    .child(Element::new("xsl:apply-templates").attr("select", "@* | node()")),
            );

        let mut common = Element::new("xsl:copy")
            .child(Element::new("xsl:apply-templates").attr("select", "@* | node()"))
            .child(
                Element::new("SetDefaults")
                    .attr("idprefix", "")
                    .attr("path", IMAGE_ROOT),
            );
        for (path, id) in self.iter() {
            common.push(Element::new("Image").attr("id", id).attr("path", path));
        }

        Element::new("xsl:transform")
            .attr("version", "1.0")
            .attr("xmlns:xsl", XSL_NAMESPACE)
            .child(identity)
            .child(
                Element::new("xsl:template")
                    .attr("match", "Resources[@id='common']")
                    .child(common),
            )
    }
}

/// Path of `file` relative to `root`, `/`-separated, final extension removed.
fn relative_key(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file).with_extension("");
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// `IMAGE_GLOBAL_<ID>_<PATH>`, keeping only letters and underscores and
/// turning path separators into underscores.
pub fn resource_id(package_id: &str, relative_path: &str) -> String {
    let id: String = package_id
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || *c == '_')
        .collect();
    let path: String = relative_path
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || *c == '_' || *c == '/')
        .map(|c| if c == '/' { '_' } else { c })
        .collect();
    format!(
        "IMAGE_GLOBAL_{}_{}",
        id.to_ascii_uppercase(),
        path.to_ascii_uppercase()
    )
}
