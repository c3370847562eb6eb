use std::path::{Path, PathBuf};

use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use tokio::fs::File;
use walkdir::WalkDir;

use crate::error::Result;

/// A file or directory to include in the ZIP archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    pub name_in_archive: String,
    pub is_dir: bool,
}

/// Collects everything beneath `root`, named relative to it with `/`
/// separators. `root` itself is not an entry.
pub fn collect_entries(root: &Path) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let mut name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let is_dir = entry.file_type().is_dir();
        if is_dir {
            name.push('/');
        }
        entries.push(ArchiveEntry {
            path: entry.into_path(),
            name_in_archive: name,
            is_dir,
        });
    }
    Ok(entries)
}

/// Archives the contents of `src` into a new ZIP file at `dest`.
///
/// The parent directory of `dest` must already exist. An existing file at
/// `dest` is truncated.
pub async fn zip_folder(src: &Path, dest: &Path, compression: Compression) -> Result<()> {
    let entries = collect_entries(src)?;

    let file = File::create(dest).await?;
    let mut writer = ZipFileWriter::with_tokio(file);

    for entry in &entries {
        if entry.is_dir {
            let builder =
                ZipEntryBuilder::new(entry.name_in_archive.clone().into(), Compression::Stored);
            writer.write_entry_whole(builder, &[]).await?;
            continue;
        }

        let data = tokio::fs::read(&entry.path).await?;
        let builder = ZipEntryBuilder::new(entry.name_in_archive.clone().into(), compression);
        writer.write_entry_whole(builder, &data).await?;
        tracing::trace!(name = %entry.name_in_archive, bytes = data.len(), "archived");
    }

    writer.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn entries_are_relative_and_slash_separated() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("merge/properties")).unwrap();
        fs::write(dir.path().join("addin.xml"), b"<addin/>").unwrap();
        fs::write(dir.path().join("merge/properties/resources.xml.xsl"), b"").unwrap();

        let names: Vec<_> = collect_entries(dir.path())
            .unwrap()
            .into_iter()
            .map(|e| e.name_in_archive)
            .collect();
        assert_eq!(
            names,
            vec![
                "addin.xml",
                "merge/",
                "merge/properties/",
                "merge/properties/resources.xml.xsl",
            ]
        );
    }

    #[tokio::test]
    async fn zip_folder_writes_archive() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("addin.xml"), b"<addin/>").unwrap();

        let dest = dir.path().join("out.goomod");
        zip_folder(&src, &dest, Compression::Deflate).await.unwrap();

        let bytes = fs::read(&dest).unwrap();
        assert_eq!(&bytes[..4], b"PK\x03\x04");
    }
}
