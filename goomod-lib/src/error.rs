use thiserror::Error;

pub type Result<T> = std::result::Result<T, GoomodError>;

#[derive(Debug, Error)]
pub enum GoomodError {
    #[error("Cannot redefine {0}")]
    Redefinition(&'static str),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("XML serialization failed: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] async_zip::error::ZipError),
}
