use crate::error::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extension of body documents.
pub const BODY_EXT: &str = "md";
/// Extension of sidecar metadata documents.
pub const META_EXT: &str = "json";

/// A discovered source file
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub extension: String,
}

impl SourceFile {
    /// Relative path with the extension removed; body and metadata files of
    /// one document share this base path.
    pub fn base_path(&self) -> String {
        match self.relative_path.rfind('.') {
            Some(idx) => self.relative_path[..idx].to_string(),
            None => self.relative_path.clone(),
        }
    }
}

/// Discover all body and sidecar files below the source root.
///
/// Recursively walks the tree; `excluded_names` is matched against the file
/// or directory name at every level, so an excluded directory prunes its
/// whole subtree. Only `.md` and `.json` files are returned, everything else
/// is skipped.
pub fn discover_files(root: &Path, excluded_names: &[String]) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root).follow_links(true).into_iter();
    for entry in walker.filter_entry(|e| {
        // Never filter out the root itself, even if its name happens to be listed.
        e.depth() == 0
            || e.file_name()
                .to_str()
                .map(|name| !excluded_names.iter().any(|ex| ex == name))
                .unwrap_or(true)
    }) {
        let entry = entry.map_err(|e| {
            crate::error::BlogconvError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk error")),
            )
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        if extension != BODY_EXT && extension != META_EXT {
            continue;
        }

        let relative_path = path
            .strip_prefix(root)
            .map_err(|_| {
                crate::error::BlogconvError::Config(format!(
                    "Failed to compute relative path for: {}",
                    path.display()
                ))
            })?
            .to_string_lossy()
            .replace('\\', "/");

        files.push(SourceFile {
            relative_path,
            absolute_path: path.to_path_buf(),
            extension,
        });
    }

    log::info!("Discovered {} files in {}", files.len(), root.display());
    Ok(files)
}
