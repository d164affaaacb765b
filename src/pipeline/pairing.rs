//! Pairing validation: every body document must have a sidecar metadata file
//! at the same base path, and every metadata file must belong to a body.
//!
//! This is the only fatal phase of a run. Violations are collected
//! exhaustively so the operator sees every offending path at once, then the
//! binary exits with a distinct code per category.

use crate::pipeline::walker::{SourceFile, BODY_EXT, META_EXT};
use std::collections::HashSet;

/// Process exit code when body documents lack their metadata counterpart.
pub const EXIT_MISSING_META: i32 = 1;
/// Process exit code when metadata files have no body document.
pub const EXIT_ORPHAN_META: i32 = 2;

/// Pairing violations, each reported in full.
#[derive(Debug)]
pub enum PairingError {
    /// Body documents whose `.json` sidecar is missing.
    MissingMetadata(Vec<String>),
    /// Metadata files whose `.md` body is missing.
    OrphanMetadata(Vec<String>),
}

impl PairingError {
    pub fn exit_code(&self) -> i32 {
        match self {
            PairingError::MissingMetadata(_) => EXIT_MISSING_META,
            PairingError::OrphanMetadata(_) => EXIT_ORPHAN_META,
        }
    }

    pub fn paths(&self) -> &[String] {
        match self {
            PairingError::MissingMetadata(p) | PairingError::OrphanMetadata(p) => p,
        }
    }
}

impl std::fmt::Display for PairingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairingError::MissingMetadata(p) => {
                write!(f, "{} body document(s) missing metadata sidecars", p.len())
            }
            PairingError::OrphanMetadata(p) => {
                write!(f, "{} orphan metadata file(s) without body documents", p.len())
            }
        }
    }
}

/// Validate that body and metadata files pair up one-to-one.
///
/// Missing metadata is checked before orphans, matching the exit-code
/// ordering: a tree with both kinds of violations reports the missing
/// sidecars first.
pub fn validate_pairs(files: &[SourceFile]) -> Result<(), PairingError> {
    let body_bases: HashSet<String> = files
        .iter()
        .filter(|f| f.extension == BODY_EXT)
        .map(|f| f.base_path())
        .collect();
    let meta_bases: HashSet<String> = files
        .iter()
        .filter(|f| f.extension == META_EXT)
        .map(|f| f.base_path())
        .collect();

    let mut missing: Vec<String> = files
        .iter()
        .filter(|f| f.extension == BODY_EXT && !meta_bases.contains(&f.base_path()))
        .map(|f| f.relative_path.clone())
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(PairingError::MissingMetadata(missing));
    }

    let mut orphans: Vec<String> = files
        .iter()
        .filter(|f| f.extension == META_EXT && !body_bases.contains(&f.base_path()))
        .map(|f| f.relative_path.clone())
        .collect();
    if !orphans.is_empty() {
        orphans.sort();
        return Err(PairingError::OrphanMetadata(orphans));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(rel: &str) -> SourceFile {
        let extension = rel.rsplit('.').next().unwrap().to_string();
        SourceFile {
            relative_path: rel.to_string(),
            absolute_path: PathBuf::from(format!("/src/{rel}")),
            extension,
        }
    }

    #[test]
    fn test_validate_pairs_balanced() {
        let files = vec![
            file("2019/tmux.md"),
            file("2019/tmux.json"),
            file("2020/vim.md"),
            file("2020/vim.json"),
        ];
        assert!(validate_pairs(&files).is_ok());
    }

    #[test]
    fn test_validate_pairs_missing_metadata() {
        let files = vec![
            file("2019/tmux.md"),
            file("2020/vim.md"),
            file("2020/vim.json"),
        ];
        let err = validate_pairs(&files).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_MISSING_META);
        assert_eq!(err.paths(), &["2019/tmux.md".to_string()]);
    }

    #[test]
    fn test_validate_pairs_orphan_metadata() {
        let files = vec![
            file("2019/tmux.md"),
            file("2019/tmux.json"),
            file("stale/old.json"),
        ];
        let err = validate_pairs(&files).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_ORPHAN_META);
        assert_eq!(err.paths(), &["stale/old.json".to_string()]);
    }

    #[test]
    fn test_validate_pairs_reports_all_offenders() {
        let files = vec![file("a.md"), file("b.md"), file("c.md"), file("c.json")];
        let err = validate_pairs(&files).unwrap_err();
        assert_eq!(err.paths().len(), 2);
        assert_eq!(err.paths(), &["a.md".to_string(), "b.md".to_string()]);
    }

    #[test]
    fn test_validate_pairs_missing_reported_before_orphans() {
        let files = vec![file("a.md"), file("b.json")];
        let err = validate_pairs(&files).unwrap_err();
        assert!(matches!(err, PairingError::MissingMetadata(_)));
    }
}
