use std::path::Path;
use std::process::Command;

/// Latest version-control change touching one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub short_hash: String,
    pub subject: String,
}

/// Query git for the newest commit touching `path`. Best-effort: any failure
/// (not a repository, git missing, file never committed) yields `None` and
/// the provenance fields are simply omitted from the header.
pub fn latest_revision(path: &Path) -> Option<Revision> {
    let dir = path.parent()?;
    let name = path.file_name()?;

    let output = Command::new("git")
        .args(["log", "-n", "1", "--pretty=format:%h%n%s", "--"])
        .arg(name)
        .current_dir(dir)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = stdout.trim().lines();
    let short_hash = lines.next()?.trim().to_string();
    if short_hash.is_empty() {
        return None;
    }
    let subject = lines.next().unwrap_or("").trim().to_string();

    Some(Revision { short_hash, subject })
}
