//! The incremental conversion pipeline: discovery, pairing validation,
//! cache-driven filtering, batch scheduling, and the final report.

pub mod pairing;
pub mod scheduler;
pub mod walker;

pub use pairing::{validate_pairs, PairingError, EXIT_MISSING_META, EXIT_ORPHAN_META};
pub use scheduler::{process_batches, DocOutcome};
pub use walker::{discover_files, SourceFile, BODY_EXT, META_EXT};

use crate::cache::{self, FingerprintCache};
use crate::error::{BlogconvError, Result};
use crate::header::CategoryRegistry;
use crate::highlight::Highlighter;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Options for one conversion run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub source_dir: PathBuf,
    pub dist_dir: PathBuf,
    pub excluded_names: Vec<String>,
    pub utc_offset_hours: i32,
    pub concurrency: usize,
    pub cache_flush_every: usize,
    /// Regenerate every document, ignoring the fingerprint cache.
    pub force: bool,
}

/// Shared per-run state threaded through the scheduler instead of
/// process-wide globals.
pub struct RunContext {
    pub utc_offset_hours: i32,
    pub cache_flush_every: usize,
    /// Shared with the blocking composition tasks the scheduler spawns.
    pub categories: Arc<CategoryRegistry>,
    total: usize,
    completed: AtomicUsize,
}

impl RunContext {
    pub fn new(total: usize, utc_offset_hours: i32, cache_flush_every: usize) -> Self {
        Self {
            utc_offset_hours,
            // Zero would divide by zero at the flush cadence check.
            cache_flush_every: cache_flush_every.max(1),
            categories: Arc::new(CategoryRegistry::new()),
            total,
            completed: AtomicUsize::new(0),
        }
    }

    /// Count one finished document (converted or skipped); returns the new count.
    pub fn mark_completed(&self) -> usize {
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Percent-complete indicator for progress lines.
    pub fn progress(&self) -> String {
        let done = self.completed.load(Ordering::SeqCst);
        if self.total == 0 {
            return "100.00%".to_string();
        }
        format!("{:.2}%", done as f64 / self.total as f64 * 100.0)
    }
}

/// One document's regeneration work, carrying everything the scheduler needs.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Discovery-order index, shown in progress lines.
    pub idx: usize,
    pub source_rel: String,
    pub body_abs: PathBuf,
    pub output_key: String,
    pub output_abs: PathBuf,
    pub body_text: String,
    pub meta_text: String,
    pub content_fingerprint: String,
}

/// End-of-run statistics.
#[derive(Debug, Default)]
pub struct RunReport {
    pub discovered: usize,
    pub converted: usize,
    pub skipped: usize,
    pub needs_meta: usize,
    pub failed: usize,
    pub removed_stale: usize,
    pub categories: Vec<String>,
}

/// How a run ends when it does not complete.
#[derive(Debug)]
pub enum RunError {
    /// Pairing validation failed; fatal, with a distinct exit code per category.
    Pairing(PairingError),
    Fatal(BlogconvError),
}

impl From<BlogconvError> for RunError {
    fn from(e: BlogconvError) -> Self {
        RunError::Fatal(e)
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Pairing(e) => write!(f, "{e}"),
            RunError::Fatal(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RunError {}

/// Execute one conversion run end to end.
///
/// Discovery order is preserved through filtering and chunk assignment, so
/// chunk-to-chunk ordering is deterministic. Only pairing validation is
/// fatal; per-document failures are logged and the run continues.
pub async fn run(
    opts: &RunOptions,
    cache: &FingerprintCache,
    highlighter: &Highlighter,
) -> std::result::Result<RunReport, RunError> {
    let files = discover_files(&opts.source_dir, &opts.excluded_names)?;

    // Validate before the empty-tree shortcut: a tree holding only orphan
    // sidecars is a pairing failure, not an empty run.
    validate_pairs(&files).map_err(RunError::Pairing)?;

    let bodies: Vec<&SourceFile> = files.iter().filter(|f| f.extension == BODY_EXT).collect();
    if bodies.is_empty() {
        log::warn!("No .md files found under {}", opts.source_dir.display());
        return Ok(RunReport::default());
    }

    let meta_by_base: HashMap<String, &SourceFile> = files
        .iter()
        .filter(|f| f.extension == META_EXT)
        .map(|f| (f.base_path(), f))
        .collect();

    // Outputs mirror the source tree's relative layout and cache records are
    // keyed by full output path; any record under this dist root outside the
    // expected set belongs to a deleted source and is collected.
    let expected_keys: HashSet<String> = bodies
        .iter()
        .map(|f| {
            opts.dist_dir
                .join(&f.relative_path)
                .to_string_lossy()
                .to_string()
        })
        .collect();
    let removed_stale = cache.garbage_collect(&expected_keys, &opts.dist_dir).len();

    let ctx = RunContext::new(bodies.len(), opts.utc_offset_hours, opts.cache_flush_every);

    let mut work = Vec::new();
    let mut skipped = 0usize;

    for (idx, body) in bodies.iter().enumerate() {
        let meta = meta_by_base
            .get(&body.base_path())
            .expect("pairing validated");

        let body_text = read_text(&body.absolute_path)?;
        let meta_text = read_text(&meta.absolute_path)?;
        let fingerprint = cache::content_fingerprint(&body_text, &meta_text);

        let output_abs = opts.dist_dir.join(&body.relative_path);
        let output_key = output_abs.to_string_lossy().to_string();

        if !opts.force && !cache.should_regenerate(&output_key, &output_abs, &fingerprint) {
            skipped += 1;
            ctx.mark_completed();
            log::info!("[{}] [skip] {}", ctx.progress(), body.relative_path);
            continue;
        }

        work.push(WorkItem {
            idx,
            source_rel: body.relative_path.clone(),
            body_abs: body.absolute_path.clone(),
            output_key,
            output_abs,
            body_text,
            meta_text,
            content_fingerprint: fingerprint,
        });
    }

    let outcomes = process_batches(work, opts.concurrency, cache, highlighter, &ctx).await;

    cache.flush()?;

    Ok(RunReport {
        discovered: bodies.len(),
        converted: outcomes.iter().filter(|o| **o == DocOutcome::Converted).count(),
        skipped,
        needs_meta: outcomes.iter().filter(|o| **o == DocOutcome::NeedsMeta).count(),
        failed: outcomes.iter().filter(|o| **o == DocOutcome::Failed).count(),
        removed_stale,
        categories: ctx.categories.slugs(),
    })
}

fn read_text(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(BlogconvError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_post(root: &std::path::Path, rel: &str, body: &str, meta: &str) {
        let body_path = root.join(format!("{rel}.md"));
        fs::create_dir_all(body_path.parent().unwrap()).unwrap();
        fs::write(&body_path, body).unwrap();
        fs::write(root.join(format!("{rel}.json")), meta).unwrap();
    }

    fn opts(dir: &TempDir) -> RunOptions {
        RunOptions {
            source_dir: dir.path().join("src"),
            dist_dir: dir.path().join("dist"),
            excluded_names: vec![".git".into(), "README.md".into()],
            utc_offset_hours: 8,
            concurrency: 2,
            cache_flush_every: 4,
            force: false,
        }
    }

    const META: &str = r#"{"title": "T", "slug": "t"}"#;

    #[tokio::test]
    async fn test_run_converts_then_skips_idempotently() {
        let dir = TempDir::new().unwrap();
        let opts = opts(&dir);
        fs::create_dir_all(&opts.source_dir).unwrap();
        write_post(&opts.source_dir, "2019/post", "# T\n\nBody.\n", META);

        let cache = FingerprintCache::load(&dir.path().join("cache.json"));
        let report = run(&opts, &cache, &Highlighter::Off).await.unwrap();
        assert_eq!(report.converted, 1);
        assert_eq!(report.skipped, 0);
        let rendered = fs::read_to_string(opts.dist_dir.join("2019/post.md")).unwrap();
        let first_mtime = fs::metadata(opts.dist_dir.join("2019/post.md")).unwrap().modified().unwrap();
        assert!(rendered.contains("title: \"T\""));

        // Second run with unchanged inputs performs zero writes.
        let report = run(&opts, &cache, &Highlighter::Off).await.unwrap();
        assert_eq!(report.converted, 0);
        assert_eq!(report.skipped, 1);
        let second_mtime = fs::metadata(opts.dist_dir.join("2019/post.md")).unwrap().modified().unwrap();
        assert_eq!(first_mtime, second_mtime);
    }

    #[tokio::test]
    async fn test_run_regenerates_on_body_change() {
        let dir = TempDir::new().unwrap();
        let opts = opts(&dir);
        fs::create_dir_all(&opts.source_dir).unwrap();
        write_post(&opts.source_dir, "post", "# T\n\nOriginal.\n", META);

        let cache = FingerprintCache::load(&dir.path().join("cache.json"));
        run(&opts, &cache, &Highlighter::Off).await.unwrap();

        fs::write(opts.source_dir.join("post.md"), "# T\n\nEdited.\n").unwrap();
        let report = run(&opts, &cache, &Highlighter::Off).await.unwrap();
        assert_eq!(report.converted, 1);
        let rendered = fs::read_to_string(opts.dist_dir.join("post.md")).unwrap();
        assert!(rendered.contains("Edited."));
    }

    #[tokio::test]
    async fn test_run_heals_deleted_output() {
        let dir = TempDir::new().unwrap();
        let opts = opts(&dir);
        fs::create_dir_all(&opts.source_dir).unwrap();
        write_post(&opts.source_dir, "a", "# A\nText.\n", META);
        write_post(&opts.source_dir, "b", "# B\nText.\n", META);

        let cache = FingerprintCache::load(&dir.path().join("cache.json"));
        run(&opts, &cache, &Highlighter::Off).await.unwrap();

        fs::remove_file(opts.dist_dir.join("a.md")).unwrap();
        let report = run(&opts, &cache, &Highlighter::Off).await.unwrap();
        // Exactly the deleted document regenerates, the other skips.
        assert_eq!(report.converted, 1);
        assert_eq!(report.skipped, 1);
        assert!(opts.dist_dir.join("a.md").exists());
    }

    #[tokio::test]
    async fn test_run_heals_corrupted_output() {
        let dir = TempDir::new().unwrap();
        let opts = opts(&dir);
        fs::create_dir_all(&opts.source_dir).unwrap();
        write_post(&opts.source_dir, "a", "# A\nText.\n", META);

        let cache = FingerprintCache::load(&dir.path().join("cache.json"));
        run(&opts, &cache, &Highlighter::Off).await.unwrap();

        fs::write(opts.dist_dir.join("a.md"), "tampered externally").unwrap();
        let report = run(&opts, &cache, &Highlighter::Off).await.unwrap();
        assert_eq!(report.converted, 1);
        let rendered = fs::read_to_string(opts.dist_dir.join("a.md")).unwrap();
        assert!(rendered.contains("title: \"T\""));
    }

    #[tokio::test]
    async fn test_run_pairing_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let opts = opts(&dir);
        fs::create_dir_all(opts.source_dir.join("2019")).unwrap();
        fs::write(opts.source_dir.join("2019/lonely.md"), "# L").unwrap();

        let cache = FingerprintCache::load(&dir.path().join("cache.json"));
        let err = run(&opts, &cache, &Highlighter::Off).await.unwrap_err();
        match err {
            RunError::Pairing(p) => {
                assert_eq!(p.exit_code(), EXIT_MISSING_META);
                assert_eq!(p.paths(), &["2019/lonely.md".to_string()]);
            }
            other => panic!("expected pairing error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_run_orphan_only_tree_is_fatal() {
        let dir = TempDir::new().unwrap();
        let opts = opts(&dir);
        fs::create_dir_all(&opts.source_dir).unwrap();
        // No bodies at all: the lone sidecar must still fail pairing.
        fs::write(opts.source_dir.join("orphan.json"), META).unwrap();

        let cache = FingerprintCache::load(&dir.path().join("cache.json"));
        let err = run(&opts, &cache, &Highlighter::Off).await.unwrap_err();
        match err {
            RunError::Pairing(p) => {
                assert_eq!(p.exit_code(), EXIT_ORPHAN_META);
                assert_eq!(p.paths(), &["orphan.json".to_string()]);
            }
            other => panic!("expected pairing error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_run_garbage_collects_removed_sources() {
        let dir = TempDir::new().unwrap();
        let opts = opts(&dir);
        fs::create_dir_all(&opts.source_dir).unwrap();
        write_post(&opts.source_dir, "keep", "# K\nText.\n", META);
        write_post(&opts.source_dir, "drop", "# D\nText.\n", META);

        let cache = FingerprintCache::load(&dir.path().join("cache.json"));
        run(&opts, &cache, &Highlighter::Off).await.unwrap();
        assert!(opts.dist_dir.join("drop.md").exists());

        fs::remove_file(opts.source_dir.join("drop.md")).unwrap();
        fs::remove_file(opts.source_dir.join("drop.json")).unwrap();
        let report = run(&opts, &cache, &Highlighter::Off).await.unwrap();
        assert_eq!(report.removed_stale, 1);
        assert!(!opts.dist_dir.join("drop.md").exists());
        assert!(opts.dist_dir.join("keep.md").exists());
    }

    #[tokio::test]
    async fn test_run_force_reconverts_everything() {
        let dir = TempDir::new().unwrap();
        let mut opts = opts(&dir);
        fs::create_dir_all(&opts.source_dir).unwrap();
        write_post(&opts.source_dir, "a", "# A\nText.\n", META);

        let cache = FingerprintCache::load(&dir.path().join("cache.json"));
        run(&opts, &cache, &Highlighter::Off).await.unwrap();

        opts.force = true;
        let report = run(&opts, &cache, &Highlighter::Off).await.unwrap();
        assert_eq!(report.converted, 1);
        assert_eq!(report.skipped, 0);
    }

    #[tokio::test]
    async fn test_run_tolerates_zero_flush_cadence() {
        let dir = TempDir::new().unwrap();
        let mut opts = opts(&dir);
        opts.cache_flush_every = 0;
        fs::create_dir_all(&opts.source_dir).unwrap();
        write_post(&opts.source_dir, "a", "# A\nText.\n", META);

        let cache = FingerprintCache::load(&dir.path().join("cache.json"));
        let report = run(&opts, &cache, &Highlighter::Off).await.unwrap();
        assert_eq!(report.converted, 1);
    }

    #[tokio::test]
    async fn test_run_empty_source_tree() {
        let dir = TempDir::new().unwrap();
        let opts = opts(&dir);
        fs::create_dir_all(&opts.source_dir).unwrap();

        let cache = FingerprintCache::load(&dir.path().join("cache.json"));
        let report = run(&opts, &cache, &Highlighter::Off).await.unwrap();
        assert_eq!(report.discovered, 0);
    }

    #[tokio::test]
    async fn test_run_collects_categories_across_documents() {
        let dir = TempDir::new().unwrap();
        let opts = opts(&dir);
        fs::create_dir_all(&opts.source_dir).unwrap();
        write_post(
            &opts.source_dir,
            "a",
            "# A\nText.\n",
            r#"{"title": "A", "slug": "a", "categories": [{"slug": "linux"}]}"#,
        );
        write_post(
            &opts.source_dir,
            "b",
            "# B\nText.\n",
            r#"{"title": "B", "slug": "b", "categories": [{"slug": "linux"}, {"slug": "tools"}]}"#,
        );

        let cache = FingerprintCache::load(&dir.path().join("cache.json"));
        let report = run(&opts, &cache, &Highlighter::Off).await.unwrap();
        assert_eq!(report.categories, vec!["linux".to_string(), "tools".to_string()]);
    }
}
