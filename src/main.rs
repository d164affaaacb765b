use anyhow::Result;
use blogconv::cache::FingerprintCache;
use blogconv::config::HighlightConfig;
use blogconv::highlight::Highlighter;
use blogconv::pipeline::{run, RunError, RunOptions, RunReport};
use blogconv::Config;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "blogconv")]
#[command(about = "Convert paired Markdown/JSON blog posts into Hugo content (incremental by default)")]
struct Args {
    /// Source directory of paired .md/.json files (defaults to config)
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Output directory (defaults to config)
    #[arg(short, long)]
    dist: Option<PathBuf>,

    /// Run every job listed in config.toml instead of a single source/dist pair
    #[arg(long)]
    use_config: bool,

    /// Override the highlight mode for this run: local, remote, or off
    #[arg(long)]
    highlight: Option<String>,

    /// Force re-conversion of all files (ignore the fingerprint cache)
    #[arg(short, long)]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();

    log::info!("Starting blogconv");

    let config = Config::load()?;
    log::info!("Configuration loaded successfully");

    let cache = FingerprintCache::load(config.cache_db());
    log::info!(
        "Cache database: {} ({} record(s))",
        config.cache_db().display(),
        cache.len()
    );

    let jobs = collect_jobs(&args, &config);
    if jobs.is_empty() {
        anyhow::bail!("No jobs to run. Pass --source/--dist or define [[convert.jobs]] and use --use-config.");
    }

    let start = Instant::now();
    let mut totals = RunReport::default();

    for (source_dir, dist_dir, highlight_mode) in jobs {
        let opts = RunOptions {
            source_dir,
            dist_dir,
            excluded_names: config.convert.excluded_names.clone(),
            utc_offset_hours: config.convert.utc_offset_hours,
            concurrency: config.performance.concurrency,
            cache_flush_every: config.performance.cache_flush_every,
            force: args.force,
        };

        let highlight_config = HighlightConfig {
            mode: highlight_mode,
            ..config.highlight.clone()
        };
        let highlighter = Highlighter::from_config(&highlight_config);

        log::info!(
            "Converting {} -> {} (highlight: {})",
            opts.source_dir.display(),
            opts.dist_dir.display(),
            highlight_config.mode
        );

        match run(&opts, &cache, &highlighter).await {
            Ok(report) => {
                totals.discovered += report.discovered;
                totals.converted += report.converted;
                totals.skipped += report.skipped;
                totals.needs_meta += report.needs_meta;
                totals.failed += report.failed;
                totals.removed_stale += report.removed_stale;
                for slug in report.categories {
                    if !totals.categories.contains(&slug) {
                        totals.categories.push(slug);
                    }
                }
            }
            Err(RunError::Pairing(e)) => {
                log::error!("{e}");
                for path in e.paths() {
                    log::error!("  {path}");
                }
                std::process::exit(e.exit_code());
            }
            Err(RunError::Fatal(e)) => return Err(e.into()),
        }
    }

    let elapsed = start.elapsed();

    log::info!("=== Conversion Complete ===");
    log::info!("Documents discovered: {}", totals.discovered);
    log::info!("  Converted: {}", totals.converted);
    log::info!("  Skipped (unchanged): {}", totals.skipped);
    log::info!("  Need meta attention: {}", totals.needs_meta);
    log::info!("  Failed: {}", totals.failed);
    if totals.removed_stale > 0 {
        log::info!("Stale outputs removed: {}", totals.removed_stale);
    }
    if !totals.categories.is_empty() {
        log::info!("Categories seen: {}", totals.categories.join(", "));
    }
    log::info!("Time: {:?}", elapsed);

    if totals.needs_meta > 0 || totals.failed > 0 {
        log::warn!("Some documents were not converted. Check logs above for details.");
    }

    Ok(())
}

/// Resolve the job list: either every `[[convert.jobs]]` entry, or the single
/// source/dist pair from the CLI (falling back to the config's defaults).
fn collect_jobs(args: &Args, config: &Config) -> Vec<(PathBuf, PathBuf, String)> {
    let override_mode = |default: &str| -> String {
        args.highlight.clone().unwrap_or_else(|| default.to_string())
    };

    if args.use_config {
        config
            .convert
            .jobs
            .iter()
            .map(|job| {
                let mode = if job.highlight {
                    override_mode(&config.highlight.mode)
                } else {
                    override_mode("off")
                };
                (job.source.clone(), job.dist.clone(), mode)
            })
            .collect()
    } else {
        let source = args
            .source
            .clone()
            .unwrap_or_else(|| config.convert.source_dir.clone());
        let dist = args
            .dist
            .clone()
            .unwrap_or_else(|| config.convert.dist_dir.clone());
        vec![(source, dist, override_mode(&config.highlight.mode))]
    }
}
