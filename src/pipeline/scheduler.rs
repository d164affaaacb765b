//! Batch scheduler: fixed-size chunks processed sequentially, documents
//! inside a chunk processed concurrently.
//!
//! The chunk size doubles as the concurrency bound, which also bounds open
//! file handles and in-flight highlighting-service connections. A single
//! document failure is logged and never aborts the batch.

use crate::cache::{self, CacheRecord, FingerprintCache};
use crate::error::BlogconvError;
use crate::header;
use crate::highlight::Highlighter;
use crate::pipeline::{RunContext, WorkItem};
use futures_util::future::join_all;
use tokio::task;

/// Result of one document's unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocOutcome {
    Converted,
    /// Metadata did not parse; the document needs operator attention.
    NeedsMeta,
    Failed,
}

/// Drive all regeneration work: chunk k+1 does not start before every task
/// of chunk k has settled.
pub async fn process_batches(
    work: Vec<WorkItem>,
    concurrency: usize,
    cache: &FingerprintCache,
    highlighter: &Highlighter,
    ctx: &RunContext,
) -> Vec<DocOutcome> {
    let mut outcomes = Vec::with_capacity(work.len());

    for chunk in work.chunks(concurrency.max(1)) {
        let tasks = chunk
            .iter()
            .map(|item| process_document(item, cache, highlighter, ctx));
        outcomes.extend(join_all(tasks).await);
    }

    outcomes
}

/// One document's unit of work: compose the header and transform the body
/// concurrently, require both, write the rendered document, then record both
/// fingerprints in the cache.
///
/// Composition runs on a blocking task because it shells out to `git` for
/// revision lines; the async thread stays free for the chunk's other
/// documents.
async fn process_document(
    item: &WorkItem,
    cache: &FingerprintCache,
    highlighter: &Highlighter,
    ctx: &RunContext,
) -> DocOutcome {
    let compose = {
        let meta_text = item.meta_text.clone();
        let body_text = item.body_text.clone();
        let body_abs = item.body_abs.clone();
        let source_rel = item.source_rel.clone();
        let utc_offset_hours = ctx.utc_offset_hours;
        let registry = ctx.categories.clone();
        task::spawn_blocking(move || {
            header::compose(
                &meta_text,
                &body_text,
                &body_abs,
                &source_rel,
                utc_offset_hours,
                &registry,
            )
        })
    };
    let transform = highlighter.transform(&item.body_text);

    let (header_result, body_result) = tokio::join!(compose, transform);
    let header_result = header_result
        .unwrap_or_else(|e| Err(BlogconvError::Header(format!("compose task failed: {e}"))));

    let header_block = match header_result {
        Ok(block) => block,
        Err(e) => {
            log::warn!(
                "[{}] [{}] [NEED META] {}: {}",
                ctx.progress(),
                item.idx,
                item.source_rel,
                e
            );
            return DocOutcome::NeedsMeta;
        }
    };

    let body = match body_result {
        Ok(body) => body,
        Err(e) => {
            log::error!(
                "[{}] [{}] highlight failed for {}: {}",
                ctx.progress(),
                item.idx,
                item.source_rel,
                e
            );
            return DocOutcome::Failed;
        }
    };

    if header_block.is_empty() || body.is_empty() {
        log::warn!(
            "[{}] [{}] [NEED META] {}",
            ctx.progress(),
            item.idx,
            item.source_rel
        );
        return DocOutcome::NeedsMeta;
    }

    let rendered = format!("{header_block}{body}");

    if let Some(parent) = item.output_abs.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            log::error!("write file error: {}: {}", item.source_rel, e);
            return DocOutcome::Failed;
        }
    }

    if let Err(e) = tokio::fs::write(&item.output_abs, rendered.as_bytes()).await {
        log::error!("write file error: {}: {}", item.source_rel, e);
        return DocOutcome::Failed;
    }

    cache.record(
        &item.output_key,
        CacheRecord {
            content_fingerprint: item.content_fingerprint.clone(),
            output_fingerprint: cache::output_fingerprint(rendered.as_bytes()),
        },
    );

    let completed = ctx.mark_completed();
    if completed % ctx.cache_flush_every == 0 {
        if let Err(e) = cache.flush() {
            log::warn!("Cache flush failed: {}", e);
        }
    }

    log::info!(
        "[{}] [{}] [done] {}",
        ctx.progress(),
        item.idx,
        item.output_abs.display()
    );

    DocOutcome::Converted
}
