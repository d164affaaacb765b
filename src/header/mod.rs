//! Header composition: merge sidecar metadata, the derived or supplied
//! excerpt, and revision provenance into the YAML front-matter block that
//! leads every rendered document.
//!
//! Downstream consumers depend on the exact field order, so the block is
//! emitted line by line rather than through a YAML serializer.

pub mod revision;

use crate::error::{BlogconvError, Result};
use crate::excerpt;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

/// One category entry of the sidecar metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Parsed sidecar metadata for one document.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataRecord {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tag: Option<Vec<String>>,
    #[serde(default)]
    pub categories: Option<Vec<Category>>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default, rename = "dataFormated")]
    pub data_formated: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Deduplicated set of category slugs seen during a run, reported at the end.
#[derive(Debug, Default)]
pub struct CategoryRegistry {
    slugs: Mutex<BTreeSet<String>>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slug; returns true the first time it is seen.
    pub fn register(&self, slug: &str) -> bool {
        self.slugs.lock().unwrap().insert(slug.to_string())
    }

    pub fn slugs(&self) -> Vec<String> {
        self.slugs.lock().unwrap().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.slugs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slugs.lock().unwrap().is_empty()
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok())
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc().fixed_offset())
        })
}

/// Compose the YAML front-matter block for one document.
///
/// Metadata that fails to parse is a recoverable failure: the caller reports
/// the document and moves on, it never aborts the run. Field order is
/// significant and preserved exactly.
pub fn compose(
    metadata_text: &str,
    body_text: &str,
    source_abs: &Path,
    source_rel: &str,
    utc_offset_hours: i32,
    registry: &CategoryRegistry,
) -> Result<String> {
    let header: MetadataRecord = serde_json::from_str(metadata_text)
        .map_err(|e| BlogconvError::Metadata(format!("{source_rel}: {e}")))?;

    let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
        .ok_or_else(|| BlogconvError::Header(format!("invalid UTC offset: {utc_offset_hours}")))?;
    let normalize = |raw: &str| parse_timestamp(raw).map(|ts| ts.with_timezone(&offset));

    let date = header.date.as_deref().and_then(normalize);
    let created = header.created_at.as_deref().and_then(normalize);
    let updated = header.updated_at.as_deref().and_then(normalize);

    let mut tpl: Vec<String> = Vec::new();
    tpl.push("---".into());
    tpl.push(format!("title: \"{}\"", header.title));

    match header.description.as_deref().filter(|d| !d.is_empty()) {
        Some(desc) => tpl.push(format!("description: \"{desc}\"")),
        None => tpl.push(format!("description: \"{}\"", excerpt::extract(body_text))),
    }

    if let Some(tags) = &header.tag {
        let rendered = serde_json::to_string(tags)
            .map_err(|e| BlogconvError::Header(format!("{source_rel}: tags: {e}")))?;
        tpl.push(format!("tags: {rendered}"));
    }

    // The effective publish date is the earlier of the explicit date and the
    // creation timestamp.
    let effective = match (date, created) {
        (Some(d), Some(c)) => Some(if d > c { c } else { d }),
        (Some(d), None) => Some(d),
        (None, Some(c)) => Some(c),
        (None, None) => None,
    };
    if let Some(ts) = effective {
        tpl.push(format!("date: \"{}\"", ts.format("%Y-%m-%dT%H:%M:%S%:z")));
    }
    if let Some(ts) = date {
        tpl.push(format!("lastmod: \"{}\"", ts.format("%Y-%m-%dT%H:%M:%S%:z")));
    }
    if let Some(ts) = created {
        tpl.push(format!("created: \"{}\"", ts.format("%Y-%m-%dT%H:%M:%S%:z")));
    }
    if let Some(ts) = updated {
        tpl.push(format!("updated: \"{}\"", ts.format("%Y-%m-%dT%H:%M:%S%:z")));
    }
    if let Some(ts) = created {
        tpl.push(format!("dateForChinese: \"{}\"", ts.format("%Y年%m月%d日")));
    }

    if let Some(categories) = &header.categories {
        let slugs: Vec<&str> = categories.iter().map(|c| c.slug.as_str()).collect();
        let rendered = serde_json::to_string(&slugs)
            .map_err(|e| BlogconvError::Header(format!("{source_rel}: topics: {e}")))?;
        tpl.push(format!("topics: {rendered}"));

        for category in categories {
            if registry.register(&category.slug) {
                log::debug!("New category: {}", category.slug);
            }
        }
    }

    if let Some(alias) = header.alias.as_deref().filter(|a| !a.is_empty()) {
        let base_uri = match header.data_formated.as_deref() {
            Some(base) if !base.is_empty() => format!("/{base}/"),
            _ => "/".to_string(),
        };
        let alias = alias.trim_start_matches('/');
        tpl.push("aliases:".into());
        tpl.push(format!("    - {base_uri}{alias}"));
        tpl.push(format!("    - {base_uri}{alias}.html"));
    }

    if let Some(status) = &header.status {
        tpl.push(format!("draft: {}", status != "published"));
    }

    tpl.push("isCJKLanguage: true".into());

    if let Some(rev) = revision::latest_revision(source_abs) {
        tpl.push(format!("gitComment: \"{}\"", rev.short_hash));
        tpl.push(format!("gitFile: \"{source_rel}\""));
        if !rev.subject.is_empty() {
            tpl.push(format!("gitLabel: \"{}\"", rev.subject));
        }
    }

    let slug = header.slug.clone().unwrap_or_else(|| {
        Path::new(source_rel)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    tpl.push(format!("slug: \"{slug}\""));
    tpl.push("---".into());

    Ok(tpl.join("\n") + "\n\n")
}
