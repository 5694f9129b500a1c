use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::config::Limits;
use crate::error::{Result, SiteError};
use crate::site;

use super::document::PageDocument;
use super::normalize::{char_len, normalize_space};

/// How many distinct issues the summary keeps
const TOP_ISSUES: usize = 20;

const IMAGE_EXTS: &[&str] = &[".png", ".jpg", ".jpeg", ".webp", ".gif", ".svg", ".avif"];

/// Stands in for the site origin when no base URL is configured
const PLACEHOLDER_ORIGIN: &str = "http://site.invalid/";

/// An image without an alt attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAltFinding {
    pub src: String,
    pub alt: Option<String>,
}

/// Audit result for a single HTML page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageAudit {
    pub file: String,
    pub url: Option<String>,

    pub title: Option<String>,
    pub title_length: usize,
    pub title_ok: bool,

    pub meta_description: Option<String>,
    pub meta_description_length: usize,
    pub meta_description_ok: bool,

    pub h1_count: usize,
    pub h2_count: usize,
    pub headings_order_warnings: Vec<String>,

    pub images_count: usize,
    pub images_missing_alt_count: usize,
    pub images_empty_alt_count: usize,
    pub images_missing_alt_samples: Vec<ImageAltFinding>,
    /// Local image references with no file behind them
    pub missing_images: Vec<String>,

    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl PageAudit {
    pub fn has_issues(&self) -> bool {
        !self.errors.is_empty() || !self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCount {
    pub issue: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub pages: usize,
    pub pages_with_errors: usize,
    pub pages_with_warnings: usize,
    pub top_issues: Vec<IssueCount>,
}

/// The JSON report written by `audit` and consumed by `fix`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditReport {
    pub root: String,
    pub base_url: Option<String>,
    pub summary: AuditSummary,
    pub pages: Vec<PageAudit>,
}

/// Settings for one audit run
#[derive(Debug, Clone)]
pub struct AuditOptions {
    pub base_url: String,
    pub limits: Limits,
    pub exclude_dirs: Vec<String>,
    pub max_image_samples: usize,
}

/// Audit one parsed page. `rel_path` is only used for labelling.
pub fn audit_page(rel_path: &str, doc: &PageDocument, opts: &AuditOptions) -> PageAudit {
    let limits = &opts.limits;

    let title = doc.title().filter(|t| !t.is_empty());
    let title_length = title.as_deref().map(char_len).unwrap_or(0);
    let title_ok = title.is_some() && (limits.title_min..=limits.title_max).contains(&title_length);

    let description = doc.meta_by_name("description").filter(|d| !d.is_empty());
    let desc_length = description.as_deref().map(char_len).unwrap_or(0);
    let desc_ok = description.is_some() && (limits.desc_min..=limits.desc_max).contains(&desc_length);

    let h1_count = doc.count("h1");
    let h2_count = doc.count("h2");

    let mut order_warnings = Vec::new();
    match doc.first_heading().as_deref() {
        None => order_warnings.push("No H1/H2 headings found.".to_string()),
        Some("h2") if h1_count > 0 => order_warnings.push("H2 appears before H1.".to_string()),
        _ => {}
    }

    let images = doc.images();
    let mut missing_samples = Vec::new();
    let mut missing_alt = 0;
    let mut empty_alt = 0;
    for img in images.iter().filter(|i| !i.decorative) {
        match &img.alt {
            None => {
                missing_alt += 1;
                if missing_samples.len() < opts.max_image_samples {
                    missing_samples.push(ImageAltFinding {
                        src: img.src.clone(),
                        alt: None,
                    });
                }
            }
            Some(alt) if normalize_space(alt).is_empty() => empty_alt += 1,
            Some(_) => {}
        }
    }

    let mut audit = PageAudit {
        file: rel_path.to_string(),
        url: site::page_url(&opts.base_url, rel_path),
        title,
        title_length,
        title_ok,
        meta_description: description,
        meta_description_length: desc_length,
        meta_description_ok: desc_ok,
        h1_count,
        h2_count,
        headings_order_warnings: order_warnings.clone(),
        images_count: images.len(),
        images_missing_alt_count: missing_alt,
        images_empty_alt_count: empty_alt,
        images_missing_alt_samples: missing_samples,
        missing_images: Vec::new(),
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    // ── Title ──
    if audit.title.is_none() {
        audit.errors.push("Missing <title>.".to_string());
    } else if !title_ok {
        audit.warnings.push(format!(
            "Title length {} outside recommended range {}-{}.",
            title_length, limits.title_min, limits.title_max
        ));
    }

    // ── Meta Description ──
    if audit.meta_description.is_none() {
        audit
            .errors
            .push("Missing meta description (<meta name=\"description\">).".to_string());
    } else if !desc_ok {
        audit.warnings.push(format!(
            "Meta description length {} outside recommended range {}-{}.",
            desc_length, limits.desc_min, limits.desc_max
        ));
    }

    // ── Headings ──
    if h1_count == 0 {
        audit.errors.push("Missing H1.".to_string());
    } else if h1_count > 1 {
        audit.warnings.push(format!("Multiple H1 tags ({}).", h1_count));
    }
    audit.warnings.extend(order_warnings);

    // ── Images ──
    if missing_alt > 0 {
        audit
            .errors
            .push(format!("{} image(s) missing alt attribute.", missing_alt));
    }
    if empty_alt > 0 {
        audit
            .warnings
            .push(format!("{} image(s) have empty alt (alt=\"\").", empty_alt));
    }

    audit
}

/// Image references on a page that resolve to a file under `root` that
/// does not exist. Absolute URLs count only when they point at `base_url`;
/// other origins, fragments and non-http schemes are ignored.
pub fn missing_image_refs(doc: &PageDocument, rel_path: &str, root: &Path, base_url: &str) -> Vec<String> {
    let Some(site) = site_origin(base_url) else {
        return Vec::new();
    };
    let Ok(page) = site.join(rel_path) else {
        return Vec::new();
    };

    doc.asset_refs()
        .into_iter()
        .filter(|r| looks_like_image(r))
        .filter(|r| {
            local_path(r, &page, &site, root).is_some_and(|p| !p.exists())
        })
        .collect()
}

fn site_origin(base_url: &str) -> Option<Url> {
    let base = base_url.trim();
    let base = if base.is_empty() { PLACEHOLDER_ORIGIN } else { base };
    let with_slash = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };
    Url::parse(&with_slash).ok()
}

fn looks_like_image(reference: &str) -> bool {
    let lower = reference.to_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or("");
    IMAGE_EXTS.iter().any(|ext| path.ends_with(ext)) || path.contains("image")
}

/// Map a reference to a file under `root`, resolving absolute,
/// root-relative and page-relative forms
fn local_path(reference: &str, page: &Url, site: &Url, root: &Path) -> Option<PathBuf> {
    if reference.starts_with('#') {
        return None;
    }
    let resolved = page.join(reference).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") || resolved.host() != site.host() {
        return None;
    }
    let rel = resolved.path().strip_prefix(site.path())?;
    let rel = urlencoding::decode(rel).map(|c| c.into_owned()).unwrap_or_else(|_| rel.to_string());
    if rel.is_empty() {
        return None;
    }
    Some(root.join(rel))
}

fn record_missing_images(page: &mut PageAudit, missing: Vec<String>) {
    if !missing.is_empty() {
        page.errors
            .push(format!("{} broken image reference(s).", missing.len()));
    }
    page.missing_images = missing;
}

/// Audit every HTML file under `root`
pub fn audit_site(root: &Path, opts: &AuditOptions) -> Result<AuditReport> {
    let files = site::html_files(root, &opts.exclude_dirs)?;
    info!("Auditing {} HTML file(s) under {}", files.len(), root.display());

    let mut pages = Vec::with_capacity(files.len());
    for file in &files {
        let bytes = fs::read(file).map_err(|e| SiteError::io(file, e))?;
        let html = String::from_utf8_lossy(&bytes);
        let rel = site::relative_path(root, file);
        let doc = PageDocument::parse(&html);
        let mut page = audit_page(&rel, &doc, opts);
        record_missing_images(&mut page, missing_image_refs(&doc, &rel, root, &opts.base_url));
        debug!(
            "{}: {} error(s), {} warning(s)",
            rel,
            page.errors.len(),
            page.warnings.len()
        );
        pages.push(page);
    }

    let base_url = opts.base_url.trim();
    Ok(AuditReport {
        root: root.display().to_string(),
        base_url: (!base_url.is_empty()).then(|| base_url.to_string()),
        summary: summarize(&pages),
        pages,
    })
}

/// Page counts plus the most frequent issues, ties broken alphabetically
pub fn summarize(pages: &[PageAudit]) -> AuditSummary {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for page in pages {
        for issue in page.errors.iter().chain(page.warnings.iter()) {
            *counts.entry(issue.as_str()).or_insert(0) += 1;
        }
    }

    let mut top: Vec<IssueCount> = counts
        .into_iter()
        .map(|(issue, count)| IssueCount {
            issue: issue.to_string(),
            count,
        })
        .collect();
    top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.issue.cmp(&b.issue)));
    top.truncate(TOP_ISSUES);

    AuditSummary {
        pages: pages.len(),
        pages_with_errors: pages.iter().filter(|p| !p.errors.is_empty()).count(),
        pages_with_warnings: pages.iter().filter(|p| !p.warnings.is_empty()).count(),
        top_issues: top,
    }
}

pub fn write_json(path: &Path, report: &AuditReport) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).map_err(|e| SiteError::io(path, e))
}

pub fn read_json(path: &Path) -> Result<AuditReport> {
    if !path.is_file() {
        return Err(SiteError::Report(format!(
            "{} not found, run `sitesmith audit` first",
            path.display()
        )));
    }
    let raw = fs::read_to_string(path).map_err(|e| SiteError::io(path, e))?;
    Ok(serde_json::from_str(&raw)?)
}

/// One row per page with lengths, counts and issue totals
pub fn write_csv(path: &Path, pages: &[PageAudit]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "file",
        "url",
        "title_length",
        "title_ok",
        "meta_description_length",
        "meta_description_ok",
        "h1_count",
        "h2_count",
        "images_count",
        "images_missing_alt_count",
        "images_empty_alt_count",
        "missing_images_count",
        "errors_count",
        "warnings_count",
    ])?;
    for p in pages {
        writer.write_record([
            p.file.clone(),
            p.url.clone().unwrap_or_default(),
            p.title_length.to_string(),
            p.title_ok.to_string(),
            p.meta_description_length.to_string(),
            p.meta_description_ok.to_string(),
            p.h1_count.to_string(),
            p.h2_count.to_string(),
            p.images_count.to_string(),
            p.images_missing_alt_count.to_string(),
            p.images_empty_alt_count.to_string(),
            p.missing_images.len().to_string(),
            p.errors.len().to_string(),
            p.warnings.len().to_string(),
        ])?;
    }
    writer.flush().map_err(|e| SiteError::io(path, e))
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| SiteError::io(PathBuf::from(parent), e))
        }
        _ => Ok(()),
    }
}
