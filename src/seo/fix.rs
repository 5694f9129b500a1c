use log::{debug, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Limits;
use crate::error::{Result, SiteError};

use super::audit::AuditReport;
use super::document::PageDocument;
use super::normalize::{MetaTextNormalizer, TextField};

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixResult {
    pub file: PathBuf,
    pub changed: bool,
    pub old_title: Option<String>,
    pub new_title: Option<String>,
    pub old_desc: Option<String>,
    pub new_desc: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FixOptions {
    pub limits: Limits,
    /// Mirror new values into `og:title` / `og:description`
    pub update_og: bool,
    /// Mirror new values into `twitter:title` / `twitter:description`
    pub update_twitter: bool,
    pub dry_run: bool,
}

/// Normalize the title and description of one page's markup.
/// Returns the result and the new markup when anything changed.
pub fn fix_html(
    html: &str,
    file: &Path,
    normalizer: &MetaTextNormalizer,
    opts: &FixOptions,
) -> (FixResult, Option<String>) {
    let mut doc = PageDocument::parse(html);
    let old_title = doc.title();
    let old_desc = doc.meta_by_name("description");

    let mut changed = false;
    let mut new_title = old_title.clone();
    let mut new_desc = old_desc.clone();

    if let Some(title) = &old_title {
        let fixed = normalizer.normalize(&TextField::title(title, &opts.limits));
        if &fixed != title && doc.set_title(&fixed) {
            changed = true;
            new_title = Some(fixed);
        }
    }

    if let Some(desc) = &old_desc {
        let fixed = normalizer.normalize(&TextField::description(desc, &opts.limits));
        if &fixed != desc && doc.set_meta_by_name("description", &fixed) {
            changed = true;
            new_desc = Some(fixed);
        }
    }

    // Social tags follow the page's values whenever they exist, so stale
    // tags are repaired even when the title itself was already in range
    let title = new_title.as_deref().filter(|t| !t.is_empty());
    let desc = new_desc.as_deref().filter(|d| !d.is_empty());

    if opts.update_og {
        if let Some(t) = title {
            changed |= sync_meta(&mut doc, SocialKey::Property("og:title"), t);
        }
        if let Some(d) = desc {
            changed |= sync_meta(&mut doc, SocialKey::Property("og:description"), d);
        }
    }
    if opts.update_twitter {
        if let Some(t) = title {
            changed |= sync_meta(&mut doc, SocialKey::Name("twitter:title"), t);
        }
        if let Some(d) = desc {
            changed |= sync_meta(&mut doc, SocialKey::Name("twitter:description"), d);
        }
    }

    let html_out = changed.then(|| doc.html());
    (
        FixResult {
            file: file.to_path_buf(),
            changed,
            old_title,
            new_title,
            old_desc,
            new_desc,
        },
        html_out,
    )
}

enum SocialKey {
    Name(&'static str),
    Property(&'static str),
}

/// Set a social meta tag to `value`. Only a tag whose content differs
/// counts as a change.
fn sync_meta(doc: &mut PageDocument, key: SocialKey, value: &str) -> bool {
    let current = match key {
        SocialKey::Name(name) => doc.meta_by_name(name),
        SocialKey::Property(property) => doc.meta_by_property(property),
    };
    if current.as_deref() == Some(value) {
        return false;
    }
    match key {
        SocialKey::Name(name) => doc.set_meta_by_name(name, value),
        SocialKey::Property(property) => doc.set_meta_by_property(property, value),
    }
}

/// Fix one file on disk. Nothing is written in dry-run mode or when the
/// page is already within its windows.
pub fn fix_file(path: &Path, normalizer: &MetaTextNormalizer, opts: &FixOptions) -> Result<FixResult> {
    let bytes = fs::read(path).map_err(|e| SiteError::io(path, e))?;
    let html = String::from_utf8_lossy(&bytes);
    let (result, updated) = fix_html(&html, path, normalizer, opts);

    if let Some(updated) = updated {
        if opts.dry_run {
            debug!("dry run, not writing {}", path.display());
        } else {
            fs::write(path, updated).map_err(|e| SiteError::io(path, e))?;
        }
    }
    Ok(result)
}

/// Files the audit flagged with any error or warning, in report order,
/// without duplicates.
pub fn flagged_files(root: &Path, report: &AuditReport) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    report
        .pages
        .iter()
        .filter(|p| p.has_issues() && !p.file.is_empty())
        .map(|p| root.join(&p.file))
        .filter(|f| seen.insert(f.clone()))
        .collect()
}

/// Run the fixer over every flagged page. Files that vanished since the
/// audit are skipped; unreadable files are logged and skipped.
pub fn fix_from_report(
    root: &Path,
    report: &AuditReport,
    normalizer: &MetaTextNormalizer,
    opts: &FixOptions,
) -> Vec<FixResult> {
    let mut results = Vec::new();
    for file in flagged_files(root, report) {
        if !file.is_file() {
            debug!("skipping missing file {}", file.display());
            continue;
        }
        match fix_file(&file, normalizer, opts) {
            Ok(result) => results.push(result),
            Err(e) => warn!("could not fix {}: {}", file.display(), e),
        }
    }
    results
}
