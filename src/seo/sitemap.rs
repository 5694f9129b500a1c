use chrono::NaiveDate;
use std::path::Path;

use crate::config::{PriorityRule, SitemapConfig};
use crate::error::Result;
use crate::site;

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: String,
    pub changefreq: String,
    pub priority: f32,
}

/// Build entries for the given relative page paths. Skipped pages are
/// dropped; the rest are ordered by priority (highest first), then URL.
pub fn build_entries(
    rel_paths: &[String],
    base_url: &str,
    cfg: &SitemapConfig,
    today: NaiveDate,
) -> Vec<SitemapEntry> {
    let base = base_url.trim().trim_end_matches('/');
    let lastmod = today.format("%Y-%m-%d").to_string();

    let mut entries: Vec<SitemapEntry> = rel_paths
        .iter()
        .filter(|rel| !is_skipped(rel, cfg))
        .map(|rel| {
            let (loc, priority, changefreq) = if rel.as_str() == "index.html" {
                (format!("{}/", base), 1.0, cfg.home_changefreq.clone())
            } else {
                let rule = rule_for(rel, cfg);
                (
                    format!("{}/{}", base, rel),
                    rule.map(|r| r.priority).unwrap_or(cfg.default_priority),
                    rule.and_then(|r| r.changefreq.clone())
                        .unwrap_or_else(|| cfg.changefreq.clone()),
                )
            };
            SitemapEntry {
                loc,
                lastmod: lastmod.clone(),
                changefreq,
                priority,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.priority
            .total_cmp(&a.priority)
            .then_with(|| a.loc.cmp(&b.loc))
    });
    entries
}

/// Render a sitemaps.org urlset
pub fn render(entries: &[SitemapEntry]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
"#,
    );

    for e in entries {
        xml.push_str(&format!(
            "  <url>\n    <loc>{}</loc>\n    <lastmod>{}</lastmod>\n    <changefreq>{}</changefreq>\n    <priority>{:.1}</priority>\n  </url>\n",
            xml_escape(&e.loc),
            e.lastmod,
            xml_escape(&e.changefreq),
            e.priority
        ));
    }

    xml.push_str("</urlset>");
    xml
}

/// Walk the site and produce sitemap.xml content plus the URL count
pub fn generate_sitemap(
    root: &Path,
    exclude_dirs: &[String],
    base_url: &str,
    cfg: &SitemapConfig,
    today: NaiveDate,
) -> Result<(String, usize)> {
    let rels: Vec<String> = site::html_files(root, exclude_dirs)?
        .iter()
        .map(|f| site::relative_path(root, f))
        .collect();
    let entries = build_entries(&rels, base_url, cfg, today);
    Ok((render(&entries), entries.len()))
}

fn is_skipped(rel: &str, cfg: &SitemapConfig) -> bool {
    let lower = rel.to_lowercase();
    cfg.skip_patterns
        .iter()
        .any(|p| !p.is_empty() && lower.contains(&p.to_lowercase()))
}

/// First rule whose prefix matches, case-insensitively
fn rule_for<'a>(rel: &str, cfg: &'a SitemapConfig) -> Option<&'a PriorityRule> {
    let lower = rel.to_lowercase();
    cfg.priorities
        .iter()
        .find(|r| lower.starts_with(&r.prefix.to_lowercase()))
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
