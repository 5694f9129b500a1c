use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Result, SiteError};

/// Directories never scanned unless the config says otherwise
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[".git", ".venv", "node_modules", "dist", "build"];

/// Top-level `sitesmith.toml`. Every section falls back to its defaults,
/// so an absent file behaves like an empty one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub site: SiteSection,
    pub brand: BrandConfig,
    pub limits: Limits,
    pub analytics: AnalyticsConfig,
    pub sitemap: SitemapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSection {
    pub base_url: String,
    pub exclude_dirs: Vec<String>,
}

impl Default for SiteSection {
    fn default() -> Self {
        SiteSection {
            base_url: "https://midwestflipllc.com".to_string(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// Business identity used to pad short titles and descriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandConfig {
    pub name: String,
    pub phone: String,
    /// Appended to short titles after the brand name, each as ` | <qualifier>`
    pub title_qualifiers: Vec<String>,
    /// Appended to short descriptions in order. `{{name}}` and `{{phone}}` are expanded.
    pub description_suffixes: Vec<String>,
    /// Lowercase terms that make a title segment worth keeping
    pub keywords: Vec<String>,
    /// Whole-title replacement used when nothing else reaches the minimum
    pub fallback_title: String,
}

impl Default for BrandConfig {
    fn default() -> Self {
        BrandConfig {
            name: "Midwest Flip LLC".to_string(),
            phone: "(313) 389-6324".to_string(),
            title_qualifiers: vec!["Detroit".to_string(), "Michigan".to_string()],
            description_suffixes: vec![
                "Serving Detroit & Metro Detroit.".to_string(),
                "Call {{phone}}.".to_string(),
                "Licensed & insured.".to_string(),
            ],
            keywords: ["detroit", "metro detroit", "remodel", "contractor", "builder", "services"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            fallback_title: "Midwest Flip LLC | Detroit Home Remodeling".to_string(),
        }
    }
}

impl BrandConfig {
    /// Description suffixes with placeholders filled in
    pub fn expanded_description_suffixes(&self) -> Vec<String> {
        self.description_suffixes
            .iter()
            .map(|s| s.replace("{{name}}", &self.name).replace("{{phone}}", &self.phone))
            .collect()
    }
}

/// Recommended length windows, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub title_min: usize,
    pub title_max: usize,
    pub desc_min: usize,
    pub desc_max: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            title_min: 30,
            title_max: 60,
            desc_min: 70,
            desc_max: 160,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub matomo_url: String,
    pub matomo_site_id: String,
    /// Script location when it differs from `<matomo_url>/matomo.js` (Matomo Cloud CDN)
    pub matomo_script_url: String,
    pub ga_measurement_id: String,
    pub plausible_domain: String,
    pub plausible_host: String,
    /// Pages containing this text are treated as already instrumented.
    /// Empty means the snippet's own opening comment.
    pub marker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitemapConfig {
    pub skip_patterns: Vec<String>,
    pub changefreq: String,
    /// changefreq for the home page
    pub home_changefreq: String,
    pub default_priority: f32,
    pub priorities: Vec<PriorityRule>,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        SitemapConfig {
            skip_patterns: vec!["receipt".to_string(), "test".to_string(), "backup".to_string()],
            changefreq: "monthly".to_string(),
            home_changefreq: "weekly".to_string(),
            default_priority: 0.5,
            priorities: Vec::new(),
        }
    }
}

/// Pages whose relative path starts with `prefix` get `priority`, and
/// `changefreq` when set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityRule {
    pub prefix: String,
    pub priority: f32,
    #[serde(default)]
    pub changefreq: Option<String>,
}

impl SiteConfig {
    /// Load config from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(SiteConfig::default());
        }
        let raw = fs::read_to_string(path).map_err(|e| SiteError::io(path, e))?;
        Self::from_toml(&raw).map_err(|source| SiteError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = SiteConfig::from_toml("").unwrap();
        assert_eq!(cfg.limits, Limits::default());
        assert_eq!(cfg.brand.name, "Midwest Flip LLC");
        assert!(cfg.site.exclude_dirs.iter().any(|d| d == "node_modules"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = SiteConfig::from_toml(
            r#"
[brand]
name = "Acme Roofing"
phone = "555-0100"

[limits]
title_max = 65

[[sitemap.priorities]]
prefix = "services/"
priority = 0.8

[[sitemap.priorities]]
prefix = "services.html"
priority = 0.9
changefreq = "weekly"
"#,
        )
        .unwrap();
        assert_eq!(cfg.brand.name, "Acme Roofing");
        assert_eq!(cfg.brand.title_qualifiers, vec!["Detroit", "Michigan"]);
        assert_eq!(cfg.limits.title_max, 65);
        assert_eq!(cfg.limits.title_min, 30);
        assert_eq!(cfg.sitemap.priorities.len(), 2);
        assert_eq!(cfg.sitemap.priorities[0].changefreq, None);
        assert_eq!(cfg.sitemap.priorities[1].changefreq.as_deref(), Some("weekly"));
        assert_eq!(cfg.sitemap.changefreq, "monthly");
        assert_eq!(cfg.sitemap.home_changefreq, "weekly");
    }

    #[test]
    fn description_placeholders_expand() {
        let brand = BrandConfig {
            name: "Acme".to_string(),
            phone: "555-0100".to_string(),
            description_suffixes: vec!["Call {{phone}}.".to_string(), "{{name}} rocks.".to_string()],
            ..BrandConfig::default()
        };
        assert_eq!(
            brand.expanded_description_suffixes(),
            vec!["Call 555-0100.", "Acme rocks."]
        );
    }

    #[test]
    fn load_missing_file_is_default() {
        let cfg = SiteConfig::load(Path::new("/definitely/not/here/sitesmith.toml")).unwrap();
        assert_eq!(cfg.limits.desc_max, 160);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sitesmith.toml");
        fs::write(&path, "[limits\ntitle_min = ").unwrap();
        assert!(matches!(SiteConfig::load(&path), Err(SiteError::Config { .. })));
    }
}
