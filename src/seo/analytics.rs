use log::{debug, warn};
use std::fs;
use std::path::Path;

use crate::config::AnalyticsConfig;
use crate::error::{Result, SiteError};
use crate::site;

use super::html_escape;

pub const SNIPPET_START: &str = "<!-- Analytics -->";
pub const SNIPPET_END: &str = "<!-- End Analytics -->";

/// Build the analytics block for every configured provider.
/// Returns an empty string when nothing is configured.
pub fn build_analytics_snippet(cfg: &AnalyticsConfig) -> String {
    let mut scripts = String::new();

    // Matomo
    let url = cfg.matomo_url.trim().trim_end_matches('/');
    let site_id = cfg.matomo_site_id.trim();
    if !url.is_empty() && !site_id.is_empty() {
        let script_url = if cfg.matomo_script_url.trim().is_empty() {
            format!("{}/matomo.js", url)
        } else {
            cfg.matomo_script_url.trim().to_string()
        };
        scripts.push_str(&format!(
            r#"<script>
  var _paq = window._paq = window._paq || [];
  _paq.push(['trackPageView']);
  _paq.push(['enableLinkTracking']);
  (function() {{
    var u="{url}/";
    _paq.push(['setTrackerUrl', u+'matomo.php']);
    _paq.push(['setSiteId', '{site_id}']);
    var d=document, g=d.createElement('script'), s=d.getElementsByTagName('script')[0];
    g.async=true; g.src='{script}'; s.parentNode.insertBefore(g,s);
  }})();
</script>
"#,
            url = html_escape(url),
            site_id = html_escape(site_id),
            script = html_escape(&script_url),
        ));
    }

    // Google Analytics (GA4)
    let ga = cfg.ga_measurement_id.trim();
    if !ga.is_empty() {
        scripts.push_str(&format!(
            r#"<script async src="https://www.googletagmanager.com/gtag/js?id={id}"></script>
<script>window.dataLayer=window.dataLayer||[];function gtag(){{dataLayer.push(arguments);}}gtag('js',new Date());gtag('config','{id}');</script>
"#,
            id = html_escape(ga)
        ));
    }

    // Plausible
    let domain = cfg.plausible_domain.trim();
    if !domain.is_empty() {
        let host = cfg.plausible_host.trim().trim_end_matches('/');
        let host = if host.is_empty() { "https://plausible.io" } else { host };
        scripts.push_str(&format!(
            r#"<script defer data-domain="{domain}" src="{host}/js/script.js"></script>
"#,
            domain = html_escape(domain),
            host = html_escape(host),
        ));
    }

    if scripts.is_empty() {
        return scripts;
    }
    format!("{}\n{}{}", SNIPPET_START, scripts, SNIPPET_END)
}

/// Insert `snippet` before the last `</head>`. Returns None when the page
/// has no head close tag, already contains `marker`, or the snippet is empty.
pub fn inject(content: &str, snippet: &str, marker: &str) -> Option<String> {
    if snippet.trim().is_empty() {
        return None;
    }
    let marker = if marker.is_empty() { SNIPPET_START } else { marker };
    if content.contains(marker) {
        return None;
    }

    // ASCII lowercasing keeps byte offsets aligned with `content`
    let at = content.to_ascii_lowercase().rfind("</head>")?;
    let (before, after) = content.split_at(at);
    let spacer = if before.ends_with('\n') { "" } else { "\n" };
    Some(format!("{}{}{}\n{}", before, spacer, snippet, after))
}

/// Inject the snippet into every page under `root`. Returns the number of
/// files changed (or that would change, in dry-run mode).
pub fn inject_site(
    root: &Path,
    exclude_dirs: &[String],
    cfg: &AnalyticsConfig,
    dry_run: bool,
) -> Result<usize> {
    let snippet = build_analytics_snippet(cfg);
    if snippet.is_empty() {
        return Ok(0);
    }

    let mut changed = 0;
    for file in site::html_files(root, exclude_dirs)? {
        match inject_file(&file, &snippet, &cfg.marker, dry_run) {
            Ok(true) => changed += 1,
            Ok(false) => {}
            Err(e) => warn!("skipping {}: {}", file.display(), e),
        }
    }
    Ok(changed)
}

fn inject_file(file: &Path, snippet: &str, marker: &str, dry_run: bool) -> Result<bool> {
    let bytes = fs::read(file).map_err(|e| SiteError::io(file, e))?;
    let content = String::from_utf8_lossy(&bytes);
    let Some(updated) = inject(&content, snippet, marker) else {
        return Ok(false);
    };
    if dry_run {
        debug!("would inject analytics into {}", file.display());
    } else {
        fs::write(file, updated).map_err(|e| SiteError::io(file, e))?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matomo() -> AnalyticsConfig {
        AnalyticsConfig {
            matomo_url: "https://acme.matomo.cloud/".to_string(),
            matomo_site_id: "2".to_string(),
            matomo_script_url: "https://cdn.matomo.cloud/acme.matomo.cloud/matomo.js".to_string(),
            ..AnalyticsConfig::default()
        }
    }

    #[test]
    fn nothing_configured_is_empty() {
        assert_eq!(build_analytics_snippet(&AnalyticsConfig::default()), "");
    }

    #[test]
    fn matomo_snippet_uses_cdn_script() {
        let s = build_analytics_snippet(&matomo());
        assert!(s.starts_with(SNIPPET_START));
        assert!(s.ends_with(SNIPPET_END));
        assert!(s.contains(r#"var u="https://acme.matomo.cloud/";"#));
        assert!(s.contains("_paq.push(['setSiteId', '2']);"));
        assert!(s.contains("g.src='https://cdn.matomo.cloud/acme.matomo.cloud/matomo.js'"));
    }

    #[test]
    fn matomo_script_defaults_to_tracker_host() {
        let cfg = AnalyticsConfig {
            matomo_script_url: String::new(),
            ..matomo()
        };
        assert!(build_analytics_snippet(&cfg).contains("g.src='https://acme.matomo.cloud/matomo.js'"));
    }

    #[test]
    fn ga_and_plausible_escape_values() {
        let cfg = AnalyticsConfig {
            ga_measurement_id: "G-\"X\"".to_string(),
            plausible_domain: "example.com".to_string(),
            ..AnalyticsConfig::default()
        };
        let s = build_analytics_snippet(&cfg);
        assert!(s.contains("gtag/js?id=G-&quot;X&quot;"));
        assert!(s.contains(r#"data-domain="example.com" src="https://plausible.io/js/script.js""#));
    }

    #[test]
    fn injects_before_last_head_close() {
        let page = "<html><HEAD><title>x</title></HEAD><body></body></html>";
        let out = inject(page, "<!-- Analytics -->S", "").unwrap();
        assert_eq!(
            out,
            "<html><HEAD><title>x</title>\n<!-- Analytics -->S\n</HEAD><body></body></html>"
        );
        // Second pass finds the marker
        assert_eq!(inject(&out, "<!-- Analytics -->S", ""), None);
    }

    #[test]
    fn no_spacer_after_newline() {
        let out = inject("<head>\n</head>", "SNIP", "SNIP").unwrap();
        assert_eq!(out, "<head>\nSNIP\n</head>");
    }

    #[test]
    fn pages_without_head_or_with_marker_are_skipped() {
        assert_eq!(inject("<p>fragment</p>", "SNIP", ""), None);
        assert_eq!(inject("<head>matomo.cloud</head>", "SNIP", "matomo.cloud"), None);
        assert_eq!(inject("<head></head>", "  ", ""), None);
    }

    #[test]
    fn inject_site_counts_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.html"), "<html><head></head><body></body></html>").unwrap();
        fs::write(root.join("b.html"), "<p>no head</p>").unwrap();

        assert_eq!(inject_site(root, &[], &matomo(), true).unwrap(), 1);
        assert!(!fs::read_to_string(root.join("a.html")).unwrap().contains(SNIPPET_START));

        assert_eq!(inject_site(root, &[], &matomo(), false).unwrap(), 1);
        assert!(fs::read_to_string(root.join("a.html")).unwrap().contains(SNIPPET_START));
        assert_eq!(inject_site(root, &[], &matomo(), false).unwrap(), 0);
    }
}
