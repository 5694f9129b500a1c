use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use super::document::PageDocument;

/// Minimum Jaro-Winkler score for a "maybe" suggestion
const SUGGESTION_THRESHOLD: f64 = 0.85;

/// Source headers are short lines ending in a colon
const HEADER_MAX_CHARS: usize = 80;

/// A source service with no matching card on the services page
#[derive(Debug, Clone, PartialEq)]
pub struct MissingService {
    pub name: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServicesAudit {
    /// `h4` card titles found on the page
    pub page_titles: usize,
    /// Distinct services in the source list
    pub source_items: usize,
    pub matched: usize,
    pub missing: Vec<MissingService>,
}

/// Comparison key: lowercase, `&` read as "and", punctuation folded to spaces
pub fn service_key(text: &str) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM.get_or_init(|| Regex::new(r"[^a-z0-9]+").unwrap());

    let lower = text.trim().to_lowercase().replace('&', " and ");
    re.replace_all(&lower, " ").trim().to_string()
}

/// Services from a pasted list: one per line, bullets and numbering
/// allowed. Blank lines, `#` comments and short `Header:` lines are
/// skipped. Duplicates (by key) keep their first spelling.
pub fn parse_source_list(text: &str) -> Vec<String> {
    static BULLET: OnceLock<Regex> = OnceLock::new();
    let bullet = BULLET.get_or_init(|| Regex::new(r"^(?:[-*•]|\d+\)|\d+\.|\d+\s+-)\s+(.*)$").unwrap());

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let item = match bullet.captures(line) {
            Some(c) => c[1].trim().to_string(),
            None => {
                if line.starts_with('#')
                    || (line.ends_with(':') && line.chars().count() < HEADER_MAX_CHARS)
                {
                    continue;
                }
                line.to_string()
            }
        };
        let key = service_key(&item);
        if !key.is_empty() && seen.insert(key) {
            out.push(item);
        }
    }
    out
}

/// Compare the `h4` titles of the services page against the source list
pub fn audit_services(services_html: &str, source: &str, max_suggestions: usize) -> ServicesAudit {
    let titles = PageDocument::parse(services_html).texts("h4");

    let mut by_key: HashMap<String, String> = HashMap::new();
    let mut display = Vec::new();
    for title in &titles {
        let key = service_key(title);
        if !key.is_empty() && !by_key.contains_key(&key) {
            by_key.insert(key, title.clone());
            display.push(title.clone());
        }
    }

    let items = parse_source_list(source);
    let mut audit = ServicesAudit {
        page_titles: titles.len(),
        source_items: items.len(),
        ..ServicesAudit::default()
    };
    for item in items {
        if by_key.contains_key(&service_key(&item)) {
            audit.matched += 1;
        } else {
            let suggestions = suggest(&item, &display, max_suggestions);
            audit.missing.push(MissingService { name: item, suggestions });
        }
    }
    audit
}

fn suggest(name: &str, candidates: &[String], max: usize) -> Vec<String> {
    let needle = name.to_lowercase();
    let mut scored: Vec<(f64, &String)> = candidates
        .iter()
        .map(|c| (strsim::jaro_winkler(&needle, &c.to_lowercase()), c))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().take(max).map(|(_, c)| c.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICES_PAGE: &str = r#"<html><body>
<div class="card"><h4>Kitchen Remodeling</h4></div>
<div class="card"><h4>Bathroom
   Remodeling</h4></div>
<div class="card"><h4>Decks &amp; Patios</h4></div>
<div class="card"><h4>Basement Finishing</h4></div>
<div class="card"><h4>kitchen remodeling</h4></div>
</body></html>"#;

    #[test]
    fn keys_fold_case_and_punctuation() {
        assert_eq!(service_key("Decks & Patios"), "decks and patios");
        assert_eq!(service_key("  Decks and patios!! "), "decks and patios");
        assert_eq!(service_key("Drywall/Plaster-Repair"), "drywall plaster repair");
        assert_eq!(service_key("---"), "");
    }

    #[test]
    fn source_list_formats() {
        let source = "Interior Services:\n\
                      - Kitchen Remodeling\n\
                      * Bathroom Remodeling\n\
                      • Roofing\n\
                      1) Siding\n\
                      2. Gutters\n\
                      3 - Windows\n\
                      # internal note\n\
                      \n\
                      Decks and Patios\n\
                      - kitchen remodeling\n";
        assert_eq!(
            parse_source_list(source),
            vec![
                "Kitchen Remodeling",
                "Bathroom Remodeling",
                "Roofing",
                "Siding",
                "Gutters",
                "Windows",
                "Decks and Patios",
            ]
        );
    }

    #[test]
    fn long_colon_line_is_a_service() {
        let line = format!("{}:", "x".repeat(HEADER_MAX_CHARS));
        assert_eq!(parse_source_list(&line), vec![line.clone()]);
    }

    #[test]
    fn compares_page_against_source() {
        let source = "- Kitchen Remodeling\n- Decks and Patios\n- Basement Finishng\n- Roofing\n";
        let audit = audit_services(SERVICES_PAGE, source, 3);
        assert_eq!(audit.page_titles, 5);
        assert_eq!(audit.source_items, 4);
        assert_eq!(audit.matched, 2);

        let names: Vec<&str> = audit.missing.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Basement Finishng", "Roofing"]);
        assert_eq!(audit.missing[0].suggestions, vec!["Basement Finishing"]);
        assert!(audit.missing[1].suggestions.is_empty());
    }

    #[test]
    fn suggestions_are_capped() {
        let candidates: Vec<String> = ["Roof Repair", "Roof Replacement", "Roof Repairs"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let got = suggest("Roof Repair", &candidates, 2);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0], "Roof Repair");
    }
}
