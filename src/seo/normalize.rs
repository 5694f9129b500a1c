//! Length normalization for `<title>` text and meta descriptions.
//!
//! Search results truncate long titles and descriptions and rank thin ones
//! poorly, so both are pushed into a `[min, max]` character window: long text
//! is cut at a word boundary, short text is padded with brand suffixes. The
//! only hard guarantee is that the output never exceeds `max`. Everything
//! else is best effort.

use regex::Regex;
use std::cmp::Reverse;
use std::sync::OnceLock;

use crate::config::{BrandConfig, Limits};

/// Upper bound on repeated passes while waiting for the output to settle
const MAX_PASSES: usize = 4;

/// Sentence ends preferred over a plain word boundary when truncating
const SENTENCE_ENDS: &[&str] = &[". ", "! ", "? ", "; "];

const TITLE_JOINER: &str = " | ";
const DESCRIPTION_JOINER: &str = " ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Title,
    Description,
}

/// A title or description awaiting normalization.
#[derive(Debug, Clone, Copy)]
pub struct TextField<'a> {
    pub raw: &'a str,
    pub kind: FieldKind,
    pub min_len: usize,
    pub max_len: usize,
}

impl<'a> TextField<'a> {
    pub fn title(raw: &'a str, limits: &Limits) -> Self {
        TextField {
            raw,
            kind: FieldKind::Title,
            min_len: limits.title_min,
            max_len: limits.title_max,
        }
    }

    pub fn description(raw: &'a str, limits: &Limits) -> Self {
        TextField {
            raw,
            kind: FieldKind::Description,
            min_len: limits.desc_min,
            max_len: limits.desc_max,
        }
    }
}

/// Brings titles and descriptions into their length windows using the
/// suffixes and keywords of one brand.
#[derive(Debug, Clone)]
pub struct MetaTextNormalizer {
    brand_name: String,
    fallback_title: String,
    title_suffixes: Vec<String>,
    description_suffixes: Vec<String>,
    keywords: Vec<String>,
}

impl MetaTextNormalizer {
    pub fn new(brand: &BrandConfig) -> Self {
        let brand_name = normalize_space(&brand.name);
        let title_suffixes = std::iter::once(brand_name.clone())
            .chain(brand.title_qualifiers.iter().map(|q| normalize_space(q)))
            .filter(|s| !s.is_empty())
            .collect();
        let description_suffixes = brand
            .expanded_description_suffixes()
            .iter()
            .map(|s| normalize_space(s))
            .filter(|s| !s.is_empty())
            .collect();

        MetaTextNormalizer {
            brand_name,
            fallback_title: normalize_space(&brand.fallback_title),
            title_suffixes,
            description_suffixes,
            keywords: brand.keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    pub fn normalize_title(&self, text: &str, min_len: usize, max_len: usize) -> String {
        self.normalize(&TextField {
            raw: text,
            kind: FieldKind::Title,
            min_len,
            max_len,
        })
    }

    pub fn normalize_description(&self, text: &str, min_len: usize, max_len: usize) -> String {
        self.normalize(&TextField {
            raw: text,
            kind: FieldKind::Description,
            min_len,
            max_len,
        })
    }

    /// Normalize a field. Text already inside the window comes back with only
    /// its whitespace collapsed. The result never exceeds `max_len`, and feeding
    /// the result back in returns it unchanged.
    pub fn normalize(&self, field: &TextField) -> String {
        let max = field.max_len;
        let min = field.min_len.min(max);

        let mut current = normalize_space(field.raw);
        for _ in 0..MAX_PASSES {
            let next = self.pass(&current, field.kind, min, max);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    fn pass(&self, text: &str, kind: FieldKind, min: usize, max: usize) -> String {
        let mut text = normalize_space(text);
        let len = char_len(&text);
        if len >= min && len <= max {
            return text;
        }

        if len > max {
            text = trim_to_word_boundary(&text, max, min);
        }

        if char_len(&text) < min {
            text = match kind {
                FieldKind::Title => extend(&text, &self.title_suffixes, TITLE_JOINER, min, max),
                FieldKind::Description => extend(
                    &text,
                    &self.description_suffixes,
                    DESCRIPTION_JOINER,
                    min,
                    max,
                ),
            };
        }

        if kind == FieldKind::Title && char_len(&text) < min {
            text = self.complete_title(&text, min, max);
        }

        trim_to_word_boundary(&text, max, min)
    }

    /// Last resort for titles still under the minimum: force the brand in,
    /// condensing segments when that overflows, then try the fallback title.
    fn complete_title(&self, text: &str, min: usize, max: usize) -> String {
        let mut title = text.to_string();

        if !self.brand_name.is_empty() && !contains_ci(&title, &self.brand_name) {
            let injected = if title.is_empty() {
                self.brand_name.clone()
            } else {
                format!("{}{}{}", title, TITLE_JOINER, self.brand_name)
            };
            title = if char_len(&injected) <= max {
                injected
            } else {
                self.condense_title(&injected, min, max)
            };
        }

        if char_len(&title) < min {
            let fallback_len = char_len(&self.fallback_title);
            if !self.fallback_title.is_empty() && fallback_len >= min && fallback_len <= max {
                return self.fallback_title.clone();
            }
        }

        title
    }

    /// Rebuild a title from its segments: the brand segment first, then the
    /// remaining segments ranked by keyword hits and brevity, added while
    /// they fit.
    fn condense_title(&self, title: &str, min: usize, max: usize) -> String {
        let parts: Vec<&str> = segment_re()
            .split(title)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let brand_lower = self.brand_name.to_lowercase();
        let brand = parts
            .iter()
            .find(|p| !brand_lower.is_empty() && p.to_lowercase().contains(&brand_lower))
            .map(|p| p.to_string())
            .unwrap_or_else(|| self.brand_name.clone());

        let mut descriptors: Vec<&str> = parts.iter().copied().filter(|p| *p != brand).collect();
        descriptors.sort_by_key(|p| (Reverse(self.keyword_score(p)), char_len(p)));

        let mut kept: Vec<String> = Vec::new();
        if !brand.is_empty() {
            kept.push(brand);
        }
        for part in descriptors {
            if kept.iter().any(|k| k.eq_ignore_ascii_case(part)) {
                continue;
            }
            let mut candidate = kept.clone();
            candidate.push(part.to_string());
            if char_len(&candidate.join(TITLE_JOINER)) <= max {
                kept = candidate;
            }
            if char_len(&kept.join(TITLE_JOINER)) >= min {
                break;
            }
        }

        trim_to_word_boundary(&kept.join(TITLE_JOINER), max, min)
    }

    fn keyword_score(&self, segment: &str) -> usize {
        let lower = segment.to_lowercase();
        self.keywords
            .iter()
            .filter(|k| !k.is_empty() && lower.contains(k.as_str()))
            .count()
    }
}

/// Collapse whitespace runs to single spaces and trim both ends.
pub fn normalize_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` down to at most `max_len` characters. Prefers the last sentence
/// end that keeps at least `floor` characters, then the last space, and only
/// hard-cuts a single oversized token. Separators left dangling at the end
/// are dropped.
pub fn trim_to_word_boundary(text: &str, max_len: usize, floor: usize) -> String {
    let text = normalize_space(text);
    if char_len(&text) <= max_len {
        return text;
    }

    let head = &text[..byte_offset(&text, max_len)];

    let sentence_cut = SENTENCE_ENDS
        .iter()
        .filter_map(|p| head.rfind(p))
        .max()
        .map(|idx| idx + 1)
        .filter(|&cut| cut > 0 && char_len(&head[..cut]) >= floor.max(1));

    let cut = match sentence_cut {
        Some(cut) => cut,
        None => {
            // A space sitting right at max_len still counts as a boundary.
            let probe = &text[..byte_offset(&text, max_len + 1)];
            match probe.rfind(' ') {
                Some(idx) if idx > 0 => idx,
                _ => head.len(),
            }
        }
    };

    trailing_separators_re()
        .replace(&text[..cut], "")
        .trim()
        .to_string()
}

/// Append `suffixes` in order while the text is shorter than `min_len`.
/// A suffix is skipped when already present or when it would push the text
/// past `max_len`. Text carrying nothing but suffixes only ever receives the
/// first one.
pub fn extend(text: &str, suffixes: &[String], joiner: &str, min_len: usize, max_len: usize) -> String {
    let mut text = normalize_space(text);
    if char_len(&text) >= min_len {
        return text;
    }

    let allowed = if is_suffix_only(&text, suffixes) {
        1
    } else {
        suffixes.len()
    };

    for suffix in suffixes.iter().take(allowed) {
        if suffix.is_empty() || contains_ci(&text, suffix) {
            continue;
        }
        let candidate = if text.is_empty() {
            suffix.clone()
        } else {
            format!("{}{}{}", text, joiner, suffix)
        };
        if char_len(&candidate) > max_len {
            continue;
        }
        text = candidate;
        if char_len(&text) >= min_len {
            break;
        }
    }

    text
}

fn is_suffix_only(text: &str, suffixes: &[String]) -> bool {
    let mut rest = text.to_lowercase();
    for suffix in suffixes {
        if !suffix.is_empty() {
            rest = rest.replace(&suffix.to_lowercase(), " ");
        }
    }
    rest.chars()
        .all(|c| c.is_whitespace() || "|:-–—,;.".contains(c))
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Length in characters, which is what search engines count
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

fn segment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*[|:–—]\s*|\s+-\s+").unwrap())
}

fn trailing_separators_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s|:–—,;-]+$").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> MetaTextNormalizer {
        MetaTextNormalizer::new(&BrandConfig::default())
    }

    const SAMPLES: &[&str] = &[
        "",
        "   ",
        "Roofing",
        "We fix roofs.",
        "Kitchen Remodeling Services for Metro Detroit Homes Today",
        "Supercalifragilisticexpialidociousremodelingcontractorsdetroitmichigan",
        "Bathroom Remodeling | Midwest Flip LLC | Detroit | Metro Detroit Contractor | Licensed Builder Services",
        "Basement Finishing in Troy, MI — Waterproofing, Egress Windows & Full Build-Outs: Midwest Flip LLC",
        "Midwest Flip LLC",
        "Detroit",
        "Décor & Küchen — Renovierung in Detroit für anspruchsvolle Häuser und Wohnungen überall",
        "Short. Another short sentence! And then a much longer trailing clause that keeps going past the limit without stopping",
    ];

    const WINDOWS: &[(usize, usize)] = &[(30, 60), (70, 160), (10, 20), (0, 5), (50, 50), (5, 0)];

    #[test]
    fn normalize_space_collapses_runs() {
        assert_eq!(normalize_space("  Kitchen \n\t Remodeling   "), "Kitchen Remodeling");
        assert_eq!(normalize_space(""), "");
    }

    #[test]
    fn never_exceeds_max() {
        let n = normalizer();
        for s in SAMPLES {
            for &(lo, hi) in WINDOWS {
                let t = n.normalize_title(s, lo, hi);
                let d = n.normalize_description(s, lo, hi);
                assert!(char_len(&t) <= hi, "title {:?} ({lo},{hi}) -> {:?}", s, t);
                assert!(char_len(&d) <= hi, "desc {:?} ({lo},{hi}) -> {:?}", s, d);
            }
        }
    }

    #[test]
    fn normalization_is_idempotent() {
        let n = normalizer();
        for s in SAMPLES {
            for &(lo, hi) in WINDOWS {
                let once = n.normalize_title(s, lo, hi);
                assert_eq!(n.normalize_title(&once, lo, hi), once, "title {:?} ({lo},{hi})", s);
                let once = n.normalize_description(s, lo, hi);
                assert_eq!(n.normalize_description(&once, lo, hi), once, "desc {:?} ({lo},{hi})", s);
            }
        }
    }

    #[test]
    fn in_window_text_only_loses_extra_whitespace() {
        let n = normalizer();
        let raw = "Kitchen   Remodeling in Troy |  Midwest Flip LLC";
        assert_eq!(n.normalize_title(raw, 30, 60), normalize_space(raw));
    }

    #[test]
    fn truncation_lands_on_word_boundary() {
        let n = normalizer();
        let input = "Kitchen Remodeling Services for Metro Detroit Homes Today";
        let out = n.normalize_description(input, 10, 20);
        assert_eq!(out, "Kitchen Remodeling");
        assert!(input.starts_with(&out));
        assert_eq!(input.as_bytes()[out.len()], b' ');
    }

    #[test]
    fn single_long_token_is_hard_cut() {
        let out = trim_to_word_boundary("abcdefghijklmnopqrstuvwxyz", 10, 0);
        assert_eq!(out, "abcdefghij");
    }

    #[test]
    fn multibyte_text_is_cut_by_characters() {
        let out = trim_to_word_boundary("Küchen Küchen Küchen", 10, 0);
        assert_eq!(out, "Küchen");
        let out = trim_to_word_boundary("ÄÖÜÄÖÜÄÖÜÄÖÜ", 4, 0);
        assert_eq!(out, "ÄÖÜÄ");
    }

    #[test]
    fn sentence_end_preferred_when_long_enough() {
        let text = "Full kitchen remodels with custom cabinets. We also handle permits and inspections for you";
        let out = trim_to_word_boundary(text, 60, 30);
        assert_eq!(out, "Full kitchen remodels with custom cabinets.");
        // Too short for the floor, falls back to the last space
        let out = trim_to_word_boundary(text, 60, 50);
        assert!(out.starts_with("Full kitchen remodels with custom cabinets. We"));
        assert!(char_len(&out) <= 60);
    }

    #[test]
    fn dangling_separator_is_dropped() {
        let out = trim_to_word_boundary("Kitchen Remodeling | Midwest Flip LLC", 21, 0);
        assert_eq!(out, "Kitchen Remodeling");
    }

    #[test]
    fn short_title_gets_brand_and_qualifier() {
        let out = normalizer().normalize_title("Roofing", 30, 60);
        assert_eq!(out, "Roofing | Midwest Flip LLC | Detroit");
        assert!(char_len(&out) >= 30 && char_len(&out) <= 60);
    }

    #[test]
    fn short_description_gets_suffixes() {
        let out = normalizer().normalize_description("We fix roofs.", 70, 160);
        assert!(out.starts_with("We fix roofs. Serving Detroit & Metro Detroit."));
        assert!(out.contains("Call (313) 389-6324."));
        let len = char_len(&out);
        assert!((70..=160).contains(&len), "{len}: {out}");
    }

    #[test]
    fn suffix_skipped_when_it_would_overflow() {
        let suffixes = vec!["a very long suffix that does not fit".to_string(), "fits".to_string()];
        assert_eq!(extend("Hello", &suffixes, " ", 12, 12), "Hello fits");
    }

    #[test]
    fn empty_title_uses_brand_fallback() {
        let out = normalizer().normalize_title("", 30, 60);
        assert!(!out.is_empty());
        assert!(char_len(&out) <= 60);
        assert_eq!(out, "Midwest Flip LLC | Detroit Home Remodeling");
    }

    #[test]
    fn empty_description_only_gets_first_suffix() {
        let out = normalizer().normalize_description("", 70, 160);
        assert_eq!(out, "Serving Detroit & Metro Detroit.");
    }

    #[test]
    fn long_title_without_brand_is_condensed() {
        let brand = BrandConfig {
            fallback_title: String::new(),
            title_qualifiers: Vec::new(),
            ..BrandConfig::default()
        };
        let n = MetaTextNormalizer::new(&brand);
        // Window too tight for "<title> | <brand>" so segments are ranked
        let out = n.normalize_title("Decks: Metro Detroit Contractor", 45, 48);
        assert!(out.starts_with("Midwest Flip LLC"));
        assert!(out.contains("Metro Detroit Contractor"));
        assert!(char_len(&out) <= 48);
    }

    #[test]
    fn keyword_rich_segment_ranks_first() {
        let n = normalizer();
        let out = n.condense_title(
            "Home Stuff | Best Detroit Remodel Contractor | Midwest Flip LLC | Misc",
            30,
            50,
        );
        assert_eq!(out, "Midwest Flip LLC | Best Detroit Remodel Contractor");
    }

    #[test]
    fn brand_segment_kept_when_already_present() {
        let n = normalizer();
        let out = n.condense_title("Midwest Flip LLC Detroit | Kitchens | Baths", 10, 40);
        assert!(out.starts_with("Midwest Flip LLC Detroit"));
    }

    #[test]
    fn custom_brand_is_used() {
        let brand = BrandConfig {
            name: "Acme Roofing".to_string(),
            phone: "555-0100".to_string(),
            title_qualifiers: vec!["Toledo".to_string()],
            description_suffixes: vec!["Call {{phone}} today.".to_string()],
            keywords: vec!["roof".to_string()],
            fallback_title: "Acme Roofing | Toledo Roof Repair".to_string(),
        };
        let n = MetaTextNormalizer::new(&brand);
        assert_eq!(n.normalize_title("Gutters", 20, 60), "Gutters | Acme Roofing");
        assert_eq!(
            n.normalize_description("Roof repair.", 20, 160),
            "Roof repair. Call 555-0100 today."
        );
    }

    #[test]
    fn text_field_constructors_use_limits() {
        let limits = Limits::default();
        let t = TextField::title("x", &limits);
        assert_eq!((t.min_len, t.max_len, t.kind), (30, 60, FieldKind::Title));
        let d = TextField::description("x", &limits);
        assert_eq!((d.min_len, d.max_len, d.kind), (70, 160, FieldKind::Description));
    }
}
