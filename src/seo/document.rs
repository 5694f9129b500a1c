use regex::Regex;
use scraper::node::{Node, Text};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::sync::OnceLock;

use super::normalize::normalize_space;

/// An `<img>` as seen by the audit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub src: String,
    pub alt: Option<String>,
    pub decorative: bool,
}

/// A parsed page. Reads and edits go through the DOM tree; `html()`
/// serializes the (possibly edited) tree back to markup.
pub struct PageDocument {
    doc: Html,
}

impl PageDocument {
    pub fn parse(html: &str) -> Self {
        PageDocument {
            doc: Html::parse_document(html),
        }
    }

    pub fn html(&self) -> String {
        self.doc.html()
    }

    /// Text of the first `<title>`, whitespace-collapsed. `Some("")` for an empty tag.
    pub fn title(&self) -> Option<String> {
        self.title_element()
            .map(|el| normalize_space(&el.text().collect::<String>()))
    }

    /// `content` of the first `<meta name="...">`, compared case-insensitively.
    pub fn meta_by_name(&self, name: &str) -> Option<String> {
        self.meta_element("name", name)
            .and_then(|el| el.value().attr("content"))
            .map(normalize_space)
    }

    /// `content` of the first `<meta property="...">` (Open Graph).
    pub fn meta_by_property(&self, property: &str) -> Option<String> {
        self.meta_element("property", property)
            .and_then(|el| el.value().attr("content"))
            .map(normalize_space)
    }

    /// Replace the text of the first `<title>`. Returns false without a title tag.
    pub fn set_title(&mut self, text: &str) -> bool {
        let Some(title) = self.title_element() else {
            return false;
        };
        let title_id = title.id();
        let text_ids: Vec<_> = title
            .children()
            .filter(|c| matches!(c.value(), Node::Text(_)))
            .map(|c| c.id())
            .collect();

        for id in text_ids {
            if let Some(mut child) = self.doc.tree.get_mut(id) {
                child.detach();
            }
        }
        match self.doc.tree.get_mut(title_id) {
            Some(mut node) => {
                node.append(Node::Text(Text { text: text.into() }));
                true
            }
            None => false,
        }
    }

    pub fn set_meta_by_name(&mut self, name: &str, content: &str) -> bool {
        self.set_meta_content("name", name, content)
    }

    pub fn set_meta_by_property(&mut self, property: &str, content: &str) -> bool {
        self.set_meta_content("property", property, content)
    }

    /// Number of elements matching a CSS selector. Invalid selectors count as zero.
    pub fn count(&self, selector: &str) -> usize {
        match Selector::parse(selector) {
            Ok(sel) => self.doc.select(&sel).count(),
            Err(_) => 0,
        }
    }

    /// Tag name of the first `h1` or `h2` in document order
    pub fn first_heading(&self) -> Option<String> {
        let sel = Selector::parse("h1, h2").ok()?;
        self.doc
            .select(&sel)
            .next()
            .map(|el| el.value().name().to_ascii_lowercase())
    }

    pub fn images(&self) -> Vec<ImageInfo> {
        let Ok(sel) = Selector::parse("img") else {
            return Vec::new();
        };
        self.doc
            .select(&sel)
            .map(|el| {
                let v = el.value();
                let role = v.attr("role").unwrap_or("").trim().to_lowercase();
                let hidden = v.attr("aria-hidden").unwrap_or("").trim().to_lowercase();
                ImageInfo {
                    src: normalize_space(v.attr("src").unwrap_or("")),
                    alt: v.attr("alt").map(str::to_string),
                    decorative: role == "presentation" || hidden == "true" || hidden == "1",
                }
            })
            .collect()
    }

    /// Whitespace-collapsed text of every element matching `selector`
    pub fn texts(&self, selector: &str) -> Vec<String> {
        let Ok(sel) = Selector::parse(selector) else {
            return Vec::new();
        };
        self.doc
            .select(&sel)
            .map(|el| normalize_space(&el.text().collect::<String>()))
            .collect()
    }

    /// Every reference that may point at an asset: `src` and `href`
    /// attributes, `og:image`, and `url(...)` in inline styles and
    /// `<style>` blocks. Sorted, without duplicates.
    pub fn asset_refs(&self) -> Vec<String> {
        let mut refs = BTreeSet::new();
        let Ok(all) = Selector::parse("*") else {
            return Vec::new();
        };

        for el in self.doc.select(&all) {
            let v = el.value();
            for attr in ["src", "href"] {
                if let Some(r) = v.attr(attr) {
                    refs.insert(r.trim().to_string());
                }
            }
            if v.name() == "meta"
                && v.attr("property").is_some_and(|p| p.trim().eq_ignore_ascii_case("og:image"))
            {
                if let Some(r) = v.attr("content") {
                    refs.insert(r.trim().to_string());
                }
            }
            if let Some(style) = v.attr("style") {
                refs.extend(css_urls(style));
            }
            if v.name() == "style" {
                refs.extend(css_urls(&el.text().collect::<String>()));
            }
        }

        refs.into_iter().filter(|r| !r.is_empty()).collect()
    }

    fn title_element(&self) -> Option<ElementRef<'_>> {
        let sel = Selector::parse("title").ok()?;
        self.doc.select(&sel).next()
    }

    fn meta_element(&self, key: &str, value: &str) -> Option<ElementRef<'_>> {
        let sel = Selector::parse("meta").ok()?;
        self.doc.select(&sel).find(|el| {
            el.value()
                .attr(key)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case(value))
        })
    }

    /// Rewrite `content` on the first matching meta tag. Tags without a
    /// `content` attribute are left alone.
    fn set_meta_content(&mut self, key: &str, value: &str, content: &str) -> bool {
        let Some(id) = self.meta_element(key, value).map(|el| el.id()) else {
            return false;
        };
        let Some(mut node) = self.doc.tree.get_mut(id) else {
            return false;
        };
        let Node::Element(element) = node.value() else {
            return false;
        };

        let mut updated = false;
        for (attr_name, attr_value) in element.attrs.iter_mut() {
            if &*attr_name.local == "content" {
                *attr_value = content.into();
                updated = true;
                break;
            }
        }
        updated
    }
}

fn css_urls(css: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)url\(([^)]+)\)").unwrap());
    re.captures_iter(css)
        .map(|c| c[1].trim().trim_matches(|ch| ch == '"' || ch == '\'').trim().to_string())
        .collect()
}
