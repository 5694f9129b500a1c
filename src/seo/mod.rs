pub mod analytics;
pub mod audit;
pub mod document;
pub mod fix;
pub mod normalize;
pub mod services;
pub mod sitemap;

// Re-export commonly used items
pub use normalize::{FieldKind, MetaTextNormalizer, TextField};

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
