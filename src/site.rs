use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::Result;

/// All `*.html` files under `root`, sorted. A file is skipped when any
/// directory between `root` and the file matches an excluded name
/// (case-insensitive).
pub fn html_files(root: &Path, exclude_dirs: &[String]) -> Result<Vec<PathBuf>> {
    let exclude: Vec<String> = exclude_dirs.iter().map(|d| d.to_lowercase()).collect();

    let mut files = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        !exclude.contains(&name)
    });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_html = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("html"));
        if is_html {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Path of `file` relative to `root`, with forward slashes
pub fn relative_path(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Public URL of a page, or None when no base URL is configured
pub fn page_url(base_url: &str, rel_path: &str) -> Option<String> {
    let base = base_url.trim();
    if base.is_empty() {
        return None;
    }
    let rel = rel_path.replace('\\', "/");
    Some(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        rel.trim_start_matches('/')
    ))
}
