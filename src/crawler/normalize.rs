//! URL canonicalization for crawl deduplication
//!
//! Two URLs that differ only by query string, fragment or redundant path
//! segments (`.`, `..`, repeated or trailing slashes) normalize to the same
//! canonical URL.

use url::{ParseError, Url};

/// Parse and canonicalize an absolute URL
pub fn normalize(url: &str) -> Result<Url, ParseError> {
    Url::parse(url).map(|parsed| normalize_url(&parsed))
}

/// Canonicalize an already parsed URL
///
/// Drops the query and fragment, then collapses the path POSIX-style.
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_query(None);
    normalized.set_fragment(None);

    if !normalized.cannot_be_a_base() {
        let path = normalize_path(normalized.path());
        normalized.set_path(&path);
    }

    normalized
}

/// Whether two URLs share scheme, host and port
pub fn same_origin(url: &Url, base: &Url) -> bool {
    url.origin() == base.origin()
}

/// Join a possibly relative URL against a base
pub fn resolve_relative(url: &str, base: &Url) -> Result<Url, ParseError> {
    base.join(url.trim())
}

fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}
