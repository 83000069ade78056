//! Content extraction functionality for the crawler module
//!
//! Header and footer elements are pruned before anything else is looked at,
//! so they can never leak into the main content, not even through the
//! sibling inclusion of the skip-link rule.

use crate::crawler::error::CrawlError;
use crate::crawler::normalize::{normalize_url, resolve_relative};
use crate::crawler::{ImageMetadata, MetaTag};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// Elements whose text makes up the plain-text content
const TEXT_ELEMENTS: [&str; 10] = ["h1", "h2", "h3", "h4", "h5", "h6", "p", "ul", "ol", "dl"];

static SKIP_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)skip.*main\scontent").expect("skip-link pattern is valid"));

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\s*\n\s*)+").expect("blank-line pattern is valid"));

/// Which rule located the main content region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainContent {
    /// A `<main>` element
    MainElement,
    /// An element with `id="main"`
    MainId,
    /// The target of a "skip to main content" link, plus its following siblings
    SkipLinkTarget,
    /// Fallback to `<body>`
    Body,
}

/// Everything the crawler needs from one HTML page
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    /// `rel="canonical"` target, resolved and normalized
    pub canonical_url: Option<Url>,

    /// Canonical link if present, otherwise the normalized page URL
    pub identity: Url,

    /// Contents of `<title>`; a page without one is not treated as HTML
    pub title: Option<String>,

    /// Named meta tags
    pub metadata: Vec<MetaTag>,

    /// Rule that selected the main content
    pub main_content: MainContent,

    /// Images inside the main content region
    pub image_metadata: Vec<ImageMetadata>,

    /// Text of headings, paragraphs and lists in the main content
    pub plain_text: String,

    /// Every `<a href>` of the page, resolved against `identity` and normalized
    pub outbound_urls: Vec<Url>,
}

/// Extract title, metadata, main content and links from a fetched page
///
/// # Arguments
///
/// * `html` - The HTML of the page
/// * `page_url` - The URL the page was served from (after redirects)
///
/// # Returns
///
/// The extracted page. A missing title is reported as `None` so the caller can
/// still deduplicate on the page's identity before skipping it.
pub fn extract_page(html: &str, page_url: &Url) -> Result<ExtractedPage, CrawlError> {
    let document = Html::parse_document(html);

    let canonical_url = find_canonical_link(&document, page_url)?;
    let identity = canonical_url
        .clone()
        .unwrap_or_else(|| normalize_url(page_url));

    let title = extract_title(&document)?;
    let metadata = extract_metadata(&document)?;
    let outbound_urls = extract_urls(&document, &identity)?;

    let (main_content, roots) = find_main_content(&document)?;
    let image_metadata = extract_image_metadata(&roots, &identity);
    let plain_text = extract_plain_text(&roots);

    Ok(ExtractedPage {
        canonical_url,
        identity,
        title,
        metadata,
        main_content,
        image_metadata,
        plain_text,
        outbound_urls,
    })
}

fn selector(css: &str) -> Result<Selector, CrawlError> {
    Selector::parse(css)
        .map_err(|e| CrawlError::HtmlParse(format!("Failed to parse selector '{}': {}", css, e)))
}

fn is_header_or_footer(name: &str) -> bool {
    name == "header" || name == "footer"
}

/// Whether the element is a header/footer or sits inside one
fn is_pruned(element: &ElementRef) -> bool {
    is_header_or_footer(element.value().name())
        || element.ancestors().any(|node| {
            node.value()
                .as_element()
                .is_some_and(|e| is_header_or_footer(e.name()))
        })
}

fn find_canonical_link(document: &Html, page_url: &Url) -> Result<Option<Url>, CrawlError> {
    let canonical = selector(r#"[rel~="canonical"][href]"#)?;
    Ok(document
        .select(&canonical)
        .filter_map(|e| e.value().attr("href"))
        .find_map(|href| resolve_relative(href, page_url).ok())
        .map(|url| normalize_url(&url)))
}

fn extract_title(document: &Html) -> Result<Option<String>, CrawlError> {
    let title = selector("title")?;
    Ok(document
        .select(&title)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty()))
}

/// Collect `<meta>` tags that carry a `name` attribute
pub fn extract_metadata(document: &Html) -> Result<Vec<MetaTag>, CrawlError> {
    let meta = selector("meta[name]")?;
    Ok(document
        .select(&meta)
        .filter_map(|e| {
            let name = e.value().attr("name")?;
            Some(MetaTag {
                name: name.to_string(),
                content: e.value().attr("content").map(str::to_string),
            })
        })
        .collect())
}

fn extract_urls(document: &Html, base: &Url) -> Result<Vec<Url>, CrawlError> {
    let anchors = selector("a[href]")?;
    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    for href in document.select(&anchors).filter_map(|e| e.value().attr("href")) {
        let Ok(resolved) = resolve_relative(href, base) else {
            continue;
        };
        let normalized = normalize_url(&resolved);
        if seen.insert(normalized.to_string()) {
            urls.push(normalized);
        }
    }
    Ok(urls)
}

/// Locate the main content region; the first matching rule wins
fn find_main_content(document: &Html) -> Result<(MainContent, Vec<ElementRef<'_>>), CrawlError> {
    let main = selector("main")?;
    if let Some(element) = document.select(&main).find(|e| !is_pruned(e)) {
        return Ok((MainContent::MainElement, vec![element]));
    }

    let main_id = selector(r#"[id="main"]"#)?;
    if let Some(element) = document.select(&main_id).find(|e| !is_pruned(e)) {
        return Ok((MainContent::MainId, vec![element]));
    }

    if let Some(target) = find_skip_link_target(document)? {
        let mut roots = vec![target];
        roots.extend(
            target
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .filter(|e| !is_pruned(e)),
        );
        return Ok((MainContent::SkipLinkTarget, roots));
    }

    let body = selector("body")?;
    let root = document
        .select(&body)
        .next()
        .unwrap_or_else(|| document.root_element());
    Ok((MainContent::Body, vec![root]))
}

fn find_skip_link_target(document: &Html) -> Result<Option<ElementRef<'_>>, CrawlError> {
    let anchors = selector("a[href]")?;
    let target_id = document
        .select(&anchors)
        .filter(|e| !is_pruned(e))
        .filter(|e| SKIP_LINK.is_match(&e.text().collect::<String>()))
        .find_map(|e| e.value().attr("href")?.strip_prefix('#').map(str::to_string));

    let Some(target_id) = target_id.filter(|id| !id.is_empty()) else {
        return Ok(None);
    };

    let any_with_id = selector("[id]")?;
    Ok(document
        .select(&any_with_id)
        .find(|e| e.value().id() == Some(target_id.as_str()) && !is_pruned(e)))
}

fn extract_image_metadata(roots: &[ElementRef], base: &Url) -> Vec<ImageMetadata> {
    roots
        .iter()
        .flat_map(|root| root.descendants().filter_map(ElementRef::wrap))
        .filter(|e| e.value().name() == "img" && !is_pruned(e))
        .filter_map(|img| {
            let src = img.value().attr("src")?;
            let src = resolve_relative(src, base).ok()?;
            Some(ImageMetadata {
                src: src.to_string(),
                alt: img.value().attr("alt").map(str::to_string),
            })
        })
        .collect()
}

fn extract_plain_text(roots: &[ElementRef]) -> String {
    let mut elements = Vec::new();
    for root in roots {
        collect_text_elements(*root, &mut elements);
    }

    let text = elements
        .iter()
        .map(|e| e.text().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n");

    remove_duplicate_eol(&text)
}

/// Walk the subtree, keeping the outermost text elements in document order
fn collect_text_elements<'a>(element: ElementRef<'a>, out: &mut Vec<ElementRef<'a>>) {
    if is_pruned(&element) {
        return;
    }
    if TEXT_ELEMENTS.contains(&element.value().name()) {
        out.push(element);
        return;
    }
    for child in element.children().filter_map(ElementRef::wrap) {
        collect_text_elements(child, out);
    }
}

/// Collapse every run of newline-containing whitespace into a single newline
pub fn remove_duplicate_eol(text: &str) -> String {
    BLANK_LINES.replace_all(text, "\n").trim().to_string()
}
