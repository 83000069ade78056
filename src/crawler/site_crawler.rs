//! Depth-bounded, same-origin traversal over an explicit worklist

use std::collections::HashSet;
use std::path::PathBuf;

use futures::future::join_all;
use reqwest::{Client, StatusCode, redirect};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::crawler::content_extraction::extract_page;
use crate::crawler::error::CrawlError;
use crate::crawler::normalize::{normalize, normalize_url, same_origin};
use crate::crawler::storage::Storage;
use crate::crawler::{CrawledDocument, CrawlerConfig, DocumentType};

/// Per-invocation crawl state
///
/// Owned by a single crawl. Two crawls over different origins each get their
/// own state and never observe each other's visited URLs.
#[derive(Debug, Default)]
pub struct CrawlState {
    visited: HashSet<String>,
    root: Option<Url>,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a normalized URL has been seen
    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str())
    }

    /// Record a URL; returns false if it was already present
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(url.to_string())
    }

    /// Origin used for same-origin filtering, fixed by the first successful fetch
    pub fn root(&self) -> Option<&Url> {
        self.root.as_ref()
    }

    pub fn visited(&self) -> &HashSet<String> {
        &self.visited
    }
}

/// Outcome of one crawl invocation
#[derive(Debug, Default)]
pub struct CrawlReport {
    /// Documents in emission order
    pub documents: Vec<CrawledDocument>,

    /// Artifact paths, parallel to `documents` when storage is configured
    pub artifacts: Vec<PathBuf>,

    /// Every URL visited, requested and canonical
    pub visited: HashSet<String>,

    /// Branches abandoned on fetch or extraction failure
    pub dead_branches: usize,

    /// Pages whose canonical URL had already been processed
    pub duplicates: usize,
}

struct FetchedPage {
    final_url: Url,
    body: String,
}

/// Site crawler
#[derive(Debug, Clone)]
pub struct Crawler {
    config: CrawlerConfig,
    client: Client,
    storage: Option<Storage>,
}

impl Crawler {
    /// Create a crawler with its own HTTP client
    pub fn new(config: CrawlerConfig) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .redirect(redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            config,
            client,
            storage: None,
        })
    }

    /// Write every emitted document to `storage`
    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Crawl a site starting at `start_url` with fresh state
    pub async fn crawl(&self, start_url: &str) -> Result<CrawlReport, CrawlError> {
        let mut state = CrawlState::new();
        self.crawl_with_state(start_url, &mut state).await
    }

    /// Crawl using caller-owned state
    ///
    /// Only a malformed start URL or an artifact write failure is returned as an
    /// error. Fetch and extraction failures abandon their branch and are counted
    /// in the report.
    #[instrument(skip(self, state), fields(max_depth = self.config.max_depth))]
    pub async fn crawl_with_state(
        &self,
        start_url: &str,
        state: &mut CrawlState,
    ) -> Result<CrawlReport, CrawlError> {
        let start = normalize(start_url)?;
        info!("Starting crawl for {}", start);

        let mut report = CrawlReport::default();
        let mut worklist: Vec<(Url, u32)> = vec![(start, 0)];

        while !worklist.is_empty() {
            let mut wave = Vec::with_capacity(self.config.concurrency);
            while wave.len() < self.config.concurrency {
                let Some((url, depth)) = worklist.pop() else {
                    break;
                };
                if state.mark_visited(&url) {
                    wave.push((url, depth));
                }
            }

            let fetched = join_all(wave.iter().map(|(url, _)| self.fetch(url))).await;

            for ((requested, depth), result) in wave.into_iter().zip(fetched) {
                match result {
                    Ok(page) => {
                        self.visit(&requested, depth, page, state, &mut worklist, &mut report)
                            .await?;
                    }
                    Err(CrawlError::Status { url, status }) => {
                        debug!("Dead end at {} (status {})", url, status);
                        report.dead_branches += 1;
                    }
                    Err(e) => {
                        warn!("Failed to fetch {}: {}", requested, e);
                        report.dead_branches += 1;
                    }
                }
            }
        }

        info!(
            "Crawl finished: {} documents, {} visited, {} dead branches",
            report.documents.len(),
            state.visited.len(),
            report.dead_branches
        );
        report.visited = state.visited.clone();
        Ok(report)
    }

    async fn fetch(&self, url: &Url) -> Result<FetchedPage, CrawlError> {
        debug!("Fetching {}", url);
        let response = self.client.get(url.clone()).send().await?;
        if response.status() != StatusCode::OK {
            return Err(CrawlError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let final_url = response.url().clone();
        let body = response.text().await?;
        Ok(FetchedPage { final_url, body })
    }

    /// Extract, emit and expand one fetched page
    async fn visit(
        &self,
        requested: &Url,
        depth: u32,
        page: FetchedPage,
        state: &mut CrawlState,
        worklist: &mut Vec<(Url, u32)>,
        report: &mut CrawlReport,
    ) -> Result<(), CrawlError> {
        if state.root.is_none() {
            state.root = Some(normalize_url(&page.final_url));
        }

        let extracted = match extract_page(&page.body, &page.final_url) {
            Ok(extracted) => extracted,
            Err(e) => {
                warn!("Skipping {}: {}", requested, e);
                state.mark_visited(&normalize_url(&page.final_url));
                report.dead_branches += 1;
                return Ok(());
            }
        };

        let identity = extracted.identity;
        if &identity != requested && state.is_visited(&identity) {
            debug!("{} is a duplicate of {}", requested, identity);
            report.duplicates += 1;
            return Ok(());
        }
        state.mark_visited(&identity);

        let Some(title) = extracted.title else {
            warn!(
                "Skipping {}: {}",
                requested,
                CrawlError::NotHtml(identity.to_string())
            );
            report.dead_branches += 1;
            return Ok(());
        };

        let document = CrawledDocument {
            url: identity.to_string(),
            title,
            doc_type: DocumentType::School,
            metadata: extracted.metadata,
            image_metadata: extracted.image_metadata,
            content: extracted.plain_text,
        };

        if let Some(storage) = &self.storage {
            let path = storage.store(&document).await?;
            debug!("Stored {} as {}", document.url, path.display());
            report.artifacts.push(path);
        }
        info!("Crawled {} (depth {})", document.url, depth);
        report.documents.push(document);

        if depth > self.config.max_depth {
            return Ok(());
        }

        let Some(root) = state.root.clone() else {
            return Ok(());
        };
        // Reverse so the first link on the page is popped first.
        for link in extracted.outbound_urls.into_iter().rev() {
            if !matches!(link.scheme(), "http" | "https") {
                continue;
            }
            if same_origin(&link, &root) && !state.is_visited(&link) {
                worklist.push((link, depth + 1));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::StorageConfig;
    use mockito::{Server, ServerGuard};
    use tempfile::TempDir;

    fn page(title: &str, canonical: Option<&str>, links: &[&str]) -> String {
        let canonical = canonical
            .map(|href| format!(r#"<link rel="canonical" href="{}">"#, href))
            .unwrap_or_default();
        let anchors: String = links
            .iter()
            .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href))
            .collect();
        format!(
            "<html><head><title>{title}</title>{canonical}</head>\
             <body><main><p>{title} text</p>{anchors}</main></body></html>"
        )
    }

    async fn serve(server: &mut ServerGuard, path: &str, body: String) {
        server
            .mock("GET", path)
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(body)
            .create_async()
            .await;
    }

    fn crawler(max_depth: u32) -> Crawler {
        Crawler::new(CrawlerConfig::builder().max_depth(max_depth).build()).unwrap()
    }

    fn paths(report: &CrawlReport) -> Vec<String> {
        report
            .documents
            .iter()
            .map(|d| Url::parse(&d.url).unwrap().path().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_canonical_duplicates_are_emitted_once() {
        let mut server = Server::new_async().await;
        serve(&mut server, "/", page("Home", None, &["/a", "/b"])).await;
        serve(&mut server, "/a", page("A", Some("/c"), &[])).await;
        serve(&mut server, "/b", page("B", Some("/c"), &[])).await;

        let report = crawler(5).crawl(&server.url()).await.unwrap();

        assert_eq!(paths(&report), vec!["/", "/c"]);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.documents[1].title, "A");
    }

    #[tokio::test]
    async fn test_redirects_into_same_target_are_processed_once() {
        let mut server = Server::new_async().await;
        serve(&mut server, "/", page("Home", None, &["/r1", "/r2"])).await;
        for from in ["/r1", "/r2"] {
            server
                .mock("GET", from)
                .with_status(302)
                .with_header("location", "/target")
                .create_async()
                .await;
        }
        serve(&mut server, "/target", page("Target", None, &[])).await;

        let report = crawler(5).crawl(&server.url()).await.unwrap();

        assert_eq!(paths(&report), vec!["/", "/target"]);
        assert_eq!(report.duplicates, 1);
    }

    #[tokio::test]
    async fn test_cycles_terminate() {
        let mut server = Server::new_async().await;
        serve(&mut server, "/", page("Home", None, &["/a"])).await;
        serve(&mut server, "/a", page("A", None, &["/", "/a?x=1", "/a#top"])).await;

        let report = crawler(5).crawl(&server.url()).await.unwrap();

        assert_eq!(paths(&report), vec!["/", "/a"]);
        let unique: HashSet<&String> = report.documents.iter().map(|d| &d.url).collect();
        assert_eq!(unique.len(), report.documents.len());
    }

    #[tokio::test]
    async fn test_failed_branch_does_not_stop_siblings() {
        let mut server = Server::new_async().await;
        serve(&mut server, "/", page("Home", None, &["/missing", "/ok"])).await;
        server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;
        serve(&mut server, "/ok", page("Ok", None, &[])).await;

        let report = crawler(5).crawl(&server.url()).await.unwrap();

        assert_eq!(paths(&report), vec!["/", "/ok"]);
        assert_eq!(report.dead_branches, 1);
    }

    #[tokio::test]
    async fn test_timed_out_fetch_is_a_dead_branch() {
        use std::io::Write as _;

        let mut server = Server::new_async().await;
        serve(&mut server, "/", page("Home", None, &["/slow", "/ok"])).await;
        server
            .mock("GET", "/slow")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_chunked_body(|w| {
                std::thread::sleep(std::time::Duration::from_secs(3));
                w.write_all(page("Slow", None, &[]).as_bytes())
            })
            .create_async()
            .await;
        serve(&mut server, "/ok", page("Ok", None, &[])).await;

        let crawler = Crawler::new(CrawlerConfig::builder().timeout_secs(1).build()).unwrap();
        let report = crawler.crawl(&server.url()).await.unwrap();

        assert_eq!(paths(&report), vec!["/", "/ok"]);
        assert_eq!(report.dead_branches, 1);
    }

    #[tokio::test]
    async fn test_crawl_states_are_isolated() {
        let mut first = Server::new_async().await;
        serve(&mut first, "/", page("First", None, &["/a"])).await;
        serve(&mut first, "/a", page("First A", None, &[])).await;
        let mut second = Server::new_async().await;
        serve(&mut second, "/", page("Second", None, &["/a", "/b"])).await;
        serve(&mut second, "/a", page("Second A", None, &[])).await;
        serve(&mut second, "/b", page("Second B", None, &[])).await;

        let crawler = crawler(5);
        let mut first_state = CrawlState::new();
        let mut second_state = CrawlState::new();
        let first_report = crawler
            .crawl_with_state(&first.url(), &mut first_state)
            .await
            .unwrap();
        let second_report = crawler
            .crawl_with_state(&second.url(), &mut second_state)
            .await
            .unwrap();

        assert_eq!(paths(&first_report), vec!["/", "/a"]);
        assert_eq!(paths(&second_report), vec!["/", "/a", "/b"]);
        assert_ne!(first_state.root(), second_state.root());
        assert_eq!(
            first_state.root().unwrap().port(),
            Url::parse(&first.url()).unwrap().port()
        );
        assert!(first_state.visited().is_disjoint(second_state.visited()));

        // State carried in by the caller is honoured
        let mut seeded = CrawlState::new();
        seeded.mark_visited(&normalize(&format!("{}/a", second.url())).unwrap());
        let report = crawler
            .crawl_with_state(&second.url(), &mut seeded)
            .await
            .unwrap();
        assert_eq!(paths(&report), vec!["/", "/b"]);
    }

    #[tokio::test]
    async fn test_untitled_duplicate_counts_as_duplicate() {
        let mut server = Server::new_async().await;
        serve(&mut server, "/", page("Home", None, &["/a", "/b"])).await;
        serve(&mut server, "/a", page("A", Some("/c"), &[])).await;
        serve(
            &mut server,
            "/b",
            r#"<html><head><link rel="canonical" href="/c"></head><body><p>b</p></body></html>"#
                .to_string(),
        )
        .await;

        let report = crawler(5).crawl(&server.url()).await.unwrap();

        assert_eq!(paths(&report), vec!["/", "/c"]);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.dead_branches, 0);
    }

    #[tokio::test]
    async fn test_untitled_pages_are_skipped() {
        let mut server = Server::new_async().await;
        serve(&mut server, "/", page("Home", None, &["/raw"])).await;
        serve(&mut server, "/raw", "<html><body><p>no title</p></body></html>".to_string()).await;

        let report = crawler(5).crawl(&server.url()).await.unwrap();

        assert_eq!(paths(&report), vec!["/"]);
        assert_eq!(report.dead_branches, 1);
    }

    #[tokio::test]
    async fn test_depth_bound() {
        let mut server = Server::new_async().await;
        serve(&mut server, "/", page("Root", None, &["/1"])).await;
        serve(&mut server, "/1", page("One", None, &["/2"])).await;
        serve(&mut server, "/2", page("Two", None, &["/3"])).await;
        let deepest = server
            .mock("GET", "/3")
            .with_status(200)
            .with_body(page("Three", None, &[]))
            .expect(0)
            .create_async()
            .await;

        let report = crawler(1).crawl(&server.url()).await.unwrap();

        assert_eq!(paths(&report), vec!["/", "/1", "/2"]);
        deepest.assert_async().await;
    }

    #[tokio::test]
    async fn test_other_origins_are_not_followed() {
        let mut server = Server::new_async().await;
        serve(
            &mut server,
            "/",
            page(
                "Home",
                None,
                &["https://other.example.org/", "mailto:office@uni.example.edu", "/local"],
            ),
        )
        .await;
        serve(&mut server, "/local", page("Local", None, &[])).await;

        let report = crawler(5).crawl(&server.url()).await.unwrap();

        assert_eq!(paths(&report), vec!["/", "/local"]);
        assert!(!report.visited.contains("https://other.example.org/"));
    }

    #[tokio::test]
    async fn test_documents_are_written_to_storage() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::with_config(StorageConfig {
            base_path: dir.path().to_path_buf(),
        });
        let mut server = Server::new_async().await;
        serve(&mut server, "/", page("Home", None, &["/a"])).await;
        serve(&mut server, "/a", page("A", None, &[])).await;

        let report = crawler(5)
            .with_storage(storage.clone())
            .crawl(&server.url())
            .await
            .unwrap();

        assert_eq!(report.artifacts.len(), 2);
        let stored = storage.load(&report.artifacts[1]).await.unwrap();
        assert_eq!(stored, report.documents[1]);
        assert_eq!(stored.doc_type, DocumentType::School);
        assert_eq!(stored.content, "A text");
    }

    #[tokio::test]
    async fn test_concurrent_fetching_finds_same_pages() {
        let mut server = Server::new_async().await;
        serve(&mut server, "/", page("Home", None, &["/a", "/b", "/c"])).await;
        serve(&mut server, "/a", page("A", None, &["/b", "/d"])).await;
        serve(&mut server, "/b", page("B", Some("/d"), &[])).await;
        serve(&mut server, "/c", page("C", None, &["/"])).await;
        serve(&mut server, "/d", page("D", None, &[])).await;

        let sequential = crawler(5).crawl(&server.url()).await.unwrap();
        let parallel = Crawler::new(CrawlerConfig::builder().concurrency(4).build())
            .unwrap()
            .crawl(&server.url())
            .await
            .unwrap();

        let mut expected = paths(&sequential);
        let mut actual = paths(&parallel);
        expected.sort();
        actual.sort();
        assert_eq!(actual, expected);
        assert_eq!(expected, vec!["/", "/a", "/c", "/d"]);
    }

    #[tokio::test]
    async fn test_malformed_start_url() {
        assert!(matches!(
            crawler(5).crawl("not a url").await,
            Err(CrawlError::UrlParse(_))
        ));
    }
}
