//! Test utilities for artifetch
//!
//! - `TestContext` - Wraps a TempDir working directory and a MockServer
//!   standing in for the repository service
//! - Artifact fixtures - Mount files with checksum headers and range support
//! - Search fixtures - Mount canned search results
//!
//! # Example
//!
//! ```ignore
//! use af_io::test_utils::TestContext;
//!
//! #[tokio::test]
//! async fn test_download() {
//!     let ctx = TestContext::new().await;
//!     let entry = ctx.mount_artifact("libs", "com/acme/a.jar", b"jar").await;
//!     ctx.mount_search(&[entry]).await;
//!
//!     let deps = ctx.resolver().download(&spec).await.unwrap();
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use af_core::{ResolverConfig, SearchResultEntry};

use crate::repository::{LATEST_BUILD_ENDPOINT, SEARCH_ENDPOINT};
use crate::resolver::Resolver;
use crate::traits::{MD5_HEADER, SHA1_HEADER, SHA256_HEADER};

// ============================================================================
// Checksum helpers
// ============================================================================

pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Deterministic pseudo-random content of the given size.
pub fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i * 31 % 251) as u8).collect()
}

// ============================================================================
// Responders
// ============================================================================

/// Serves `content`, honoring a single `Range: bytes=start-end` header.
pub struct RangeResponder {
    content: Vec<u8>,
}

impl RangeResponder {
    pub fn new(content: Vec<u8>) -> Self {
        Self { content }
    }

    fn requested_range(&self, request: &Request) -> Option<(usize, usize)> {
        let value = request.headers.get("range")?.to_str().ok()?;
        let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
        let start: usize = start.trim().parse().ok()?;
        let end: usize = end.trim().parse().ok()?;
        (start <= end && end < self.content.len()).then_some((start, end))
    }
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        match self.requested_range(request) {
            Some((start, end)) => ResponseTemplate::new(206)
                .insert_header(
                    "content-range",
                    format!("bytes {start}-{end}/{}", self.content.len()),
                )
                .set_body_bytes(self.content[start..=end].to_vec()),
            None => ResponseTemplate::new(200).set_body_bytes(self.content.clone()),
        }
    }
}

/// HEAD response the service sends for a file.
pub fn file_head_response(content: &[u8], accept_ranges: bool) -> ResponseTemplate {
    let mut response = ResponseTemplate::new(200)
        .insert_header(MD5_HEADER, md5_hex(content))
        .insert_header(SHA1_HEADER, sha1_hex(content))
        .insert_header(SHA256_HEADER, sha256_hex(content))
        .insert_header("content-length", content.len().to_string());
    if accept_ranges {
        response = response.insert_header("accept-ranges", "bytes");
    }
    response
}

// ============================================================================
// Fixtures
// ============================================================================

/// Search result entry describing `repo/file_path` with `content`.
pub fn search_entry(repo: &str, file_path: &str, content: &[u8]) -> SearchResultEntry {
    let (dir, name) = file_path.rsplit_once('/').unwrap_or((".", file_path));
    SearchResultEntry {
        repo: repo.to_string(),
        path: dir.to_string(),
        name: name.to_string(),
        size: content.len() as u64,
        item_type: "file".to_string(),
        actual_md5: md5_hex(content),
        actual_sha1: sha1_hex(content),
        properties: Vec::new(),
    }
}

pub fn search_results_json(entries: &[SearchResultEntry]) -> String {
    serde_json::json!({ "results": entries }).to_string()
}

// ============================================================================
// TestContext - Main test infrastructure
// ============================================================================

/// Test context that wraps common test setup.
///
/// Provides:
/// - Temporary working directory for downloads
/// - Mock server answering search, build and file requests
/// - A resolver pointed at both
pub struct TestContext {
    pub tmp: TempDir,
    pub mock_server: MockServer,
}

impl TestContext {
    pub async fn new() -> Self {
        let mock_server = MockServer::start().await;
        let tmp = TempDir::new().expect("failed to create temp dir");
        Self { tmp, mock_server }
    }

    /// Directory downloads land in.
    pub fn working_dir(&self) -> PathBuf {
        self.tmp.path().join("work")
    }

    pub fn config(&self) -> ResolverConfig {
        ResolverConfig::new(self.mock_server.uri(), self.working_dir())
    }

    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.config())
    }

    pub fn resolver_with(&self, config: ResolverConfig) -> Resolver {
        Resolver::new(config)
    }

    /// Mount HEAD and GET for `repo/file_path` and return its search entry.
    pub async fn mount_artifact(
        &self,
        repo: &str,
        file_path: &str,
        content: &[u8],
    ) -> SearchResultEntry {
        self.mount_artifact_expecting(repo, file_path, content, None)
            .await
    }

    /// Like [`TestContext::mount_artifact`], verifying the number of GET
    /// requests when the server is dropped.
    pub async fn mount_artifact_expecting(
        &self,
        repo: &str,
        file_path: &str,
        content: &[u8],
        gets: Option<u64>,
    ) -> SearchResultEntry {
        let url_path = format!("/{repo}/{file_path}");

        Mock::given(method("HEAD"))
            .and(path(url_path.clone()))
            .respond_with(file_head_response(content, true))
            .mount(&self.mock_server)
            .await;

        let get = Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(RangeResponder::new(content.to_vec()));
        match gets {
            Some(count) => get.expect(count).mount(&self.mock_server).await,
            None => get.mount(&self.mock_server).await,
        }

        search_entry(repo, file_path, content)
    }

    /// Mount a folder: HEAD without checksums.
    pub async fn mount_folder(&self, repo: &str, folder: &str) {
        Mock::given(method("HEAD"))
            .and(path(format!("/{repo}/{folder}")))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.mock_server)
            .await;
    }

    /// Answer every search with `entries`.
    pub async fn mount_search(&self, entries: &[SearchResultEntry]) {
        Mock::given(method("POST"))
            .and(path(format!("/api/{SEARCH_ENDPOINT}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(search_results_json(entries)))
            .mount(&self.mock_server)
            .await;
    }

    /// Answer symbolic build lookups with `number`, or as unknown.
    pub async fn mount_latest_build(&self, number: Option<&str>) {
        let body = match number {
            Some(number) => serde_json::json!([{ "buildNumber": number }]),
            None => serde_json::json!([]),
        };
        Mock::given(method("POST"))
            .and(path(format!("/api/{LATEST_BUILD_ENDPOINT}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.mock_server)
            .await;
    }

    /// Requests the server received for `url_path` with `http_method`.
    pub async fn requests_to(&self, http_method: &str, url_path: &str) -> usize {
        self.mock_server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == http_method && r.url.path() == url_path)
            .count()
    }
}

/// Progress sink that records every event, for asserting on the event stream.
pub fn recording_progress() -> (
    crate::progress::ProgressCallback,
    Arc<std::sync::Mutex<Vec<crate::progress::DownloadProgress>>>,
) {
    let events = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = events.clone();
    let callback: crate::progress::ProgressCallback = Arc::new(move |event| {
        if let Ok(mut events) = sink.lock() {
            events.push(event);
        }
    });
    (callback, events)
}

// ============================================================================
// Module tests
// ============================================================================
