//! HTTP transport seam.
//!
//! Everything that talks to the repository goes through [`HttpClient`], so
//! tests can swap in a mock transport or a wiremock-backed real one.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
#[cfg(test)]
use mockall::automock;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, RANGE};
use tokio::io::AsyncWriteExt;

use af_core::Error;
use af_core::config::DEFAULT_USER_AGENT;

pub const MD5_HEADER: &str = "x-checksum-md5";
pub const SHA1_HEADER: &str = "x-checksum-sha1";
pub const SHA256_HEADER: &str = "x-checksum-sha256";

/// What a HEAD request reports about a remote file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteFileInfo {
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
    pub size: u64,
    pub accept_ranges: bool,
}

impl RemoteFileInfo {
    /// Folders are served without checksums.
    pub fn is_directory(&self) -> bool {
        self.md5.is_none() && self.sha1.is_none()
    }

    fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            md5: text(MD5_HEADER),
            sha1: text(SHA1_HEADER),
            sha256: text(SHA256_HEADER),
            size: text(CONTENT_LENGTH.as_str())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            accept_ranges: text(ACCEPT_RANGES.as_str()).is_some_and(|v| v == "bytes"),
        }
    }
}

/// Inclusive byte range, rendered as `bytes=start-end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn head(&self, url: &str) -> Result<RemoteFileInfo, Error>;

    /// Stream the body of `url` (or one range of it) into `dest`, returning
    /// the number of bytes written.
    async fn download(&self, url: &str, range: Option<ByteRange>, dest: &Path) -> Result<u64, Error>;

    /// POST a plain-text body and return the response body.
    async fn post_text(&self, url: &str, body: String) -> Result<Vec<u8>, Error>;

    /// POST a JSON body and return the response body.
    async fn post_json(&self, url: &str, body: serde_json::Value) -> Result<Vec<u8>, Error>;
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(user_agent)
                .pool_max_idle_per_host(10)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn network(e: impl std::fmt::Display) -> Error {
    Error::NetworkFailure {
        message: e.to_string(),
    }
}

fn check_status(url: &str, status: StatusCode) -> Result<(), Error> {
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::NetworkFailure {
            message: format!("HTTP {status} for {url}"),
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn head(&self, url: &str) -> Result<RemoteFileInfo, Error> {
        let response = self.client.head(url).send().await.map_err(network)?;
        check_status(url, response.status())?;
        Ok(RemoteFileInfo::from_headers(response.headers()))
    }

    async fn download(&self, url: &str, range: Option<ByteRange>, dest: &Path) -> Result<u64, Error> {
        let mut request = self.client.get(url);
        if let Some(range) = range {
            request = request.header(RANGE, range.header_value());
        }
        let response = request.send().await.map_err(network)?;
        check_status(url, response.status())?;
        if range.is_some() && response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(Error::NetworkFailure {
                message: format!("server ignored range request for {url}"),
            });
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::file_system(dest, e))?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(network)?;
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::file_system(dest, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| Error::file_system(dest, e))?;

        Ok(written)
    }

    async fn post_text(&self, url: &str, body: String) -> Result<Vec<u8>, Error> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(network)?;
        check_status(url, response.status())?;
        response.bytes().await.map(|b| b.to_vec()).map_err(network)
    }

    async fn post_json(&self, url: &str, body: serde_json::Value) -> Result<Vec<u8>, Error> {
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(network)?;
        check_status(url, response.status())?;
        response.bytes().await.map(|b| b.to_vec()).map_err(network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use tempfile::TempDir;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // ========================================================================
    // Header parsing
    // ========================================================================

    #[test]
    fn remote_info_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(MD5_HEADER, HeaderValue::from_static("m"));
        headers.insert(SHA1_HEADER, HeaderValue::from_static("s"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("42"));
        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));

        let info = RemoteFileInfo::from_headers(&headers);
        assert_eq!(info.md5.as_deref(), Some("m"));
        assert_eq!(info.sha1.as_deref(), Some("s"));
        assert_eq!(info.sha256, None);
        assert_eq!(info.size, 42);
        assert!(info.accept_ranges);
        assert!(!info.is_directory());
    }

    #[test]
    fn no_checksums_means_directory() {
        let info = RemoteFileInfo::from_headers(&HeaderMap::new());
        assert!(info.is_directory());
        assert!(!info.accept_ranges);
        assert_eq!(info.size, 0);
    }

    #[test]
    fn byte_range_header() {
        let range = ByteRange { start: 5, end: 9 };
        assert_eq!(range.header_value(), "bytes=5-9");
        assert_eq!(range.len(), 5);
    }

    // ========================================================================
    // Mocked transport
    // ========================================================================

    #[tokio::test]
    async fn mock_http_client_reports_failure() {
        let mut mock = MockHttpClient::new();
        mock.expect_head().returning(|_| {
            Err(Error::NetworkFailure {
                message: "connection timeout".into(),
            })
        });

        match mock.head("https://example.com/libs/a.jar").await {
            Err(Error::NetworkFailure { message }) => assert!(message.contains("timeout")),
            other => panic!("expected NetworkFailure, got {other:?}"),
        }
    }

    // ========================================================================
    // ReqwestHttpClient against a local server
    // ========================================================================

    #[tokio::test]
    async fn download_streams_body_to_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/libs/a.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("a.bin");
        let client = ReqwestHttpClient::new();
        let written = client
            .download(&format!("{}/libs/a.bin", server.uri()), None, &dest)
            .await
            .unwrap();

        assert_eq!(written, 5);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn range_request_requires_partial_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/libs/a.bin"))
            .and(header("range", "bytes=0-1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let client = ReqwestHttpClient::new();
        let result = client
            .download(
                &format!("{}/libs/a.bin", server.uri()),
                Some(ByteRange { start: 0, end: 1 }),
                &tmp.path().join("a.bin"),
            )
            .await;

        assert!(matches!(result, Err(Error::NetworkFailure { .. })));
    }

    #[tokio::test]
    async fn error_status_is_network_failure() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::new();
        let result = client.head(&format!("{}/libs/missing.jar", server.uri())).await;
        match result {
            Err(Error::NetworkFailure { message }) => assert!(message.contains("404")),
            other => panic!("expected NetworkFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn post_text_sends_plain_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/search/aql"))
            .and(header("content-type", "text/plain"))
            .and(body_string("items.find({})"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"results":[]}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::new();
        let body = client
            .post_text(
                &format!("{}/api/search/aql", server.uri()),
                "items.find({})".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(body, br#"{"results":[]}"#);
    }

    #[test]
    fn reqwest_http_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ReqwestHttpClient>();
        assert_send_sync::<MockHttpClient>();
    }
}
