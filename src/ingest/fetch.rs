// SSRF-safe remote image fetch
//
// The same validation runs twice: on the URL the client supplied and on
// the effective URL after redirects, because a redirect can point an
// otherwise-safe URL at a disallowed host. The body is streamed against a
// running byte cap so an oversized upstream is cut off instead of
// buffered.

use std::time::Duration;

use anyhow::{Context, Result};
use regex::RegexBuilder;
use url::Url;

use crate::core::config::Config;
use crate::core::errors::FetchError;
use crate::core::types::UrlContext;

/// Pure URL policy check: scheme, loopback-only http, host allowlist.
/// `ctx` labels which pass produced a rejection.
pub fn validate_url(url: &Url, ctx: UrlContext, host_pattern: &str) -> Result<(), FetchError> {
    let scheme = url.scheme().to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return Err(FetchError::BadScheme(ctx));
    }

    let host = match url.host_str() {
        Some(h) if !h.is_empty() => h,
        _ => return Err(FetchError::InvalidUrl(ctx)),
    };

    // IPv6 hosts come back bracketed from the url crate
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host = host.to_ascii_lowercase();
    let host = host.trim_end_matches('.');

    let is_loopback = matches!(host, "localhost" | "127.0.0.1" | "::1");
    if scheme == "http" && !is_loopback {
        return Err(FetchError::InsecureScheme(ctx));
    }

    // Full-match semantics, case-insensitive. A broken operator pattern is
    // a server error, not a client one.
    let host_re = RegexBuilder::new(&format!("^(?:{host_pattern})$"))
        .case_insensitive(true)
        .build()
        .map_err(|_| FetchError::BadHostPattern)?;

    if !host_re.is_match(host) {
        return Err(FetchError::HostNotAllowed(ctx));
    }

    Ok(())
}

/// Streaming HTTP image fetcher with URL policy enforcement.
/// Single attempt per call; retries are the caller's decision.
pub struct SafeFetcher {
    client: reqwest::Client,
    host_pattern: String,
    max_bytes: usize,
}

impl SafeFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.ingest.fetch_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            host_pattern: config.ingest.image_url_host_regex.clone(),
            max_bytes: config.ingest.max_image_bytes,
        })
    }

    /// Fetch the image at `raw_url`, enforcing scheme/host policy on both
    /// the original and the post-redirect URL and a hard size cap on the
    /// streamed body.
    pub async fn fetch(&self, raw_url: &str) -> Result<Vec<u8>, FetchError> {
        let url =
            Url::parse(raw_url).map_err(|_| FetchError::InvalidUrl(UrlContext::Initial))?;
        validate_url(&url, UrlContext::Initial, &self.host_pattern)?;

        let mut resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(classify_transport)?;

        // Redirects were followed by the client; the effective URL must
        // pass the same policy before we touch the body.
        validate_url(resp.url(), UrlContext::Redirected, &self.host_pattern)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::UpstreamStatus(status.as_u16()));
        }

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(classify_transport)? {
            if chunk.is_empty() {
                continue;
            }
            if data.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::PayloadTooLarge);
            }
            data.extend_from_slice(&chunk);
        }

        if data.is_empty() {
            return Err(FetchError::EmptyBody);
        }

        Ok(data)
    }
}

fn classify_transport(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const LOOPBACK_PATTERN: &str = r"localhost|127\.0\.0\.1|::1";

    fn check(raw: &str, pattern: &str) -> Result<(), FetchError> {
        let url = Url::parse(raw).expect("test url must parse");
        validate_url(&url, UrlContext::Initial, pattern)
    }

    fn fetcher(pattern: &str, max_bytes: usize) -> SafeFetcher {
        let mut config = Config::new().unwrap();
        config.ingest.image_url_host_regex = pattern.to_string();
        config.ingest.max_image_bytes = max_bytes;
        config.ingest.fetch_timeout_secs = 5;
        SafeFetcher::new(&config).unwrap()
    }

    /// Minimal one-connection HTTP server; returns the bound port.
    async fn serve_once(response: Vec<u8>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let _ = stream.write_all(&response).await;
        });
        port
    }

    #[test]
    fn non_http_schemes_are_rejected() {
        for raw in ["ftp://example.com/x", "file:///etc/passwd", "gopher://host/"] {
            assert!(matches!(
                check(raw, ".*"),
                Err(FetchError::BadScheme(UrlContext::Initial))
            ));
        }
    }

    #[test]
    fn http_requires_loopback_host() {
        assert!(matches!(
            check("http://example.com/img.png", ".*"),
            Err(FetchError::InsecureScheme(_))
        ));
        assert!(check("http://localhost:8080/img.png", LOOPBACK_PATTERN).is_ok());
        assert!(check("http://127.0.0.1/img.png", LOOPBACK_PATTERN).is_ok());
        assert!(check("http://[::1]/img.png", LOOPBACK_PATTERN).is_ok());
    }

    #[test]
    fn host_must_match_allow_pattern() {
        let pattern = r".+\.example\.com";
        assert!(check("https://cdn.example.com/a.png", pattern).is_ok());
        assert!(matches!(
            check("https://evil.org/a.png", pattern),
            Err(FetchError::HostNotAllowed(_))
        ));
        // Full match, not substring match
        assert!(matches!(
            check("https://cdn.example.com.evil.org/a.png", pattern),
            Err(FetchError::HostNotAllowed(_))
        ));
    }

    #[test]
    fn host_is_normalized_before_matching() {
        assert!(check("https://CDN.Example.COM./a.png", r".+\.example\.com").is_ok());
    }

    #[test]
    fn malformed_pattern_is_a_server_error() {
        assert!(matches!(
            check("https://cdn.example.com/a.png", "(unclosed"),
            Err(FetchError::BadHostPattern)
        ));
    }

    #[tokio::test]
    async fn fetch_rejects_bad_scheme_without_network() {
        // No server is listening anywhere; a network attempt would fail
        // with Transport, not BadScheme.
        let fetcher = fetcher(".*", 1024);
        assert!(matches!(
            fetcher.fetch("ftp://127.0.0.1:1/x").await,
            Err(FetchError::BadScheme(UrlContext::Initial))
        ));
    }

    #[tokio::test]
    async fn fetch_reads_successful_body() {
        let body = b"imagebytes";
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes()
        .into_iter()
        .chain(body.iter().copied())
        .collect();
        let port = serve_once(response).await;

        let fetcher = fetcher(LOOPBACK_PATTERN, 1024);
        let data = fetcher
            .fetch(&format!("http://127.0.0.1:{port}/img"))
            .await
            .unwrap();
        assert_eq!(data, body);
    }

    #[tokio::test]
    async fn fetch_maps_upstream_status() {
        let response =
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec();
        let port = serve_once(response).await;

        let fetcher = fetcher(LOOPBACK_PATTERN, 1024);
        assert!(matches!(
            fetcher.fetch(&format!("http://127.0.0.1:{port}/img")).await,
            Err(FetchError::UpstreamStatus(404))
        ));
    }

    #[tokio::test]
    async fn fetch_rejects_empty_body() {
        let response =
            b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec();
        let port = serve_once(response).await;

        let fetcher = fetcher(LOOPBACK_PATTERN, 1024);
        assert!(matches!(
            fetcher.fetch(&format!("http://127.0.0.1:{port}/img")).await,
            Err(FetchError::EmptyBody)
        ));
    }

    #[tokio::test]
    async fn oversized_stream_aborts_before_buffering() {
        // The server would write forever; the fetch must bail as soon as
        // the running total crosses the cap.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let header = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n";
            if stream.write_all(header).await.is_err() {
                return;
            }
            let chunk = format!("{:x}\r\n{}\r\n", 1024, "x".repeat(1024));
            loop {
                if stream.write_all(chunk.as_bytes()).await.is_err() {
                    return;
                }
            }
        });

        let fetcher = fetcher(LOOPBACK_PATTERN, 16 * 1024);
        assert!(matches!(
            fetcher.fetch(&format!("http://127.0.0.1:{port}/big")).await,
            Err(FetchError::PayloadTooLarge)
        ));
    }

    #[tokio::test]
    async fn redirect_target_is_revalidated() {
        // First hop is allowed (127.0.0.1), redirect lands on localhost
        // which the pattern does not allow.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            // redirect hop
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let redirect = format!(
                "HTTP/1.1 302 Found\r\nLocation: http://localhost:{port}/final\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            );
            let _ = stream.write_all(redirect.as_bytes()).await;

            // final hop
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = stream.read(&mut buf).await;
            let _ = stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                .await;
        });

        let fetcher = fetcher(r"127\.0\.0\.1", 1024);
        assert!(matches!(
            fetcher.fetch(&format!("http://127.0.0.1:{port}/start")).await,
            Err(FetchError::HostNotAllowed(UrlContext::Redirected))
        ));
    }
}
