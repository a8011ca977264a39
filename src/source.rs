//! Loading raw image bytes from a URL or a local file.
//!
//! Chat users can send a link instead of a file. The fetcher downloads it
//! with a bounded body size and only accepts responses that declare an image
//! content type. Decoding is left to the engine, so a lying server gets a
//! decode error later rather than a fetch error here.

use crate::config::FetchConfig;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

const MAX_REDIRECTS: u32 = 5;

#[derive(Error, Debug)]
pub enum SourceFetchError {
    #[error("Not an http(s) URL: {0}")]
    InvalidUrl(String),
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} is not an image (content type {content_type:?})")]
    NotAnImage { url: String, content_type: String },
    #[error("Source exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn is_image_content_type(content_type: &str) -> bool {
    content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("image/")
}

/// Download an image over HTTP(S).
pub fn fetch_image(url: &str, config: &FetchConfig) -> Result<Vec<u8>, SourceFetchError> {
    if !is_url(url) {
        return Err(SourceFetchError::InvalidUrl(url.to_string()));
    }

    let agent = ureq::AgentBuilder::new()
        .timeout(config.timeout())
        .redirects(MAX_REDIRECTS)
        .build();

    let response = match agent.get(url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(status, _)) => {
            return Err(SourceFetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        Err(e) => return Err(SourceFetchError::Transport(e.to_string())),
    };

    // ureq treats 1xx/3xx leftovers as success; only 2xx counts here
    let status = response.status();
    if !(200..300).contains(&status) {
        return Err(SourceFetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    let content_type = response.content_type().to_string();
    if !is_image_content_type(&content_type) {
        return Err(SourceFetchError::NotAnImage {
            url: url.to_string(),
            content_type,
        });
    }

    if let Some(declared) = response
        .header("Content-Length")
        .and_then(|v| v.trim().parse::<usize>().ok())
        && declared > config.max_bytes
    {
        return Err(SourceFetchError::TooLarge {
            limit: config.max_bytes,
        });
    }

    let bytes = read_bounded(response.into_reader(), config.max_bytes)?;
    info!(url, size = bytes.len(), "fetched source image");
    Ok(bytes)
}

/// Load a source given as either a URL or a filesystem path.
pub fn read_source(source: &str, config: &FetchConfig) -> Result<Vec<u8>, SourceFetchError> {
    if is_url(source) {
        return fetch_image(source, config);
    }
    let path = Path::new(source);
    let file = fs::File::open(path)?;
    let bytes = read_bounded(file, config.max_bytes)?;
    debug!(path = %path.display(), size = bytes.len(), "read source file");
    Ok(bytes)
}

/// Read at most `limit` bytes, failing if the stream holds more.
fn read_bounded(reader: impl Read, limit: usize) -> Result<Vec<u8>, SourceFetchError> {
    let mut buf = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut buf)?;
    if buf.len() > limit {
        return Err(SourceFetchError::TooLarge { limit });
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;
    use tempfile::TempDir;

    /// Serve exactly one response (`head` lines, then `body`) on a local port.
    fn serve_raw(head: String, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request);
            let header = format!(
                "{head}Content-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            // Client may hang up early on rejected responses
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(&body);
        });
        format!("http://{addr}/image")
    }

    fn serve_once(status_line: &str, content_type: &str, body: Vec<u8>) -> String {
        serve_raw(
            format!("HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\n"),
            body,
        )
    }

    fn redirect_to(location: &str) -> String {
        serve_raw(
            format!("HTTP/1.1 302 Found\r\nLocation: {location}\r\n"),
            Vec::new(),
        )
    }

    fn config(max_bytes: usize) -> FetchConfig {
        FetchConfig {
            timeout_secs: 5,
            max_bytes,
        }
    }

    #[test]
    fn url_detection() {
        assert!(is_url("http://example.com/a.jpg"));
        assert!(is_url("https://example.com/a.jpg"));
        assert!(!is_url("ftp://example.com/a.jpg"));
        assert!(!is_url("/tmp/a.jpg"));
    }

    #[test]
    fn content_type_check() {
        assert!(is_image_content_type("image/jpeg"));
        assert!(is_image_content_type("Image/PNG"));
        assert!(!is_image_content_type("text/html"));
        assert!(!is_image_content_type(""));
    }

    #[test]
    fn rejects_non_http_url() {
        let err = fetch_image("file:///etc/passwd", &config(10)).unwrap_err();
        assert!(matches!(err, SourceFetchError::InvalidUrl(_)));
    }

    #[test]
    fn fetches_image_body() {
        let url = serve_once("200 OK", "image/jpeg", b"jpegish".to_vec());
        let bytes = fetch_image(&url, &config(1024)).unwrap();
        assert_eq!(bytes, b"jpegish");
    }

    #[test]
    fn follows_redirect_to_image() {
        let target = serve_once("200 OK", "image/png", b"abc".to_vec());
        let url = redirect_to(&target);
        let bytes = fetch_image(&url, &config(1024)).unwrap();
        assert_eq!(bytes, b"abc");
    }

    #[test]
    fn gives_up_on_long_redirect_chains() {
        let mut url = serve_once("200 OK", "image/png", b"abc".to_vec());
        for _ in 0..=MAX_REDIRECTS {
            url = redirect_to(&url);
        }
        let err = fetch_image(&url, &config(1024)).unwrap_err();
        assert!(
            matches!(
                err,
                SourceFetchError::Transport(_) | SourceFetchError::Status { .. }
            ),
            "{err:?}"
        );
    }

    #[test]
    fn rejects_non_image_content_type() {
        let url = serve_once("200 OK", "text/html", b"<html>".to_vec());
        let err = fetch_image(&url, &config(1024)).unwrap_err();
        assert!(matches!(err, SourceFetchError::NotAnImage { .. }));
    }

    #[test]
    fn rejects_error_status() {
        let url = serve_once("404 Not Found", "text/plain", b"missing".to_vec());
        let err = fetch_image(&url, &config(1024)).unwrap_err();
        assert!(matches!(err, SourceFetchError::Status { status: 404, .. }));
    }

    #[test]
    fn rejects_oversized_body() {
        let url = serve_once("200 OK", "image/png", vec![0u8; 200]);
        let err = fetch_image(&url, &config(100)).unwrap_err();
        assert!(matches!(err, SourceFetchError::TooLarge { limit: 100 }));
    }

    #[test]
    fn read_source_reads_local_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("photo.jpg");
        fs::write(&path, b"bytes").unwrap();
        let bytes = read_source(path.to_str().unwrap(), &config(1024)).unwrap();
        assert_eq!(bytes, b"bytes");
    }

    #[test]
    fn read_source_enforces_limit_on_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("big.jpg");
        fs::write(&path, vec![1u8; 11]).unwrap();
        let err = read_source(path.to_str().unwrap(), &config(10)).unwrap_err();
        assert!(matches!(err, SourceFetchError::TooLarge { limit: 10 }));
    }

    #[test]
    fn read_source_missing_file_is_io_error() {
        let err = read_source("/definitely/not/here.jpg", &config(10)).unwrap_err();
        assert!(matches!(err, SourceFetchError::Io(_)));
    }
}
