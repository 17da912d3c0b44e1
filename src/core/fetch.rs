//! Image fetchers used by the demo host.
//!
//! `FileFetcher` reads `file://` URLs and plain filesystem paths,
//! `HttpFetcher` downloads `http`/`https` URLs, and `RoutingFetcher` picks one
//! of them by scheme. All of them run on fetch workers and block.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, trace};
use url::Url;

use crate::entities::{CancelToken, DecodedImage, FetchError, ImageFetcher};

#[derive(Debug, Clone, Default)]
pub struct FileFetcher {
    /// Base directory for relative paths
    root: Option<PathBuf>,
}

impl FileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative locators against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn to_path(&self, key: &str) -> Result<PathBuf, FetchError> {
        let path = match Url::parse(key) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map_err(|_| FetchError::InvalidLocator(key.to_string()))?,
            Ok(url) => {
                return Err(FetchError::InvalidLocator(format!(
                    "unsupported scheme '{}' in {}",
                    url.scheme(),
                    key
                )));
            }
            Err(_) => PathBuf::from(key),
        };

        Ok(match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        })
    }
}

impl ImageFetcher for FileFetcher {
    fn fetch(&self, key: &str, cancel: &CancelToken) -> Result<DecodedImage, FetchError> {
        let path = self.to_path(key)?;
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        trace!("Reading image {}", path.display());
        let bytes = std::fs::read(&path).map_err(|e| io_error(&path, e))?;
        // Decoding is the expensive part; skip it if the last waiter left.
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        DecodedImage::decode(&bytes)
    }
}

fn io_error(path: &Path, e: std::io::Error) -> FetchError {
    FetchError::Transport(format!("{}: {}", path.display(), e))
}

/// Default per-request timeout for remote images
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking HTTP(S) fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(HTTP_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, key: &str, cancel: &CancelToken) -> Result<DecodedImage, FetchError> {
        let url = Url::parse(key).map_err(|_| FetchError::InvalidLocator(key.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidLocator(format!(
                "unsupported scheme '{}' in {}",
                url.scheme(),
                key
            )));
        }
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        trace!("Downloading image {}", url);
        let response = self
            .client
            .get(url)
            // Avoid compressed, range-susceptible responses for binary assets
            .header(reqwest::header::ACCEPT_ENCODING, "identity")
            .send()
            .map_err(|e| FetchError::Transport(format!("Failed to download {}: {}", key, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transport(format!("{}: HTTP {}", key, status)));
        }

        let bytes = response
            .bytes()
            .map_err(|e| FetchError::Transport(format!("Failed to read {}: {}", key, e)))?;
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        debug!("Downloaded {} ({} bytes)", key, bytes.len());
        DecodedImage::decode(&bytes)
    }
}

/// Sends `http`/`https` keys to the network, everything else to the filesystem.
#[derive(Debug, Clone)]
pub struct RoutingFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl RoutingFetcher {
    pub fn new(http: HttpFetcher, file: FileFetcher) -> Self {
        Self { http, file }
    }
}

impl ImageFetcher for RoutingFetcher {
    fn fetch(&self, key: &str, cancel: &CancelToken) -> Result<DecodedImage, FetchError> {
        match Url::parse(key) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => self.http.fetch(key, cancel),
            _ => self.file.fetch(key, cancel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    fn write_png(path: &Path, w: u32, h: u32) {
        image::RgbaImage::from_pixel(w, h, image::Rgba([1, 2, 3, 255]))
            .save_with_format(path, image::ImageFormat::Png)
            .unwrap();
    }

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        image::RgbaImage::from_pixel(w, h, image::Rgba([9, 8, 7, 255]))
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    /// One-shot HTTP/1.1 server on localhost. Returns the base URL and the
    /// thread, which yields the request line it saw.
    fn serve_once(status: &'static str, body: Vec<u8>) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            stream.write_all(head.as_bytes()).unwrap();
            stream.write_all(&body).unwrap();
            stream.flush().unwrap();
            let text = String::from_utf8_lossy(&request).to_string();
            text.lines().next().unwrap_or_default().to_string()
        });
        (base, handle)
    }

    fn local_http() -> HttpFetcher {
        let client = reqwest::blocking::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpFetcher::from_client(client)
    }

    #[test]
    fn test_fetch_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_png(&path, 5, 4);

        let url = Url::from_file_path(&path).unwrap();
        let img = FileFetcher::new().fetch(url.as_str(), &CancelToken::new()).unwrap();
        assert_eq!((img.width(), img.height()), (5, 4));
    }

    #[test]
    fn test_relative_path_uses_root() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("b.png"), 2, 2);

        let fetcher = FileFetcher::with_root(dir.path());
        assert!(fetcher.fetch("b.png", &CancelToken::new()).is_ok());
    }

    #[test]
    fn test_unsupported_scheme() {
        let err = FileFetcher::new()
            .fetch("https://example.com/x.png", &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidLocator(_)));
    }

    #[test]
    fn test_missing_file_is_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FileFetcher::with_root(dir.path());
        let err = fetcher.fetch("missing.png", &CancelToken::new()).unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[test]
    fn test_cancelled_before_read() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("c.png"), 2, 2);

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = FileFetcher::with_root(dir.path()).fetch("c.png", &cancel).unwrap_err();
        assert_eq!(err, FetchError::Cancelled);
    }

    #[test]
    fn test_http_fetch_decodes_body() {
        let (base, server) = serve_once("200 OK", png_bytes(6, 3));
        let img = local_http()
            .fetch(&format!("{}/banners/a.png", base), &CancelToken::new())
            .unwrap();
        assert_eq!((img.width(), img.height()), (6, 3));
        assert_eq!(server.join().unwrap(), "GET /banners/a.png HTTP/1.1");
    }

    #[test]
    fn test_http_error_status_is_transport_error() {
        let (base, server) = serve_once("404 Not Found", b"gone".to_vec());
        let err = local_http()
            .fetch(&format!("{}/missing.png", base), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(ref e) if e.contains("404")), "{:?}", err);
        server.join().unwrap();
    }

    #[test]
    fn test_http_undecodable_body() {
        let (base, server) = serve_once("200 OK", b"not an image".to_vec());
        let err = local_http()
            .fetch(&format!("{}/x.png", base), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
        server.join().unwrap();
    }

    #[test]
    fn test_http_cancelled_before_request() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = local_http().fetch("http://127.0.0.1:9/x.png", &cancel).unwrap_err();
        assert_eq!(err, FetchError::Cancelled);
    }

    #[test]
    fn test_http_rejects_other_schemes() {
        let err = local_http().fetch("file:///tmp/x.png", &CancelToken::new()).unwrap_err();
        assert!(matches!(err, FetchError::InvalidLocator(_)));
        let err = local_http().fetch("x.png", &CancelToken::new()).unwrap_err();
        assert!(matches!(err, FetchError::InvalidLocator(_)));
    }

    #[test]
    fn test_routing_by_scheme() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("local.png"), 2, 2);
        let fetcher = RoutingFetcher::new(local_http(), FileFetcher::with_root(dir.path()));

        let img = fetcher.fetch("local.png", &CancelToken::new()).unwrap();
        assert_eq!((img.width(), img.height()), (2, 2));

        let (base, server) = serve_once("200 OK", png_bytes(4, 4));
        let img = fetcher
            .fetch(&format!("{}/remote.png", base), &CancelToken::new())
            .unwrap();
        assert_eq!((img.width(), img.height()), (4, 4));
        server.join().unwrap();
    }
}
