use super::{SourceFetcher, StorageError, StorageResult, validate_key};
use crate::types::SourceImage;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;

/// Fetches source images from an HTTP origin (typically a bucket website
/// endpoint or CDN origin).
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration) -> StorageResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `<base>/<key>` with spaces encoded as `+`.
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.replace(' ', "+"))
    }
}

#[async_trait]
impl SourceFetcher for HttpSource {
    async fn fetch(&self, key: &str) -> StorageResult<SourceImage> {
        let key = validate_key(key)?;
        let url = self.object_url(key);
        debug!(%url, "fetching source image");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            return Err(StorageError::Status {
                status: status.as_u16(),
                key: key.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        debug!(bytes = bytes.len(), ?content_type, "source image fetched");

        Ok(SourceImage::new(bytes.to_vec(), content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on an ephemeral port and return the
    /// base URL plus a handle yielding the request line that was received.
    async fn serve_once(response: Vec<u8>) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let mut read = 0;
            while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf[read..]).await.unwrap();
                if n == 0 {
                    break;
                }
                read += n;
            }
            stream.write_all(&response).await.unwrap();
            stream.shutdown().await.unwrap();
            let request = String::from_utf8_lossy(&buf[..read]).to_string();
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{addr}"), handle)
    }

    fn http_response(status: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn object_url_replaces_spaces() {
        let source = HttpSource::new("https://img.example.com/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            source.object_url("shoes/red sneaker.jpg"),
            "https://img.example.com/shoes/red+sneaker.jpg"
        );
    }

    #[tokio::test]
    async fn fetch_returns_body_and_content_type() {
        let (base, handle) = serve_once(http_response("200 OK", "image/png", b"png")).await;
        let source = HttpSource::new(&base, Duration::from_secs(5)).unwrap();

        let image = source.fetch("/a b.png").await.unwrap();
        assert_eq!(image.bytes, b"png");
        assert_eq!(image.content_type.as_deref(), Some("image/png"));
        assert_eq!(handle.await.unwrap(), "GET /a+b.png HTTP/1.1");
    }

    #[tokio::test]
    async fn fetch_maps_404_to_not_found() {
        let (base, _handle) = serve_once(http_response("404 Not Found", "text/plain", b"")).await;
        let source = HttpSource::new(&base, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            source.fetch("missing.jpg").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn fetch_rejects_other_failures() {
        let (base, _handle) =
            serve_once(http_response("503 Service Unavailable", "text/plain", b"")).await;
        let source = HttpSource::new(&base, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            source.fetch("a.jpg").await,
            Err(StorageError::Status { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn fetch_from_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = HttpSource::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            source.fetch("a.jpg").await,
            Err(StorageError::Http(_))
        ));
    }
}
