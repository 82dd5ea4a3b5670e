//! HTTP image fetcher.

use async_trait::async_trait;
use optic_core::error::ImageError;
use optic_core::{FetchedImage, ImageFetcher};
use std::time::Duration;
use tracing::{debug, warn};

/// Downloads attachments with a plain GET, capped at `max_bytes`.
pub struct HttpImageFetcher {
    client: reqwest::Client,
    max_bytes: u64,
    timeout_secs: u64,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            client,
            max_bytes,
            timeout_secs: timeout.as_secs(),
        }
    }

    pub fn from_config(config: &optic_config::AppConfig) -> Self {
        Self::new(
            Duration::from_secs(config.polling.request_timeout_secs),
            config.inference.max_image_bytes,
        )
    }

    fn map_err(&self, e: reqwest::Error) -> ImageError {
        if e.is_timeout() {
            ImageError::Timeout(self.timeout_secs)
        } else {
            ImageError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn get(&self, url: &str) -> Result<FetchedImage, ImageError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        if !response.status().is_success() {
            return Err(ImageError::Status(response.status().as_u16()));
        }

        if let Some(len) = response.content_length()
            && len > self.max_bytes
        {
            return Err(ImageError::TooLarge {
                size: len,
                limit: self.max_bytes,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        // Content-Length can be absent or wrong; enforce the cap while reading
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_err(e))? {
            bytes.extend_from_slice(&chunk);
            if bytes.len() as u64 > self.max_bytes {
                return Err(ImageError::TooLarge {
                    size: bytes.len() as u64,
                    limit: self.max_bytes,
                });
            }
        }

        debug!(url, bytes = bytes.len(), content_type = ?content_type, "Image downloaded");
        Ok(FetchedImage::new(bytes, content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(max_bytes: u64) -> HttpImageFetcher {
        HttpImageFetcher::new(Duration::from_secs(5), max_bytes)
    }

    #[tokio::test]
    async fn downloads_bytes_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/cat.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0xFF, 0xD8, 0xFF], "image/jpeg"))
            .mount(&server)
            .await;

        let image = fetcher(1024)
            .get(&format!("{}/media/cat.jpg", server.uri()))
            .await
            .unwrap();
        assert_eq!(image.bytes, vec![0xFF, 0xD8, 0xFF]);
        assert_eq!(image.mime_type(), "image/jpeg");
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher(1024)
            .get(&format!("{}/gone.jpg", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::Status(404)));
    }

    #[tokio::test]
    async fn oversized_image_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 64], "image/png"))
            .mount(&server)
            .await;

        let err = fetcher(16)
            .get(&format!("{}/big.png", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::TooLarge { limit: 16, .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let err = fetcher(16).get("http://127.0.0.1:9/x.jpg").await.unwrap_err();
        assert!(matches!(err, ImageError::Network(_)));
    }
}
