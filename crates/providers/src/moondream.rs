//! Moondream cloud API provider.
//!
//! Sends the image inline as a base64 data URL to `POST {api_url}/query` and
//! reads the `answer` field of the response. The credential goes in the
//! `X-Moondream-Auth` header.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use optic_core::error::InferenceError;
use optic_core::{Answer, Credential, FetchedImage, InferenceProvider};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// A 1×1 transparent PNG used by [`MoondreamProvider::probe`].
const PROBE_IMAGE_B64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

const PROBE_QUESTION: &str = "What is in this image?";

pub struct MoondreamProvider {
    base_url: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl MoondreamProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs: timeout.as_secs(),
            client,
        }
    }

    /// Encode an image as a `data:` URL.
    fn data_url(image: &FetchedImage) -> String {
        format!(
            "data:{};base64,{}",
            image.mime_type(),
            STANDARD.encode(&image.bytes)
        )
    }

    async fn send(
        &self,
        image_url: String,
        question: &str,
        credential: &Credential,
    ) -> Result<Answer, InferenceError> {
        let url = format!("{}/query", self.base_url);
        let body = QueryRequest {
            image_url,
            question,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .header("X-Moondream-Auth", credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout(self.timeout_secs)
                } else {
                    InferenceError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(InferenceError::RateLimited);
        }

        if status == 401 || status == 403 {
            return Err(InferenceError::AuthenticationFailed(format!(
                "credential {credential} rejected (status {status})"
            )));
        }

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Moondream returned error");
            return Err(InferenceError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

        let answer = parsed
            .answer
            .ok_or_else(|| InferenceError::MalformedResponse("response has no answer".into()))?;

        Ok(Answer::new(answer))
    }
}

#[async_trait]
impl InferenceProvider for MoondreamProvider {
    fn name(&self) -> &str {
        "moondream"
    }

    async fn query(
        &self,
        image: &FetchedImage,
        prompt: &str,
        credential: &Credential,
    ) -> Result<Answer, InferenceError> {
        debug!(
            credential = %credential,
            bytes = image.bytes.len(),
            mime = image.mime_type(),
            "Sending query request"
        );
        self.send(Self::data_url(image), prompt, credential).await
    }

    /// Runs a real query against a built-in 1×1 image. Billable.
    async fn probe(&self, credential: &Credential) -> Result<(), InferenceError> {
        if credential.is_blank() {
            return Err(InferenceError::AuthenticationFailed(
                "blank credential".into(),
            ));
        }
        let image_url = format!("data:image/png;base64,{PROBE_IMAGE_B64}");
        self.send(image_url, PROBE_QUESTION, credential)
            .await
            .map(|_| ())
    }
}

// --- Moondream API types ---

#[derive(Serialize)]
struct QueryRequest<'a> {
    image_url: String,
    question: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    answer: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn jpeg() -> FetchedImage {
        FetchedImage::new(vec![0xFF, 0xD8, 0xFF, 0xE0], Some("image/jpeg".into()))
    }

    fn provider(server: &MockServer) -> MoondreamProvider {
        MoondreamProvider::new(format!("{}/v1/", server.uri()), Duration::from_secs(5))
    }

    #[test]
    fn data_url_encodes_bytes_with_mime() {
        let url = MoondreamProvider::data_url(&jpeg());
        assert_eq!(url, "data:image/jpeg;base64,/9j/4A==");
    }

    #[tokio::test]
    async fn query_sends_auth_header_and_reads_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/query"))
            .and(header("X-Moondream-Auth", "md-key-1"))
            .and(body_partial_json(serde_json::json!({
                "question": "what color is the car?",
                "stream": false,
                "image_url": "data:image/jpeg;base64,/9j/4A=="
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"answer": "red", "request_id": "r1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let answer = provider(&server)
            .query(&jpeg(), "what color is the car?", &Credential::new("md-key-1"))
            .await
            .unwrap();
        assert_eq!(answer.answer, "red");
    }

    #[tokio::test]
    async fn missing_answer_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"caption": "x"})))
            .mount(&server)
            .await;

        let err = provider(&server)
            .query(&jpeg(), "q", &Credential::new("k"))
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn status_codes_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-Moondream-Auth", "bad"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("X-Moondream-Auth", "busy"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("X-Moondream-Auth", "broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let p = provider(&server);
        assert!(matches!(
            p.query(&jpeg(), "q", &Credential::new("bad")).await,
            Err(InferenceError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            p.query(&jpeg(), "q", &Credential::new("busy")).await,
            Err(InferenceError::RateLimited)
        ));
        match p.query(&jpeg(), "q", &Credential::new("broken")).await {
            Err(InferenceError::ApiError {
                status_code,
                message,
            }) => {
                assert_eq!(status_code, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn probe_uses_builtin_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/query"))
            .and(body_partial_json(serde_json::json!({
                "image_url": format!("data:image/png;base64,{PROBE_IMAGE_B64}")
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"answer": "a dot"})))
            .expect(1)
            .mount(&server)
            .await;

        assert!(provider(&server).probe(&Credential::new("k")).await.is_ok());
    }

    #[tokio::test]
    async fn probe_rejects_blank_without_network() {
        let p = MoondreamProvider::new("http://127.0.0.1:9", Duration::from_secs(1));
        assert!(matches!(
            p.probe(&Credential::new(" ")).await,
            Err(InferenceError::AuthenticationFailed(_))
        ));
    }
}
