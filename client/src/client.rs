use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::{Client, Response, Url};
use std::time::Duration;
use storyreel_common::ImageResult;
use tracing::debug;

use crate::error::{ClientError, Result};

const STORY_PATH: &str = "generate/story";
const IMAGES_PATH: &str = "generate/images";
const AUDIO_PATH: &str = "generate/audio";

/// The three generation endpoints, plus image download for video capture.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// `GET /generate/story?prompt=`
    async fn story(&self, prompt: &str) -> Result<String>;
    /// `GET /generate/images?story=`
    async fn images(&self, caption: &str) -> Result<Vec<ImageResult>>;
    /// `GET /generate/audio?text=`
    async fn audio(&self, caption: &str) -> Result<Bytes>;
    /// Fetch the bytes behind an `image_url`.
    async fn image_bytes(&self, url: &str) -> Result<Bytes>;
}

pub struct HttpGenerationClient {
    http: Client,
    base_url: Url,
}

impl HttpGenerationClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, None)
    }

    pub fn with_timeout(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        // Url::join replaces the last segment unless the base ends in '/'
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            base_url: url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| ClientError::InvalidUrl {
            url: format!("{}{path}", self.base_url),
            reason: e.to_string(),
        })
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Response> {
        let url = self.endpoint(path)?;
        debug!("GET {url} {query:?}");
        let resp = self.http.get(url).query(query).send().await?;
        check_status(path, resp).await
    }
}

async fn check_status(endpoint: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Status {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// The story endpoint may answer with a bare string or a JSON string literal.
fn decode_story(raw: &str) -> String {
    serde_json::from_str::<String>(raw.trim()).unwrap_or_else(|_| raw.to_string())
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn story(&self, prompt: &str) -> Result<String> {
        let raw = self.get(STORY_PATH, &[("prompt", prompt)]).await?.text().await?;
        let story = decode_story(&raw);
        if story.trim().is_empty() {
            return Err(ClientError::Malformed {
                endpoint: STORY_PATH.to_string(),
                reason: "empty story".to_string(),
            });
        }
        Ok(story)
    }

    async fn images(&self, caption: &str) -> Result<Vec<ImageResult>> {
        let raw = self.get(IMAGES_PATH, &[("story", caption)]).await?.text().await?;
        serde_json::from_str(&raw).map_err(|e| ClientError::Malformed {
            endpoint: IMAGES_PATH.to_string(),
            reason: e.to_string(),
        })
    }

    async fn audio(&self, caption: &str) -> Result<Bytes> {
        let resp = self.get(AUDIO_PATH, &[("text", caption)]).await?;
        let mut stream = resp.bytes_stream();
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        if buf.is_empty() {
            return Err(ClientError::Malformed {
                endpoint: AUDIO_PATH.to_string(),
                reason: "empty audio payload".to_string(),
            });
        }
        debug!("Received audio clip ({} bytes)", buf.len());
        Ok(Bytes::from(buf))
    }

    async fn image_bytes(&self, url: &str) -> Result<Bytes> {
        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                let resp = self.http.get(parsed).send().await?;
                let resp = check_status(url, resp).await?;
                Ok(resp.bytes().await?)
            }
            Ok(parsed) if parsed.scheme() == "file" => {
                let path = parsed.to_file_path().map_err(|_| ClientError::InvalidUrl {
                    url: url.to_string(),
                    reason: "not a local path".to_string(),
                })?;
                Ok(Bytes::from(tokio::fs::read(path).await?))
            }
            Ok(parsed) => Err(ClientError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            }),
            // Bare filesystem path
            Err(_) => Ok(Bytes::from(tokio::fs::read(url).await?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpGenerationClient {
        HttpGenerationClient::new(&format!("{}/api/v1", server.uri())).unwrap()
    }

    #[test]
    fn base_url_keeps_its_path_prefix() {
        let client = HttpGenerationClient::new("http://localhost:8000/api/v1").unwrap();
        let url = client.endpoint(STORY_PATH).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/v1/generate/story");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            HttpGenerationClient::new("not a url"),
            Err(ClientError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn story_accepts_json_encoded_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/generate/story"))
            .and(query_param("prompt", "a fox who wanted to fly"))
            .respond_with(ResponseTemplate::new(200).set_body_string("\"The fox jumped. It flew.\""))
            .mount(&server)
            .await;

        let story = client_for(&server).story("a fox who wanted to fly").await.unwrap();
        assert_eq!(story, "The fox jumped. It flew.");
    }

    #[tokio::test]
    async fn story_accepts_plain_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/generate/story"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Plain words. More words."))
            .mount(&server)
            .await;

        let story = client_for(&server).story("anything").await.unwrap();
        assert_eq!(story, "Plain words. More words.");
    }

    #[tokio::test]
    async fn server_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/generate/story"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Failed to generate story"))
            .mount(&server)
            .await;

        let err = client_for(&server).story("x").await.unwrap_err();
        match err {
            ClientError::Status { status, body, .. } => {
                assert_eq!(status, 500);
                assert!(body.contains("Failed to generate story"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn images_parse_result_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/generate/images"))
            .and(query_param("story", "The fox jumped."))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"image_url":"https://img.example/fox.png","caption":"The fox jumped"}]"#,
            ))
            .mount(&server)
            .await;

        let images = client_for(&server).images("The fox jumped.").await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].image_url.as_deref(), Some("https://img.example/fox.png"));
    }

    #[tokio::test]
    async fn images_reject_non_list_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/generate/images"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"detail":"busy"}"#))
            .mount(&server)
            .await;

        let err = client_for(&server).images("x.").await.unwrap_err();
        assert!(matches!(err, ClientError::Malformed { .. }));
    }

    #[tokio::test]
    async fn audio_returns_raw_bytes() {
        let server = MockServer::start().await;
        let payload = b"RIFF\x24\x00\x00\x00WAVEdata".to_vec();
        Mock::given(method("GET"))
            .and(path("/api/v1/generate/audio"))
            .and(query_param("text", "It flew."))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
            .mount(&server)
            .await;

        let audio = client_for(&server).audio("It flew.").await.unwrap();
        assert_eq!(audio.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn empty_audio_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/generate/audio"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = client_for(&server).audio("x.").await.unwrap_err();
        assert!(matches!(err, ClientError::Malformed { .. }));
    }

    #[tokio::test]
    async fn image_bytes_reads_local_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("frame.png");
        std::fs::write(&file, b"png-bytes").unwrap();

        let client = HttpGenerationClient::new("http://localhost:8000/api/v1").unwrap();
        let bytes = client.image_bytes(file.to_str().unwrap()).await.unwrap();
        assert_eq!(bytes.as_ref(), b"png-bytes");
    }

    #[tokio::test]
    async fn image_bytes_downloads_http_urls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/story_images/fox.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fox".to_vec()))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let bytes = client
            .image_bytes(&format!("{}/story_images/fox.png", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), b"fox");
    }
}
