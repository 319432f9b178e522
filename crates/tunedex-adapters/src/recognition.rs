// Fingerprint-matching recognition adapter

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use serde::Deserialize;
use std::fmt::{Debug, Formatter, Result as FmtResult};

use tunedex_core::models::{Fulfillment, Outcome, Request, RequestPayload, TrackMetadata};
use tunedex_core::validation::{format_file_size, is_audio_file, is_video_file};
use tunedex_core::{Config, RequestError};
use tunedex_store::ArtifactKind;

use crate::capability::{Capability, CapabilityContext};

/// Adapter over the external fingerprint-matching service.
///
/// Uploads the clip sample and normalizes the provider's nested track
/// document into `TrackMetadata`. Every transport or provider failure is
/// classified locally; the orchestrator only ever sees `RequestError`s.
pub struct FingerprintAdapter {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl Debug for FingerprintAdapter {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FingerprintAdapter")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl FingerprintAdapter {
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.recognize_timeout)
            .build()
            .context("Failed to create HTTP client for fingerprint service")?;

        Ok(Self {
            http_client,
            base_url: config.fingerprint_url.trim_end_matches('/').to_string(),
            api_key: config.fingerprint_api_key.clone(),
        })
    }

    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self {
            http_client: Client::builder().timeout(timeout).build().unwrap(),
            base_url: base_url.into(),
            api_key: None,
        }
    }

    async fn submit_sample(
        &self,
        data: Vec<u8>,
        filename: &str,
    ) -> Result<RecognizeResponse, RequestError> {
        let url = format!("{}/v1/recognize", self.base_url);

        let part = multipart::Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| RequestError::Internal(format!("invalid sample part: {}", e)))?;
        let form = multipart::Form::new().part("sample", part);

        let mut request = self.http_client.post(&url).multipart(form);
        if let Some(ref key) = self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            RequestError::UpstreamUnavailable(format!("fingerprint service unreachable: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            // Quota, auth, and server errors are all an upstream problem from
            // the requester's point of view
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Fingerprint service returned an error");
            return Err(RequestError::UpstreamUnavailable(format!(
                "fingerprint service returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        response.json::<RecognizeResponse>().await.map_err(|e| {
            RequestError::UpstreamUnavailable(format!("malformed fingerprint response: {}", e))
        })
    }
}

#[async_trait]
impl Capability for FingerprintAdapter {
    fn name(&self) -> &str {
        "fingerprint"
    }

    async fn execute(&self, request: &Request, ctx: &CapabilityContext) -> Outcome {
        let RequestPayload::Clip { data, filename } = &request.payload else {
            return Err(RequestError::UnsupportedInput(
                "recognition requires a media clip".to_string(),
            ));
        };

        if data.is_empty() {
            return Err(RequestError::UnsupportedInput("empty clip".to_string()));
        }
        if !is_audio_file(filename) && !is_video_file(filename) {
            return Err(RequestError::UnsupportedInput(format!(
                "unsupported clip format: {}",
                filename
            )));
        }
        if data.len() as u64 > ctx.limits.max_bytes {
            return Err(RequestError::SizeOrDurationExceeded(format!(
                "clip is {}, limit is {}",
                format_file_size(data.len() as u64),
                format_file_size(ctx.limits.max_bytes)
            )));
        }

        // Stage the sample on disk and upload from the staged file; the
        // handle is never committed, so the file is removed when this call
        // returns on any path.
        let handle = ctx.store.acquire(ArtifactKind::InboundClip, "bin");
        tokio::fs::write(handle.path(), data)
            .await
            .map_err(|e| RequestError::Internal(format!("failed to stage clip: {}", e)))?;
        let staged = tokio::fs::read(handle.path())
            .await
            .map_err(|e| RequestError::Internal(format!("failed to read staged clip: {}", e)))?;

        tracing::info!(
            requester = %request.requester,
            clip_bytes = staged.len(),
            "Submitting clip to fingerprint service"
        );

        let response = self.submit_sample(staged, filename).await?;

        let Some(track) = response.track else {
            tracing::info!(requester = %request.requester, "No recognition match");
            return Err(RequestError::NotFound(
                "no recognition match for this clip".to_string(),
            ));
        };

        let metadata = track.into_metadata();
        tracing::info!(
            title = %metadata.title,
            artist = metadata.artist.as_deref().unwrap_or("unknown"),
            "Song recognized"
        );

        Ok(Fulfillment {
            metadata,
            artifact: None,
        })
    }
}

/// Top-level fingerprint service response. An absent `track` means the
/// service found no match.
#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    track: Option<TrackDoc>,
}

/// Provider track document, as nested as the provider likes it.
#[derive(Debug, Deserialize)]
struct TrackDoc {
    #[serde(default)]
    title: Option<String>,
    /// Artist name travels in `subtitle`
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    isrc: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    year: Option<u32>,
    #[serde(default)]
    genres: Option<Genres>,
    #[serde(default)]
    images: Option<Images>,
    #[serde(default)]
    sections: Vec<Section>,
    #[serde(default)]
    hub: Option<Hub>,
}

#[derive(Debug, Deserialize)]
struct Genres {
    #[serde(default)]
    primary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Images {
    #[serde(default)]
    coverarthq: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Section {
    #[serde(default)]
    metadata: Vec<SectionMetadata>,
}

#[derive(Debug, Deserialize)]
struct SectionMetadata {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Hub {
    #[serde(default)]
    actions: Vec<HubAction>,
    #[serde(default)]
    options: Vec<HubOption>,
}

#[derive(Debug, Deserialize)]
struct HubAction {
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HubOption {
    #[serde(default)]
    actions: Vec<HubAction>,
}

impl TrackDoc {
    fn into_metadata(self) -> TrackMetadata {
        let album = self
            .sections
            .iter()
            .flat_map(|s| s.metadata.iter())
            .find(|m| m.title.as_deref() == Some("Album"))
            .and_then(|m| m.text.clone());

        let (spotify_url, apple_url) = match self.hub {
            Some(ref hub) => {
                let spotify = hub.actions.iter().find_map(|a| a.uri.clone());
                let apple = hub
                    .options
                    .first()
                    .and_then(|o| o.actions.iter().find_map(|a| a.uri.clone()));
                (spotify, apple)
            }
            None => (None, None),
        };

        TrackMetadata {
            title: self.title.unwrap_or_else(|| "Unknown".to_string()),
            artist: self.subtitle,
            album,
            duration_secs: self.duration.map(|d| d.round() as u64),
            genre: self.genres.and_then(|g| g.primary),
            year: self.year,
            thumbnail_url: self.images.and_then(|i| i.coverarthq),
            spotify_url,
            apple_url,
            youtube_url: None,
            source_platform: None,
            provider_id: self.key,
            isrc: self.isrc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;
    use tunedex_core::models::RequesterId;
    use tunedex_store::ArtifactStore;

    use crate::capability::MediaLimits;

    async fn test_ctx(dir: &tempfile::TempDir) -> CapabilityContext {
        CapabilityContext {
            store: Arc::new(
                ArtifactStore::new(
                    PathBuf::from(dir.path()).join("artifacts"),
                    Duration::from_secs(60),
                )
                .await
                .unwrap(),
            ),
            limits: MediaLimits {
                max_bytes: 1024,
                max_duration: Duration::from_secs(600),
            },
        }
    }

    fn clip_request(filename: &str, bytes: &'static [u8]) -> Request {
        Request::new(
            RequesterId(7),
            RequestPayload::Clip {
                data: Bytes::from_static(bytes),
                filename: filename.into(),
            },
        )
    }

    fn matched_track() -> serde_json::Value {
        json!({
            "track": {
                "title": "Bohemian Rhapsody",
                "subtitle": "Queen",
                "key": "40333609",
                "isrc": "GBUM71029604",
                "duration": 354.2,
                "year": 1975,
                "genres": { "primary": "Rock" },
                "images": { "coverarthq": "https://img.example/cover.jpg" },
                "sections": [
                    { "metadata": [
                        { "title": "Album", "text": "A Night at the Opera" },
                        { "title": "Label", "text": "EMI" }
                    ]}
                ],
                "hub": {
                    "actions": [ { "uri": "spotify:track:xyz" } ],
                    "options": [ { "actions": [ { "uri": "https://music.apple.com/t/xyz" } ] } ]
                }
            }
        })
    }

    #[tokio::test]
    async fn recognizes_matched_clip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/recognize")
            .match_body(mockito::Matcher::Regex("fake audio".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(matched_track().to_string())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(&dir).await;
        let adapter = FingerprintAdapter::with_base_url(server.url(), Duration::from_secs(5));

        let outcome = adapter
            .execute(&clip_request("clip.mp3", b"fake audio"), &ctx)
            .await;

        let fulfillment = outcome.unwrap();
        assert_eq!(fulfillment.metadata.title, "Bohemian Rhapsody");
        assert_eq!(fulfillment.metadata.artist.as_deref(), Some("Queen"));
        assert_eq!(
            fulfillment.metadata.album.as_deref(),
            Some("A Night at the Opera")
        );
        assert_eq!(fulfillment.metadata.duration_secs, Some(354));
        assert_eq!(fulfillment.metadata.genre.as_deref(), Some("Rock"));
        assert_eq!(
            fulfillment.metadata.spotify_url.as_deref(),
            Some("spotify:track:xyz")
        );
        assert_eq!(
            fulfillment.metadata.apple_url.as_deref(),
            Some("https://music.apple.com/t/xyz")
        );
        assert_eq!(fulfillment.metadata.isrc.as_deref(), Some("GBUM71029604"));
        assert!(fulfillment.artifact.is_none());
        mock.assert_async().await;

        // The staged sample must not leak
        assert_eq!(ctx.store.live_count().await, 0);
    }

    #[tokio::test]
    async fn no_match_maps_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/recognize")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "track": null }).to_string())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(&dir).await;
        let adapter = FingerprintAdapter::with_base_url(server.url(), Duration::from_secs(5));

        let outcome = adapter
            .execute(&clip_request("clip.ogg", b"silence"), &ctx)
            .await;
        assert!(matches!(outcome, Err(RequestError::NotFound(_))));
    }

    #[tokio::test]
    async fn server_error_maps_to_upstream_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/recognize")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(&dir).await;
        let adapter = FingerprintAdapter::with_base_url(server.url(), Duration::from_secs(5));

        let outcome = adapter
            .execute(&clip_request("clip.mp3", b"audio"), &ctx)
            .await;
        assert!(matches!(
            outcome,
            Err(RequestError::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn malformed_body_maps_to_upstream_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/recognize")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{not json")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(&dir).await;
        let adapter = FingerprintAdapter::with_base_url(server.url(), Duration::from_secs(5));

        let outcome = adapter
            .execute(&clip_request("clip.mp3", b"audio"), &ctx)
            .await;
        assert!(matches!(
            outcome,
            Err(RequestError::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn rejects_bad_clips_before_any_network_call() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(&dir).await;
        // Unroutable base URL: a network attempt would fail loudly, which is
        // exactly what these cases must never reach
        let adapter =
            FingerprintAdapter::with_base_url("http://127.0.0.1:1", Duration::from_secs(1));

        let outcome = adapter
            .execute(&clip_request("notes.txt", b"hello"), &ctx)
            .await;
        assert!(matches!(outcome, Err(RequestError::UnsupportedInput(_))));

        let outcome = adapter.execute(&clip_request("clip.mp3", b""), &ctx).await;
        assert!(matches!(outcome, Err(RequestError::UnsupportedInput(_))));

        static BIG: [u8; 2048] = [0u8; 2048];
        let outcome = adapter
            .execute(&clip_request("clip.mp3", &BIG), &ctx)
            .await;
        assert!(matches!(
            outcome,
            Err(RequestError::SizeOrDurationExceeded(_))
        ));
    }
}
