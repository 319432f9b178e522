//! Platform retrieval adapters
//!
//! One `PlatformAdapter` per supported platform, all sharing the same
//! extraction backend. Limits are checked twice: against the probe's
//! estimates before any media moves, and against the real file after the
//! fetch, since probe figures can be absent or wrong.

use async_trait::async_trait;
use std::sync::Arc;

use tunedex_core::models::{Fulfillment, Outcome, Platform, Request, RequestPayload, TrackMetadata};
use tunedex_core::validation::{format_duration, format_file_size, is_valid_url};
use tunedex_core::RequestError;
use tunedex_store::ArtifactKind;

use crate::capability::{Capability, CapabilityContext};
use crate::extractor::{ExtractError, ExtractorBackend, FormatPolicy, ProbeInfo};

/// Retrieval capability for one platform.
#[derive(Debug)]
pub struct PlatformAdapter {
    platform: Platform,
    backend: Arc<dyn ExtractorBackend>,
    policy: FormatPolicy,
    name: String,
}

impl PlatformAdapter {
    /// Build the adapter for any platform with its default format policy:
    /// audio extraction for audio-first platforms, best media for the rest.
    pub fn for_platform(platform: Platform, backend: Arc<dyn ExtractorBackend>) -> Self {
        let policy = match platform {
            Platform::Youtube | Platform::SoundCloud => FormatPolicy::AudioMp3,
            Platform::Instagram | Platform::TikTok | Platform::Pinterest => {
                FormatPolicy::BestMedia
            }
        };
        Self::with_policy(platform, backend, policy)
    }

    pub fn with_policy(
        platform: Platform,
        backend: Arc<dyn ExtractorBackend>,
        policy: FormatPolicy,
    ) -> Self {
        Self {
            name: format!("retrieval:{}", platform),
            platform,
            backend,
            policy,
        }
    }

    fn check_probe_limits(&self, probe: &ProbeInfo, ctx: &CapabilityContext) -> Result<(), RequestError> {
        if let Some(duration) = probe.duration {
            // Compare in f64 seconds: the probe is untrusted JSON and can
            // report values no Duration can hold
            if !duration.is_finite() || duration < 0.0 {
                return Err(RequestError::UpstreamUnavailable(format!(
                    "probe reported invalid duration: {}",
                    duration
                )));
            }
            if duration > ctx.limits.max_duration.as_secs_f64() {
                return Err(RequestError::SizeOrDurationExceeded(format!(
                    "media runs {:.0}s, limit is {}",
                    duration,
                    format_duration(ctx.limits.max_duration.as_secs())
                )));
            }
        }
        if let Some(size) = probe.size_estimate() {
            if size > ctx.limits.max_bytes {
                return Err(RequestError::SizeOrDurationExceeded(format!(
                    "media is about {}, limit is {}",
                    format_file_size(size),
                    format_file_size(ctx.limits.max_bytes)
                )));
            }
        }
        Ok(())
    }

    fn metadata_from_probe(&self, probe: &ProbeInfo) -> TrackMetadata {
        TrackMetadata {
            title: probe
                .title
                .clone()
                .unwrap_or_else(|| format!("{} media", self.platform)),
            artist: probe.uploader.clone(),
            duration_secs: probe.duration.map(|d| d.round() as u64),
            thumbnail_url: probe.thumbnail.clone(),
            youtube_url: match self.platform {
                Platform::Youtube => probe.webpage_url.clone(),
                _ => None,
            },
            source_platform: Some(self.platform),
            provider_id: probe.id.clone(),
            ..TrackMetadata::default()
        }
    }
}

fn map_extract_error(err: ExtractError) -> RequestError {
    match err {
        ExtractError::NotFound(msg) => RequestError::NotFound(msg),
        ExtractError::Unsupported(msg) => RequestError::UnsupportedInput(msg),
        ExtractError::Backend(msg) => RequestError::UpstreamUnavailable(msg),
    }
}

#[async_trait]
impl Capability for PlatformAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, request: &Request, ctx: &CapabilityContext) -> Outcome {
        let RequestPayload::Link { url } = &request.payload else {
            return Err(RequestError::UnsupportedInput(
                "retrieval requires a link".to_string(),
            ));
        };
        if !is_valid_url(url) {
            return Err(RequestError::UnsupportedInput(format!(
                "not a valid url: {}",
                url
            )));
        }

        let probe = self.backend.probe(url).await.map_err(map_extract_error)?;
        self.check_probe_limits(&probe, ctx)?;

        let handle = ctx.store.acquire(ArtifactKind::Download, self.policy.extension());
        tracing::info!(
            requester = %request.requester,
            platform = %self.platform,
            title = probe.title.as_deref().unwrap_or("unknown"),
            "Fetching media"
        );

        self.backend
            .fetch(url, self.policy, handle.path())
            .await
            .map_err(map_extract_error)?;

        // The probe can underreport; verify what actually landed on disk.
        // The handle drops and removes the file if we bail here.
        let size = tokio::fs::metadata(handle.path())
            .await
            .map_err(|e| RequestError::Internal(format!("fetched file unreadable: {}", e)))?
            .len();
        if size > ctx.limits.max_bytes {
            return Err(RequestError::SizeOrDurationExceeded(format!(
                "media is {}, limit is {}",
                format_file_size(size),
                format_file_size(ctx.limits.max_bytes)
            )));
        }

        let metadata = self.metadata_from_probe(&probe);
        let artifact = ctx
            .store
            .commit(handle)
            .await
            .map_err(|e| RequestError::Internal(format!("failed to commit artifact: {}", e)))?;

        tracing::info!(
            platform = %self.platform,
            artifact_id = %artifact.id,
            size_bytes = artifact.size_bytes,
            "Media retrieved"
        );

        Ok(Fulfillment {
            metadata,
            artifact: Some(artifact),
        })
    }
}
