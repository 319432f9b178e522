//! Platform extraction backend
//!
//! Wraps the external extractor binary behind a trait so retrieval adapters
//! and tests never spawn a real subprocess directly. The default
//! implementation shells out to `yt-dlp`: a JSON probe first, then the
//! actual fetch into a caller-provided destination.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Extraction failure, classified from the backend's stderr so the adapter
/// layer can map it onto the request error taxonomy.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The target is gone, private, or never existed
    #[error("media not found: {0}")]
    NotFound(String),

    /// The backend recognized the URL but cannot extract from it
    #[error("unsupported url: {0}")]
    Unsupported(String),

    /// Anything else: network trouble, backend crash, bad output
    #[error("extractor backend failure: {0}")]
    Backend(String),
}

/// Output format the fetch should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatPolicy {
    /// Extract the audio track and transcode to mp3
    AudioMp3,
    /// Keep the best available media as-is (video platforms)
    BestMedia,
}

impl FormatPolicy {
    pub fn extension(&self) -> &'static str {
        match self {
            FormatPolicy::AudioMp3 => "mp3",
            FormatPolicy::BestMedia => "mp4",
        }
    }
}

/// Metadata returned by a probe, before any media is transferred.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub filesize_approx: Option<u64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
}

impl ProbeInfo {
    /// Best available size estimate, exact figure preferred.
    pub fn size_estimate(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }
}

/// Seam between retrieval adapters and the extraction tool.
#[async_trait]
pub trait ExtractorBackend: Send + Sync + std::fmt::Debug {
    /// Inspect the target without transferring media.
    async fn probe(&self, url: &str) -> Result<ProbeInfo, ExtractError>;

    /// Transfer the media to `dest` in the requested format.
    async fn fetch(&self, url: &str, policy: FormatPolicy, dest: &Path)
        -> Result<(), ExtractError>;
}

/// `yt-dlp` subprocess backend.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    bin: String,
}

impl YtDlpExtractor {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>, ExtractError> {
        let output = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtractError::Backend(format!("failed to spawn {}: {}", self.bin, e)))?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_stderr(&stderr))
    }
}

/// Map the extractor's stderr onto our failure taxonomy. The tool exits
/// non-zero for wildly different reasons; its messages are the only signal.
fn classify_stderr(stderr: &str) -> ExtractError {
    let lowered = stderr.to_lowercase();
    let summary = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("unknown extractor error")
        .trim()
        .to_string();

    if lowered.contains("private")
        || lowered.contains("unavailable")
        || lowered.contains("does not exist")
        || lowered.contains("not exist")
        || lowered.contains("404")
        || lowered.contains("removed")
    {
        ExtractError::NotFound(summary)
    } else if lowered.contains("unsupported url") {
        ExtractError::Unsupported(summary)
    } else {
        ExtractError::Backend(summary)
    }
}

#[async_trait]
impl ExtractorBackend for YtDlpExtractor {
    async fn probe(&self, url: &str) -> Result<ProbeInfo, ExtractError> {
        tracing::debug!(url, "Probing media");
        let stdout = self
            .run(&["-J", "--no-warnings", "--no-playlist", url])
            .await?;

        serde_json::from_slice(&stdout)
            .map_err(|e| ExtractError::Backend(format!("unparseable probe output: {}", e)))
    }

    async fn fetch(
        &self,
        url: &str,
        policy: FormatPolicy,
        dest: &Path,
    ) -> Result<(), ExtractError> {
        let dest_str = dest
            .to_str()
            .ok_or_else(|| ExtractError::Backend("non-utf8 destination path".to_string()))?;

        let mut args: Vec<&str> = vec!["--no-warnings", "--no-playlist", "--no-part"];
        match policy {
            FormatPolicy::AudioMp3 => {
                args.extend(["-f", "bestaudio/best", "-x", "--audio-format", "mp3"]);
                args.extend(["--audio-quality", "192K"]);
            }
            FormatPolicy::BestMedia => {
                args.extend(["-f", "best"]);
            }
        }
        args.extend(["-o", dest_str, url]);

        tracing::debug!(url, dest = dest_str, ?policy, "Fetching media");
        self.run(&args).await?;

        if !dest.exists() {
            return Err(ExtractError::Backend(
                "extractor reported success but produced no file".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_classification() {
        assert!(matches!(
            classify_stderr("ERROR: [instagram] abc: This post is private"),
            ExtractError::NotFound(_)
        ));
        assert!(matches!(
            classify_stderr("ERROR: Video unavailable"),
            ExtractError::NotFound(_)
        ));
        assert!(matches!(
            classify_stderr("ERROR: HTTP Error 404: Not Found"),
            ExtractError::NotFound(_)
        ));
        assert!(matches!(
            classify_stderr("ERROR: Unsupported URL: https://example.com/x"),
            ExtractError::Unsupported(_)
        ));
        assert!(matches!(
            classify_stderr("ERROR: unable to download webpage: timed out"),
            ExtractError::Backend(_)
        ));
        assert!(matches!(classify_stderr(""), ExtractError::Backend(_)));
    }

    #[test]
    fn classification_uses_last_meaningful_line() {
        let err = classify_stderr("WARNING: cookies\nERROR: Unsupported URL: https://x\n\n");
        match err {
            ExtractError::Unsupported(msg) => {
                assert!(msg.contains("Unsupported URL"));
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn size_estimate_prefers_exact() {
        let info = ProbeInfo {
            filesize: Some(100),
            filesize_approx: Some(200),
            ..Default::default()
        };
        assert_eq!(info.size_estimate(), Some(100));

        let info = ProbeInfo {
            filesize: None,
            filesize_approx: Some(200),
            ..Default::default()
        };
        assert_eq!(info.size_estimate(), Some(200));
    }

    #[test]
    fn probe_json_shape() {
        let info: ProbeInfo = serde_json::from_str(
            r#"{
                "id": "dQw4w9WgXcQ",
                "title": "Never Gonna Give You Up",
                "uploader": "Rick Astley",
                "duration": 212.0,
                "filesize_approx": 3400000,
                "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.jpg",
                "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                "extractor": "youtube",
                "formats": []
            }"#,
        )
        .unwrap();
        assert_eq!(info.id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(info.duration, Some(212.0));
        assert_eq!(info.size_estimate(), Some(3400000));
    }

    #[tokio::test]
    async fn missing_binary_is_a_backend_error() {
        let extractor = YtDlpExtractor::new("definitely-not-a-real-binary-5150");
        let err = extractor.probe("https://example.com/x").await.unwrap_err();
        assert!(matches!(err, ExtractError::Backend(_)));
    }
}
