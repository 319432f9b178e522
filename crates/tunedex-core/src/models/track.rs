//! Normalized track metadata
//!
//! One schema for both recognition matches and retrieved media. Adapters
//! convert whatever their external service returns into this shape, isolating
//! provider schema drift from the rest of the pipeline.

use serde::{Deserialize, Serialize};

use crate::models::Platform;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spotify_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apple_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_url: Option<String>,
    /// Platform the media was retrieved from (retrieval outcomes only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_platform: Option<Platform>,
    /// Provider-side identifier (fingerprint-service track key, video id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isrc: Option<String>,
}

impl TrackMetadata {
    /// Display label in the `Artist - Title` form used for artifact naming.
    pub fn display_name(&self) -> String {
        match &self.artist {
            Some(artist) if !artist.is_empty() => format!("{} - {}", artist, self.title),
            _ => self.title.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_artist() {
        let mut meta = TrackMetadata {
            title: "Song".into(),
            ..Default::default()
        };
        assert_eq!(meta.display_name(), "Song");

        meta.artist = Some("Band".into());
        assert_eq!(meta.display_name(), "Band - Song");
    }
}
