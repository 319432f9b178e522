//! Supported retrieval platforms

use serde::{Deserialize, Serialize};
use std::fmt;

/// External platform a retrieval URL can point at.
///
/// Host patterns are matched as suffixes of the URL host, so subdomains
/// (`www.youtube.com`, `m.tiktok.com`) match without being listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Instagram,
    TikTok,
    Pinterest,
    SoundCloud,
}

impl Platform {
    /// All platforms in registration/precedence order.
    pub const ALL: [Platform; 5] = [
        Platform::Youtube,
        Platform::Instagram,
        Platform::TikTok,
        Platform::Pinterest,
        Platform::SoundCloud,
    ];

    /// Host patterns this platform answers to.
    pub fn hosts(&self) -> &'static [&'static str] {
        match self {
            Platform::Youtube => &["youtube.com", "youtu.be"],
            Platform::Instagram => &["instagram.com", "instagr.am"],
            Platform::TikTok => &["tiktok.com"],
            Platform::Pinterest => &["pinterest.com", "pin.it"],
            Platform::SoundCloud => &["soundcloud.com"],
        }
    }

    /// Whether `host` (lowercased) belongs to this platform.
    pub fn matches_host(&self, host: &str) -> bool {
        self.hosts()
            .iter()
            .any(|h| host == *h || host.ends_with(&format!(".{}", h)))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Instagram => "instagram",
            Platform::TikTok => "tiktok",
            Platform::Pinterest => "pinterest",
            Platform::SoundCloud => "soundcloud",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
