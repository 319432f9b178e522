//! Input validation and URL normalization
//!
//! URL canonicalization keeps cache keys stable across the many spellings a
//! link can arrive in: short hosts, mobile subdomains, tracking query
//! parameters. YouTube links collapse to the 11-character video id form and
//! Instagram links to the post shortcode form.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::models::Platform;

/// Audio extensions accepted for recognition clips.
pub const AUDIO_EXTENSIONS: [&str; 8] = ["mp3", "m4a", "wav", "ogg", "flac", "aac", "wma", "opus"];

/// Video extensions accepted for recognition clips (audio gets sampled out
/// by the fingerprint service).
pub const VIDEO_EXTENSIONS: [&str; 8] = ["mp4", "avi", "mov", "mkv", "webm", "flv", "wmv", "m4v"];

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^https?://(?:(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,6}\.?|localhost|\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(?::\d+)?(?:/?|[/?]\S+)$",
    )
    .expect("url regex")
});

static YOUTUBE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:watch\?v=|embed/|youtu\.be/|/v/)([0-9A-Za-z_-]{11})").expect("youtube regex")
});

static INSTAGRAM_SHORTCODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:instagram\.com|instagr\.am)/(?:p|reel|tv)/([^/?#]+)").expect("instagram regex")
});

/// Syntactic URL check. Matching here does not imply the platform is
/// supported, only that the text is a plausible http(s) URL.
pub fn is_valid_url(url: &str) -> bool {
    URL_RE.is_match(url)
}

/// Extract the lowercased host portion of a URL, without port.
pub fn host_of(url: &str) -> Option<String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.split('@').next_back()?;
    let host = host.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

/// Match a URL against the registered platform host patterns.
pub fn detect_platform(url: &str) -> Option<Platform> {
    let host = host_of(url)?;
    Platform::ALL.iter().copied().find(|p| p.matches_host(&host))
}

/// Extract the 11-character YouTube video id, if present.
pub fn extract_youtube_id(url: &str) -> Option<String> {
    YOUTUBE_ID_RE
        .captures(url)
        .map(|c| c[1].to_string())
}

/// Extract the Instagram post/reel shortcode, if present.
pub fn extract_instagram_shortcode(url: &str) -> Option<String> {
    INSTAGRAM_SHORTCODE_RE
        .captures(url)
        .map(|c| c[1].to_string())
}

/// Canonicalize a URL into its cache-key form.
pub fn canonicalize_url(url: &str) -> String {
    match detect_platform(url) {
        Some(Platform::Youtube) => {
            if let Some(id) = extract_youtube_id(url) {
                return format!("https://www.youtube.com/watch?v={}", id);
            }
        }
        Some(Platform::Instagram) => {
            if let Some(code) = extract_instagram_shortcode(url) {
                return format!("https://www.instagram.com/p/{}/", code);
            }
        }
        _ => {}
    }

    // Generic form: lowercased host, path kept verbatim, query and fragment
    // stripped, trailing slash trimmed.
    let (scheme, rest) = if let Some(r) = url.strip_prefix("https://") {
        ("https", r)
    } else if let Some(r) = url.strip_prefix("http://") {
        ("http", r)
    } else {
        return url.trim_end_matches('/').to_string();
    };

    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    let rest = &rest[..end];
    let (host, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, ""),
    };

    format!(
        "{}://{}{}",
        scheme,
        host.to_ascii_lowercase(),
        path.trim_end_matches('/')
    )
}

/// Lowercased file extension, without the dot.
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn is_audio_file(filename: &str) -> bool {
    file_extension(filename)
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn is_video_file(filename: &str) -> bool {
    file_extension(filename)
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Strip characters that are unsafe in filenames and bound the length.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect();
    let cleaned = cleaned.trim_matches(['.', ' ']);

    let truncated: String = cleaned.chars().take(200).collect();
    if truncated.is_empty() {
        "unnamed".to_string()
    } else {
        truncated
    }
}

/// Human-readable duration (`M:SS` or `H:MM:SS`).
pub fn format_duration(seconds: u64) -> String {
    let (hours, rem) = (seconds / 3600, seconds % 3600);
    let (minutes, seconds) = (rem / 60, rem % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Human-readable byte size.
pub fn format_file_size(size_bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if size_bytes == 0 {
        return "0 B".to_string();
    }
    let mut size = size_bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_validity() {
        assert!(is_valid_url("https://youtube.com/watch?v=abc123def45"));
        assert!(is_valid_url("http://localhost:8080/x"));
        assert!(!is_valid_url("not a url"));
        assert!(!is_valid_url("ftp://example.com/file"));
        assert!(!is_valid_url("youtube.com/watch"));
    }

    #[test]
    fn host_extraction() {
        assert_eq!(
            host_of("https://WWW.YouTube.com/watch?v=x"),
            Some("www.youtube.com".to_string())
        );
        assert_eq!(
            host_of("http://pin.it:443/abc"),
            Some("pin.it".to_string())
        );
        assert_eq!(host_of("garbage"), None);
    }

    #[test]
    fn platform_detection() {
        assert_eq!(
            detect_platform("https://youtu.be/dQw4w9WgXcQ"),
            Some(Platform::Youtube)
        );
        assert_eq!(
            detect_platform("https://www.instagram.com/reel/Cx1/"),
            Some(Platform::Instagram)
        );
        assert_eq!(
            detect_platform("https://m.tiktok.com/v/123"),
            Some(Platform::TikTok)
        );
        assert_eq!(detect_platform("https://example.com/a"), None);
    }

    #[test]
    fn youtube_canonical_forms_collapse() {
        let canonical = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL1",
            "https://youtu.be/dQw4w9WgXcQ?t=10",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
        ] {
            assert_eq!(canonicalize_url(url), canonical, "url: {}", url);
        }
    }

    #[test]
    fn instagram_canonical_forms_collapse() {
        let canonical = "https://www.instagram.com/p/Cxyz123/";
        for url in [
            "https://www.instagram.com/p/Cxyz123/?igshid=abc",
            "https://instagram.com/reel/Cxyz123",
            "https://instagr.am/p/Cxyz123/",
        ] {
            assert_eq!(canonicalize_url(url), canonical, "url: {}", url);
        }
    }

    #[test]
    fn generic_canonicalization_strips_query_and_case() {
        assert_eq!(
            canonicalize_url("https://SoundCloud.com/Artist/Track/?in=playlist"),
            "https://soundcloud.com/Artist/Track"
        );
    }

    #[test]
    fn clip_extension_checks() {
        assert!(is_audio_file("song.MP3"));
        assert!(is_audio_file("x.flac"));
        assert!(is_video_file("clip.mp4"));
        assert!(!is_audio_file("notes.txt"));
        assert!(!is_video_file("noext"));
    }

    #[test]
    fn filename_sanitizing() {
        assert_eq!(sanitize_filename("a/b\\c:d*e?.mp3"), "abcde.mp3");
        assert_eq!(sanitize_filename("  ...  "), "unnamed");
        assert_eq!(sanitize_filename("ok name.mp3"), "ok name.mp3");
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(225), "3:45");
        assert_eq!(format_duration(5025), "1:23:45");
    }

    #[test]
    fn size_formatting() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512.0 B");
        assert_eq!(format_file_size(50 * 1024 * 1024), "50.0 MB");
    }
}
