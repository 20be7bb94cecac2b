//! Image and video URL extraction from a content region.
//!
//! Images are kept when they resolve to an absolute `http(s)` URL, are not
//! explicitly smaller than [`MIN_IMAGE_DIMENSION`], and carry no chrome
//! token (`icon`, `logo`, `avatar`, ...) in their class, id or alt text.
//! Videos come from iframes on known video hosts and from native
//! `<video>`/`<source>` elements.

use crate::utils::resolve_http_url;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use url::Url;

/// Explicit `width`/`height` below this many pixels marks an image as chrome.
pub const MIN_IMAGE_DIMENSION: u32 = 100;

const CHROME_IMAGE_TOKENS: &[&str] = &[
    "icon",
    "logo",
    "avatar",
    "profile",
    "badge",
    "thumbnail",
    "banner",
    "favicon",
];

const VIDEO_HOSTS: &[&str] = &[
    "youtube.com",
    "youtube-nocookie.com",
    "youtu.be",
    "vimeo.com",
    "dailymotion.com",
    "player.twitch.tv",
    "ted.com",
    "metacafe.com",
    "wistia.com",
    "wistia.net",
];

const LAZY_SRC_ATTRS: &[&str] = &["src", "data-src", "data-lazy-src", "data-original"];

static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("valid img selector"));
static IFRAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("iframe[src]").expect("valid iframe selector"));
static NATIVE_VIDEO: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("video[src], video source[src]").expect("valid video selector")
});

/// Deduplicated media URLs, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaUrls {
    pub images: Vec<String>,
    pub videos: Vec<String>,
}

/// Collect content images and videos below `region`.
pub fn extract_media(region: ElementRef<'_>, base: &Url) -> MediaUrls {
    let images = region
        .select(&IMG)
        .filter(|img| !is_chrome_image(*img))
        .filter(|img| !is_too_small(*img))
        .filter_map(|img| image_source(img, base))
        .unique()
        .collect();

    let embedded = region
        .select(&IFRAME)
        .filter_map(|iframe| iframe.value().attr("src"))
        .filter_map(|src| resolve_http_url(base, src))
        .filter(is_video_host)
        .map(|url| url.to_string());
    let native = region
        .select(&NATIVE_VIDEO)
        .filter_map(|el| el.value().attr("src"))
        .filter_map(|src| resolve_http_url(base, src))
        .map(|url| url.to_string());
    let videos = embedded.chain(native).unique().collect();

    MediaUrls { images, videos }
}

/// First usable source of an image; lazy-loading attributes are consulted
/// when `src` is missing or a `data:` placeholder.
fn image_source(img: ElementRef<'_>, base: &Url) -> Option<String> {
    LAZY_SRC_ATTRS
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .map(str::trim)
        .filter(|src| !src.is_empty() && !src.to_ascii_lowercase().starts_with("data:"))
        .find_map(|src| resolve_http_url(base, src))
        .map(|url| url.to_string())
}

fn is_chrome_image(img: ElementRef<'_>) -> bool {
    let el = img.value();
    let haystack = [
        el.attr("class").unwrap_or_default(),
        el.id().unwrap_or_default(),
        el.attr("alt").unwrap_or_default(),
    ]
    .join(" ")
    .to_lowercase();
    CHROME_IMAGE_TOKENS.iter().any(|token| haystack.contains(token))
}

fn is_too_small(img: ElementRef<'_>) -> bool {
    ["width", "height"]
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .filter_map(parse_pixels)
        .any(|px| px < MIN_IMAGE_DIMENSION)
}

/// `"50"` and `"50px"` are pixel sizes; percentages and junk are ignored.
fn parse_pixels(value: &str) -> Option<u32> {
    let value = value.trim();
    if value.ends_with('%') {
        return None;
    }
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn is_video_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    VIDEO_HOSTS
        .iter()
        .any(|allowed| host == *allowed || host.ends_with(&format!(".{allowed}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn media(html: &str) -> MediaUrls {
        let doc = Html::parse_document(html);
        let base = Url::parse("https://example.com/news/story").unwrap();
        extract_media(doc.root_element(), &base)
    }

    #[test]
    fn test_resolves_and_keeps_content_images() {
        let found = media(
            r#"<article>
                <img src="/img/photo.jpg" alt="A crowd at the rally">
                <img src="//cdn.example.com/chart.png" width="640">
                <img src="https://example.com/img/photo.jpg">
            </article>"#,
        );
        assert_eq!(
            found.images,
            vec!["https://example.com/img/photo.jpg", "https://cdn.example.com/chart.png"]
        );
    }

    #[test]
    fn test_excludes_chrome_images() {
        let found = media(
            r#"<div>
                <img src="/a.png" class="site-logo">
                <img src="/b.png" id="user-avatar">
                <img src="/c.png" alt="Author profile picture">
                <img src="/d.png" class="Badge-new">
                <img src="/e.png" class="post-thumbnail">
                <img src="/f.png" alt="icon">
                <img src="/g.png" class="top-banner">
                <img src="/ok.png" class="wp-image-12">
            </div>"#,
        );
        assert_eq!(found.images, vec!["https://example.com/ok.png"]);
    }

    #[test]
    fn test_excludes_small_and_data_images() {
        let found = media(
            r#"<div>
                <img src="/tiny.png" width="32" height="32">
                <img src="/short.png" height="40px">
                <img src="/wide.png" width="100%">
                <img src="data:image/gif;base64,R0lGOD">
                <img src="data:image/gif;base64,R0lGOD" data-src="/lazy.jpg">
            </div>"#,
        );
        assert_eq!(
            found.images,
            vec!["https://example.com/wide.png", "https://example.com/lazy.jpg"]
        );
        assert!(found.images.iter().all(|u| !u.starts_with("data:")));
    }

    #[test]
    fn test_videos_from_allowed_hosts_and_native_tags() {
        let found = media(
            r#"<div>
                <iframe src="https://www.youtube.com/embed/abc123"></iframe>
                <iframe src="https://ads.example.net/frame"></iframe>
                <iframe src="//player.vimeo.com/video/42"></iframe>
                <video src="/media/clip.mp4"></video>
                <video><source src="https://cdn.example.com/v.webm"></video>
                <iframe src="https://www.youtube.com/embed/abc123"></iframe>
            </div>"#,
        );
        assert_eq!(
            found.videos,
            vec![
                "https://www.youtube.com/embed/abc123",
                "https://player.vimeo.com/video/42",
                "https://example.com/media/clip.mp4",
                "https://cdn.example.com/v.webm",
            ]
        );
    }
}
