use crate::scrapers::snapshot::{selector, PageSnapshot};
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Lazy-load attributes tried when `src` is missing or a placeholder
const LAZY_SRC_ATTRS: &[&str] = &["data-src", "data-lazy-src", "data-original"];

static GALLERY_ALLOW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)scontent|fbcdn|\.(?:jpe?g|png|webp)$").unwrap());
static NON_LISTING_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)profile|avatar|emoji").unwrap());
static CSS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)background(?:-image)?\s*:[^;]*?url\(\s*['"]?([^'")]+)['"]?\s*\)"#).unwrap()
});

/// Image URLs found on a page, per discovery channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageSet {
    /// `<img>` sources passing the gallery allowlist
    pub dom: Vec<String>,
    pub meta: Vec<String>,
    pub background: Vec<String>,
    /// dom, meta and background merged in that order
    pub all: Vec<String>,
}

/// Drop query string and fragment
pub fn normalize_image_url(url: &str) -> String {
    let end = url.find(|c: char| c == '?' || c == '#').unwrap_or(url.len());
    url[..end].to_string()
}

/// Collects and deduplicates image URLs from a snapshot
pub struct ImageAggregator {
    cap: usize,
}

impl ImageAggregator {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    pub fn collect(&self, snapshot: &PageSnapshot) -> ImageSet {
        let dom_raw = channel("img", img_sources(snapshot));
        let meta = channel("meta", meta_images(snapshot));
        let background = channel("background", background_images(snapshot));

        let dom: Vec<String> = dom_raw
            .into_iter()
            .filter(|url| GALLERY_ALLOW.is_match(url))
            .collect();

        let set = ImageSet {
            dom: self.dedup(dom.iter()),
            meta: self.dedup(meta.iter()),
            background: self.dedup(background.iter()),
            all: self.dedup(dom.iter().chain(meta.iter()).chain(background.iter())),
        };
        debug!(
            dom = set.dom.len(),
            meta = set.meta.len(),
            background = set.background.len(),
            all = set.all.len(),
            "collected images"
        );
        set
    }

    /// Keep first occurrences, in order, up to the cap
    fn dedup<'a>(&self, urls: impl Iterator<Item = &'a String>) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        urls.filter(|url| seen.insert((*url).clone()))
            .take(self.cap)
            .cloned()
            .collect()
    }
}

/// Resolve, normalize and screen out avatars for one channel; a failing
/// channel contributes nothing
fn channel(name: &str, found: Result<Vec<String>>) -> Vec<String> {
    match found {
        Ok(urls) => urls
            .into_iter()
            .map(|url| normalize_image_url(&url))
            .filter(|url| !NON_LISTING_IMAGE.is_match(url))
            .collect(),
        Err(e) => {
            warn!(channel = name, error = %e, "image channel failed");
            Vec::new()
        }
    }
}

fn img_sources(snapshot: &PageSnapshot) -> Result<Vec<String>> {
    let selector = selector("img")?;
    Ok(snapshot
        .document()
        .select(&selector)
        .filter_map(|img| {
            let el = img.value();
            let src = el.attr("src").filter(|s| !is_placeholder(s));
            let lazy = LAZY_SRC_ATTRS
                .iter()
                .filter_map(|attr| el.attr(attr))
                .find(|s| !is_placeholder(s));
            let srcset = el
                .attr("srcset")
                .or_else(|| el.attr("data-srcset"))
                .and_then(|set| set.split(',').next())
                .and_then(|candidate| candidate.split_whitespace().next());

            src.or(lazy)
                .or(srcset)
                .and_then(|raw| snapshot.resolve_url(raw))
        })
        .collect())
}

fn meta_images(snapshot: &PageSnapshot) -> Result<Vec<String>> {
    let selector = selector(
        r#"meta[property="og:image"], meta[property="og:image:url"], meta[name="og:image"], meta[name="twitter:image"], meta[property="twitter:image"]"#,
    )?;
    Ok(snapshot
        .document()
        .select(&selector)
        .filter_map(|meta| meta.value().attr("content"))
        .filter_map(|raw| snapshot.resolve_url(raw))
        .collect())
}

fn background_images(snapshot: &PageSnapshot) -> Result<Vec<String>> {
    let styled = selector("[style]")?;
    let blocks = selector("style")?;
    let document = snapshot.document();

    let declarations = document
        .select(&styled)
        .filter_map(|el| el.value().attr("style").map(str::to_string))
        .chain(
            document
                .select(&blocks)
                .map(|el| el.text().collect::<String>()),
        );

    let mut urls = Vec::new();
    for css in declarations {
        for caps in CSS_URL.captures_iter(&css) {
            if let Some(url) = caps.get(1).and_then(|m| snapshot.resolve_url(m.as_str())) {
                urls.push(url);
            }
        }
    }
    Ok(urls)
}

fn is_placeholder(src: &str) -> bool {
    let src = src.trim();
    src.is_empty() || src.starts_with("data:")
}
