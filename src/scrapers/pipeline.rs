use crate::models::ExtractedListing;
use crate::scrapers::assemble::assemble;
use crate::scrapers::expand::expand;
use crate::scrapers::fields::{extract_fields, ExtractionContext};
use crate::scrapers::images::ImageAggregator;
use crate::scrapers::traits::PageHost;
use crate::scrapers::types::ExtractorConfig;
use anyhow::{Context, Result};
use std::fmt;
use tracing::info;

/// Where a run currently is; runs only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Idle,
    Expanding,
    Extracting,
    Assembled,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Idle => "idle",
            RunStage::Expanding => "expanding",
            RunStage::Extracting => "extracting",
            RunStage::Assembled => "assembled",
        };
        f.write_str(name)
    }
}

/// Expand, extract and assemble one listing from a page host
pub struct ListingExtractor {
    config: ExtractorConfig,
}

impl ListingExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Only an unreadable page fails the run; everything else degrades to
    /// empty fields.
    pub fn run<H: PageHost + ?Sized>(&self, host: &H) -> Result<ExtractedListing> {
        let mut stage = RunStage::Idle;
        info!(%stage, "starting extraction run");

        stage = RunStage::Expanding;
        info!(%stage, "expanding truncated content");
        let report = expand(host, &self.config.expansion);

        stage = RunStage::Extracting;
        info!(%stage, clicked = report.clicked, "reading page");
        let snapshot = host
            .snapshot()
            .context("Page representation unavailable after expansion")?;

        let ctx = ExtractionContext {
            snapshot: &snapshot,
            walk_max_steps: self.config.walk_max_steps,
        };
        let fields = extract_fields(&ctx);
        let images = ImageAggregator::new(self.config.image_cap).collect(&snapshot);

        let listing = assemble(&snapshot, fields, images, &self.config);
        stage = RunStage::Assembled;
        info!(
            %stage,
            title = %listing.title,
            price = %listing.price_text,
            images = listing.images.len(),
            "listing assembled"
        );

        Ok(listing)
    }
}

impl Default for ListingExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::expand::tests::{clickable, FakeHost};
    use crate::scrapers::fields::contains_blocked_term;
    use crate::scrapers::images::normalize_image_url;
    use crate::scrapers::snapshot::PageSnapshot;
    use crate::scrapers::traits::Clickable;
    use anyhow::bail;
    use std::collections::HashSet;
    use std::time::Duration;

    const LISTING_PAGE: &str = r#"<html>
        <head>
            <title>(2) Marketplace - Apartment for rent | Facebook</title>
            <meta property="og:title" content="2BR apartment near campus">
        </head>
        <body>
            <div role="navigation"><span>Marketplace</span><span>Notifications</span></div>
            <div>
                <h1>Bright 2 bedroom apartment near campus</h1>
                <span>$1,200 / month</span>
                <div>2 bedrooms · 1.5 bathrooms</div>
                <div>Available: October 1</div>
            </div>
            <div>
                <div><span>Description</span></div>
                <div>Top floor unit with large windows, in-suite laundry and a short walk to campus.</div>
                <div>See more</div>
            </div>
            <div><h3>Seller details</h3><span>Alex</span></div>
            <img src="https://scontent.example.net/v/one.jpg?stp=1">
            <img src="https://scontent.example.net/v/two.jpg">
            <img src="https://scontent.example.net/v/one.jpg?stp=2">
        </body>
    </html>"#;

    fn page_host(html: &str, rounds: Vec<Vec<Clickable>>) -> FakeHost {
        let mut host = FakeHost::with_rounds(rounds);
        host.html = html.to_string();
        host
    }

    #[test]
    fn test_end_to_end_listing() {
        let host = page_host(LISTING_PAGE, vec![vec![clickable(1, "See more")]]);

        let listing = ListingExtractor::default().run(&host).unwrap();

        assert_eq!(listing.title, "Bright 2 bedroom apartment near campus");
        assert_eq!(listing.price_text, "$1,200");
        assert_eq!(listing.bedroom_count, Some(2));
        assert_eq!(listing.bathroom_count, Some(1.5));
        assert_eq!(
            listing.description_text,
            "Top floor unit with large windows, in-suite laundry and a short walk to campus."
        );
        assert_eq!(listing.availability_text, "Available: October 1");
        assert_eq!(listing.title_meta, "2BR apartment near campus");
        assert_eq!(
            listing.images,
            vec![
                "https://scontent.example.net/v/one.jpg".to_string(),
                "https://scontent.example.net/v/two.jpg".to_string(),
            ]
        );
        assert_eq!(listing.source_url, "https://example.com/item/1");
        assert_eq!(listing.canonical_url, "https://example.com/item/1");
        assert!(host.actions().contains(&"click 1".to_string()));
    }

    #[test]
    fn test_unrecognizable_page_yields_mostly_empty_record() {
        let host = page_host(
            "<html><body><div>Menu</div><div>Welcome back</div></body></html>",
            vec![],
        );

        let listing = ListingExtractor::default().run(&host).unwrap();

        assert_eq!(listing.price_text, "");
        assert_eq!(listing.description_text, "");
        assert_eq!(listing.location_text, "");
        assert_eq!(listing.bedroom_text, "");
        assert_eq!(listing.bedroom_count, None);
        assert_eq!(listing.bathroom_count, None);
        assert!(listing.images.is_empty());
        assert_eq!(listing.raw_text, "Menu\nWelcome back");
    }

    #[test]
    fn test_extracted_fields_respect_invariants() {
        let host = page_host(LISTING_PAGE, vec![]);
        let listing = ListingExtractor::default().run(&host).unwrap();

        for value in [
            &listing.title,
            &listing.price_text,
            &listing.description_text,
            &listing.location_text,
            &listing.availability_text,
            &listing.bedroom_text,
            &listing.bathroom_text,
            &listing.pets_text,
            &listing.furnished_text,
            &listing.posted_text,
            &listing.title_meta,
            &listing.description_meta,
        ] {
            assert!(!contains_blocked_term(value), "blocked term in {value:?}");
        }

        let stripped: HashSet<String> =
            listing.images.iter().map(|u| normalize_image_url(u)).collect();
        assert_eq!(stripped.len(), listing.images.len());
    }

    struct UnreadablePage;

    impl PageHost for UnreadablePage {
        fn clickables(&self) -> Result<Vec<Clickable>> {
            bail!("no document")
        }

        fn scroll_into_view(&self, _handle: usize) -> Result<()> {
            Ok(())
        }

        fn click(&self, _handle: usize) -> Result<()> {
            Ok(())
        }

        fn pause(&self, _duration: Duration) {}

        fn snapshot(&self) -> Result<PageSnapshot> {
            bail!("tab crashed")
        }
    }

    #[test]
    fn test_unreadable_page_is_total_fault() {
        let err = ListingExtractor::default().run(&UnreadablePage).unwrap_err();
        assert!(err.to_string().contains("Page representation unavailable"));
    }
}
