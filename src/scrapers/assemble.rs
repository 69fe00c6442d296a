use crate::models::ExtractedListing;
use crate::scrapers::fields::ExtractedFields;
use crate::scrapers::images::ImageSet;
use crate::scrapers::snapshot::{selector, PageSnapshot};
use crate::scrapers::types::ExtractorConfig;
use chrono::Utc;

/// Package extractor outputs into the listing record. Values are taken as
/// the extractors produced them.
pub fn assemble(
    snapshot: &PageSnapshot,
    fields: ExtractedFields,
    images: ImageSet,
    config: &ExtractorConfig,
) -> ExtractedListing {
    ExtractedListing {
        title: fields.title,
        price_text: fields.price_text,
        description_text: fields.description_text,
        location_text: fields.location_text,
        availability_text: fields.availability_text,
        bedroom_text: fields.bedroom_text,
        bedroom_count: fields.bedroom_count,
        bathroom_text: fields.bathroom_text,
        bathroom_count: fields.bathroom_count,
        pets_text: fields.pets_text,
        furnished_text: fields.furnished_text,
        posted_text: fields.posted_text,
        title_meta: fields.title_meta,
        description_meta: fields.description_meta,
        images: images.dom,
        images_meta: images.meta,
        background_images: images.background,
        all_images: images.all,
        canonical_url: canonical_url(snapshot),
        source_url: snapshot.url().to_string(),
        raw_text: snapshot.raw_text(config.raw_text_limit),
        raw_html_excerpt: snapshot.raw_html_excerpt(config.raw_html_limit),
        extracted_at: Utc::now(),
    }
}

fn canonical_url(snapshot: &PageSnapshot) -> String {
    selector(r#"link[rel="canonical"]"#)
        .ok()
        .and_then(|sel| {
            snapshot
                .document()
                .select(&sel)
                .filter_map(|link| link.value().attr("href"))
                .find_map(|href| snapshot.resolve_url(href))
        })
        .unwrap_or_else(|| snapshot.url().to_string())
}
