use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A value produced by one strategy of a field's chain, with the
/// strategy's position in that chain (0 = most structural)
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionCandidate {
    pub value: String,
    pub strategy_rank: usize,
}

/// Best-effort listing record recovered from a single page.
///
/// String fields are empty, never missing, when no strategy produced a
/// usable value. Counts stay `None` in the same situation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedListing {
    pub title: String,
    pub price_text: String,
    pub description_text: String,
    pub location_text: String,
    pub availability_text: String,
    pub bedroom_text: String,
    pub bedroom_count: Option<u32>,
    pub bathroom_text: String,
    pub bathroom_count: Option<f32>,
    pub pets_text: String,
    pub furnished_text: String,
    pub posted_text: String,
    pub title_meta: String,
    pub description_meta: String,
    /// Primary gallery, query strings stripped, no duplicates
    pub images: Vec<String>,
    pub images_meta: Vec<String>,
    pub background_images: Vec<String>,
    pub all_images: Vec<String>,
    pub canonical_url: String,
    pub source_url: String,
    pub raw_text: String,
    pub raw_html_excerpt: String,
    pub extracted_at: DateTime<Utc>,
}

/// Body of `POST /api/ingest`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestPayload {
    pub source_url: String,
    pub raw_json: RawListingJson,
    pub raw_text: String,
    pub raw_html: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawListingJson {
    pub title: String,
    pub price: String,
    pub images: Vec<String>,
    pub images_meta: Vec<String>,
    pub background_images: Vec<String>,
    pub all_images: Vec<String>,
    pub canonical_url: String,
    pub title_meta: String,
    pub description_meta: String,
    pub description_text: String,
    pub location_text: String,
    pub availability_text: String,
    pub bedroom_text: String,
    pub bathroom_text: String,
    pub pets_text: String,
    pub furnished_text: String,
    pub posted_text: String,
}

impl From<&ExtractedListing> for IngestPayload {
    fn from(listing: &ExtractedListing) -> Self {
        Self {
            source_url: listing.source_url.clone(),
            raw_json: RawListingJson {
                title: listing.title.clone(),
                price: listing.price_text.clone(),
                images: listing.images.clone(),
                images_meta: listing.images_meta.clone(),
                background_images: listing.background_images.clone(),
                all_images: listing.all_images.clone(),
                canonical_url: listing.canonical_url.clone(),
                title_meta: listing.title_meta.clone(),
                description_meta: listing.description_meta.clone(),
                description_text: listing.description_text.clone(),
                location_text: listing.location_text.clone(),
                availability_text: listing.availability_text.clone(),
                bedroom_text: listing.bedroom_text.clone(),
                bathroom_text: listing.bathroom_text.clone(),
                pets_text: listing.pets_text.clone(),
                furnished_text: listing.furnished_text.clone(),
                posted_text: listing.posted_text.clone(),
            },
            raw_text: listing.raw_text.clone(),
            raw_html: listing.raw_html_excerpt.clone(),
        }
    }
}

/// Reply from the ingestion API; listings are created asynchronously, so
/// the id is usually absent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub created_listing_id: Option<i64>,
    pub status: String,
}
