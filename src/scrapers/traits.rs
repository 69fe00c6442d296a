use crate::models::{IngestPayload, IngestResponse};
use crate::scrapers::snapshot::PageSnapshot;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// A clickable element as reported by the page host
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Clickable {
    /// Host-specific handle passed back to `scroll_into_view` / `click`
    pub handle: usize,
    pub text: String,
    pub width: f64,
    pub height: f64,
}

impl Clickable {
    /// Rendered with a non-zero box
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Capabilities the engine needs from whatever hosts the page
/// (a live browser tab, a saved file, a test fixture)
pub trait PageHost {
    /// Clickable elements in document order
    fn clickables(&self) -> Result<Vec<Clickable>>;

    fn scroll_into_view(&self, handle: usize) -> Result<()>;

    fn click(&self, handle: usize) -> Result<()>;

    /// Block for a fixed duration
    fn pause(&self, duration: Duration);

    /// Read the current document state
    fn snapshot(&self) -> Result<PageSnapshot>;
}

/// Receiver of assembled listings
#[async_trait]
pub trait IngestSink: Send + Sync {
    async fn submit(&self, payload: &IngestPayload) -> Result<IngestResponse>;

    /// Name used in logs
    fn sink_name(&self) -> &'static str;
}
