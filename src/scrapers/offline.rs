use crate::scrapers::snapshot::PageSnapshot;
use crate::scrapers::traits::{Clickable, PageHost};
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

/// A saved page: nothing to click, nothing to wait for
pub struct StaticPage {
    url: String,
    html: String,
}

impl StaticPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn from_file(url: impl Into<String>, path: &Path) -> Result<Self> {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self::new(url, html))
    }
}

impl PageHost for StaticPage {
    fn clickables(&self) -> Result<Vec<Clickable>> {
        Ok(Vec::new())
    }

    fn scroll_into_view(&self, _handle: usize) -> Result<()> {
        Ok(())
    }

    fn click(&self, _handle: usize) -> Result<()> {
        Ok(())
    }

    fn pause(&self, _duration: Duration) {}

    fn snapshot(&self) -> Result<PageSnapshot> {
        Ok(PageSnapshot::parse(self.url.clone(), self.html.clone()))
    }
}
