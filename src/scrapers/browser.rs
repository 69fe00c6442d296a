use crate::scrapers::snapshot::PageSnapshot;
use crate::scrapers::traits::{Clickable, PageHost};
use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Attribute used to find enumerated clickables again
const HANDLE_ATTR: &str = "data-listing-expand";

/// Tags every short-texted clickable with an index and reports its text and
/// rendered size, in document order. Only the outermost of nested clickables
/// is reported, so one control is never clicked twice in a pass.
const ENUMERATE_CLICKABLES: &str = r#"
(() => {
    document.querySelectorAll('[data-listing-expand]')
        .forEach(el => el.removeAttribute('data-listing-expand'));
    const nodes = document.querySelectorAll(
        'button, a, [role="button"], span, div[tabindex]'
    );
    const out = [];
    nodes.forEach(el => {
        const text = (el.innerText || '').trim();
        if (!text || text.length > 80) return;
        if (el.parentElement && el.parentElement.closest('[data-listing-expand]')) return;
        const rect = el.getBoundingClientRect();
        const handle = out.length;
        el.setAttribute('data-listing-expand', String(handle));
        out.push({ handle, text, width: rect.width, height: rect.height });
    });
    return JSON.stringify(out);
})()
"#;

/// Live listing page in headless Chrome
pub struct ChromePage {
    // Keeps the browser process alive for the tab
    _browser: Browser,
    tab: Arc<Tab>,
    url: String,
}

impl ChromePage {
    /// Launch Chrome and open `url`
    pub fn open(url: &str, load_wait: Duration) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((1280, 2000)))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open tab")?;

        info!("Opening {}", url);
        tab.navigate_to(url)
            .with_context(|| format!("Failed to navigate to {}", url))?;
        tab.wait_until_navigated()
            .context("Page did not finish navigating")?;

        // Listing pages render client-side after navigation completes
        info!("Waiting {:?} for page to render...", load_wait);
        thread::sleep(load_wait);

        Ok(Self {
            _browser: browser,
            tab,
            url: url.to_string(),
        })
    }

    fn evaluate_string(&self, script: &str) -> Result<String> {
        let result = self
            .tab
            .evaluate(script, false)
            .context("Script evaluation failed")?;
        match result.value {
            Some(value) => Ok(value.as_str().unwrap_or_default().to_string()),
            None => {
                warn!("Script returned no value");
                Ok(String::new())
            }
        }
    }

    fn handle_selector(handle: usize) -> String {
        format!("[{}=\"{}\"]", HANDLE_ATTR, handle)
    }
}

impl PageHost for ChromePage {
    fn clickables(&self) -> Result<Vec<Clickable>> {
        let json = self.evaluate_string(ENUMERATE_CLICKABLES)?;
        if json.is_empty() {
            return Ok(Vec::new());
        }
        let clickables: Vec<Clickable> =
            serde_json::from_str(&json).context("Unexpected clickable listing from page")?;
        debug!("Page reports {} clickable elements", clickables.len());
        Ok(clickables)
    }

    fn scroll_into_view(&self, handle: usize) -> Result<()> {
        self.tab
            .find_element(&Self::handle_selector(handle))
            .with_context(|| format!("Clickable {} no longer on page", handle))?
            .scroll_into_view()
            .context("Failed to scroll element into view")?;
        Ok(())
    }

    fn click(&self, handle: usize) -> Result<()> {
        self.tab
            .find_element(&Self::handle_selector(handle))
            .with_context(|| format!("Clickable {} no longer on page", handle))?
            .click()
            .context("Failed to click element")?;
        Ok(())
    }

    fn pause(&self, duration: Duration) {
        thread::sleep(duration);
    }

    fn snapshot(&self) -> Result<PageSnapshot> {
        let html = self.evaluate_string("document.documentElement.outerHTML")?;
        if html.is_empty() {
            anyhow::bail!("Could not get HTML from page");
        }
        let text = self.evaluate_string("document.body ? document.body.innerText : ''")?;
        let url = self.tab.get_url();
        let url = if url.is_empty() { self.url.clone() } else { url };

        debug!("Captured {} bytes of HTML, {} chars of text", html.len(), text.len());
        Ok(PageSnapshot::parse(url, html).with_rendered_text(text))
    }
}
