use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for a single extraction run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    pub expansion: ExpansionConfig,
    /// Upper bound on nodes visited by one tree walk
    pub walk_max_steps: usize,
    /// Maximum number of image URLs kept per output set
    pub image_cap: usize,
    /// Characters of rendered text carried in the record
    pub raw_text_limit: usize,
    /// Characters of markup carried in the record
    pub raw_html_limit: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            expansion: ExpansionConfig::default(),
            walk_max_steps: 200,
            image_cap: 20,
            raw_text_limit: 30_000,
            raw_html_limit: 5_000,
        }
    }
}

/// Fixed waits and vocabulary used while clicking "see more" controls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpansionConfig {
    /// Phrases that identify an expand control (lower case)
    pub vocabulary: Vec<String>,
    /// Pause between scrolling a control into view and clicking it
    pub scroll_settle: Duration,
    /// Pause after each click so lazily loaded text can arrive
    pub click_settle: Duration,
    /// Pause once all controls have been handled
    pub final_settle: Duration,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            vocabulary: vec![
                "see more".to_string(),
                "show more".to_string(),
                "read more".to_string(),
            ],
            scroll_settle: Duration::from_millis(300),
            click_settle: Duration::from_millis(1000),
            final_settle: Duration::from_millis(2000),
        }
    }
}

/// Where extracted listings are submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub api_base: String,
    pub timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}
