use crate::models::ExtractionCandidate;
use crate::scrapers::snapshot::{
    collapse_whitespace, element_text, selector, DomTree, NodeId, PageSnapshot,
};
use crate::scrapers::walker::{self, StopPattern, DESCRIPTION_STOP_HEADINGS};
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Navigation and site chrome words that never belong in a listing field
pub const BLOCKED_TERMS: &[&str] = &[
    "notification",
    "unread",
    "facebook",
    "marketplace",
    "message",
    "menu",
    "imported",
];

const HOUSING_KEYWORDS: &[&str] = &[
    "bedroom", "bathroom", "apartment", "condo", "unit", "lease", "rent", "furnished", "parking",
];

const TITLE_SELECTORS: &[&str] = &[
    "h1",
    "[itemprop=\"name\"]",
    "[data-testid*=\"title\"]",
    ".listing-title",
];

const FALLBACK_TITLE: &str = "Property Listing";

/// Minimum length of a free-text description paragraph
const MIN_PARAGRAPH_CHARS: usize = 60;

static PRICE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\d[\d,]*").unwrap());
static PRICE_ONLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\$\s?\d[\d,]*(?:\.\d{2})?(?:\s*(?:/|per)\s*(?:month|mo|week|wk))?$").unwrap()
});
// The count may not continue a decimal ("1.5 bedrooms" is not "5 bedrooms")
static BEDROOMS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[^\d.])(\d+)\s*(?:bedrooms?|beds?|br|bd)\b").unwrap());
static BATHROOMS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(?:bathrooms?|baths?|ba)\b").unwrap());
static AVAILABILITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:available|move-in|ready)\b:?[^\S\n]*[^\n]{0,100}").unwrap());
static PETS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:no\s+pets(?:\s+allowed)?|pets?\s+(?:are\s+)?(?:not\s+allowed|allowed|ok(?:ay)?|welcome|friendly|negotiable|considered)|pet[- ]friendly|(?:cats?|dogs?)(?:\s+(?:and|&|or)\s+(?:cats?|dogs?))?\s+(?:are\s+)?(?:allowed|ok(?:ay)?|welcome))\b",
    )
    .unwrap()
});
static FURNISHED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:un-?furnished|(?:fully|partially|semi)[- ]furnished|furnished)\b").unwrap()
});
static POSTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:posted|listed)\b:?[^\S\n]*[^\n]{0,50}").unwrap());
static TITLE_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:\d+\s*(?:bedrooms?|beds?|br|bd)|studio|apartment|condo|house|townhouse|basement|suite|room for rent)\b|\$\d",
    )
    .unwrap()
});
static TITLE_COUNTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\(\d+\+?\)\s*").unwrap());
static LOCATION_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^location(?:\s+is\s+approximate)?$").unwrap());
static LOCATION_SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)(?:^|\n)[^\S\n]*location(?:\s+is\s+approximate)?[^\S\n]*\n(.*?)(?:\n[^\S\n]*(?:description|getting around|seller details|report this listing|photos|share|posted|price|apply|contact|suite features|building amenities)[^\S\n]*:?[^\S\n]*(?:\n|\z)|\z)",
    )
    .unwrap()
});
static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[^\S\n]*\n").unwrap());

pub fn contains_blocked_term(text: &str) -> bool {
    let lower = text.to_lowercase();
    BLOCKED_TERMS.iter().any(|term| lower.contains(term))
}

/// Shared validity predicate: character bounds plus the blocklist
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub min_chars: usize,
    pub max_chars: usize,
}

impl FieldRule {
    pub fn accepts(&self, value: &str) -> bool {
        let chars = value.chars().count();
        chars >= self.min_chars && chars <= self.max_chars && !contains_blocked_term(value)
    }
}

/// What strategies may look at
pub struct ExtractionContext<'a> {
    pub snapshot: &'a PageSnapshot,
    pub walk_max_steps: usize,
}

pub type StrategyFn = fn(&ExtractionContext<'_>) -> Result<Option<String>>;

pub struct Strategy {
    pub name: &'static str,
    pub run: StrategyFn,
}

/// Ordered strategies for one listing attribute, from the most structural
/// (element and attribute based) to plain free-text matching. The first value
/// accepted by `rule` wins; a strategy that errors is logged and skipped.
pub struct StrategyChain {
    pub field: &'static str,
    pub rule: FieldRule,
    pub strategies: &'static [Strategy],
}

impl StrategyChain {
    /// First accepted value, tried in order
    pub fn evaluate(&self, ctx: &ExtractionContext<'_>) -> Option<ExtractionCandidate> {
        for (rank, strategy) in self.strategies.iter().enumerate() {
            match (strategy.run)(ctx) {
                Ok(Some(value)) => {
                    let value = value.trim().to_string();
                    if self.rule.accepts(&value) {
                        debug!(field = self.field, strategy = strategy.name, "accepted value");
                        return Some(ExtractionCandidate {
                            value,
                            strategy_rank: rank,
                        });
                    }
                    debug!(field = self.field, strategy = strategy.name, "rejected value");
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        field = self.field,
                        strategy = strategy.name,
                        error = %e,
                        "strategy failed, trying next"
                    );
                }
            }
        }
        None
    }

    /// Accepted value or the empty string
    pub fn value(&self, ctx: &ExtractionContext<'_>) -> String {
        self.evaluate(ctx).map(|c| c.value).unwrap_or_default()
    }
}

pub const TITLE: StrategyChain = StrategyChain {
    field: "title",
    rule: FieldRule { min_chars: 6, max_chars: 200 },
    strategies: &[
        Strategy { name: "title_selectors", run: title_from_selectors },
        Strategy { name: "social_meta", run: title_from_social_meta },
        Strategy { name: "price_neighbor", run: title_near_price_element },
        Strategy { name: "price_line", run: title_near_price_line },
        Strategy { name: "heading", run: title_from_headings },
        Strategy { name: "document_title", run: title_from_document_title },
        Strategy { name: "text_pattern", run: title_from_text_patterns },
        Strategy { name: "fallback", run: title_fallback },
    ],
};

pub const PRICE: StrategyChain = StrategyChain {
    field: "price",
    rule: FieldRule { min_chars: 2, max_chars: 20 },
    strategies: &[Strategy { name: "price_token", run: price_from_text }],
};

pub const DESCRIPTION: StrategyChain = StrategyChain {
    field: "description",
    rule: FieldRule { min_chars: 20, max_chars: 10_000 },
    strategies: &[
        Strategy { name: "description_heading", run: description_from_heading },
        Strategy { name: "housing_paragraph", run: description_from_paragraphs },
    ],
};

pub const LOCATION: StrategyChain = StrategyChain {
    field: "location",
    rule: FieldRule { min_chars: 2, max_chars: 300 },
    strategies: &[
        Strategy { name: "location_heading", run: location_from_heading },
        Strategy { name: "location_text", run: location_from_text },
    ],
};

pub const BEDROOMS_TEXT: StrategyChain = StrategyChain {
    field: "bedrooms",
    rule: FieldRule { min_chars: 2, max_chars: 40 },
    strategies: &[Strategy { name: "bedroom_pattern", run: bedrooms_from_text }],
};

pub const BATHROOMS_TEXT: StrategyChain = StrategyChain {
    field: "bathrooms",
    rule: FieldRule { min_chars: 2, max_chars: 40 },
    strategies: &[Strategy { name: "bathroom_pattern", run: bathrooms_from_text }],
};

pub const AVAILABILITY_TEXT: StrategyChain = StrategyChain {
    field: "availability",
    rule: FieldRule { min_chars: 5, max_chars: 120 },
    strategies: &[Strategy { name: "availability_pattern", run: availability_from_text }],
};

pub const PETS_TEXT: StrategyChain = StrategyChain {
    field: "pets",
    rule: FieldRule { min_chars: 4, max_chars: 80 },
    strategies: &[Strategy { name: "pets_pattern", run: pets_from_text }],
};

pub const FURNISHED_TEXT: StrategyChain = StrategyChain {
    field: "furnished",
    rule: FieldRule { min_chars: 9, max_chars: 60 },
    strategies: &[Strategy { name: "furnished_pattern", run: furnished_from_text }],
};

pub const POSTED_TEXT: StrategyChain = StrategyChain {
    field: "posted",
    rule: FieldRule { min_chars: 6, max_chars: 80 },
    strategies: &[Strategy { name: "posted_pattern", run: posted_from_text }],
};

pub const TITLE_META: StrategyChain = StrategyChain {
    field: "title_meta",
    rule: FieldRule { min_chars: 1, max_chars: 300 },
    strategies: &[Strategy { name: "og_title", run: title_meta_from_tags }],
};

pub const DESCRIPTION_META: StrategyChain = StrategyChain {
    field: "description_meta",
    rule: FieldRule { min_chars: 1, max_chars: 2_000 },
    strategies: &[Strategy { name: "og_description", run: description_meta_from_tags }],
};

/// Raw field values for one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
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
}

/// Run every field chain against the snapshot
pub fn extract_fields(ctx: &ExtractionContext<'_>) -> ExtractedFields {
    let bedroom_text = BEDROOMS_TEXT.value(ctx);
    let bathroom_text = BATHROOMS_TEXT.value(ctx);

    ExtractedFields {
        title: TITLE.value(ctx),
        price_text: PRICE.value(ctx),
        description_text: DESCRIPTION.value(ctx),
        location_text: LOCATION.value(ctx),
        availability_text: AVAILABILITY_TEXT.value(ctx),
        bedroom_count: leading_number(&BEDROOMS, &bedroom_text),
        bedroom_text,
        bathroom_count: leading_number(&BATHROOMS, &bathroom_text),
        bathroom_text,
        pets_text: PETS_TEXT.value(ctx),
        furnished_text: FURNISHED_TEXT.value(ctx),
        posted_text: POSTED_TEXT.value(ctx),
        title_meta: TITLE_META.value(ctx),
        description_meta: DESCRIPTION_META.value(ctx),
    }
}

fn leading_number<T: std::str::FromStr>(pattern: &Regex, text: &str) -> Option<T> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn first_match(pattern: &Regex, text: &str) -> Option<String> {
    pattern.find(text).map(|m| m.as_str().trim().to_string())
}

fn is_price_only(text: &str) -> bool {
    PRICE_ONLY.is_match(text.trim())
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|line| !line.is_empty())
}

fn usable_title(text: &str) -> bool {
    TITLE.rule.accepts(text) && !is_price_only(text)
}

/// "(3) Marketplace - Cozy loft | Site" -> "Marketplace"
fn strip_site_suffix(title: &str) -> String {
    let title = TITLE_COUNTER.replace(title.trim(), "");
    [" | ", " - ", " – ", " · "]
        .iter()
        .fold(title.to_string(), |acc, sep| {
            acc.split(sep).next().unwrap_or_default().trim().to_string()
        })
}

fn is_section_heading(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    lower == "description" || DESCRIPTION_STOP_HEADINGS.contains(&lower.as_str())
}

/// Keep only lines free of navigation terms
fn drop_blocked_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !contains_blocked_term(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn title_from_selectors(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    for css in TITLE_SELECTORS {
        let selector = selector(css)?;
        let found = ctx
            .snapshot
            .document()
            .select(&selector)
            .map(element_text)
            .find(|text| usable_title(text));
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

fn title_from_social_meta(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    let content = match ctx
        .snapshot
        .meta_content(r#"meta[property="og:title"], meta[name="og:title"]"#)?
    {
        Some(content) => Some(content),
        None => ctx
            .snapshot
            .meta_content(r#"meta[name="twitter:title"], meta[property="twitter:title"]"#)?,
    };
    Ok(content.map(|c| strip_site_suffix(&c)))
}

fn title_near_price_element(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    let tree = ctx.snapshot.tree();
    let price = match tree.elements().find(|&id| is_price_only(&tree.own_text(id))) {
        Some(id) => id,
        None => return Ok(None),
    };

    // Check the price's neighbours, then its parent's, a few levels up
    let mut anchor = price;
    for _ in 0..3 {
        for forward in [false, true] {
            if let Some(line) = neighbor_line(tree, anchor, forward) {
                if usable_title(&line) {
                    return Ok(Some(line));
                }
            }
        }

        anchor = match tree.parent(anchor) {
            Some(parent) => parent,
            None => break,
        };
    }
    Ok(None)
}

/// First line of the closest sibling that renders any text
fn neighbor_line(tree: &DomTree, id: NodeId, forward: bool) -> Option<String> {
    let step = |current: NodeId| {
        if forward {
            tree.next_sibling(current)
        } else {
            tree.prev_sibling(current)
        }
    };

    let mut cursor = step(id);
    while let Some(current) = cursor {
        let text = tree.text_of(current);
        if let Some(line) = first_line(&text) {
            return Some(line.to_string());
        }
        cursor = step(current);
    }
    None
}

fn title_near_price_line(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    let lines: Vec<&str> = ctx
        .snapshot
        .text()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let price_at = match lines.iter().position(|line| PRICE_TOKEN.is_match(line)) {
        Some(index) => index,
        None => return Ok(None),
    };

    Ok(lines[..price_at]
        .iter()
        .rev()
        .take(2)
        .find(|line| usable_title(line))
        .map(|line| line.to_string()))
}

fn title_from_headings(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    let selector = selector(r#"h2, h3, [role="heading"]"#)?;
    Ok(ctx
        .snapshot
        .document()
        .select(&selector)
        .map(element_text)
        .find(|text| !is_section_heading(text) && usable_title(text)))
}

fn title_from_document_title(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    let selector = selector("title")?;
    Ok(ctx
        .snapshot
        .document()
        .select(&selector)
        .next()
        .map(element_text)
        .map(|title| strip_site_suffix(&title))
        .filter(|title| !title.is_empty()))
}

fn title_from_text_patterns(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    Ok(ctx
        .snapshot
        .text()
        .lines()
        .map(str::trim)
        .filter(|line| TITLE_PHRASE.is_match(line))
        .find(|line| usable_title(line))
        .map(str::to_string))
}

fn title_fallback(_ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    Ok(Some(FALLBACK_TITLE.to_string()))
}

fn price_from_text(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    Ok(first_match(&PRICE_TOKEN, ctx.snapshot.text()))
}

fn description_from_heading(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    let tree = ctx.snapshot.tree();
    let heading = match tree.find_heading(|text| text.eq_ignore_ascii_case("description")) {
        Some(id) => id,
        None => return Ok(None),
    };
    let stop = StopPattern::from_headings(DESCRIPTION_STOP_HEADINGS)?;
    let text = drop_blocked_lines(&walker::collect(tree, heading, &stop, ctx.walk_max_steps));
    Ok(Some(text).filter(|t| !t.is_empty()))
}

fn description_from_paragraphs(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    let mut best: Option<String> = None;
    for block in PARAGRAPH_BREAK.split(ctx.snapshot.text()) {
        let block = block.trim();
        if block.chars().count() < MIN_PARAGRAPH_CHARS || contains_blocked_term(block) {
            continue;
        }
        let lower = block.to_lowercase();
        if !HOUSING_KEYWORDS.iter().any(|k| lower.contains(k)) {
            continue;
        }
        let longer = best
            .as_ref()
            .map_or(true, |b| block.chars().count() > b.chars().count());
        if longer {
            best = Some(block.to_string());
        }
    }
    Ok(best)
}

fn location_from_heading(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    let tree = ctx.snapshot.tree();
    let heading = match tree.find_heading(|text| LOCATION_HEADING.is_match(text)) {
        Some(id) => id,
        None => return Ok(None),
    };

    let headings: Vec<&str> = DESCRIPTION_STOP_HEADINGS
        .iter()
        .copied()
        .filter(|h| !h.starts_with("location"))
        .chain(std::iter::once("description"))
        .collect();
    let stop = StopPattern::from_headings(&headings)?;
    let text = drop_blocked_lines(&walker::collect(tree, heading, &stop, ctx.walk_max_steps));
    Ok(Some(text).filter(|t| !t.is_empty()))
}

fn location_from_text(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    Ok(LOCATION_SECTION
        .captures(ctx.snapshot.text())
        .and_then(|caps| caps.get(1))
        .map(|m| drop_blocked_lines(m.as_str()))
        .filter(|text| !text.is_empty()))
}

fn bedrooms_from_text(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    let text = ctx.snapshot.text();
    Ok(BEDROOMS.captures(text).and_then(|caps| {
        let count = caps.get(1)?;
        let whole = caps.get(0)?;
        Some(text[count.start()..whole.end()].trim().to_string())
    }))
}

fn bathrooms_from_text(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    Ok(first_match(&BATHROOMS, ctx.snapshot.text()))
}

fn availability_from_text(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    Ok(first_match(&AVAILABILITY, ctx.snapshot.text()))
}

fn pets_from_text(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    Ok(first_match(&PETS, ctx.snapshot.text()))
}

fn furnished_from_text(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    Ok(first_match(&FURNISHED, ctx.snapshot.text()))
}

fn posted_from_text(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    Ok(first_match(&POSTED, ctx.snapshot.text()))
}

fn title_meta_from_tags(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    ctx.snapshot
        .meta_content(r#"meta[property="og:title"], meta[name="og:title"]"#)
}

fn description_meta_from_tags(ctx: &ExtractionContext<'_>) -> Result<Option<String>> {
    match ctx
        .snapshot
        .meta_content(r#"meta[property="og:description"], meta[name="og:description"]"#)?
    {
        Some(content) => Ok(Some(collapse_whitespace(&content))),
        None => ctx.snapshot.meta_content(r#"meta[name="description"]"#),
    }
}
