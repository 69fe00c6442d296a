use crate::scrapers::snapshot::{DomTree, NodeId};
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Section headings that end a description block
pub const DESCRIPTION_STOP_HEADINGS: &[&str] = &[
    "getting around",
    "seller details",
    "report this listing",
    "location",
    "location is approximate",
    "photos",
    "share",
    "posted",
    "price",
    "apply",
    "contact",
    "suite features",
    "building amenities",
];

static SEE_TOGGLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bsee (?:more|less)\b").unwrap());
static EXTRA_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Heading vocabulary that ends a walk
#[derive(Debug, Clone)]
pub struct StopPattern {
    regex: Regex,
}

impl StopPattern {
    /// A line stops the walk when it is one of `headings`, optionally
    /// followed by a colon or an item count such as "Photos (12)"
    pub fn from_headings(headings: &[&str]) -> Result<Self> {
        let alternation = headings
            .iter()
            .map(|h| regex::escape(h))
            .collect::<Vec<_>>()
            .join("|");
        let regex = Regex::new(&format!(r"(?i)^(?:{})\s*(?::|\(\d+\+?\))?$", alternation))?;
        Ok(Self { regex })
    }

    pub fn matches_first_line(&self, text: &str) -> bool {
        text.lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map_or(false, |line| self.regex.is_match(line))
    }
}

/// Collect the rendered text that follows `header` until a stop heading,
/// the end of the document or `max_steps` visited nodes
pub fn collect(tree: &DomTree, header: NodeId, stop: &StopPattern, max_steps: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut cursor = tree.next_in_flow(header);
    let mut steps = 0;

    while let Some(id) = cursor {
        if steps >= max_steps {
            debug!(max_steps, "tree walk hit step bound");
            break;
        }
        steps += 1;

        let text = tree.text_of(id);
        if !text.trim().is_empty() {
            if stop.matches_first_line(&text) {
                debug!(steps, "tree walk reached stop heading");
                break;
            }
            parts.push(text);
        }
        cursor = tree.next_in_flow(id);
    }

    clean_collected(&parts.join("\n"))
}

/// Drop expand/collapse toggles and squeeze blank runs
pub fn clean_collected(text: &str) -> String {
    let stripped = SEE_TOGGLE.replace_all(text, "");
    let lines = stripped
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    EXTRA_NEWLINES.replace_all(&lines, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::snapshot::PageSnapshot;

    fn description_walk(html: &str, max_steps: usize) -> String {
        let snapshot = PageSnapshot::parse("https://example.com", html);
        let tree = snapshot.tree();
        let heading = tree
            .find_heading(|text| text.eq_ignore_ascii_case("description"))
            .expect("fixture has a heading");
        let stop = StopPattern::from_headings(DESCRIPTION_STOP_HEADINGS).unwrap();
        collect(tree, heading, &stop, max_steps)
    }

    #[test]
    fn test_stops_before_stop_heading_and_strips_toggle() {
        let text = description_walk(
            r#"<div>
                <h2>Description</h2>
                <div>para A</div>
                <div>See more</div>
                <div>Getting Around</div>
                <div>para B</div>
            </div>"#,
            200,
        );
        assert_eq!(text, "para A");
    }

    #[test]
    fn test_continues_past_layout_containers() {
        let text = description_walk(
            r#"<section><div><span>Description</span></div></section>
               <section><p>Sunny unit with parking.</p></section>
               <section><p>Laundry on site.</p></section>
               <section><h3>Seller details</h3><p>Jane</p></section>"#,
            200,
        );
        assert_eq!(text, "Sunny unit with parking.\nLaundry on site.");
    }

    #[test]
    fn test_step_bound_limits_collection() {
        let text = description_walk(
            "<div><h2>Description</h2><p>one</p><p>two</p><p>three</p></div>",
            2,
        );
        assert_eq!(text, "one\ntwo");
    }

    #[test]
    fn test_empty_when_heading_is_last() {
        let text = description_walk("<div><p>intro</p><h2>Description</h2></div>", 200);
        assert_eq!(text, "");
    }

    #[test]
    fn test_only_whole_heading_lines_stop() {
        let stop = StopPattern::from_headings(DESCRIPTION_STOP_HEADINGS).unwrap();
        assert!(stop.matches_first_line("Location is approximate"));
        assert!(stop.matches_first_line("  Price\n$1,200"));
        assert!(stop.matches_first_line("Photos (12)"));
        assert!(stop.matches_first_line("Contact:"));
        assert!(!stop.matches_first_line("Price includes heat and hydro."));
        assert!(!stop.matches_first_line("Contact me for a viewing"));
        assert!(!stop.matches_first_line("Share with one roommate"));
        assert!(!stop.matches_first_line("Shared laundry"));
    }

    #[test]
    fn test_sentence_starting_with_heading_word_is_collected() {
        let text = description_walk(
            r#"<div>
                <h2>Description</h2>
                <p>Price includes heat and hydro.</p>
                <p>Two bedroom unit on a quiet street with parking and laundry.</p>
                <h2>Seller details</h2>
                <p>Sam</p>
            </div>"#,
            200,
        );
        assert_eq!(
            text,
            "Price includes heat and hydro.\nTwo bedroom unit on a quiet street with parking and laundry."
        );
    }

    #[test]
    fn test_clean_collapses_blank_runs() {
        assert_eq!(
            clean_collected("Line one\n\n\n\nLine two... See More  \nsee less"),
            "Line one\n\nLine two..."
        );
    }
}
