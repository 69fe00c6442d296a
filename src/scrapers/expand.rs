use crate::scrapers::traits::{Clickable, PageHost};
use crate::scrapers::types::ExpansionConfig;
use tracing::{debug, info, warn};

/// Longest control text still treated as a near match of a phrase
const MAX_CLOSE_MATCH_CHARS: usize = 24;

/// Outcome of one expansion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpansionReport {
    pub clicked: usize,
    pub failed: usize,
}

/// Lower-case, single-spaced, without trailing dots/ellipses/arrows
fn normalize_label(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

/// Equal to a phrase, or the phrase followed by a short qualifier
/// ("see more details")
pub fn matches_vocabulary(text: &str, vocabulary: &[String]) -> bool {
    let label = normalize_label(text);
    vocabulary.iter().any(|phrase| {
        label == *phrase
            || (label.starts_with(&format!("{} ", phrase))
                && label.chars().count() <= MAX_CLOSE_MATCH_CHARS)
    })
}

fn is_exact_see_more(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("see more")
}

/// Click every visible "see more"-style control so truncated text is
/// rendered before extraction. Never fails; problems are logged per element.
pub fn expand<H: PageHost + ?Sized>(host: &H, config: &ExpansionConfig) -> ExpansionReport {
    let mut report = ExpansionReport::default();

    run_pass(host, config, "vocabulary", &mut report, |c| {
        matches_vocabulary(&c.text, &config.vocabulary)
    });
    // Second, narrower pass over a fresh enumeration: the first round of
    // clicks can render new toggles
    run_pass(host, config, "exact", &mut report, |c| is_exact_see_more(&c.text));

    host.pause(config.final_settle);
    info!(
        clicked = report.clicked,
        failed = report.failed,
        "expansion finished"
    );
    report
}

fn run_pass<H, F>(
    host: &H,
    config: &ExpansionConfig,
    pass: &str,
    report: &mut ExpansionReport,
    wanted: F,
) where
    H: PageHost + ?Sized,
    F: Fn(&Clickable) -> bool,
{
    let targets: Vec<Clickable> = match host.clickables() {
        Ok(all) => all
            .into_iter()
            .filter(|c| c.is_visible() && wanted(c))
            .collect(),
        Err(e) => {
            warn!(pass, error = %e, "could not enumerate clickable elements");
            return;
        }
    };
    debug!(pass, targets = targets.len(), "expand controls found");

    for target in targets {
        let outcome = host.scroll_into_view(target.handle).and_then(|_| {
            host.pause(config.scroll_settle);
            host.click(target.handle)
        });

        match outcome {
            Ok(()) => {
                report.clicked += 1;
                host.pause(config.click_settle);
            }
            Err(e) => {
                report.failed += 1;
                warn!(pass, text = %target.text, error = %e, "expand click failed, skipping");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scrapers::snapshot::PageSnapshot;
    use anyhow::{bail, Result};
    use std::cell::RefCell;
    use std::time::Duration;

    /// Scripted host: returns the queued clickable lists in turn and records
    /// every action
    #[derive(Default)]
    pub(crate) struct FakeHost {
        pub enumerations: RefCell<Vec<Result<Vec<Clickable>>>>,
        pub failing_clicks: Vec<usize>,
        pub actions: RefCell<Vec<String>>,
        pub html: String,
    }

    impl FakeHost {
        pub fn with_rounds(rounds: Vec<Vec<Clickable>>) -> Self {
            Self {
                enumerations: RefCell::new(rounds.into_iter().map(Ok).collect()),
                ..Default::default()
            }
        }

        pub fn actions(&self) -> Vec<String> {
            self.actions.borrow().clone()
        }
    }

    impl PageHost for FakeHost {
        fn clickables(&self) -> Result<Vec<Clickable>> {
            let mut queue = self.enumerations.borrow_mut();
            if queue.is_empty() {
                Ok(Vec::new())
            } else {
                queue.remove(0)
            }
        }

        fn scroll_into_view(&self, handle: usize) -> Result<()> {
            self.actions.borrow_mut().push(format!("scroll {handle}"));
            Ok(())
        }

        fn click(&self, handle: usize) -> Result<()> {
            if self.failing_clicks.contains(&handle) {
                bail!("element {handle} detached");
            }
            self.actions.borrow_mut().push(format!("click {handle}"));
            Ok(())
        }

        fn pause(&self, duration: Duration) {
            self.actions
                .borrow_mut()
                .push(format!("pause {}", duration.as_millis()));
        }

        fn snapshot(&self) -> Result<PageSnapshot> {
            Ok(PageSnapshot::parse("https://example.com/item/1", self.html.clone()))
        }
    }

    pub(crate) fn clickable(handle: usize, text: &str) -> Clickable {
        Clickable {
            handle,
            text: text.to_string(),
            width: 60.0,
            height: 20.0,
        }
    }

    #[test]
    fn test_vocabulary_matching() {
        let vocabulary = ExpansionConfig::default().vocabulary;
        assert!(matches_vocabulary("See more", &vocabulary));
        assert!(matches_vocabulary("  SHOW   MORE… ", &vocabulary));
        assert!(matches_vocabulary("Read more ›", &vocabulary));
        assert!(matches_vocabulary("See more details", &vocabulary));
        assert!(!matches_vocabulary("See more listings from this seller", &vocabulary));
        assert!(!matches_vocabulary("See less", &vocabulary));
        assert!(!matches_vocabulary("Seemore", &vocabulary));
    }

    #[test]
    fn test_clicks_visible_matches_in_order_with_delays() {
        let mut hidden = clickable(3, "Show more");
        hidden.width = 0.0;
        let host = FakeHost::with_rounds(vec![
            vec![
                clickable(1, "See more"),
                clickable(2, "Message"),
                hidden,
                clickable(4, "Read more"),
            ],
            vec![],
        ]);

        let report = expand(&host, &ExpansionConfig::default());

        assert_eq!(report, ExpansionReport { clicked: 2, failed: 0 });
        assert_eq!(
            host.actions(),
            vec![
                "scroll 1", "pause 300", "click 1", "pause 1000",
                "scroll 4", "pause 300", "click 4", "pause 1000",
                "pause 2000",
            ]
        );
    }

    #[test]
    fn test_second_pass_clicks_newly_rendered_see_more() {
        let host = FakeHost::with_rounds(vec![
            vec![clickable(1, "Read more")],
            vec![clickable(7, "See More"), clickable(8, "Read more")],
        ]);

        let report = expand(&host, &ExpansionConfig::default());

        assert_eq!(report.clicked, 2);
        let clicks: Vec<String> = host
            .actions()
            .into_iter()
            .filter(|a| a.starts_with("click"))
            .collect();
        assert_eq!(clicks, vec!["click 1", "click 7"]);
    }

    #[test]
    fn test_failures_are_isolated() {
        let mut host = FakeHost::with_rounds(vec![vec![
            clickable(1, "See more"),
            clickable(2, "See more"),
        ]]);
        host.failing_clicks = vec![1];

        let report = expand(&host, &ExpansionConfig::default());

        assert_eq!(report, ExpansionReport { clicked: 1, failed: 1 });
        assert!(host.actions().contains(&"click 2".to_string()));
    }

    #[test]
    fn test_enumeration_error_skips_pass_only() {
        let host = FakeHost {
            enumerations: RefCell::new(vec![
                Err(anyhow::anyhow!("page gone")),
                Ok(vec![clickable(5, "See more")]),
            ]),
            ..Default::default()
        };

        let report = expand(&host, &ExpansionConfig::default());
        assert_eq!(report.clicked, 1);
    }

    #[test]
    fn test_no_matches_only_settles() {
        let host = FakeHost::default();
        let report = expand(&host, &ExpansionConfig::default());
        assert_eq!(report, ExpansionReport::default());
        assert_eq!(host.actions(), vec!["pause 2000"]);
    }
}
