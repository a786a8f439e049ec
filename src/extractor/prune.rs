// Pruning: remove non-content subtrees before conversion
// Instruments every removal and guards against stripping the article itself

use scraper::{Html, Selector};
use tracing::{debug, error, info, warn};

use super::exclusions::DEFAULT_EXCLUSIONS;

/// Selectors known to match content-bearing elements on real sites; a
/// removal through one of these is worth a warning on its own.
const CONTENT_BEARING_SELECTORS: &[&str] = &[
    ".elementor-widget-container",
    ".elementor-widget-theme-post-content",
];

/// Pre-prune word count above which a collapse is considered critical
const GUARD_MIN_WORDS: usize = 1000;

#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    /// (selector, removed node count) for every selector that matched
    pub removed: Vec<(String, usize)>,
    pub total_removed: usize,
    pub pre_word_count: usize,
    pub post_word_count: usize,
    /// Set when pruning dropped more than 90% of a substantial article
    pub collapsed: bool,
}

/// Apply exclusion selectors to an HTML fragment and return the pruned
/// inner HTML plus an instrumentation report. An empty exclusion list means
/// the built-in defaults.
pub fn apply_exclusions(fragment_html: &str, exclude_selectors: &[String]) -> (String, PruneReport) {
    let mut doc = Html::parse_fragment(&format!("<div>{}</div>", fragment_html));
    let mut report = PruneReport::default();

    report.pre_word_count = root_word_count(&doc);

    let defaults: Vec<String> = DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect();
    let selectors: &[String] = if exclude_selectors.is_empty() {
        &defaults
    } else {
        exclude_selectors
    };

    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            warn!(selector = %selector_str, "Skipping unparsable exclusion selector");
            continue;
        };

        let ids: Vec<_> = match root_element(&doc) {
            Some(root) => root.select(&selector).map(|el| el.id()).collect(),
            None => Vec::new(),
        };

        if ids.is_empty() {
            continue;
        }

        let count = ids.len();
        for id in ids {
            if let Some(mut node) = doc.tree.get_mut(id) {
                node.detach();
            }
        }

        debug!(selector = %selector_str, removed = count, "Removed excluded elements");
        if CONTENT_BEARING_SELECTORS.contains(&selector_str.as_str()) {
            warn!(
                selector = %selector_str,
                removed = count,
                "Exclusion matched a content-bearing element"
            );
        }

        report.removed.push((selector_str.clone(), count));
        report.total_removed += count;
    }

    report.post_word_count = root_word_count(&doc);

    // Post-prune guard: a substantial article losing >90% of its words means
    // the exclusion list ate the content. Emit the critical event but still
    // hand back what survived.
    if report.pre_word_count > GUARD_MIN_WORDS
        && report.post_word_count * 10 < report.pre_word_count
    {
        report.collapsed = true;
        error!(
            pre_words = report.pre_word_count,
            post_words = report.post_word_count,
            "Pruning removed more than 90% of article content"
        );
    }

    info!(
        total_removed = report.total_removed,
        rules = selectors.len(),
        "Applied exclusions"
    );

    let pruned = root_element(&doc)
        .map(|root| root.inner_html())
        .unwrap_or_default();
    (pruned, report)
}

/// Visible word count of a fragment
pub fn word_count(html: &str) -> usize {
    let doc = Html::parse_fragment(html);
    doc.root_element()
        .text()
        .flat_map(|t| t.split_whitespace())
        .count()
}

fn root_element(doc: &Html) -> Option<scraper::ElementRef<'_>> {
    let selector = Selector::parse("div").expect("static selector");
    doc.select(&selector).next()
}

fn root_word_count(doc: &Html) -> usize {
    root_element(doc)
        .map(|root| root.text().flat_map(|t| t.split_whitespace()).count())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_exclusions_remove_matches() {
        let html = r#"<p>Keep this paragraph.</p><div class="share-buttons">Share!</div>"#;
        let (pruned, report) =
            apply_exclusions(html, &[".share-buttons".to_string()]);

        assert!(pruned.contains("Keep this paragraph."));
        assert!(!pruned.contains("Share!"));
        assert_eq!(report.removed, vec![(".share-buttons".to_string(), 1)]);
        assert_eq!(report.total_removed, 1);
    }

    #[test]
    fn empty_list_falls_back_to_defaults() {
        let html = r#"<p>Article text.</p><nav>Menu</nav><div class="sidebar">Links</div>"#;
        let (pruned, report) = apply_exclusions(html, &[]);

        assert!(pruned.contains("Article text."));
        assert!(!pruned.contains("Menu"));
        assert!(!pruned.contains("Links"));
        assert!(report.total_removed >= 2);
    }

    #[test]
    fn unmatched_selectors_are_not_reported() {
        let (_, report) = apply_exclusions("<p>Text</p>", &[".nope".to_string()]);
        assert!(report.removed.is_empty());
        assert_eq!(report.total_removed, 0);
    }

    #[test]
    fn guard_fires_when_container_swallows_article() {
        // A 2000-word article inside an elementor widget container: the
        // default list matches the wrapper and prunes everything.
        let words = vec!["word"; 2000].join(" ");
        let html = format!(
            r#"<div class="elementor-widget-container"><article><p>{}</p></article></div>"#,
            words
        );
        let (pruned, report) = apply_exclusions(&html, &[]);

        assert!(report.collapsed);
        assert!(report.pre_word_count >= 2000);
        assert!(report.post_word_count < 200);
        // Pruned outcome is still returned, not an error
        assert!(word_count(&pruned) < 200);
    }

    #[test]
    fn small_fragments_never_trip_the_guard() {
        let (_, report) = apply_exclusions(r#"<div class="widget">tiny</div>"#, &[]);
        assert!(!report.collapsed);
    }

    #[test]
    fn word_count_ignores_markup() {
        assert_eq!(word_count("<p>one <b>two</b> three</p>"), 3);
    }
}
