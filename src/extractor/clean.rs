// Pre-markdown cleaning: strip non-article machinery the pruning selectors
// don't reach, namely hard-skip tags and elements carrying inline JavaScript

use scraper::{Html, Selector};
use tracing::debug;

/// Tags that never contribute article text
pub const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "embed", "object", "meta", "link", "title", "head",
    "nav", "header", "footer", "aside", "form", "input", "button", "select", "textarea", "canvas",
    "svg", "video", "audio", "source", "track",
];

/// Substrings that mark an element's inner HTML as JavaScript payload
const JS_MARKERS: &[&str] = &[
    "var ",
    "function(",
    "hbspt.",
    "document.",
    "window.",
    "jQuery",
    "$(",
];

/// Remove skip-listed tags and JS-bearing elements from a fragment,
/// returning the cleaned inner HTML.
pub fn clean_fragment(fragment_html: &str) -> String {
    let mut doc = Html::parse_fragment(&format!("<div>{}</div>", fragment_html));
    let root_selector = Selector::parse("div").expect("static selector");

    for tag in SKIP_TAGS {
        let Ok(selector) = Selector::parse(tag) else {
            continue;
        };
        let ids: Vec<_> = match doc.select(&root_selector).next() {
            Some(root) => root.select(&selector).map(|el| el.id()).collect(),
            None => Vec::new(),
        };
        for id in ids {
            if let Some(mut node) = doc.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    // Remove the innermost elements whose markup contains JS markers; taking
    // the innermost keeps surrounding prose when a wrapper div happens to
    // contain one scripted child.
    let js_ids: Vec<_> = match doc.select(&root_selector).next() {
        Some(root) => root
            .select(&Selector::parse("*").expect("static selector"))
            .filter(|el| {
                let inner = el.inner_html();
                contains_js_marker(&inner)
                    && !el.children().filter_map(scraper::ElementRef::wrap).any(|child| {
                        contains_js_marker(&child.inner_html())
                    })
            })
            .map(|el| el.id())
            .collect(),
        None => Vec::new(),
    };

    if !js_ids.is_empty() {
        debug!(count = js_ids.len(), "Removed elements containing JavaScript");
    }
    for id in js_ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }

    doc.select(&root_selector)
        .next()
        .map(|root| root.inner_html())
        .unwrap_or_default()
}

fn contains_js_marker(html: &str) -> bool {
    JS_MARKERS.iter().any(|marker| html.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_skip_tags() {
        let html = "<p>Text</p><script>var x = 1;</script><svg><circle/></svg><form><input></form>";
        let cleaned = clean_fragment(html);
        assert!(cleaned.contains("<p>Text</p>"));
        assert!(!cleaned.contains("script"));
        assert!(!cleaned.contains("svg"));
        assert!(!cleaned.contains("form"));
    }

    #[test]
    fn removes_js_bearing_elements() {
        let html = "<p>Before</p><div>window.dataLayer = [];</div><p>After</p>";
        let cleaned = clean_fragment(html);
        assert!(cleaned.contains("Before"));
        assert!(cleaned.contains("After"));
        assert!(!cleaned.contains("dataLayer"));
    }

    #[test]
    fn keeps_wrapper_when_only_a_child_is_scripted() {
        let html = "<div><p>Real prose stays.</p><span>jQuery('.x').hide()</span></div>";
        let cleaned = clean_fragment(html);
        assert!(cleaned.contains("Real prose stays."));
        assert!(!cleaned.contains("jQuery"));
    }

    #[test]
    fn plain_prose_passes_through() {
        let html = "<p>Nothing suspicious about variance or functions.</p>";
        assert_eq!(clean_fragment(html), html);
    }
}
