// Structural selection: find the article subtree
// Order is strict: recipe selector, recipe fallback, content pattern over
// the raw HTML, then the generic cascade. The first candidate whose pruned
// text clears the floor wins.

use lazy_static::lazy_static;
use regex::RegexBuilder;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use super::prune::{apply_exclusions, PruneReport};
use super::recipe::SiteRecipe;

/// Minimum character count of pruned text for a candidate to be accepted
const CONTENT_FLOOR: usize = 100;

/// Generic fallback cascade tried when recipe strategies fail
const FALLBACK_SELECTORS: &[&str] = &[
    "article",
    "main article",
    ".article-content",
    ".post-content",
    ".entry-content",
    "[role='main']",
    "main",
];

lazy_static! {
    static ref BODY_SELECTOR: Selector = Selector::parse("body").expect("static selector");
    static ref H1_SELECTOR: Selector = Selector::parse("h1").expect("static selector");
    static ref TITLE_SELECTOR: Selector = Selector::parse("title").expect("static selector");
    static ref OG_TITLE_SELECTOR: Selector =
        Selector::parse("meta[property='og:title']").expect("static selector");
    static ref META_AUTHOR_SELECTOR: Selector =
        Selector::parse("meta[name='author']").expect("static selector");
    static ref ARTICLE_AUTHOR_SELECTOR: Selector =
        Selector::parse("meta[property='article:author']").expect("static selector");
    static ref AUTHOR_CLASS_SELECTOR: Selector =
        Selector::parse(".author, .author-name, [rel='author']").expect("static selector");
}

#[derive(thiserror::Error, Debug)]
#[error("Article content too short after selection and pruning")]
pub struct ContentTooShort;

/// Outcome of selection: the pruned article HTML and how it was found
#[derive(Debug)]
pub struct SelectedContent {
    pub html: String,
    pub report: PruneReport,
    pub strategy: &'static str,
}

pub fn select_content(
    doc: &Html,
    recipe: Option<&SiteRecipe>,
    raw_html: &str,
) -> Result<SelectedContent, ContentTooShort> {
    let empty: Vec<String> = Vec::new();
    let excludes = recipe
        .map(|r| &r.extraction.article_content.exclude_selectors)
        .unwrap_or(&empty);

    if let Some(recipe) = recipe {
        let rules = &recipe.extraction.article_content;

        // 1. Primary selector
        if !rules.selector.is_empty() {
            if let Some(selected) = try_selector(doc, &rules.selector, excludes, "primary") {
                return Ok(selected);
            }
        }

        // 2. Fallback selector
        if !rules.fallback.is_empty() {
            if let Some(selected) = try_selector(doc, &rules.fallback, excludes, "fallback") {
                return Ok(selected);
            }
        }

        // 3. Content pattern over the raw HTML
        let pattern = &recipe.extraction.content_pattern;
        if pattern.is_set() {
            if let Some(fragment) =
                extract_with_pattern(raw_html, &pattern.start_marker, &pattern.end_marker)
            {
                let (pruned, report) = apply_exclusions(&fragment, excludes);
                if text_length(&pruned) > CONTENT_FLOOR || report.collapsed {
                    debug!("Content pattern matched");
                    return Ok(SelectedContent {
                        html: pruned,
                        report,
                        strategy: "pattern",
                    });
                }
                warn!("Content pattern matched but result was too short after pruning");
            }
        }
    }

    // 4. Generic fallback cascade
    for selector_str in FALLBACK_SELECTORS {
        if let Some(selected) = try_selector(doc, selector_str, excludes, "generic") {
            debug!(selector = selector_str, "Using generic fallback selector");
            return Ok(selected);
        }
    }

    // Last resort: the whole body, pruned, floor still enforced
    warn!("No selector matched, using body as last resort");
    if let Some(body) = doc.select(&BODY_SELECTOR).next() {
        let (pruned, report) = apply_exclusions(&body.inner_html(), excludes);
        if text_length(&pruned) > CONTENT_FLOOR || report.collapsed {
            return Ok(SelectedContent {
                html: pruned,
                report,
                strategy: "body",
            });
        }
    }

    Err(ContentTooShort)
}

fn try_selector(
    doc: &Html,
    selector_str: &str,
    excludes: &[String],
    strategy: &'static str,
) -> Option<SelectedContent> {
    let Ok(selector) = Selector::parse(selector_str) else {
        warn!(selector = %selector_str, "Unparsable content selector");
        return None;
    };

    let element = doc.select(&selector).next()?;
    let (pruned, report) = apply_exclusions(&element.inner_html(), excludes);

    // A guarded collapse (substantial article stripped by exclusions) is
    // returned as-is: the critical event has fired and the caller records
    // the pruned outcome rather than masking it with a different strategy.
    if text_length(&pruned) > CONTENT_FLOOR || report.collapsed {
        Some(SelectedContent {
            html: pruned,
            report,
            strategy,
        })
    } else {
        debug!(selector = %selector_str, "Candidate too short after pruning");
        None
    }
}

/// Extract the substring between two markers, case-insensitively with a
/// non-greedy middle. Markers are treated as regex fragments, matching how
/// recipes author them.
pub fn extract_with_pattern(raw_html: &str, start_marker: &str, end_marker: &str) -> Option<String> {
    let (start, end) = lower_markers(start_marker, end_marker);

    let pattern = format!("{}(.*?){}", start, end);
    let regex = match RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
    {
        Ok(regex) => regex,
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Failed to compile content pattern");
            return None;
        }
    };

    let captured = regex.captures(raw_html)?.get(1)?.as_str();
    debug!(length = captured.len(), "Content pattern matched raw HTML");
    Some(captured.to_string())
}

/// Lower hand-authored Perl-style patterns to something the regex engine
/// accepts: `(?=X|Y|…)` lookaheads become their first alternative, and a
/// lowered `<footer` end rewrites the start to `<h1` to recover from the
/// common header-to-footer recipe shape.
pub fn lower_markers(start_marker: &str, end_marker: &str) -> (String, String) {
    let mut start = start_marker.to_string();
    let mut end = end_marker.to_string();

    if end.starts_with("(?=") && end.ends_with(')') {
        let lookahead = &end[3..end.len() - 1];
        end = match lookahead.find('|') {
            Some(pipe) => lookahead[..pipe].to_string(),
            None => lookahead.to_string(),
        };
        debug!(original = %end_marker, lowered = %end, "Lowered lookahead end marker");
    }

    if end == "<footer" {
        start = "<h1".to_string();
    }

    (start, end)
}

/// Title: recipe og-meta, `og:title`, first h1, then the title tag
pub fn extract_title(doc: &Html, recipe: Option<&SiteRecipe>) -> String {
    if let Some(recipe) = recipe {
        let rules = &recipe.extraction.title;

        if !rules.og_meta.is_empty() {
            let selector_str = format!("meta[property='{}']", rules.og_meta);
            if let Some(title) = meta_content(doc, &selector_str) {
                return title;
            }
        }

        if !rules.fallback_selector.is_empty() {
            if let Some(title) = first_text(doc, &rules.fallback_selector) {
                return title;
            }
        }
    }

    if let Some(title) = doc
        .select(&OG_TITLE_SELECTOR)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return title.to_string();
    }

    if let Some(h1) = element_text(doc, &H1_SELECTOR) {
        return h1;
    }

    element_text(doc, &TITLE_SELECTOR).unwrap_or_default()
}

/// Author: recipe fallback selector, author metas, then common byline classes
pub fn extract_author(doc: &Html, recipe: Option<&SiteRecipe>) -> String {
    if let Some(recipe) = recipe {
        let selector = &recipe.extraction.author.fallback_selector;
        if !selector.is_empty() {
            if let Some(author) = first_text(doc, selector) {
                return author;
            }
        }
    }

    for selector in [&*META_AUTHOR_SELECTOR, &*ARTICLE_AUTHOR_SELECTOR] {
        if let Some(author) = doc
            .select(selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(str::trim)
            .filter(|a| !a.is_empty())
        {
            return author.to_string();
        }
    }

    element_text(doc, &AUTHOR_CLASS_SELECTOR).unwrap_or_default()
}

fn text_length(html: &str) -> usize {
    let doc = Html::parse_fragment(html);
    doc.root_element().text().map(str::len).sum()
}

fn meta_content(doc: &Html, selector_str: &str) -> Option<String> {
    let selector = Selector::parse(selector_str).ok()?;
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn first_text(doc: &Html, selector_str: &str) -> Option<String> {
    let selector = Selector::parse(selector_str).ok()?;
    element_text(doc, &selector)
}

fn element_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}
