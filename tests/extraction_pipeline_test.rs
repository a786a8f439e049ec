// End-to-end extraction pipeline over static HTML: selection, pruning,
// cleaning, image enrichment with a stub describer, markdown, persistence.
// No network, no database.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use artex_backend::extractor::recipe::SiteRecipe;
use artex_backend::extractor::Extractor;
use artex_backend::services::describe::{DescribeError, DescribeImage};

/// Describer that succeeds for every URL except those containing "broken"
struct StubDescriber;

#[async_trait]
impl DescribeImage for StubDescriber {
    async fn describe(&self, image_url: &str) -> Result<String, DescribeError> {
        if image_url.contains("broken") {
            Err(DescribeError::Status(503))
        } else {
            Ok(format!("A stub description of {}", image_url))
        }
    }
}

fn extractor(storage: &str) -> Extractor {
    Extractor::new(Arc::new(StubDescriber), storage.to_string())
}

fn temp_storage() -> String {
    std::env::temp_dir()
        .join(format!("artex-pipeline-{}", Uuid::new_v4()))
        .to_string_lossy()
        .into_owned()
}

fn article_html() -> String {
    let body = "This sentence pads the article out to a useful length. ".repeat(20);
    format!(
        r#"<html>
        <head>
            <meta property="og:title" content="The Anatomy of Churn">
            <meta name="author" content="Jane Analyst">
            <title>Ignored Tag Title</title>
        </head>
        <body>
            <nav>Home | About | Contact</nav>
            <article>
                <h1>The Anatomy of Churn</h1>
                <p>{body}</p>
                <img src="/charts/churn-curve.png" width="640" alt="churn curve">
                <img src="https://cdn.test/broken-diagram.png" width="480" alt="retention diagram">
                <img src="/icons/rss.png" width="16" alt="rss icon">
                <ul><li>First takeaway</li><li>Second takeaway</li></ul>
                <script>var tracker = analytics();</script>
            </article>
            <footer>Copyright</footer>
        </body>
        </html>"#,
    )
}

#[tokio::test]
async fn full_pipeline_with_image_fallback() {
    let storage = temp_storage();
    let extractor = extractor(&storage);
    let job_id = Uuid::new_v4();
    let html = article_html();

    let prepared = extractor
        .prepare(&html, "https://www.example.com/churn", None)
        .unwrap();

    assert_eq!(prepared.title, "The Anatomy of Churn");
    assert_eq!(prepared.author, "Jane Analyst");
    // The icon-sized image is dropped, the two article images stay in order
    assert_eq!(prepared.images.len(), 2);
    assert_eq!(
        prepared.images[0].url,
        "https://www.example.com/charts/churn-curve.png"
    );
    assert_eq!(prepared.images[1].url, "https://cdn.test/broken-diagram.png");
    // The nav never makes it into the body, nor does inline script
    assert!(!prepared.body_markdown.contains("Home | About"));
    assert!(!prepared.body_markdown.contains("tracker"));
    assert!(prepared.body_markdown.contains("- First takeaway"));

    let described = extractor.describe(&prepared.images).await;
    let result = extractor.finish(job_id, prepared, described).await.unwrap();

    assert_eq!(result.image_count, 2);
    assert!(result.word_count > 100);
    assert!(result.markdown.starts_with("# The Anatomy of Churn"));
    assert!(result.markdown.contains("**Author:** Jane Analyst"));

    // Appendix: both images present, the broken one degraded to a placeholder
    assert!(result.markdown.contains("### Image 1/2"));
    assert!(result
        .markdown
        .contains("A stub description of https://www.example.com/charts/churn-curve.png"));
    assert!(result.markdown.contains("### Image 2/2"));
    assert!(result
        .markdown
        .contains("Image: retention diagram (Description unavailable)"));

    // Result saved under the sanitized title
    assert!(result.path.ends_with("The_Anatomy_of_Churn.md"));
    let saved = tokio::fs::read_to_string(&result.path).await.unwrap();
    assert_eq!(saved, result.markdown);

    tokio::fs::remove_dir_all(&storage).await.unwrap();
}

#[test]
fn recipe_selector_drives_selection() {
    let storage = temp_storage();
    let extractor = extractor(&storage);

    let body = "Recipe-selected content that is clearly long enough to pass the floor. ".repeat(5);
    let html = format!(
        r#"<html><body>
            <div class="post-body"><p>{body}</p></div>
            <article><p>Decoy article body that should not be selected here at all, padded padded padded padded padded padded padded padded.</p></article>
        </body></html>"#,
    );

    let yaml = r#"
extraction:
  article_content:
    selector: ".post-body"
    exclude_selectors:
      - ".share"
"#;
    let recipe = SiteRecipe::parse(yaml).unwrap();

    let prepared = extractor
        .prepare(&html, "https://example.com/x", Some(&recipe))
        .unwrap();

    assert!(prepared.body_markdown.contains("Recipe-selected content"));
    assert!(!prepared.body_markdown.contains("Decoy article"));
    assert_eq!(prepared.strategy, "primary");
}

#[test]
fn aggressive_defaults_trip_the_collapse_guard() {
    // A substantial article wrapped in an elementor widget container and
    // selected through a recipe without exclusions: the default list prunes
    // the wrapper, the guard fires, and the pruned outcome is still returned.
    let storage = temp_storage();
    let extractor = extractor(&storage);

    let words = "word ".repeat(2000);
    let html = format!(
        r#"<html><body>
            <div class="page">
                <div class="elementor-widget-container">
                    <article><p>{words}</p></article>
                </div>
            </div>
        </body></html>"#,
    );

    let yaml = r#"
extraction:
  article_content:
    selector: ".page"
"#;
    let recipe = SiteRecipe::parse(yaml).unwrap();

    let prepared = extractor
        .prepare(&html, "https://example.com/post", Some(&recipe))
        .unwrap();

    assert!(prepared.prune_report.collapsed);
    assert!(prepared.prune_report.pre_word_count >= 2000);
    // Near-empty but present: the job records the pruned outcome
    assert!(prepared.prune_report.post_word_count < 200);
}

#[test]
fn pattern_extraction_recovers_marker_recipes() {
    let storage = temp_storage();
    let extractor = extractor(&storage);

    let words = "Marker-delimited body content repeated for length. ".repeat(10);
    let html = format!(
        "<html><body><div><h1>Heading</h1><p>{words}</p><footer>fin</footer></div></body></html>"
    );

    let yaml = r#"
extraction:
  article_content:
    selector: ".never-matches"
  content_pattern:
    start_marker: "<h1"
    end_marker: "(?=<footer|<nav)"
"#;
    let recipe = SiteRecipe::parse(yaml).unwrap();

    let prepared = extractor
        .prepare(&html, "https://example.com/post", Some(&recipe))
        .unwrap();

    assert_eq!(prepared.strategy, "pattern");
    assert!(prepared.body_markdown.contains("Marker-delimited body content"));
    assert!(!prepared.body_markdown.contains("fin"));
}

#[test]
fn content_too_short_is_an_error() {
    let storage = temp_storage();
    let extractor = extractor(&storage);

    let result = extractor.prepare(
        "<html><body><p>tiny</p></body></html>",
        "https://example.com/x",
        None,
    );
    assert!(result.is_err());
}
