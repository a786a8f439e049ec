// Image extraction and description enrichment

use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use crate::services::describe::DescribeImage;

/// Parallel describe calls in flight at once
const DESCRIBE_CONCURRENCY: usize = 5;

/// Per-image launch stagger to avoid burst rate limiting
const DESCRIBE_STAGGER: Duration = Duration::from_millis(100);

/// Images narrower than this are treated as icons and skipped
const MIN_WIDTH_PX: i64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleImage {
    pub url: String,
    pub alt: String,
}

#[derive(Debug, Clone)]
pub struct DescribedImage {
    pub url: String,
    pub alt: String,
    pub description: String,
}

/// Walk `<img>` elements in the article fragment: resolve srcs against the
/// page URL, de-duplicate by absolute URL, and drop icon-sized images.
pub fn extract_images(fragment_html: &str, page_url: &str) -> Vec<ArticleImage> {
    let doc = Html::parse_fragment(fragment_html);
    let img_selector = Selector::parse("img").expect("static selector");

    let base = Url::parse(page_url).ok();
    let mut seen = std::collections::HashSet::new();
    let mut images = Vec::new();

    for element in doc.select(&img_selector) {
        let Some(src) = element.value().attr("src").filter(|s| !s.is_empty()) else {
            continue;
        };

        let Some(absolute) = resolve_url(base.as_ref(), src) else {
            continue;
        };

        if !seen.insert(absolute.clone()) {
            continue;
        }

        if let Some(width) = element.value().attr("width").and_then(parse_px) {
            if width < MIN_WIDTH_PX {
                debug!(url = %absolute, width, "Skipping icon-sized image");
                continue;
            }
        }

        images.push(ArticleImage {
            url: absolute,
            alt: element.value().attr("alt").unwrap_or_default().to_string(),
        });
    }

    images
}

/// Describe every image with bounded parallelism, preserving input order.
/// A failed describe call degrades to a placeholder; it never fails the job.
pub async fn describe_images(
    describer: &Arc<dyn DescribeImage>,
    images: &[ArticleImage],
) -> Vec<DescribedImage> {
    let semaphore = Arc::new(Semaphore::new(DESCRIBE_CONCURRENCY));

    let futures = images.iter().enumerate().map(|(index, image)| {
        let describer = describer.clone();
        let semaphore = semaphore.clone();
        let image = image.clone();

        async move {
            let _permit = semaphore.acquire().await.expect("semaphore closed");

            // Stagger launches so a burst of images doesn't trip the
            // downstream rate limit
            tokio::time::sleep(DESCRIBE_STAGGER * index as u32).await;

            let description = match describer.describe(&image.url).await {
                Ok(description) => description,
                Err(e) => {
                    warn!(url = %image.url, error = %e, "Failed to describe image");
                    format!("Image: {} (Description unavailable)", image.alt)
                }
            };

            DescribedImage {
                url: image.url,
                alt: image.alt,
                description,
            }
        }
    });

    futures::future::join_all(futures).await
}

fn resolve_url(base: Option<&Url>, href: &str) -> Option<String> {
    match base {
        Some(base) => base.join(href).ok().map(|u| u.to_string()),
        None => Url::parse(href).ok().map(|u| u.to_string()),
    }
}

/// Parse the leading digits of a width attribute ("480", "480px")
fn parse_px(value: &str) -> Option<i64> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::describe::DescribeError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn resolves_relative_srcs_and_dedupes() {
        let html = r#"
            <img src="/a.png" alt="first">
            <img src="https://cdn.test/b.png" alt="second">
            <img src="/a.png" alt="duplicate">
        "#;
        let images = extract_images(html, "https://example.com/post");

        assert_eq!(images.len(), 2);
        assert_eq!(images[0].url, "https://example.com/a.png");
        assert_eq!(images[0].alt, "first");
        assert_eq!(images[1].url, "https://cdn.test/b.png");
    }

    #[test]
    fn skips_narrow_images_and_missing_srcs() {
        let html = r#"
            <img src="/icon.png" width="32" alt="icon">
            <img src="/wide.png" width="640px" alt="wide">
            <img alt="no src">
            <img src="/unknown.png" width="squiggle" alt="unparsable width kept">
        "#;
        let images = extract_images(html, "https://example.com/");

        let urls: Vec<&str> = images.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/wide.png",
                "https://example.com/unknown.png"
            ]
        );
    }

    struct FlakyDescriber {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DescribeImage for FlakyDescriber {
        async fn describe(&self, image_url: &str) -> Result<String, DescribeError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if image_url.contains("bad") {
                Err(DescribeError::Status(500))
            } else {
                Ok(format!("description {}", call))
            }
        }
    }

    #[tokio::test]
    async fn failed_describe_gets_placeholder_and_order_is_kept() {
        let describer: Arc<dyn DescribeImage> = Arc::new(FlakyDescriber {
            calls: AtomicUsize::new(0),
        });

        let images = vec![
            ArticleImage {
                url: "https://example.com/good.png".to_string(),
                alt: "a chart".to_string(),
            },
            ArticleImage {
                url: "https://example.com/bad.png".to_string(),
                alt: "a diagram".to_string(),
            },
        ];

        let described = describe_images(&describer, &images).await;

        assert_eq!(described.len(), 2);
        assert_eq!(described[0].url, "https://example.com/good.png");
        assert!(described[0].description.starts_with("description"));
        assert_eq!(
            described[1].description,
            "Image: a diagram (Description unavailable)"
        );
    }
}
