// Extraction pipeline: fetch, select, prune, clean, convert, enrich, save
//
// The pipeline is split into stages so the worker handler can report phase
// transitions between them. Parsed DOM state never crosses an await: scraper
// documents are not Send, so each stage takes and returns plain strings.

pub mod clean;
pub mod exclusions;
pub mod images;
pub mod markdown;
pub mod prune;
pub mod recipe;
pub mod select;
pub mod storage;

use reqwest::header;
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::services::describe::DescribeImage;
use clean::clean_fragment;
use images::{describe_images, extract_images, ArticleImage, DescribedImage};
use markdown::{convert_fragment, render_document};
use prune::PruneReport;
use recipe::SiteRecipe;
use select::{extract_author, extract_title, select_content};
use storage::save_markdown;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to fetch page: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Fetch returned HTTP {0}")]
    HttpStatus(u16),

    #[error(transparent)]
    ContentTooShort(#[from] select::ContentTooShort),

    #[error("Failed to save result: {0}")]
    Storage(#[from] std::io::Error),
}

/// Everything known about an article before image enrichment
#[derive(Debug)]
pub struct PreparedArticle {
    pub title: String,
    pub author: String,
    pub body_markdown: String,
    pub images: Vec<ArticleImage>,
    pub prune_report: PruneReport,
    pub strategy: &'static str,
}

/// Final output written back to the job row
#[derive(Debug)]
pub struct ExtractionResult {
    pub path: String,
    pub markdown: String,
    pub title: String,
    pub author: String,
    pub word_count: i32,
    pub image_count: i32,
}

pub struct Extractor {
    http: reqwest::Client,
    describer: Arc<dyn DescribeImage>,
    storage_path: String,
}

impl Extractor {
    pub fn new(describer: Arc<dyn DescribeImage>, storage_path: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .default_headers(browser_headers())
            .build()
            .unwrap_or_default();

        Self {
            http,
            describer,
            storage_path,
        }
    }

    /// Run the whole pipeline for one job
    #[instrument(skip(self, recipe), fields(job_id = %job_id))]
    pub async fn extract(
        &self,
        job_id: Uuid,
        url: &str,
        recipe: Option<&SiteRecipe>,
    ) -> Result<ExtractionResult, ExtractError> {
        let html = self.fetch_html(url).await?;
        let prepared = self.prepare(&html, url, recipe)?;
        let described = self.describe(&prepared.images).await;
        self.finish(job_id, prepared, described).await
    }

    /// Fetch the page with a browser-like header set. Non-200 is an error.
    pub async fn fetch_html(&self, url: &str) -> Result<String, ExtractError> {
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ExtractError::HttpStatus(status.as_u16()));
        }

        Ok(response.text().await?)
    }

    /// Synchronous stage: selection, pruning, cleaning, metadata, image
    /// discovery, and body conversion.
    pub fn prepare(
        &self,
        raw_html: &str,
        page_url: &str,
        recipe: Option<&SiteRecipe>,
    ) -> Result<PreparedArticle, ExtractError> {
        let doc = Html::parse_document(raw_html);

        let title = extract_title(&doc, recipe);
        let author = extract_author(&doc, recipe);

        let selected = select_content(&doc, recipe, raw_html)?;
        let cleaned = clean_fragment(&selected.html);

        let images = extract_images(&cleaned, page_url);
        let body_markdown = convert_fragment(&cleaned);

        info!(
            strategy = selected.strategy,
            images = images.len(),
            pruned = selected.report.total_removed,
            "Article prepared"
        );

        Ok(PreparedArticle {
            title,
            author,
            body_markdown,
            images,
            prune_report: selected.report,
            strategy: selected.strategy,
        })
    }

    /// Enrich images with descriptions; failures degrade to placeholders
    pub async fn describe(&self, article_images: &[ArticleImage]) -> Vec<DescribedImage> {
        describe_images(&self.describer, article_images).await
    }

    /// Render the final document and persist it
    pub async fn finish(
        &self,
        job_id: Uuid,
        prepared: PreparedArticle,
        described: Vec<DescribedImage>,
    ) -> Result<ExtractionResult, ExtractError> {
        let markdown = render_document(
            &prepared.title,
            &prepared.author,
            &prepared.body_markdown,
            &described,
        );

        let path = save_markdown(&self.storage_path, job_id, &prepared.title, &markdown).await?;

        Ok(ExtractionResult {
            word_count: markdown.split_whitespace().count() as i32,
            image_count: prepared.images.len() as i32,
            path,
            markdown,
            title: prepared.title,
            author: prepared.author,
        })
    }
}

fn browser_headers() -> header::HeaderMap {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
        ),
    );
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        header::HeaderValue::from_static("en-US,en;q=0.5"),
    );
    headers.insert(
        header::ACCEPT_ENCODING,
        header::HeaderValue::from_static("gzip, deflate"),
    );
    headers.insert(
        header::CONNECTION,
        header::HeaderValue::from_static("keep-alive"),
    );
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        header::HeaderValue::from_static("1"),
    );
    headers
}
