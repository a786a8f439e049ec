// Site recipe: the YAML body stored per domain in site_configs
// Every field defaults so partially learned recipes still parse

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteRecipe {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub learned_at: String,
    #[serde(default)]
    pub extraction: ExtractionRules,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionRules {
    #[serde(default)]
    pub article_content: ArticleContentRules,
    #[serde(default)]
    pub title: TitleRules,
    #[serde(default)]
    pub author: AuthorRules,
    #[serde(default)]
    pub content_pattern: ContentPattern,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleContentRules {
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub fallback: String,
    #[serde(default)]
    pub exclude_selectors: Vec<String>,
    #[serde(default)]
    pub cleanup_rules: CleanupRules,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupRules {
    #[serde(default)]
    pub stop_at_repeated_links: bool,
    #[serde(default)]
    pub max_consecutive_links: u32,
    #[serde(default)]
    pub remove_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TitleRules {
    #[serde(default)]
    pub og_meta: String,
    #[serde(default)]
    pub fallback_selector: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorRules {
    #[serde(default)]
    pub fallback_selector: String,
    #[serde(default)]
    pub fallback_meta: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentPattern {
    #[serde(default)]
    pub start_marker: String,
    #[serde(default)]
    pub end_marker: String,
}

impl ContentPattern {
    pub fn is_set(&self) -> bool {
        !self.start_marker.is_empty() && !self.end_marker.is_empty()
    }
}

impl SiteRecipe {
    pub fn parse(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_RECIPE: &str = r#"
domain: example.com
learned_at: "2025-06-01T10:00:00Z"
extraction:
  article_content:
    selector: "article.post"
    fallback: ".entry-content"
    exclude_selectors:
      - ".share-buttons"
      - ".related-posts"
    cleanup_rules:
      stop_at_repeated_links: true
      max_consecutive_links: 3
      remove_patterns:
        - "Subscribe to our newsletter"
  title:
    og_meta: "og:title"
    fallback_selector: "h1.entry-title"
  author:
    fallback_selector: ".byline a"
    fallback_meta: "author"
  content_pattern:
    start_marker: "<h1"
    end_marker: "(?=<footer|<div class=\"comments\")"
notes: "Elementor site, content inside widget container"
"#;

    #[test]
    fn parses_full_recipe() {
        let recipe = SiteRecipe::parse(FULL_RECIPE).unwrap();
        assert_eq!(recipe.domain, "example.com");
        assert_eq!(recipe.extraction.article_content.selector, "article.post");
        assert_eq!(
            recipe.extraction.article_content.exclude_selectors,
            vec![".share-buttons", ".related-posts"]
        );
        assert!(recipe.extraction.article_content.cleanup_rules.stop_at_repeated_links);
        assert_eq!(recipe.extraction.title.og_meta, "og:title");
        assert_eq!(recipe.extraction.author.fallback_selector, ".byline a");
        assert!(recipe.extraction.content_pattern.is_set());
    }

    #[test]
    fn parses_minimal_recipe() {
        let recipe = SiteRecipe::parse("domain: blog.test\n").unwrap();
        assert_eq!(recipe.domain, "blog.test");
        assert!(recipe.extraction.article_content.selector.is_empty());
        assert!(recipe.extraction.article_content.exclude_selectors.is_empty());
        assert!(!recipe.extraction.content_pattern.is_set());
    }

    #[test]
    fn empty_document_uses_defaults() {
        let recipe = SiteRecipe::parse("{}").unwrap();
        assert!(recipe.domain.is_empty());
        assert!(!recipe.extraction.content_pattern.is_set());
    }
}
