// URL and domain validation helpers

use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum DomainError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL has no host")]
    MissingHost,
}

/// Derive the routing domain from a URL: lowercase host with any leading
/// `www.` stripped. This is the lookup key for site recipes.
pub fn derive_domain(url_str: &str) -> Result<String, DomainError> {
    let parsed = Url::parse(url_str).map_err(|e| DomainError::InvalidUrl(e.to_string()))?;

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(DomainError::MissingHost)?;

    let host = host.to_lowercase();
    Ok(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_www_and_lowercases() {
        assert_eq!(
            derive_domain("https://WWW.Example.COM/a/b?c=d").unwrap(),
            "example.com"
        );
    }

    #[test]
    fn keeps_subdomains() {
        assert_eq!(
            derive_domain("https://blog.example.com/post").unwrap(),
            "blog.example.com"
        );
    }

    #[test]
    fn rejects_urls_without_host() {
        assert!(matches!(
            derive_domain("not-a-url"),
            Err(DomainError::InvalidUrl(_))
        ));
        assert_eq!(derive_domain("file:///tmp/x"), Err(DomainError::MissingHost));
    }
}
