use crate::error::{Result, ScanError};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static ABSOLUTE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://").expect("hardcoded regex pattern is valid"));

/// The single host a crawl is confined to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
}

impl Scope {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port: None,
        }
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn from_url(url: &Url) -> Result<Self> {
        let host = url
            .host_str()
            .ok_or_else(|| ScanError::InvalidUrl(format!("{} has no host", url)))?;
        Ok(Self::new(url.scheme(), host).with_port(url.port()))
    }

    pub fn parse(url: &str) -> Result<Self> {
        let parsed =
            Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;
        Self::from_url(&parsed)
    }

    /// `scheme://host[:port]`
    pub fn origin(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.scheme, self.host, port),
            None => format!("{}://{}", self.scheme, self.host),
        }
    }

    /// Absolute URLs are kept verbatim; everything else hangs off the site
    /// root, never off the current page's directory.
    pub fn absolute(&self, value: &str) -> String {
        if ABSOLUTE_URL.is_match(value) {
            return value.to_string();
        }
        let relative = value.strip_prefix('/').unwrap_or(value);
        format!("{}/{}", self.origin(), relative)
    }

    /// Hostname comparison only; scheme and port are not checked.
    pub fn contains(&self, url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(&self.host)))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_keeps_absolute_urls() {
        let scope = Scope::new("https", "example.com");
        assert_eq!(
            scope.absolute("http://other.org/x"),
            "http://other.org/x"
        );
    }

    #[test]
    fn test_absolute_joins_relative_to_root() {
        let scope = Scope::new("https", "example.com");
        assert_eq!(scope.absolute("/a/b?c=1"), "https://example.com/a/b?c=1");
        assert_eq!(scope.absolute("page.html"), "https://example.com/page.html");
    }

    #[test]
    fn test_absolute_keeps_port() {
        let scope = Scope::parse("http://127.0.0.1:8080/start").unwrap();
        assert_eq!(scope.absolute("/x"), "http://127.0.0.1:8080/x");
    }

    #[test]
    fn test_contains_compares_hostname_only() {
        let scope = Scope::new("https", "example.com");
        assert!(scope.contains("http://example.com:9000/a"));
        assert!(scope.contains("https://EXAMPLE.com/"));
        assert!(!scope.contains("https://sub.example.com/"));
        assert!(!scope.contains("not a url"));
    }

    #[test]
    fn test_parse_rejects_hostless_url() {
        assert!(Scope::parse("mailto:someone@example.com").is_err());
    }
}
