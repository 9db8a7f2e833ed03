use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use url::Url;

/// HTTP method a discovered endpoint is submitted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }

    /// Lowercase form used for `<form method>` matching and config sections.
    pub fn as_lower(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One crawlable target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    pub method: Method,
    pub url: String,
}

impl Endpoint {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// What part of an endpoint takes part in deduplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FingerprintScope {
    /// Method and sorted parameter names only. Two different pages sharing a
    /// parameter-name set collapse into one entry.
    #[default]
    ParamsOnly,
    /// Also keys on the normalized URL path.
    PathAndParams,
}

/// Deduplication key of an [`Endpoint`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub method: Method,
    pub path: Option<String>,
    pub params: Vec<String>,
}

/// Fingerprint ignoring the path.
pub fn fingerprint(endpoint: &Endpoint) -> Fingerprint {
    fingerprint_with(endpoint, FingerprintScope::ParamsOnly)
}

pub fn fingerprint_with(endpoint: &Endpoint, scope: FingerprintScope) -> Fingerprint {
    let mut params: Vec<String> = query_of(&endpoint.url)
        .split('&')
        .map(|pair| pair.split('=').next().unwrap_or_default().to_string())
        .collect();
    params.sort();

    let path = match scope {
        FingerprintScope::ParamsOnly => None,
        FingerprintScope::PathAndParams => Some(normalized_path(&endpoint.url)),
    };

    Fingerprint {
        method: endpoint.method,
        path,
        params,
    }
}

/// True iff some endpoint in `known` shares `candidate`'s fingerprint.
pub fn is_known<'a>(known: impl IntoIterator<Item = &'a Endpoint>, candidate: &Endpoint) -> bool {
    let wanted = fingerprint(candidate);
    known.into_iter().any(|e| fingerprint(e) == wanted)
}

/// Stable removal of exact duplicates, keeping the first occurrence.
pub fn dedupe<T: Eq + Hash + Clone>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

fn query_of(url: &str) -> &str {
    let without_fragment = url.split('#').next().unwrap_or(url);
    without_fragment
        .split_once('?')
        .map(|(_, query)| query)
        .unwrap_or("")
}

fn normalized_path(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    };
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
