//! Pulls in-scope candidate endpoints out of documents, robots.txt and
//! sitemap.xml.

use crate::endpoint::{Endpoint, Method, dedupe};
use crate::error::{Result, ScanError};
use crate::frontier::Frontier;
use crate::scope::Scope;
use crate::session::Session;
use crate::synth::submission_url;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, info};

static ROBOTS_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"llow:\s+([a-zA-Z0-9/\-?&=%*.]+)").expect("hardcoded regex pattern is valid")
});
static SITEMAP_SCHEME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(http|https|ftp)://").expect("hardcoded regex pattern is valid")
});

static FORM_WITH_ACTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("form[action]").expect("hardcoded selector is valid"));
static NAMED_CONTROLS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("input[name], textarea[name], select[name]")
        .expect("hardcoded selector is valid")
});
static SITEMAP_LOC: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("sitemap > loc").expect("hardcoded selector is valid"));

/// Parses a response body. Only a blank body is rejected; anything else
/// yields some tree.
pub fn parse_document(body: &str) -> Result<Html> {
    if body.trim().is_empty() {
        return Err(ScanError::Parse("document is empty".to_string()));
    }
    Ok(Html::parse_document(body))
}

/// Attribute values that never name a fetchable page.
fn is_navigable(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    !(value.is_empty()
        || value.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:"))
}

/// GET endpoints for every `<tag attr=...>` that resolves into scope and is
/// not already fingerprint-known.
pub fn links(
    document: &Html,
    tag: &str,
    attr: &str,
    scope: &Scope,
    frontier: &Frontier,
) -> Result<Vec<Endpoint>> {
    let selector = Selector::parse(&format!("{}[{}]", tag, attr))
        .map_err(|e| ScanError::Parse(format!("selector {}[{}]: {}", tag, attr, e)))?;

    let found = document
        .select(&selector)
        .filter_map(|element| element.value().attr(attr))
        .map(str::trim)
        .filter(|value| is_navigable(value))
        .map(|value| scope.absolute(value))
        .filter(|url| scope.contains(url))
        .map(Endpoint::get)
        .filter(|endpoint| !frontier.is_known(endpoint));

    Ok(dedupe(found))
}

/// Serialized `<form>` markup for each in-scope form submitted with
/// `method` whose parameter-name set is new.
pub fn forms(document: &Html, method: Method, scope: &Scope, frontier: &Frontier) -> Vec<String> {
    let mut found = Vec::new();

    for form in document.select(&FORM_WITH_ACTION) {
        let declared = form.value().attr("method").unwrap_or_default();
        if !declared.trim().eq_ignore_ascii_case(method.as_lower()) {
            continue;
        }
        let Some(action) = form.value().attr("action") else {
            continue;
        };

        let action = scope.absolute(action.trim());
        if !scope.contains(&action) {
            debug!("Form action {} is out of scope", action);
            continue;
        }

        let placeholder_params = form
            .select(&NAMED_CONTROLS)
            .filter_map(|control| control.value().attr("name"))
            .map(|name| format!("{}=null", name))
            .collect::<Vec<_>>()
            .join("&");
        let placeholder = Endpoint::new(method, submission_url(&action, &placeholder_params));
        if frontier.is_known(&placeholder) {
            debug!("Form {} already covered", placeholder);
            continue;
        }

        found.push(form.html());
    }

    found
}

/// GET endpoints from `Allow:`/`Disallow:` lines of a robots.txt body.
pub fn robots_entries(body: &str, scope: &Scope, frontier: &Frontier) -> Vec<Endpoint> {
    let found = ROBOTS_RULE
        .captures_iter(body)
        .filter_map(|captures| captures.get(1))
        .map(|path| Endpoint::get(scope.absolute(path.as_str())))
        .filter(|endpoint| scope.contains(&endpoint.url))
        .filter(|endpoint| !frontier.is_known(endpoint));
    dedupe(found)
}

/// GET endpoints from `<sitemap><loc>` entries of a sitemap document.
pub fn sitemap_entries(body: &str, scope: &Scope, frontier: &Frontier) -> Result<Vec<Endpoint>> {
    let document = parse_document(body)?;
    let found = document
        .select(&SITEMAP_LOC)
        .map(|loc| loc.text().collect::<String>().trim().to_string())
        .filter(|text| SITEMAP_SCHEME.is_match(text))
        .filter(|text| scope.contains(text))
        .map(Endpoint::get)
        .filter(|endpoint| !frontier.is_known(endpoint));
    Ok(dedupe(found))
}

/// Fetches `/robots.txt`; a failed fetch yields nothing.
pub async fn robots_urls(session: &Session, scope: &Scope, frontier: &Frontier) -> Vec<Endpoint> {
    let url = format!("{}/robots.txt", scope.origin());
    let body = match session.get(&url).await {
        Ok(body) => body,
        Err(e) => {
            debug!("Could not fetch {}: {}", url, e);
            return Vec::new();
        }
    };
    session.settle().await;

    let found = robots_entries(&body, scope, frontier);
    info!("robots.txt yielded {} URLs", found.len());
    found
}

/// Fetches `/sitemap.xml`; a failed fetch or unparsable body yields nothing.
pub async fn sitemap_urls(session: &Session, scope: &Scope, frontier: &Frontier) -> Vec<Endpoint> {
    let url = format!("{}/sitemap.xml", scope.origin());
    let body = match session.get(&url).await {
        Ok(body) => body,
        Err(e) => {
            debug!("Could not fetch {}: {}", url, e);
            return Vec::new();
        }
    };
    session.settle().await;

    match sitemap_entries(&body, scope, frontier) {
        Ok(found) => {
            info!("sitemap.xml yielded {} URLs", found.len());
            found
        }
        Err(e) => {
            debug!("Ignoring {}: {}", url, e);
            Vec::new()
        }
    }
}
