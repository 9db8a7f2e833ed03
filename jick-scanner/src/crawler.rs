use crate::config::GenerationConfig;
use crate::controls::FormDescriptor;
use crate::endpoint::{Endpoint, FingerprintScope, Method, dedupe};
use crate::error::{Result, ScanError};
use crate::extract;
use crate::frontier::Frontier;
use crate::result::{CrawlOutcome, TerminationReason};
use crate::scope::Scope;
use crate::session::{Session, SessionSettings};
use crate::sink::{EndpointSink, flush_all};
use crate::synth::Synthesizer;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::form_urlencoded;

/// Called with the 1-based visit number before each frontier entry is fetched.
pub type ProgressCallback = Arc<dyn Fn(usize, &Endpoint) + Send + Sync>;

/// Which kinds of discovery are switched on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features {
    pub href: bool,
    pub iframe: bool,
    pub get: bool,
    pub post: bool,
    pub robots: bool,
    pub sitemap: bool,
}

impl Features {
    pub fn any(&self) -> bool {
        self.href || self.iframe || self.get || self.post || self.robots || self.sitemap
    }
}

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub scope: Scope,
    pub features: Features,
    pub session: SessionSettings,
    pub max_time: Duration,
    pub max_results: usize,
    pub fingerprint_scope: FingerprintScope,
}

impl CrawlSettings {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            features: Features::default(),
            session: SessionSettings::default(),
            max_time: Duration::from_secs(600),
            max_results: 300,
            fingerprint_scope: FingerprintScope::default(),
        }
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    pub fn with_session(mut self, session: SessionSettings) -> Self {
        self.session = session;
        self
    }

    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = max_time;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_fingerprint_scope(mut self, scope: FingerprintScope) -> Self {
        self.fingerprint_scope = scope;
        self
    }
}

/// Sequential crawl over a growing frontier.
///
/// Seeds are fetched once and mined for endpoints, then the frontier is
/// drained in append order. Each visited response may append more entries.
/// The run stops on the time budget, the result budget, or when the cursor
/// reaches the end of the frontier.
pub struct Crawler {
    session: Session,
    settings: CrawlSettings,
    config: Arc<GenerationConfig>,
    progress_callback: Option<ProgressCallback>,
    rng_seed: Option<u64>,
}

impl Crawler {
    pub fn new(settings: CrawlSettings, config: Arc<GenerationConfig>) -> Result<Self> {
        Ok(Self {
            session: Session::new(settings.session.clone())?,
            settings,
            config,
            progress_callback: None,
            rng_seed: None,
        })
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Makes generated form values reproducible.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Runs the crawl and writes every discovered endpoint to `sink`.
    pub async fn crawl_into(
        &self,
        seeds: &[String],
        sink: &mut dyn EndpointSink,
    ) -> Result<CrawlOutcome> {
        let outcome = self.crawl(seeds).await?;
        flush_all(&outcome.endpoints, sink)?;
        Ok(outcome)
    }

    pub async fn crawl(&self, seeds: &[String]) -> Result<CrawlOutcome> {
        if seeds.is_empty() {
            return Err(ScanError::InvalidUrl("no seed URL given".to_string()));
        }
        info!(
            "Starting crawl of {} from {} seed(s)",
            self.settings.scope.host,
            seeds.len()
        );

        let start = Instant::now();
        let mut frontier = Frontier::with_scope(self.settings.fingerprint_scope);
        let mut synth = Synthesizer::new(self.config.clone());
        if let Some(seed) = self.rng_seed {
            synth = synth.with_seed(seed);
        }

        for seed in seeds {
            match self.session.get(seed).await {
                Ok(body) => {
                    self.session.settle().await;
                    let found = self.harvest(&body, &frontier, &mut synth);
                    let added = frontier.extend(found);
                    debug!("Seed {} added {} endpoints", seed, added);
                }
                Err(e) => warn!("Skipping seed {}: {}", seed, e),
            }
        }

        let scope = &self.settings.scope;
        if self.settings.features.sitemap {
            let found = extract::sitemap_urls(&self.session, scope, &frontier).await;
            frontier.extend(found);
        }
        if self.settings.features.robots {
            let found = extract::robots_urls(&self.session, scope, &frontier).await;
            frontier.extend(found);
        }
        info!("Seeding found {} endpoints", frontier.len());
        if frontier.is_empty() {
            return Ok(CrawlOutcome::new(
                TerminationReason::NothingFound,
                0,
                start.elapsed(),
                Vec::new(),
            ));
        }

        let mut visited = 0;
        let reason = loop {
            let Some(entry) = frontier.next_entry() else {
                break TerminationReason::Exhausted;
            };
            visited += 1;
            if let Some(ref callback) = self.progress_callback {
                callback(visited, &entry);
            }

            match self.visit(&entry).await {
                Ok(body) => {
                    let found = self.harvest(&body, &frontier, &mut synth);
                    let added = frontier.extend(found);
                    debug!("{} added {} endpoints", entry, added);
                }
                Err(e) => debug!("Skipping {}: {}", entry, e),
            }
            self.session.settle().await;

            if start.elapsed() > self.settings.max_time {
                break TerminationReason::TimeLimit;
            }
            if frontier.len() >= self.settings.max_results {
                break TerminationReason::ResultLimit;
            }
        };

        info!(
            "Crawl done ({}): visited {}, discovered {}",
            reason,
            visited,
            frontier.len()
        );
        Ok(CrawlOutcome::new(
            reason,
            visited,
            start.elapsed(),
            frontier.into_entries(),
        ))
    }

    async fn visit(&self, endpoint: &Endpoint) -> Result<String> {
        match endpoint.method {
            Method::Get => self.session.get(&endpoint.url).await,
            Method::Post => {
                let (action, fields) = split_post(&endpoint.url)?;
                self.session.post(action, &fields).await
            }
        }
    }

    /// Everything a response body contributes, before frontier admission.
    fn harvest(&self, body: &str, frontier: &Frontier, synth: &mut Synthesizer) -> Vec<Endpoint> {
        let document = match extract::parse_document(body) {
            Ok(document) => document,
            Err(e) => {
                debug!("No discoveries: {}", e);
                return Vec::new();
            }
        };
        let scope = &self.settings.scope;
        let features = self.settings.features;

        let mut links = Vec::new();
        let link_sources = [(features.href, "a", "href"), (features.iframe, "iframe", "src")];
        for (enabled, tag, attr) in link_sources {
            if !enabled {
                continue;
            }
            match extract::links(&document, tag, attr, scope, frontier) {
                Ok(found) => links.extend(found),
                Err(e) => warn!("Link extraction failed: {}", e),
            }
        }

        let mut discovered = dedupe(links);
        for (enabled, method) in [(features.get, Method::Get), (features.post, Method::Post)] {
            if !enabled {
                continue;
            }
            for markup in extract::forms(&document, method, scope, frontier) {
                match FormDescriptor::parse(&markup, method, scope) {
                    Ok(form) => discovered.extend(synth.submissions(&form)),
                    Err(e) => debug!("Skipping form: {}", e),
                }
            }
        }
        discovered
    }
}

/// Splits a stored POST endpoint into its action and body fields. Later
/// duplicates of a field name win.
pub fn split_post(url: &str) -> Result<(&str, Vec<(String, String)>)> {
    let mut parts = url.split('?');
    let (Some(action), Some(query), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ScanError::InvalidUrl(format!(
            "{} does not split into action and parameters",
            url
        )));
    };

    let mut fields: Vec<(String, String)> = Vec::new();
    for (name, value) in form_urlencoded::parse(query.as_bytes()) {
        match fields.iter_mut().find(|(existing, _)| existing.as_str() == name.as_ref()) {
            Some(field) => field.1 = value.into_owned(),
            None => fields.push((name.into_owned(), value.into_owned())),
        }
    }
    Ok((action, fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MethodRules, SelectionMode, ValueRule};
    use crate::session::DelayBounds;
    use std::sync::Mutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, header, header_exists, method, path, query_param},
    };

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html")
            .set_body_string(body.to_string())
    }

    async fn mount_page(server: &MockServer, at: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(html(body))
            .mount(server)
            .await;
    }

    fn crawler_for(server: &MockServer, features: Features) -> CrawlSettings {
        let scope = Scope::parse(&server.uri()).unwrap();
        CrawlSettings::new(scope).with_features(features)
    }

    fn links_only() -> Features {
        Features {
            href: true,
            ..Features::default()
        }
    }

    fn intelligence_config() -> Arc<GenerationConfig> {
        let rules = || {
            MethodRules::new(1).with_rule(
                "default",
                ValueRule::new(["intelligence"], SelectionMode::Positional),
            )
        };
        Arc::new(GenerationConfig::new(rules(), rules()))
    }

    #[test]
    fn test_split_post() {
        let (action, fields) = split_post("http://h/login?user=a&pass=b%21&user=c").unwrap();
        assert_eq!(action, "http://h/login");
        assert_eq!(
            fields,
            vec![
                ("user".to_string(), "c".to_string()),
                ("pass".to_string(), "b!".to_string()),
            ]
        );
        assert!(split_post("http://h/login").is_err());
        assert!(split_post("http://h/a?b=1?c=2").is_err());
    }

    #[test]
    fn test_features_any() {
        assert!(!Features::default().any());
        assert!(links_only().any());
    }

    #[tokio::test]
    async fn test_link_discovery_drains_frontier() {
        let server = MockServer::start().await;
        mount_page(&server, "/", r#"<a href="/page1?a=1">1</a><a href="/page2?b=1">2</a>"#).await;
        mount_page(&server, "/page1", r#"<a href="/page3?c=1">3</a>"#).await;
        mount_page(&server, "/page2", "<p>two</p>").await;
        mount_page(&server, "/page3", "<p>three</p>").await;

        let crawler =
            Crawler::new(crawler_for(&server, links_only()), intelligence_config()).unwrap();
        let outcome = crawler.crawl(&[server.uri()]).await.unwrap();

        assert_eq!(outcome.reason, TerminationReason::Exhausted);
        assert_eq!(outcome.visited, 3);
        let urls: Vec<String> = outcome.endpoints.iter().map(|e| e.url.clone()).collect();
        assert_eq!(
            urls,
            vec![
                format!("{}/page1?a=1", server.uri()),
                format!("{}/page2?b=1", server.uri()),
                format!("{}/page3?c=1", server.uri()),
            ]
        );
    }

    #[tokio::test]
    async fn test_result_limit_stops_after_one_visit() {
        let server = MockServer::start().await;
        let root: String = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|p| format!(r#"<a href="/p?{}=1">{}</a>"#, p, p))
            .collect();
        mount_page(&server, "/", &root).await;
        mount_page(&server, "/p", "<p>leaf</p>").await;

        let settings = crawler_for(&server, links_only()).with_max_results(1);
        let crawler = Crawler::new(settings, intelligence_config()).unwrap();
        let mut sink: Vec<Endpoint> = Vec::new();
        let outcome = crawler.crawl_into(&[server.uri()], &mut sink).await.unwrap();

        assert_eq!(outcome.reason, TerminationReason::ResultLimit);
        assert_eq!(outcome.visited, 1);
        assert_eq!(sink.len(), 5);

        let requests = server.received_requests().await.unwrap();
        let leaf_hits = requests.iter().filter(|r| r.url.path() == "/p").count();
        assert_eq!(leaf_hits, 1);
    }

    #[tokio::test]
    async fn test_time_limit() {
        let server = MockServer::start().await;
        mount_page(&server, "/", r#"<a href="/a?x=1">a</a><a href="/b?y=1">b</a>"#).await;
        mount_page(&server, "/a", "<p>a</p>").await;
        mount_page(&server, "/b", "<p>b</p>").await;

        let settings = crawler_for(&server, links_only()).with_max_time(Duration::ZERO);
        let crawler = Crawler::new(settings, intelligence_config()).unwrap();
        let outcome = crawler.crawl(&[server.uri()]).await.unwrap();

        assert_eq!(outcome.reason, TerminationReason::TimeLimit);
        assert_eq!(outcome.visited, 1);
        assert_eq!(outcome.endpoints.len(), 2);
    }

    #[tokio::test]
    async fn test_get_form_is_synthesized_and_submitted() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<form method="get" action="/search">
                <input type="text" name="q" maxlength="5">
                <input type="hidden" name="csrf" value="tok">
            </form>"#,
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("csrf", "tok"))
            .respond_with(html("<p>results</p>"))
            .expect(1)
            .mount(&server)
            .await;

        let features = Features {
            get: true,
            ..Features::default()
        };
        let crawler = Crawler::new(crawler_for(&server, features), intelligence_config())
            .unwrap()
            .with_rng_seed(3);
        let outcome = crawler.crawl(&[server.uri()]).await.unwrap();

        assert_eq!(outcome.endpoints.len(), 1);
        let endpoint = &outcome.endpoints[0];
        assert_eq!(endpoint.method, Method::Get);
        let query = endpoint.url.split_once('?').unwrap().1;
        let (text, hidden) = query.split_once('&').unwrap();
        assert_eq!(text.len(), "q=".len() + 4);
        assert_eq!(hidden, "csrf=tok");
    }

    #[tokio::test]
    async fn test_post_form_is_sent_as_body() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<form method="POST" action="/login">
                <input type="text" name="user" placeholder="alice">
                <input type="password" name="pass" maxlength="5">
                <input type="password" name="confirm" maxlength="5">
            </form>"#,
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_string_contains("user=alice"))
            .and(body_string_contains("pass=Ax1%21"))
            .and(body_string_contains("confirm=Ax1%21"))
            .respond_with(html("<p>welcome</p>"))
            .expect(1)
            .mount(&server)
            .await;

        let features = Features {
            post: true,
            ..Features::default()
        };
        let crawler = Crawler::new(crawler_for(&server, features), intelligence_config()).unwrap();
        let outcome = crawler.crawl(&[server.uri()]).await.unwrap();

        assert_eq!(outcome.visited, 1);
        assert_eq!(
            outcome.endpoints,
            vec![Endpoint::post(format!(
                "{}/login?user=alice&pass=Ax1%21&confirm=Ax1%21",
                server.uri()
            ))]
        );
    }

    #[tokio::test]
    async fn test_transport_failures_are_skipped() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<a href="http://127.0.0.1:1/dead?z=1">dead</a><a href="/alive?y=1">alive</a>"#,
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/alive"))
            .respond_with(html("<p>ok</p>"))
            .expect(1)
            .mount(&server)
            .await;

        let crawler =
            Crawler::new(crawler_for(&server, links_only()), intelligence_config()).unwrap();
        let seeds = vec![server.uri(), "http://127.0.0.1:1/".to_string()];
        let outcome = crawler.crawl(&seeds).await.unwrap();

        assert_eq!(outcome.reason, TerminationReason::Exhausted);
        assert_eq!(outcome.visited, 2);
        assert_eq!(outcome.endpoints.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_body_yields_nothing() {
        let server = MockServer::start().await;
        mount_page(&server, "/", r#"<a href="/blank?x=1">blank</a>"#).await;
        mount_page(&server, "/blank", "").await;

        let crawler =
            Crawler::new(crawler_for(&server, links_only()), intelligence_config()).unwrap();
        let outcome = crawler.crawl(&[server.uri()]).await.unwrap();
        assert_eq!(outcome.reason, TerminationReason::Exhausted);
        assert_eq!(outcome.endpoints.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_seeding_reports_nothing_found() {
        let server = MockServer::start().await;
        mount_page(&server, "/", "<p>no links here</p>").await;

        let crawler =
            Crawler::new(crawler_for(&server, links_only()), intelligence_config()).unwrap();
        let outcome = crawler.crawl(&[server.uri()]).await.unwrap();
        assert!(outcome.is_empty());
        assert_eq!(outcome.visited, 0);
        assert_eq!(outcome.reason, TerminationReason::NothingFound);
    }

    #[tokio::test]
    async fn test_sitemap_then_robots_are_seeded() {
        let server = MockServer::start().await;
        mount_page(&server, "/", "<p>home</p>").await;
        mount_page(
            &server,
            "/sitemap.xml",
            &format!(
                "<sitemapindex><sitemap><loc>{}/posts?s=1</loc></sitemap></sitemapindex>",
                server.uri()
            ),
        )
        .await;
        mount_page(&server, "/robots.txt", "User-agent: *\nDisallow: /secret?k=1\n").await;

        let features = Features {
            robots: true,
            sitemap: true,
            ..Features::default()
        };
        let crawler = Crawler::new(crawler_for(&server, features), intelligence_config()).unwrap();
        let outcome = crawler.crawl(&[server.uri()]).await.unwrap();

        assert_eq!(
            outcome.endpoints,
            vec![
                Endpoint::get(format!("{}/posts?s=1", server.uri())),
                Endpoint::get(format!("{}/secret?k=1", server.uri())),
            ]
        );
    }

    #[tokio::test]
    async fn test_cookies_carried_when_enabled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                html(r#"<a href="/next?n=1">next</a>"#)
                    .insert_header("set-cookie", "sid=1; Path=/"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/next"))
            .and(header("cookie", "sid=1"))
            .respond_with(html("<p>hi</p>"))
            .expect(1)
            .mount(&server)
            .await;

        let mut settings = crawler_for(&server, links_only());
        settings.session.use_cookies = true;
        let crawler = Crawler::new(settings, intelligence_config()).unwrap();
        crawler.crawl(&[server.uri()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_cookies_dropped_when_disabled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                html(r#"<a href="/next?n=1">next</a>"#)
                    .insert_header("set-cookie", "sid=1; Path=/"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/next"))
            .and(header_exists("cookie"))
            .respond_with(html("<p>hi</p>"))
            .expect(0)
            .mount(&server)
            .await;
        mount_page(&server, "/next", "<p>anonymous</p>").await;

        let crawler =
            Crawler::new(crawler_for(&server, links_only()), intelligence_config()).unwrap();
        let outcome = crawler.crawl(&[server.uri()]).await.unwrap();
        assert_eq!(outcome.visited, 1);
    }

    #[tokio::test]
    async fn test_progress_callback_sees_each_visit() {
        let server = MockServer::start().await;
        mount_page(&server, "/", r#"<a href="/a?x=1">a</a><a href="/b?y=1">b</a>"#).await;
        mount_page(&server, "/a", "<p>a</p>").await;
        mount_page(&server, "/b", "<p>b</p>").await;

        let seen: Arc<Mutex<Vec<(usize, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let crawler = Crawler::new(crawler_for(&server, links_only()), intelligence_config())
            .unwrap()
            .with_progress_callback(Arc::new(move |n: usize, endpoint: &Endpoint| {
                seen_clone.lock().unwrap().push((n, endpoint.url.clone()));
            }));
        crawler.crawl(&[server.uri()]).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 1);
        assert!(seen[1].1.ends_with("/b?y=1"));
    }

    #[tokio::test]
    async fn test_unreachable_robots_and_sitemap_are_skipped() {
        let server = MockServer::start().await;
        let link = format!("{}/a?x=1", server.uri());
        mount_page(&server, "/", &format!(r#"<a href="{}">a</a>"#, link)).await;
        mount_page(&server, "/a", "<p>a</p>").await;

        // Same host as the mock server, but nothing listens on port 1.
        let scope = Scope::parse("http://127.0.0.1:1").unwrap();
        let features = Features {
            href: true,
            robots: true,
            sitemap: true,
            ..Features::default()
        };
        let settings = CrawlSettings::new(scope).with_features(features);
        let crawler = Crawler::new(settings, intelligence_config()).unwrap();
        let outcome = crawler.crawl(&[server.uri()]).await.unwrap();

        assert_eq!(outcome.reason, TerminationReason::Exhausted);
        assert_eq!(outcome.visited, 1);
        assert_eq!(outcome.endpoints, vec![Endpoint::get(link)]);
    }

    #[tokio::test]
    async fn test_unsplittable_post_entry_is_skipped() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<form method="POST" action="/login?a=1?b=2">
                <input type="hidden" name="t" value="x">
            </form>"#,
        )
        .await;
        Mock::given(method("POST"))
            .respond_with(html("<p>never</p>"))
            .expect(0)
            .mount(&server)
            .await;

        let features = Features {
            post: true,
            ..Features::default()
        };
        let crawler = Crawler::new(crawler_for(&server, features), intelligence_config()).unwrap();
        let outcome = crawler.crawl(&[server.uri()]).await.unwrap();

        assert_eq!(outcome.reason, TerminationReason::Exhausted);
        assert_eq!(outcome.visited, 1);
        assert_eq!(outcome.endpoints.len(), 1);
        assert_eq!(outcome.endpoints[0].url.matches('?').count(), 2);
        assert!(split_post(&outcome.endpoints[0].url).is_err());
    }

    #[tokio::test]
    async fn test_delay_applies_after_every_fetch() {
        let server = MockServer::start().await;
        mount_page(&server, "/", r#"<a href="/a?x=1">a</a><a href="/b?y=1">b</a>"#).await;
        mount_page(&server, "/a", "<p>a</p>").await;
        mount_page(&server, "/b", "<p>b</p>").await;

        // [1, 2) always draws one second.
        let mut settings = crawler_for(&server, links_only()).with_max_time(Duration::from_secs(1));
        settings.session.delay = DelayBounds::new(1, 2);
        let crawler = Crawler::new(settings, intelligence_config()).unwrap();
        let outcome = crawler.crawl(&[server.uri()]).await.unwrap();

        // One pause after the seed and one after the first visit.
        assert_eq!(outcome.reason, TerminationReason::TimeLimit);
        assert_eq!(outcome.visited, 1);
        assert!(outcome.elapsed >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_no_seeds_is_an_error() {
        let scope = Scope::new("http", "example.com");
        let crawler = Crawler::new(CrawlSettings::new(scope), intelligence_config()).unwrap();
        assert!(matches!(crawler.crawl(&[]).await, Err(ScanError::InvalidUrl(_))));
    }
}
