use crate::error::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use jick_scanner::{CrawlOutcome, CrawlSettings, Crawler, Endpoint, GenerationConfig, Method};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub seeds: Vec<String>,
    pub settings: CrawlSettings,
    pub config: Arc<GenerationConfig>,
    pub show_progress_bars: bool,
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Execute a crawl with the given options
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlOutcome> {
    let CrawlOptions {
        seeds,
        settings,
        config,
        show_progress_bars,
    } = options;

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Seeding from {} URL(s)...", seeds.len()));
        Some(pb)
    } else {
        None
    };

    if let Some(ref callback) = progress_callback {
        callback(format!("Crawling {}", settings.scope.origin()));
    }

    let mut crawler = Crawler::new(settings, config)?;
    if let Some(ref pb) = progress_bar {
        let pb = pb.clone();
        let on_visit = move |visited: usize, endpoint: &Endpoint| {
            pb.set_message(format!(
                "Visited {} | {} {}",
                visited,
                endpoint.method,
                extract_url_path(&endpoint.url)
            ));
        };
        crawler = crawler.with_progress_callback(Arc::new(on_visit));
    }

    let outcome = crawler.crawl(&seeds).await;

    if let Some(ref pb) = progress_bar {
        match &outcome {
            Ok(outcome) => pb.finish_with_message(format!(
                "Crawl complete ({}): {} endpoints",
                outcome.reason,
                outcome.endpoints.len()
            )),
            Err(_) => pb.finish_and_clear(),
        }
    }
    if let (Some(callback), Ok(outcome)) = (&progress_callback, &outcome) {
        callback(format!("Stopped: {}", outcome.reason));
    }

    Ok(outcome?)
}

/// Generate a crawl report from an outcome
pub fn generate_crawl_report(outcome: &CrawlOutcome) -> String {
    let get_count = outcome
        .endpoints
        .iter()
        .filter(|e| e.method == Method::Get)
        .count();
    let post_count = outcome.endpoints.len() - get_count;

    let mut report = String::new();
    report.push_str(&format!("{}\n\n", "━".repeat(52)));
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Stopped: {}\n", outcome.reason));
    report.push_str(&format!("  Entries visited: {}\n", outcome.visited));
    report.push_str(&format!("  Endpoints discovered: {}\n", outcome.endpoints.len()));
    report.push_str(&format!("  GET: {}  POST: {}\n", get_count, post_count));
    report.push_str(&format!("  Elapsed: {:.1}s\n", outcome.elapsed.as_secs_f64()));
    report.push_str(&format!("\n{}\n\n", "━".repeat(52)));

    let mut by_path: BTreeMap<String, Vec<&Endpoint>> = BTreeMap::new();
    for endpoint in &outcome.endpoints {
        by_path
            .entry(extract_url_path(&endpoint.url))
            .or_default()
            .push(endpoint);
    }

    for (path, endpoints) in &by_path {
        report.push_str(&format!("## {}\n", path));
        for endpoint in endpoints {
            let method = match endpoint.method {
                Method::Get => endpoint.method.as_str().green(),
                Method::Post => endpoint.method.as_str().yellow(),
            };
            report.push_str(&format!("  {} {}\n", method, endpoint.url));
        }
        report.push('\n');
    }

    report
}
