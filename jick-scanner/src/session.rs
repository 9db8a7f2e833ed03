use crate::error::{Result, ScanError};
use rand::Rng;
use reqwest::Client;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Inter-request pause, in whole seconds, drawn from `[min, max)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelayBounds {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl DelayBounds {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self { min_secs, max_secs }
    }

    /// Signed bounds as typed on a command line. Negative or inverted
    /// bounds disable the delay.
    pub fn normalized(min_secs: i64, max_secs: i64) -> Self {
        if min_secs < 0 || max_secs < 0 || max_secs < min_secs {
            return Self::default();
        }
        Self::new(min_secs as u64, max_secs as u64)
    }

    pub fn is_active(&self) -> bool {
        self.min_secs < self.max_secs
    }

    pub fn draw(&self) -> Option<Duration> {
        if !self.is_active() {
            return None;
        }
        let secs = rand::thread_rng().gen_range(self.min_secs..self.max_secs);
        Some(Duration::from_secs(secs))
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub user_agent: String,
    pub timeout: Duration,
    pub proxy: Option<String>,
    pub use_cookies: bool,
    pub delay: DelayBounds,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(5),
            proxy: None,
            use_cookies: false,
            delay: DelayBounds::default(),
        }
    }
}

/// Cookie store that can be emptied between requests.
#[derive(Default)]
pub struct SessionJar {
    inner: RwLock<Jar>,
}

impl SessionJar {
    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Jar::default();
    }

    /// `Cookie` header that would be sent to `url`.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        self.cookies(url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }
}

impl CookieStore for SessionJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .set_cookies(cookie_headers, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .cookies(url)
    }
}

/// HTTP client plus the per-request policies applied between fetches.
pub struct Session {
    client: Client,
    jar: Arc<SessionJar>,
    settings: SessionSettings,
}

impl Session {
    pub fn new(settings: SessionSettings) -> Result<Self> {
        let jar = Arc::new(SessionJar::default());
        let mut builder = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout)
            .connect_timeout(settings.timeout)
            .cookie_provider(jar.clone())
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(proxy) = &settings.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| ScanError::Config(format!("invalid proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build()?,
            jar,
            settings,
        })
    }

    /// Response body of a GET; any status code counts as a response.
    pub async fn get(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        Ok(response.text().await?)
    }

    pub async fn post(&self, url: &str, form: &[(String, String)]) -> Result<String> {
        debug!("POST {} ({} fields)", url, form.len());
        let response = self.client.post(url).form(form).send().await?;
        Ok(response.text().await?)
    }

    /// Runs after every fetch: optional pause, then drop cookies unless
    /// they are being carried.
    pub async fn settle(&self) {
        if let Some(pause) = self.settings.delay.draw() {
            debug!("Sleeping {:?}", pause);
            tokio::time::sleep(pause).await;
        }
        if !self.settings.use_cookies {
            self.jar.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_normalization() {
        assert_eq!(DelayBounds::normalized(2, 6), DelayBounds::new(2, 6));
        assert_eq!(DelayBounds::normalized(-1, 6), DelayBounds::default());
        assert_eq!(DelayBounds::normalized(5, 2), DelayBounds::default());
    }

    #[test]
    fn test_delay_draw_within_bounds() {
        let bounds = DelayBounds::new(1, 3);
        for _ in 0..20 {
            let pause = bounds.draw().unwrap();
            assert!(pause >= Duration::from_secs(1) && pause < Duration::from_secs(3));
        }
        assert!(DelayBounds::new(2, 2).draw().is_none());
    }

    #[test]
    fn test_jar_clear() {
        let jar = SessionJar::default();
        let url = Url::parse("http://example.com/").unwrap();
        let header = HeaderValue::from_static("session=abc; Path=/");
        jar.set_cookies(&mut std::iter::once(&header), &url);
        assert_eq!(jar.cookie_header(&url), Some("session=abc".to_string()));

        jar.clear();
        assert_eq!(jar.cookie_header(&url), None);
    }

    #[test]
    fn test_invalid_proxy_is_config_error() {
        let settings = SessionSettings {
            proxy: Some("::not a proxy::".to_string()),
            ..SessionSettings::default()
        };
        assert!(matches!(Session::new(settings), Err(ScanError::Config(_))));
    }
}
