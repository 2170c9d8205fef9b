//! Shared HTTP client for HTML scrapers.
//!
//! [`ScrapeClient`] wraps a [`reqwest::Client`] with browser-like headers,
//! a rotating User-Agent, per-client request pacing and retries, so each
//! scraper only has to deal with parsing.

use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::config::ScrapeConfig;
use crate::context::SearchContext;
use crate::error::{SearchError, SourceError};
use crate::rate_limit::IntervalThrottle;

/// Realistic browser User-Agent strings, rotated per client.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

const TOO_MANY_REQUESTS: u16 = 429;

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        // USER_AGENTS is a non-empty const array.
        .unwrap_or(USER_AGENTS[0])
}

/// Paced, retrying HTTP client for one scraper.
///
/// Requests from the same client are spaced at least
/// [`ScrapeConfig::request_delay_ms`] apart. Transport failures and `5xx`
/// responses are retried with quadratic backoff; a `429` waits
/// [`ScrapeConfig::rate_limited_pause_ms`] before the next attempt. Any
/// other non-success status is returned immediately as
/// [`SourceError::Status`].
#[derive(Debug)]
pub struct ScrapeClient {
    client: reqwest::Client,
    config: ScrapeConfig,
    throttle: IntervalThrottle,
}

impl ScrapeClient {
    /// Build a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the config is invalid or the
    /// underlying client cannot be constructed.
    pub fn new(config: ScrapeConfig) -> Result<Self, SearchError> {
        config.validate()?;

        let ua = match config.user_agent {
            Some(ref custom) => custom.clone(),
            None => random_user_agent().to_owned(),
        };

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout())
            .user_agent(ua)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| SearchError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            throttle: IntervalThrottle::new(config.request_delay()),
            client,
            config,
        })
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Fetch `url` and return its body as text.
    ///
    /// Pacing waits, backoff sleeps and the requests themselves all honour
    /// `ctx`.
    ///
    /// # Errors
    ///
    /// Returns the last [`SourceError`] once retries are spent,
    /// [`SourceError::Status`] for a non-retryable status, or
    /// [`SourceError::Cancelled`] / [`SourceError::Timeout`] from `ctx`.
    pub async fn get_text(&self, ctx: &SearchContext, url: &str) -> Result<String, SourceError> {
        let mut attempt: u32 = 0;
        loop {
            self.throttle.wait_with(ctx).await?;

            let err = match ctx.run(self.fetch_once(url)).await {
                Ok(body) => return Ok(body),
                Err(err) => err,
            };

            let pause = match &err {
                SourceError::Status(TOO_MANY_REQUESTS) => self.config.rate_limited_pause(),
                SourceError::Status(code) if *code >= 500 => self.config.backoff(attempt + 1),
                SourceError::Http(_) => self.config.backoff(attempt + 1),
                _ => return Err(err),
            };

            if attempt >= self.config.max_retries {
                warn!(attempts = attempt + 1, error = %err, "scrape request failed");
                return Err(err);
            }
            attempt += 1;
            debug!(attempt, error = %err, ?pause, "retrying scrape request");

            ctx.run(async {
                tokio::time::sleep(pause).await;
                Ok(())
            })
            .await?;
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<String, SourceError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}
