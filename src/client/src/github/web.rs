use crate::config_manager::Config;
use crate::error::{TailError, TailResult};
use crate::resolver::PageFetcher;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, COOKIE};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches github.com pages the way a signed-in browser tab does.
///
/// Requests to the web host carry the `user_session` cookie; the
/// authenticated URLs handed out during discovery live on other hosts and
/// are fetched without it.
pub struct WebClient {
    client: Client,
    web_host: Option<String>,
    user_session: Option<String>,
}

impl WebClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to create HTTP client")?;

        let web_host = Url::parse(&config.web_base_url)
            .context("invalid web_base_url")?
            .host_str()
            .map(str::to_string);

        Ok(Self {
            client,
            web_host,
            user_session: config.user_session.clone(),
        })
    }

    fn is_web_host(&self, url: &str) -> bool {
        match (Url::parse(url), &self.web_host) {
            (Ok(parsed), Some(web_host)) => parsed.host_str() == Some(web_host.as_str()),
            _ => false,
        }
    }
}

#[async_trait]
impl PageFetcher for WebClient {
    async fn fetch(&self, url: &str) -> TailResult<String> {
        let mut request = self.client.get(url);

        if self.is_web_host(url) {
            if let Some(session) = &self.user_session {
                request = request.header(COOKIE, format!("user_session={}", session));
            }
            request = request
                .header("X-Requested-With", "XMLHttpRequest")
                .header(ACCEPT, "*/*");
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(url, status = status.as_u16(), "fetched page");

        if !status.is_success() {
            return Err(TailError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}
