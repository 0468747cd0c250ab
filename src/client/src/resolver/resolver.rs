use crate::config_manager::Config;
use crate::error::{ResolutionStage, TailError, TailResult};
use crate::resolver::documents::{
    parse_job_page, JobPage, StreamingHandleDocument, WebSocketDocument,
};
use crate::resolver::single_flight::SingleFlight;
use async_trait::async_trait;
use ghtail_common::types::RunIdentity;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

/// Fetches a web page or JSON document as text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> TailResult<String>;
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub web_base_url: String,
    pub attempts: usize,
    pub retry_delay: Duration,
}

impl ResolverSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            web_base_url: config.web_base_url.clone(),
            attempts: config.resolve_attempts as usize,
            retry_delay: config.resolve_retry_delay(),
        }
    }
}

/// Discovers the websocket URL of a run's live log stream.
///
/// Concurrent resolutions of the same run share one discovery.
pub struct StreamUrlResolver {
    fetcher: Arc<dyn PageFetcher>,
    settings: ResolverSettings,
    inflight: SingleFlight<RunIdentity, TailResult<String>>,
}

impl StreamUrlResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: ResolverSettings) -> Self {
        Self {
            fetcher,
            settings,
            inflight: SingleFlight::new(),
        }
    }

    pub async fn resolve(
        &self,
        token: &CancellationToken,
        run: &RunIdentity,
        job_name: &str,
    ) -> TailResult<String> {
        let discovery = Discovery {
            fetcher: self.fetcher.clone(),
            settings: self.settings.clone(),
            token: token.clone(),
            run: run.clone(),
            job_name: job_name.to_string(),
        };
        self.inflight
            .run(run.clone(), move || discovery.execute())
            .await
    }
}

struct Discovery {
    fetcher: Arc<dyn PageFetcher>,
    settings: ResolverSettings,
    token: CancellationToken,
    run: RunIdentity,
    job_name: String,
}

impl Discovery {
    async fn execute(self) -> TailResult<String> {
        info!(run = %self.run, job = %self.job_name, "resolving live log stream");
        let handle = self.streaming_handle().await?;
        let authenticated_url = self.authenticated_url(&handle).await?;
        let ws_url = self.websocket_url(&authenticated_url).await?;
        debug!(run = %self.run, "live log stream resolved");
        Ok(ws_url)
    }

    fn job_page_url(&self) -> TailResult<String> {
        let mut url = Url::parse(&self.settings.web_base_url)
            .map_err(|_| TailError::InvalidStreamUrl(self.settings.web_base_url.clone()))?;
        url.path_segments_mut()
            .map_err(|_| TailError::InvalidStreamUrl(self.settings.web_base_url.clone()))?
            .pop_if_empty()
            .extend([
                self.run.owner.as_str(),
                self.run.repo.as_str(),
                "actions",
                "runs",
                &self.run.run_id.to_string(),
                "graph",
                "job",
                self.job_name.as_str(),
            ]);
        Ok(url.into())
    }

    /// Phase A: wait for the job page to hand out a streaming handle.
    async fn streaming_handle(&self) -> TailResult<String> {
        let page_url = self.job_page_url()?;
        for attempt in 1..=self.settings.attempts {
            let html = self.fetch(&page_url).await?;
            match parse_job_page(&html) {
                JobPage::Concluded => return Err(TailError::JobConcluded),
                JobPage::Streaming(relative) => return self.join_web(&relative),
                JobPage::Pending => {
                    debug!(attempt, url = %page_url, "streaming handle not available yet");
                }
            }
            self.pause().await?;
        }
        Err(TailError::ResolutionTimeout {
            stage: ResolutionStage::StreamingHandle,
            attempts: self.settings.attempts,
        })
    }

    /// Phase B, first half.
    async fn authenticated_url(&self, handle: &str) -> TailResult<String> {
        for attempt in 1..=self.settings.attempts {
            if let Some(document) = self
                .fetch_document::<StreamingHandleDocument>(handle)
                .await?
            {
                if !document.data.authenticated_url.is_empty() {
                    return Ok(document.data.authenticated_url);
                }
            }
            debug!(attempt, "authenticated url not available yet");
            self.pause().await?;
        }
        Err(TailError::ResolutionTimeout {
            stage: ResolutionStage::AuthenticatedUrl,
            attempts: self.settings.attempts,
        })
    }

    /// Phase B, second half.
    async fn websocket_url(&self, authenticated_url: &str) -> TailResult<String> {
        for attempt in 1..=self.settings.attempts {
            if let Some(document) = self
                .fetch_document::<WebSocketDocument>(authenticated_url)
                .await?
            {
                if !document.log_stream_web_socket_url.is_empty() {
                    return Ok(document.log_stream_web_socket_url);
                }
            }
            debug!(attempt, "websocket url not available yet");
            self.pause().await?;
        }
        Err(TailError::ResolutionTimeout {
            stage: ResolutionStage::WebSocketUrl,
            attempts: self.settings.attempts,
        })
    }

    async fn fetch(&self, url: &str) -> TailResult<String> {
        tokio::select! {
            _ = self.token.cancelled() => Err(TailError::Cancelled),
            body = self.fetcher.fetch(url) => body,
        }
    }

    /// The backend answers with errors until the stream is provisioned, so
    /// every failure here except cancellation just means "not yet".
    async fn fetch_document<T: DeserializeOwned>(&self, url: &str) -> TailResult<Option<T>> {
        let body = match self.fetch(url).await {
            Ok(body) => body,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                debug!(url, error = %e, "document not ready");
                return Ok(None);
            }
        };
        match serde_json::from_str(&body) {
            Ok(document) => Ok(Some(document)),
            Err(e) => {
                debug!(url, error = %e, "document not parseable yet");
                Ok(None)
            }
        }
    }

    fn join_web(&self, relative: &str) -> TailResult<String> {
        Url::parse(&self.settings.web_base_url)
            .and_then(|base| base.join(relative))
            .map(String::from)
            .map_err(|_| TailError::InvalidStreamUrl(relative.to_string()))
    }

    async fn pause(&self) -> TailResult<()> {
        tokio::select! {
            _ = self.token.cancelled() => Err(TailError::Cancelled),
            _ = tokio::time::sleep(self.settings.retry_delay) => Ok(()),
        }
    }
}
