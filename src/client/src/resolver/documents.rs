use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static JOB_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<streaming-graph-job\b([^>]*)>").expect("valid job element pattern")
});

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z0-9_:-]+)\s*=\s*"([^"]*)""#).expect("valid attribute pattern")
});

/// What the job graph fragment says about the job's live log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JobPage {
    /// The job finished; there is nothing left to stream.
    Concluded,
    /// The page does not expose a streaming handle yet.
    Pending,
    /// Relative URL of the streaming handle.
    Streaming(String),
}

pub(crate) fn parse_job_page(html: &str) -> JobPage {
    let Some(element) = JOB_ELEMENT.captures(html) else {
        return JobPage::Pending;
    };
    let attributes = &element[1];

    let mut concluded = false;
    let mut streaming_url = None;
    for attribute in ATTRIBUTE.captures_iter(attributes) {
        match &attribute[1] {
            "data-concluded" => concluded = &attribute[2] == "true",
            "data-streaming-url" => streaming_url = Some(decode_entities(&attribute[2])),
            _ => {}
        }
    }

    if concluded {
        return JobPage::Concluded;
    }
    match streaming_url {
        Some(url) if !url.is_empty() => JobPage::Streaming(url),
        _ => JobPage::Pending,
    }
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct StreamingHandleDocument {
    pub data: StreamingHandleData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct StreamingHandleData {
    pub authenticated_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WebSocketDocument {
    #[serde(rename = "logStreamWebSocketUrl")]
    pub log_stream_web_socket_url: String,
}
