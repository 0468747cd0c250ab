use std::fmt;
use std::io;
use std::sync::Arc;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::error::ProtocolError as WsProtocolError;

/// Discovery stage that ran out of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStage {
    /// Waiting for the job page to expose a streaming handle.
    StreamingHandle,
    /// Waiting for the handle to yield an authenticated URL.
    AuthenticatedUrl,
    /// Waiting for the authenticated URL to yield the websocket URL.
    WebSocketUrl,
}

impl fmt::Display for ResolutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionStage::StreamingHandle => write!(f, "streaming handle"),
            ResolutionStage::AuthenticatedUrl => write!(f, "authenticated url"),
            ResolutionStage::WebSocketUrl => write!(f, "websocket url"),
        }
    }
}

/// Errors raised while tailing a run.
///
/// Cloneable so that every waiter of a coalesced resolution sees the same error.
#[derive(Debug, Clone)]
pub enum TailError {
    /// The polling API failed
    Api(Arc<anyhow::Error>),

    /// A web page or document request failed
    Http(Arc<reqwest::Error>),

    /// A web page or document request returned a non-2XX status
    HttpStatus { url: String, status: u16 },

    /// The push connection was reset; safe to reconnect with a fresh URL
    ConnectionReset(String),

    /// The push connection failed for any other reason
    Connection(Arc<tungstenite::Error>),

    /// The resolved streaming URL could not be parsed
    InvalidStreamUrl(String),

    /// A frame could not be decoded
    Protocol {
        frame: String,
        source: Arc<serde_json::Error>,
    },

    /// Stream URL discovery ran out of attempts
    ResolutionTimeout {
        stage: ResolutionStage,
        attempts: usize,
    },

    /// The job finished before its stream could be discovered
    JobConcluded,

    /// Every job of the run completed; ends a session successfully
    JobComplete,

    /// The session was cancelled
    Cancelled,

    /// The consumer of the output stream went away
    OutputClosed,

    /// A supervised task panicked or was aborted
    Task(String),
}

impl fmt::Display for TailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TailError::Api(e) => write!(f, "GitHub API request failed: {}", e),
            TailError::Http(e) => write!(f, "Web request failed: {}", e),
            TailError::HttpStatus { url, status } => {
                write!(f, "Unexpected status {} from {}", status, url)
            }
            TailError::ConnectionReset(reason) => write!(f, "Connection reset: {}", reason),
            TailError::Connection(e) => write!(f, "Push connection failed: {}", e),
            TailError::InvalidStreamUrl(url) => write!(f, "Invalid stream url: {}", url),
            TailError::Protocol { frame, source } => {
                write!(f, "Malformed frame {:?}: {}", frame, source)
            }
            TailError::ResolutionTimeout { stage, attempts } => write!(
                f,
                "Didn't get the {} after {} attempts",
                stage, attempts
            ),
            TailError::JobConcluded => write!(f, "Job concluded before its log stream was found"),
            TailError::JobComplete => write!(f, "Job done"),
            TailError::Cancelled => write!(f, "Cancelled"),
            TailError::OutputClosed => write!(f, "Output receiver dropped"),
            TailError::Task(reason) => write!(f, "Task failed: {}", reason),
        }
    }
}

impl std::error::Error for TailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TailError::Api(e) => Some(e.as_ref().as_ref()),
            TailError::Http(e) => Some(e.as_ref()),
            TailError::Connection(e) => Some(e.as_ref()),
            TailError::Protocol { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TailError {
    fn from(err: reqwest::Error) -> Self {
        TailError::Http(Arc::new(err))
    }
}

impl From<octocrab::Error> for TailError {
    fn from(err: octocrab::Error) -> Self {
        TailError::Api(Arc::new(err.into()))
    }
}

impl From<tungstenite::Error> for TailError {
    fn from(err: tungstenite::Error) -> Self {
        match &err {
            tungstenite::Error::Io(io_err) if io_err.kind() == io::ErrorKind::ConnectionReset => {
                TailError::ConnectionReset(err.to_string())
            }
            tungstenite::Error::Protocol(WsProtocolError::ResetWithoutClosingHandshake) => {
                TailError::ConnectionReset(err.to_string())
            }
            _ => TailError::Connection(Arc::new(err)),
        }
    }
}

impl TailError {
    pub fn api(err: impl Into<anyhow::Error>) -> Self {
        TailError::Api(Arc::new(err.into()))
    }

    pub fn protocol(frame: &[u8], source: serde_json::Error) -> Self {
        TailError::Protocol {
            frame: String::from_utf8_lossy(frame).into_owned(),
            source: Arc::new(source),
        }
    }

    /// Only resets are worth a reconnect: the backend drops sockets that hit
    /// their time limit, and a new socket on a fresh URL picks the stream up again.
    pub fn is_connection_reset(&self) -> bool {
        matches!(self, TailError::ConnectionReset(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TailError::Cancelled)
    }

    /// Outcomes that end a session without anything having gone wrong.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            TailError::JobConcluded | TailError::JobComplete | TailError::Cancelled
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            TailError::Api(_) => "Failed to fetch the run status from GitHub".to_string(),
            TailError::Http(_) | TailError::HttpStatus { .. } => {
                "Failed to load the live log page; is the user session still valid?".to_string()
            }
            TailError::ConnectionReset(_) | TailError::Connection(_) => {
                "Lost the connection to the live log stream".to_string()
            }
            TailError::InvalidStreamUrl(_) | TailError::Protocol { .. } => {
                "The live log stream sent something unexpected".to_string()
            }
            TailError::ResolutionTimeout { .. } => {
                "Timed out waiting for the live log stream to become available".to_string()
            }
            TailError::JobConcluded | TailError::JobComplete => "The run has finished".to_string(),
            TailError::Cancelled => "Stopped".to_string(),
            TailError::OutputClosed => "Output closed".to_string(),
            TailError::Task(_) => "Internal error while tailing".to_string(),
        }
    }
}

pub type TailResult<T> = Result<T, TailError>;
