//! Error types for the exporter.

use thiserror::Error;

/// Errors raised while scraping the Traffic Server status page.
///
/// None of these are fatal: they are logged and counted by the exporter.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The request never produced a response (connect, TLS, timeout).
    #[error("Error scraping traffic server: {0}")]
    Transport(#[source] reqwest::Error),

    /// The server answered with something other than 200 OK.
    #[error("Status {status} from traffic server: {body}")]
    Status { status: u16, body: String },

    /// The response body of a 200 OK could not be read.
    #[error("Error reading response body: {0}")]
    Body(#[source] reqwest::Error),

    /// The body was not a valid `/_billing` document.
    #[error("Error decoding traffic server response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ScrapeError {
    /// Short label for structured logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Transport(_) => "transport",
            ScrapeError::Status { .. } => "status",
            ScrapeError::Body(_) => "body",
            ScrapeError::Decode(_) => "decode",
        }
    }
}

/// Errors raised while constructing an exporter.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
