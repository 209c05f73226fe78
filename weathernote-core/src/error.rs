use thiserror::Error;

use crate::slots::SlotId;

/// Why a fetch produced no snapshot.
///
/// Never surfaced as a failure to the host: the renderer turns it into
/// [`crate::template::UNAVAILABLE_MESSAGE`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("location and API key must both be set")]
    MissingCredentials,

    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} request failed with status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to parse weather JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("weather response is missing `{0}`")]
    MissingField(&'static str),

    #[error("weather response carries an out-of-range timestamp")]
    InvalidTimestamp,
}

/// Failures of host-facing commands. Each one maps to a transient notice.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("location or API key is not set")]
    ConfigMissing,

    #[error("no active document")]
    NoActiveDocument,

    #[error("document is not in source mode")]
    SourceModeRequired,

    #[error("{0} is not defined")]
    FormatUndefined(SlotId),
}

impl CommandError {
    /// Text shown to the user through the host's notice area.
    pub fn notice(&self) -> String {
        match self {
            CommandError::ConfigMissing => {
                "Weather settings are undefined, check your settings.".to_string()
            }
            CommandError::NoActiveDocument => "Open a Markdown file first.".to_string(),
            CommandError::SourceModeRequired => {
                "Markdown file must be in source mode to insert weather string.".to_string()
            }
            CommandError::FormatUndefined(slot) => format!(
                "Weather string {} is undefined! Please add a definition for it in the settings.",
                slot.number().unwrap_or_default()
            ),
        }
    }
}
