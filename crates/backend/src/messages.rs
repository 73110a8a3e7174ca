//! Backend reply frames and their decoding.
//!
//! A backend answers a request with one text frame holding either a JSON
//! array of artifact strings (`["img-abc", ...]`) or an error object
//! (`{"error": "..."}`). Anything else is a protocol violation.

use serde::Deserialize;

/// A data frame received from a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplyBody {
    Artifacts(Vec<String>),
    Failure { error: String },
}

/// Reasons a reply could not be turned into artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    /// Only text frames carry results.
    #[error("unexpected binary reply ({0} bytes)")]
    UnexpectedBinary(usize),

    #[error("json unmarshal error: {0}")]
    Decode(String),

    /// The backend reported a generation failure.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("backend returned no artifacts")]
    Empty,
}

/// Decode a reply into its ordered, non-empty artifact list.
pub fn decode_artifacts(reply: &Reply) -> Result<Vec<String>, ReplyError> {
    let text = match reply {
        Reply::Text(text) => text,
        Reply::Binary(data) => return Err(ReplyError::UnexpectedBinary(data.len())),
    };

    match serde_json::from_str::<ReplyBody>(text) {
        Ok(ReplyBody::Artifacts(artifacts)) if artifacts.is_empty() => Err(ReplyError::Empty),
        Ok(ReplyBody::Artifacts(artifacts)) => Ok(artifacts),
        Ok(ReplyBody::Failure { error }) => Err(ReplyError::Backend(error)),
        Err(e) => Err(ReplyError::Decode(e.to_string())),
    }
}
