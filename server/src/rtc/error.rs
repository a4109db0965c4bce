//! Signaling Client Errors

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while establishing or driving a WHIP connection.
#[derive(Debug, Error)]
pub enum WhipError {
    /// WebRTC error.
    #[error("WebRTC error: {0}")]
    WebRtc(String),

    /// Network-level failure talking to the signaling server.
    #[error("Signaling request failed: {0}")]
    Signaling(String),

    /// The signaling server rejected the offer with a non-201 status.
    #[error("WHIP request rejected with status {status}")]
    Rejected {
        /// HTTP status returned by the signaling server.
        status: StatusCode,
    },

    /// The SDP answer could not be parsed or applied.
    #[error("Invalid SDP answer: {0}")]
    Sdp(String),
}

impl From<webrtc::Error> for WhipError {
    fn from(err: webrtc::Error) -> Self {
        Self::WebRtc(err.to_string())
    }
}

impl From<reqwest::Error> for WhipError {
    fn from(err: reqwest::Error) -> Self {
        Self::Signaling(err.to_string())
    }
}
