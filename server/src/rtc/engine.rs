//! WebRTC API Construction
//!
//! Builds the shared `webrtc` API object with an Opus-only media engine,
//! plus the peer connection configuration derived from service config.

use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS};
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};

use super::error::WhipError;
use crate::config::Config;

/// Opus codec capability used for both the local source track and the
/// media engine registration.
#[must_use]
pub fn opus_capability() -> RTCRtpCodecCapability {
    RTCRtpCodecCapability {
        mime_type: MIME_TYPE_OPUS.to_string(),
        clock_rate: 48000,
        channels: 2,
        sdp_fmtp_line: "minptime=10;useinbandfec=1".to_string(),
        rtcp_feedback: vec![],
    }
}

/// Build the WebRTC API with an audio-only media engine.
pub fn build_api() -> Result<API, WhipError> {
    let mut media_engine = MediaEngine::default();

    media_engine
        .register_codec(
            RTCRtpCodecParameters {
                capability: opus_capability(),
                payload_type: 111,
                ..Default::default()
            },
            RTPCodecType::Audio,
        )
        .map_err(|e| WhipError::WebRtc(e.to_string()))?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)
        .map_err(|e| WhipError::WebRtc(e.to_string()))?;

    Ok(APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build())
}

/// Get `RTCConfiguration` with ICE servers from config.
///
/// An empty `stun_server` disables STUN and gathers host candidates only.
#[must_use]
pub fn rtc_config(config: &Config) -> RTCConfiguration {
    let ice_servers = if config.stun_server.is_empty() {
        vec![]
    } else {
        vec![RTCIceServer {
            urls: vec![config.stun_server.clone()],
            ..Default::default()
        }]
    };

    RTCConfiguration {
        ice_servers,
        ..Default::default()
    }
}
