//! WHIP Signaling Client
//!
//! Owns one outbound WebRTC connection per room. Creates the SDP offer,
//! waits for ICE gathering, exchanges the offer for an answer over HTTP
//! (WHIP), and tears the connection down on failure at any step.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};
use webrtc::api::API;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use super::engine;
use super::error::WhipError;
use super::source::AudioSource;
use crate::config::Config;

/// Bound on waiting for ICE gathering to complete. On expiry the offer is
/// sent with whatever candidates were gathered.
const ICE_GATHERING_TIMEOUT: Duration = Duration::from_secs(5);

/// Handler invoked with each inbound remote audio track.
pub type TrackHandler =
    Arc<dyn Fn(Arc<TrackRemote>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Hook invoked after the connection transitions to `failed` and the client
/// has closed itself.
pub type FailedHandler =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// WebRTC client that connects to a WHIP signaling server.
///
/// The peer connection is created exactly once per client; a closed client
/// is never reused.
pub struct WhipClient {
    room_id: String,
    endpoint: String,
    request_timeout: Duration,
    pc: Arc<RTCPeerConnection>,
    http: reqwest::Client,
    on_track: Arc<RwLock<Option<TrackHandler>>>,
    on_failed: Arc<RwLock<Option<FailedHandler>>>,
    closed_tx: watch::Sender<bool>,
}

impl WhipClient {
    /// Create a new client for a room, allocating its peer connection.
    pub async fn new(api: &API, config: &Config, room_id: &str) -> Result<Self, WhipError> {
        let pc = api.new_peer_connection(engine::rtc_config(config)).await?;
        let (closed_tx, _) = watch::channel(false);

        Ok(Self {
            room_id: room_id.to_string(),
            endpoint: config.whip_url(room_id),
            request_timeout: Duration::from_secs(config.signaling_request_timeout_secs),
            pc: Arc::new(pc),
            http: reqwest::Client::new(),
            on_track: Arc::new(RwLock::new(None)),
            on_failed: Arc::new(RwLock::new(None)),
            closed_tx,
        })
    }

    /// Set the callback for inbound remote audio tracks.
    ///
    /// At most one callback is active; a new registration replaces any
    /// prior one.
    pub async fn set_on_track_callback<F>(&self, callback: F)
    where
        F: Fn(Arc<TrackRemote>) -> Pin<Box<dyn Future<Output = ()> + Send>>
            + Send
            + Sync
            + 'static,
    {
        *self.on_track.write().await = Some(Arc::new(callback));
    }

    /// Set the hook invoked once the connection enters `failed` and the
    /// client has auto-closed.
    pub async fn set_on_connection_failed<F>(&self, hook: F)
    where
        F: Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static,
    {
        *self.on_failed.write().await = Some(Arc::new(hook));
    }

    /// Connect to the room: attach the local source, negotiate, and submit
    /// the offer to the WHIP endpoint.
    ///
    /// On any failure the connection is closed before the error is
    /// returned, so no partial connection is ever left open.
    pub async fn connect(&self, source: &AudioSource) -> Result<(), WhipError> {
        match self.negotiate(source).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(room_id = %self.room_id, error = %e, "Failed to connect");
                self.close().await;
                Err(e)
            }
        }
    }

    async fn negotiate(&self, source: &AudioSource) -> Result<(), WhipError> {
        // Attach the sole outbound audio track.
        self.pc
            .add_track(source.track() as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        self.register_track_handler();
        self.register_state_handler();

        // Offer / local description.
        let offer = self.pc.create_offer(None).await?;
        self.pc.set_local_description(offer).await?;

        // Bounded wait for ICE gathering; timing out is non-fatal.
        let mut gathered = self.pc.gathering_complete_promise().await;
        if tokio::time::timeout(ICE_GATHERING_TIMEOUT, gathered.recv())
            .await
            .is_err()
        {
            warn!(
                room_id = %self.room_id,
                "ICE gathering timed out, continuing with partial candidates"
            );
        }

        let local = self
            .pc
            .local_description()
            .await
            .ok_or_else(|| WhipError::WebRtc("missing local description".into()))?;

        // Submit the offer to the WHIP endpoint.
        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/sdp")
            .timeout(self.request_timeout)
            .body(local.sdp)
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            return Err(WhipError::Rejected {
                status: response.status(),
            });
        }

        let answer_sdp = response.text().await?;
        debug!(room_id = %self.room_id, "Received SDP answer from server");

        let answer = RTCSessionDescription::answer(answer_sdp)
            .map_err(|e| WhipError::Sdp(e.to_string()))?;
        self.pc
            .set_remote_description(answer)
            .await
            .map_err(|e| WhipError::Sdp(e.to_string()))?;

        info!(room_id = %self.room_id, "Connected to room");
        Ok(())
    }

    /// Forward inbound audio tracks to the registered callback. Each track
    /// is consumed on its own task so the connect flow never blocks.
    fn register_track_handler(&self) {
        let handlers = Arc::clone(&self.on_track);
        let room_id = self.room_id.clone();

        self.pc
            .on_track(Box::new(move |track, _receiver, _transceiver| {
                let handlers = Arc::clone(&handlers);
                let room_id = room_id.clone();

                Box::pin(async move {
                    if track.kind() != RTPCodecType::Audio {
                        debug!(room_id = %room_id, kind = ?track.kind(), "Ignoring non-audio track");
                        return;
                    }

                    let callback = handlers.read().await.clone();
                    if let Some(callback) = callback {
                        info!(room_id = %room_id, "Receiving audio from remote peer");
                        tokio::spawn(callback(track));
                    }
                })
            }));
    }

    /// Observe connection state transitions. `failed` closes the client
    /// and fires the failed hook; `disconnected` is only logged.
    fn register_state_handler(&self) {
        let pc_weak = Arc::downgrade(&self.pc);
        let closed_tx = self.closed_tx.clone();
        let on_failed = Arc::clone(&self.on_failed);
        let room_id = self.room_id.clone();

        self.pc
            .on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
                let pw = pc_weak.clone();
                let closed_tx = closed_tx.clone();
                let on_failed = Arc::clone(&on_failed);
                let room_id = room_id.clone();

                Box::pin(async move {
                    info!(room_id = %room_id, state = ?state, "Connection state changed");

                    if state == RTCPeerConnectionState::Failed {
                        let _ = closed_tx.send(true);
                        // Close and notify on a separate task: the hook
                        // tears the session down, which closes the
                        // connection again from outside this callback.
                        tokio::spawn(async move {
                            if let Some(pc) = pw.upgrade() {
                                if let Err(e) = pc.close().await {
                                    warn!(room_id = %room_id, error = %e, "Error closing failed connection");
                                }
                            }
                            let hook = on_failed.read().await.clone();
                            if let Some(hook) = hook {
                                hook().await;
                            }
                        });
                    }
                })
            }));
    }

    /// Close the peer connection.
    ///
    /// Idempotent: safe to call multiple times, concurrently with an
    /// in-flight connect, or on a client whose connection already failed.
    pub async fn close(&self) {
        let _ = self.closed_tx.send(true);
        if let Err(e) = self.pc.close().await {
            warn!(room_id = %self.room_id, error = %e, "Error closing peer connection");
        } else {
            debug!(room_id = %self.room_id, "WebRTC connection closed");
        }
    }

    /// Drive the `failed` teardown path without a live transport: mark the
    /// client closed, close the peer connection, and run the failed hook.
    #[cfg(test)]
    pub(crate) async fn fail_connection(&self) {
        let _ = self.closed_tx.send(true);
        if let Err(e) = self.pc.close().await {
            warn!(room_id = %self.room_id, error = %e, "Error closing failed connection");
        }
        let hook = self.on_failed.read().await.clone();
        if let Some(hook) = hook {
            hook().await;
        }
    }

    /// Watch receiver that flips to `true` once the client is closed.
    #[must_use]
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed_tx.subscribe()
    }

    /// Current connection state.
    #[must_use]
    pub fn connection_state(&self) -> RTCPeerConnectionState {
        self.pc.connection_state()
    }
}
