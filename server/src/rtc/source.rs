//! Local Audio Source
//!
//! The outbound audio track a `WhipClient` sends into the room. The agent
//! writes response frames here; between responses a keepalive task feeds
//! Opus silence so the track stays alive.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, warn};
use webrtc::media::Sample;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use super::engine::opus_capability;

/// Canonical Opus silence frame (DTX comfort noise payload).
const OPUS_SILENCE: [u8; 3] = [0xf8, 0xff, 0xfe];

/// Frame cadence: 20ms at 48kHz.
const FRAME_DURATION: Duration = Duration::from_millis(20);

/// Local outbound audio track, exclusively owned by one signaling client.
#[derive(Clone)]
pub struct AudioSource {
    track: Arc<TrackLocalStaticSample>,
}

impl AudioSource {
    /// Create a new audio source for a room.
    #[must_use]
    pub fn new(room_id: &str) -> Self {
        let track = Arc::new(TrackLocalStaticSample::new(
            opus_capability(),
            format!("agent-audio-{room_id}"),
            format!("agent-{room_id}"),
        ));
        Self { track }
    }

    /// The underlying local track, to be attached to a peer connection.
    #[must_use]
    pub fn track(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.track)
    }

    /// Write one encoded audio frame produced by the agent.
    pub async fn write_frame(&self, data: Bytes) -> Result<(), webrtc::Error> {
        self.track
            .write_sample(&Sample {
                data,
                duration: FRAME_DURATION,
                ..Default::default()
            })
            .await
    }

    /// Spawn the silence keepalive loop. Runs until `closed` flips to true.
    pub fn spawn_keepalive(&self, mut closed: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let track = Arc::clone(&self.track);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(FRAME_DURATION);
            loop {
                if *closed.borrow() {
                    break;
                }
                tokio::select! {
                    changed = closed.changed() => {
                        if changed.is_err() || *closed.borrow() {
                            debug!("Audio keepalive stopped");
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let sample = Sample {
                            data: Bytes::from_static(&OPUS_SILENCE),
                            duration: FRAME_DURATION,
                            ..Default::default()
                        };
                        if let Err(e) = track.write_sample(&sample).await {
                            warn!(error = %e, "Failed to write silence frame");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_frame_on_unbound_track_is_ok() {
        // Before the track is negotiated onto a connection, writes are no-ops.
        let source = AudioSource::new("test-room");
        source
            .write_frame(Bytes::from_static(&OPUS_SILENCE))
            .await
            .expect("write to unbound track should not fail");
    }

    #[tokio::test]
    async fn keepalive_stops_on_close_signal() {
        let source = AudioSource::new("test-room");
        let (tx, rx) = watch::channel(false);
        let handle = source.spawn_keepalive(rx);
        tx.send(true).expect("receiver alive");
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("keepalive should exit promptly")
            .expect("keepalive task should not panic");
    }
}
