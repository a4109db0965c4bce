//! Session Registry
//!
//! The coordinator: maps room identifiers to active (signaling client,
//! agent) pairs, enforces at most one session per room, and drives ordered
//! startup and failure-tolerant teardown.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};
use webrtc::api::API;

use super::error::SessionError;
use crate::agent::{SpeechPipeline, VoiceAgent};
use crate::config::Config;
use crate::rtc::{engine, AudioSource, WhipClient};

/// One active room session.
pub struct RoomSession {
    /// Room identifier.
    pub room_id: String,
    /// The room's conversational agent.
    pub agent: Arc<VoiceAgent>,
    /// The room's signaling client.
    pub client: Arc<WhipClient>,
    /// Local outbound audio source attached to the client.
    pub source: AudioSource,
    /// When the session became active.
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSession")
            .field("room_id", &self.room_id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Per-room slot state. `Connecting` and `Closing` reserve the key while a
/// join or teardown is in flight; only `Active` is visible to `list` and
/// `leave`.
enum SessionSlot {
    Connecting,
    Active(Arc<RoomSession>),
    Closing,
}

/// Registry of active room sessions.
///
/// The slot protocol makes check-then-act atomic per room: a join reserves
/// the key before any suspension point, so two concurrent joins for the
/// same room cannot both succeed, and a half-constructed session is never
/// exposed.
pub struct SessionRegistry {
    sessions: DashMap<String, SessionSlot>,
    api: API,
    config: Arc<Config>,
    pipeline: Arc<dyn SpeechPipeline>,
    /// Handle to ourselves for the auto-close path registered on each
    /// client; weak so sessions never keep the registry alive.
    self_ref: Weak<Self>,
}

impl SessionRegistry {
    /// Create a new registry.
    pub fn new(
        config: Arc<Config>,
        pipeline: Arc<dyn SpeechPipeline>,
    ) -> Result<Arc<Self>, SessionError> {
        let api = engine::build_api()?;
        info!("Session registry initialized");

        Ok(Arc::new_cyclic(|self_ref| Self {
            sessions: DashMap::new(),
            api,
            config,
            pipeline,
            self_ref: self_ref.clone(),
        }))
    }

    /// Join a room: start an agent, connect a signaling client, record the
    /// session. On any failure every partially started piece is rolled
    /// back and the room slot is released.
    pub async fn join(
        &self,
        room_id: &str,
        system_prompt: Option<String>,
    ) -> Result<Arc<RoomSession>, SessionError> {
        match self.sessions.entry(room_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(SessionError::DuplicateSession(room_id.to_string()));
            }
            Entry::Vacant(slot) => {
                slot.insert(SessionSlot::Connecting);
            }
        }

        info!(room_id = %room_id, "Joining room");

        let prompt =
            system_prompt.unwrap_or_else(|| self.config.agent_default_prompt.clone());
        let agent = Arc::new(VoiceAgent::new(prompt, Arc::clone(&self.pipeline)));

        match self.establish(room_id, agent).await {
            Ok(session) => {
                self.sessions.insert(
                    room_id.to_string(),
                    SessionSlot::Active(Arc::clone(&session)),
                );

                // The auto-close path backs off while the slot is still
                // Connecting; if the connection died in that window, reap
                // it now so a closed client never lingers as active.
                if *session.client.closed().borrow() {
                    self.reap(room_id).await;
                    return Err(SessionError::ConnectionFailed(
                        "connection failed during setup".into(),
                    ));
                }

                info!(room_id = %room_id, "Agent joined room");
                Ok(session)
            }
            Err(e) => {
                self.sessions.remove(room_id);
                Err(e)
            }
        }
    }

    /// Build and connect the session pieces in order: start the agent, then
    /// wire the signaling client to it. On any failure the agent is stopped
    /// again before the error is returned.
    pub(super) async fn establish(
        &self,
        room_id: &str,
        agent: Arc<VoiceAgent>,
    ) -> Result<Arc<RoomSession>, SessionError> {
        agent.start().await;

        let client = match WhipClient::new(&self.api, &self.config, room_id).await {
            Ok(client) => Arc::new(client),
            Err(e) => {
                agent.stop().await;
                return Err(e.into());
            }
        };

        let source = AudioSource::new(room_id);

        // Inbound audio feeds the agent; agent responses feed the source.
        {
            let agent = Arc::clone(&agent);
            let source = source.clone();
            let room = room_id.to_string();
            client
                .set_on_track_callback(move |track| {
                    let agent = Arc::clone(&agent);
                    let source = source.clone();
                    let room = room.clone();
                    Box::pin(async move {
                        consume_track(&room, track, &agent, &source).await;
                    })
                })
                .await;
        }

        // A fatal connection-state transition destroys the session.
        {
            let registry = self.self_ref.clone();
            let room = room_id.to_string();
            client
                .set_on_connection_failed(move || {
                    let registry = registry.clone();
                    let room = room.clone();
                    Box::pin(async move {
                        if let Some(registry) = registry.upgrade() {
                            registry.reap(&room).await;
                        }
                    })
                })
                .await;
        }

        if let Err(e) = client.connect(&source).await {
            // connect() already closed the client; stop the consumer too.
            agent.stop().await;
            return Err(e.into());
        }

        source.spawn_keepalive(client.closed());

        Ok(Arc::new(RoomSession {
            room_id: room_id.to_string(),
            agent,
            client,
            source,
            created_at: Utc::now(),
        }))
    }

    /// Leave a room: stop the agent, close the client, then remove the
    /// entry. Teardown is best-effort; the entry is removed once both
    /// attempts finish.
    pub async fn leave(&self, room_id: &str) -> Result<(), SessionError> {
        let session = {
            let mut entry = self
                .sessions
                .get_mut(room_id)
                .ok_or_else(|| SessionError::NotFound(room_id.to_string()))?;

            match std::mem::replace(entry.value_mut(), SessionSlot::Closing) {
                SessionSlot::Active(session) => session,
                other => {
                    // A join or another teardown holds this room's slot.
                    *entry.value_mut() = other;
                    return Err(SessionError::NotFound(room_id.to_string()));
                }
            }
        };

        // Stop the audio consumer before tearing down the transport.
        session.agent.stop().await;
        session.client.close().await;

        self.sessions.remove(room_id);
        info!(room_id = %room_id, "Left room");
        Ok(())
    }

    /// Teardown driven by a fatal connection-state transition.
    async fn reap(&self, room_id: &str) {
        match self.leave(room_id).await {
            Ok(()) => warn!(room_id = %room_id, "Session removed after connection failure"),
            // Already removed, or a join/leave is mid-flight for this room.
            Err(SessionError::NotFound(_)) => {}
            Err(e) => warn!(room_id = %room_id, error = %e, "Failed to reap session"),
        }
    }

    /// Close all sessions. Errors are logged, never propagated; always
    /// attempts every room.
    pub async fn shutdown(&self) {
        let rooms = self.list();
        info!(count = rooms.len(), "Shutting down, closing all sessions");

        for room_id in rooms {
            match self.leave(&room_id).await {
                Ok(()) => {}
                // A concurrent leave or reap already has this room.
                Err(SessionError::NotFound(_)) => {}
                Err(e) => {
                    warn!(room_id = %room_id, error = %e, "Error closing session during shutdown");
                }
            }
        }
    }

    /// Snapshot of active room identifiers.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|entry| matches!(entry.value(), SessionSlot::Active(_)))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of active sessions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.list().len()
    }

    /// Look up an active session.
    #[must_use]
    pub fn get(&self, room_id: &str) -> Option<Arc<RoomSession>> {
        self.sessions.get(room_id).and_then(|entry| match entry.value() {
            SessionSlot::Active(session) => Some(Arc::clone(session)),
            _ => None,
        })
    }
}

/// Drain one remote audio track into the agent, writing any response
/// frames back out through the room's source. Runs until the track ends;
/// its errors end only this loop and never propagate to session teardown.
async fn consume_track(
    room_id: &str,
    track: Arc<webrtc::track::track_remote::TrackRemote>,
    agent: &VoiceAgent,
    source: &AudioSource,
) {
    let mut buf = vec![0u8; 1500]; // MTU size

    loop {
        match track.read(&mut buf).await {
            Ok((packet, _attributes)) => {
                match agent.process_audio(&packet.payload).await {
                    Ok(Some(frame)) => {
                        if let Err(e) = source.write_frame(frame).await {
                            warn!(room_id = %room_id, error = %e, "Failed to write response frame");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(room_id = %room_id, error = %e, "Agent failed to process audio");
                    }
                }
            }
            Err(e) => {
                debug!(room_id = %room_id, error = %e, "Track read ended");
                break;
            }
        }
    }
}
