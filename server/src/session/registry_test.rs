//! Tests for the session registry against a loopback WHIP responder.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use super::{SessionError, SessionRegistry};
use crate::agent::{NullPipeline, VoiceAgent};
use crate::config::Config;
use crate::rtc::{engine, AudioSource, WhipClient, WhipError};

/// How the stub signaling server treats incoming offers.
#[derive(Clone, Copy)]
enum StubMode {
    /// Answer the offer like a real WHIP server (201 + SDP answer).
    Answer,
    /// Reject every offer with this status.
    Reject(u16),
}

async fn whip_stub_handler(State(mode): State<StubMode>, body: String) -> Response {
    match mode {
        StubMode::Reject(status) => StatusCode::from_u16(status)
            .expect("valid status")
            .into_response(),
        StubMode::Answer => {
            // Build a real answer for the offer, as the signaling server
            // would for the waiting peer.
            let api = engine::build_api().expect("test api");
            let pc = api
                .new_peer_connection(RTCConfiguration::default())
                .await
                .expect("answer side peer connection");

            let offer = RTCSessionDescription::offer(body).expect("parse offer");
            pc.set_remote_description(offer).await.expect("set offer");
            let answer = pc.create_answer(None).await.expect("create answer");
            pc.set_local_description(answer.clone())
                .await
                .expect("set answer");

            (StatusCode::CREATED, answer.sdp).into_response()
        }
    }
}

/// Spawn a stub WHIP server on an ephemeral loopback port.
async fn spawn_whip_stub(mode: StubMode) -> SocketAddr {
    let app = Router::new()
        .route("/whip", post(whip_stub_handler))
        .with_state(mode);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });

    addr
}

fn test_config(addr: SocketAddr) -> Arc<Config> {
    let mut config = Config::default_for_test();
    config.signaling_host = addr.ip().to_string();
    config.signaling_port = addr.port();
    Arc::new(config)
}

fn registry_for(addr: SocketAddr) -> Arc<SessionRegistry> {
    SessionRegistry::new(test_config(addr), Arc::new(NullPipeline))
        .expect("registry should build")
}

#[tokio::test]
async fn join_rejects_duplicate_room() {
    let addr = spawn_whip_stub(StubMode::Answer).await;
    let registry = registry_for(addr);

    registry
        .join("room-a", None)
        .await
        .expect("first join should succeed");

    let err = registry
        .join("room-a", None)
        .await
        .expect_err("second join must be rejected");
    assert!(matches!(err, SessionError::DuplicateSession(_)));

    registry.shutdown().await;
}

#[tokio::test]
async fn concurrent_joins_for_one_room_admit_exactly_one() {
    let addr = spawn_whip_stub(StubMode::Answer).await;
    let registry = registry_for(addr);

    let (a, b) = tokio::join!(
        registry.join("room-race", None),
        registry.join("room-race", None),
    );

    let successes = usize::from(a.is_ok()) + usize::from(b.is_ok());
    assert_eq!(successes, 1, "exactly one concurrent join may win");
    for result in [a, b] {
        if let Err(e) = result {
            assert!(matches!(e, SessionError::DuplicateSession(_)));
        }
    }

    registry.shutdown().await;
}

#[tokio::test]
async fn leave_unknown_room_is_not_found() {
    let addr = spawn_whip_stub(StubMode::Answer).await;
    let registry = registry_for(addr);

    let err = registry
        .leave("never-joined")
        .await
        .expect_err("unknown room must be NotFound");
    assert!(matches!(err, SessionError::NotFound(_)));
}

#[tokio::test]
async fn join_then_leave_restores_registry() {
    let addr = spawn_whip_stub(StubMode::Answer).await;
    let registry = registry_for(addr);

    registry.join("room-b", None).await.expect("join");
    assert_eq!(registry.list(), vec!["room-b".to_string()]);

    registry.leave("room-b").await.expect("leave");
    assert!(registry.list().is_empty());
    assert_eq!(registry.active_count(), 0);

    // The room slot is fully released: joining again works.
    registry.join("room-b", None).await.expect("rejoin");
    registry.shutdown().await;
}

#[tokio::test]
async fn rejected_offer_rolls_back_partial_state() {
    let addr = spawn_whip_stub(StubMode::Reject(500)).await;
    let registry = registry_for(addr);

    let err = registry
        .join("room-c", None)
        .await
        .expect_err("rejected offer must fail the join");
    assert!(matches!(err, SessionError::ConnectionFailed(_)));

    assert!(registry.list().is_empty());
    assert!(registry.get("room-c").is_none());
}

#[tokio::test]
async fn rejected_offer_stops_agent_and_closes_client() {
    let addr = spawn_whip_stub(StubMode::Reject(503)).await;
    let registry = registry_for(addr);

    // Hold the agent ourselves so the rollback is observable.
    let agent = Arc::new(VoiceAgent::new("You are terse.", Arc::new(NullPipeline)));
    registry
        .establish("room-g", Arc::clone(&agent))
        .await
        .expect_err("rejected offer must fail establishment");
    assert!(!agent.is_running(), "agent must be stopped on rollback");

    // The signaling client closes itself before connect reports failure.
    let api = engine::build_api().expect("api");
    let client = WhipClient::new(&api, &test_config(addr), "room-g")
        .await
        .expect("client");
    let source = AudioSource::new("room-g");
    let err = client
        .connect(&source)
        .await
        .expect_err("offer must be rejected");
    assert!(matches!(err, WhipError::Rejected { .. }));
    assert!(*client.closed().borrow());
}

#[tokio::test]
async fn connection_failure_reaps_the_session() {
    let addr = spawn_whip_stub(StubMode::Answer).await;
    let registry = registry_for(addr);

    let session = registry.join("room-h", None).await.expect("join");
    assert_eq!(registry.active_count(), 1);

    // A fatal transport transition must destroy the session without an
    // explicit leave.
    session.client.fail_connection().await;

    assert!(registry.list().is_empty());
    assert!(registry.get("room-h").is_none());
    assert!(!session.agent.is_running());
}

#[tokio::test]
async fn connect_is_time_bounded() {
    let addr = spawn_whip_stub(StubMode::Answer).await;
    let registry = registry_for(addr);

    let started = Instant::now();
    registry.join("room-d", None).await.expect("join");

    // 5s ICE-gathering bound plus negotiation overhead.
    assert!(
        started.elapsed() < Duration::from_secs(8),
        "join took {:?}",
        started.elapsed()
    );

    registry.shutdown().await;
}

#[tokio::test]
async fn shutdown_tears_down_every_room() {
    let addr = spawn_whip_stub(StubMode::Answer).await;
    let registry = registry_for(addr);

    for room in ["room-1", "room-2", "room-3"] {
        registry.join(room, None).await.expect("join");
    }
    assert_eq!(registry.active_count(), 3);

    // Close one client out from under the registry; its teardown still
    // completes and must not stop the others from being torn down.
    let session = registry.get("room-2").expect("active session");
    session.client.close().await;

    registry.shutdown().await;
    assert!(registry.list().is_empty());
}

#[tokio::test]
async fn shutdown_skips_rooms_already_tearing_down() {
    let addr = spawn_whip_stub(StubMode::Answer).await;
    let registry = registry_for(addr);

    for room in ["room-i", "room-j"] {
        registry.join(room, None).await.expect("join");
    }

    // A room caught mid-teardown by shutdown is skipped, not an error.
    let (left, ()) = tokio::join!(registry.leave("room-i"), registry.shutdown());
    assert!(matches!(left, Ok(()) | Err(SessionError::NotFound(_))));
    assert!(registry.list().is_empty());
    assert_eq!(registry.active_count(), 0);
}

#[tokio::test]
async fn custom_prompt_reaches_the_agent() {
    let addr = spawn_whip_stub(StubMode::Answer).await;
    let registry = registry_for(addr);

    let session = registry
        .join("room-e", Some("You are a pirate.".into()))
        .await
        .expect("join");
    assert_eq!(session.agent.system_prompt(), "You are a pirate.");
    assert!(session.agent.is_running());

    registry.leave("room-e").await.expect("leave");
    assert!(!session.agent.is_running());
}

#[tokio::test]
async fn whip_client_close_is_idempotent() {
    let addr = spawn_whip_stub(StubMode::Answer).await;
    let api = engine::build_api().expect("api");
    let client = WhipClient::new(&api, &test_config(addr), "room-f")
        .await
        .expect("client");

    client.close().await;
    // Second close on an already-closed client must be a no-op.
    client.close().await;
    assert!(*client.closed().borrow());
    assert_eq!(
        client.connection_state(),
        webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState::Closed
    );
}
