//! Session Orchestration
//!
//! Bridges the HTTP control plane to per-room WebRTC sessions. The
//! registry coordinates concurrent joins and leaves, enforces the
//! one-session-per-room invariant, and owns ordered teardown.

pub mod error;
pub mod registry;

#[cfg(test)]
mod registry_test;

pub use error::SessionError;
pub use registry::{RoomSession, SessionRegistry};
