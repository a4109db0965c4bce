//! WebRTC Plane
//!
//! Everything that touches the `webrtc` crate: API construction, the local
//! audio source, and the WHIP signaling client that negotiates one
//! connection per room.

pub mod engine;
pub mod error;
pub mod source;
pub mod whip;

pub use error::WhipError;
pub use source::AudioSource;
pub use whip::WhipClient;
