//! Voice Agent Service
//!
//! HTTP-controlled WebRTC agent: joins WHIP rooms, attaches a
//! conversational agent to each, and bridges audio between them.

pub mod agent;
pub mod api;
pub mod config;
pub mod rtc;
pub mod session;
