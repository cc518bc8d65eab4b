//! WebSocket presence and live-event layer

pub mod events;
pub mod handler;
