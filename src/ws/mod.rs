//! WebSocket transport for match inputs and broadcasts

pub mod handler;
pub mod protocol;
