//! Client-facing transport: wire protocol, WebSocket endpoint, HTTP server

pub mod protocol;
pub mod server;
pub mod websocket;

pub use protocol::{ClientMessage, JoinLimits, JoinRequest, ServerMessage};
pub use server::{build_router, HttpServer, HttpState};
pub use websocket::origin_allowed;
