//! Signaling protocol
//!
//! JSON messages over a persistent socket, one `action` per message:
//! - `router-rtp-capabilities`: greeting with the session id
//! - `create-transport`, `connect-transport`, `produce`: WebRTC negotiation
//! - `start-record`, `stop-record`: recording control
//! - `start-combine`: run the Combine Pipeline
//! - `error`: failed request, with the originating action

mod dispatcher;
mod messages;

pub use dispatcher::Dispatcher;
pub use messages::{ClientMessage, ServerMessage};
