//! Signaling client
//!
//! `CorrelationQueue` pairs negotiation callbacks with server replies that
//! carry only an action name. `SignalingClient` drives the protocol over any
//! text channel.

mod client;
mod queue;

pub use client::{ClientState, SignalingClient};
pub use queue::{CorrelationQueue, PendingAction};
