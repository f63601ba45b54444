pub mod client;
pub mod messages;

pub use client::{connect, NatsMediaRouter, NatsWorker};
pub use messages::{EngineCall, EngineReply, EngineRequest, RouterCreated};
