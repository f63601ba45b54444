pub mod client;
pub mod combine;
pub mod config;
pub mod error;
pub mod http;
pub mod media;
pub mod nats;
pub mod ports;
pub mod recording;
pub mod session;
pub mod signaling;

pub use client::{CorrelationQueue, PendingAction, SignalingClient};
pub use combine::{CombineOutcome, CombinePipeline, CombineStatus, SystemRunner, ToolRunner};
pub use config::Config;
pub use error::{ErrorResponse, RecordError, RecordResult};
pub use http::{create_router, AppState};
pub use media::{default_media_codecs, MediaKind, MediaRouter, MediaWorker, WorkerPool};
pub use ports::PortAllocator;
pub use recording::{ProcessSpawner, RecordInfo, RecordingSupervisor, SystemSpawner};
pub use session::{Session, SessionHandle, SessionRegistry, SessionStats};
pub use signaling::{ClientMessage, Dispatcher, ServerMessage};
