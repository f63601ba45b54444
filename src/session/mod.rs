//! Session management
//!
//! One `Session` per connected participant, holding:
//! - Transports (WebRTC send + plain RTP recording sinks)
//! - Producers and recording consumers
//! - Ports taken from the port pool
//! - The recording state and recorder process handle

mod registry;
mod session;
mod stats;

pub use registry::{SessionHandle, SessionRegistry};
pub use session::{
    ConsumerEntry, ProducerEntry, RecordingResources, RecordingState, Session, TransportEntry,
    TransportRole,
};
pub use stats::SessionStats;
