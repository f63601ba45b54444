//! Recording pipeline
//!
//! - `bridge`: producer → plain RTP transport → paused consumer on a local port
//! - `command`: SDP and recorder argv for FFmpeg or GStreamer
//! - `process`: spawning and killing the recorder
//! - `supervisor`: start/stop/teardown state machine per session

pub mod bridge;
pub mod command;
pub mod info;
pub mod process;
pub mod supervisor;

pub use bridge::PublishBridge;
pub use command::{create_sdp, RecorderCommand};
pub use info::{RecordInfo, RtpSink};
pub use process::{ChildProcess, ProcessSpawner, RecorderProcess, SystemSpawner};
pub use supervisor::RecordingSupervisor;
