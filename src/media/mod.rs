//! Media engine seam
//!
//! Typed RTP capability/parameter model shared with the engine and the
//! signaling clients, the `MediaRouter`/`MediaWorker` traits, and the
//! round-robin worker pool used at startup.

mod codecs;
mod router;
mod types;

pub use codecs::default_media_codecs;
pub use router::{MediaRouter, MediaWorker, WorkerPool};
pub use types::{
    ConsumerInfo, MediaKind, PlainTransportInfo, ProducerInfo, RtcpFeedback, RtpCapabilities,
    RtpCodecCapability, RtpCodecParameters, RtpEncodingParameters, RtpParameters,
    WebRtcTransportInfo,
};
