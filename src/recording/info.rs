use crate::media::{MediaKind, RtpCapabilities, RtpParameters};
use chrono::Utc;
use serde::Serialize;

/// Local RTP sink for one media kind, produced by the publish bridge
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpSink {
    pub kind: MediaKind,
    pub transport_id: String,
    pub consumer_id: String,
    /// Port the recorder listens on for RTP
    pub remote_rtp_port: u16,
    /// Port the recorder listens on for RTCP, when RTCP is not muxed
    pub remote_rtcp_port: Option<u16>,
    /// Engine-side RTCP port the recorder sends reports back to
    pub local_rtcp_port: Option<u16>,
    pub rtp_capabilities: RtpCapabilities,
    pub rtp_parameters: RtpParameters,
}

impl RtpSink {
    pub fn ports(&self) -> Vec<u16> {
        std::iter::once(self.remote_rtp_port)
            .chain(self.remote_rtcp_port)
            .collect()
    }
}

/// Per-attempt bundle handed to the recorder
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInfo {
    pub file_name: String,
    pub video: Option<RtpSink>,
    pub audio: Option<RtpSink>,
}

impl RecordInfo {
    /// Empty bundle named after the current time (epoch millis) and the
    /// session, so concurrent sessions never share a file
    pub fn new(session_id: &str) -> Self {
        let tag: String = session_id.chars().take(8).collect();
        Self {
            file_name: format!("{}-{}", Utc::now().timestamp_millis(), tag),
            video: None,
            audio: None,
        }
    }

    pub fn insert(&mut self, sink: RtpSink) {
        match sink.kind {
            MediaKind::Video => self.video = Some(sink),
            MediaKind::Audio => self.audio = Some(sink),
        }
    }

    /// Sinks in SDP order: video first, then audio
    pub fn sinks(&self) -> impl Iterator<Item = &RtpSink> {
        self.video.iter().chain(self.audio.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.audio.is_none()
    }
}
