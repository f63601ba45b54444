use crate::media::{MediaKind, RtpCapabilities, RtpCodecCapability, RtpParameters};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request published to a media worker subject
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_id: Option<String>,
    #[serde(flatten)]
    pub call: EngineCall,
}

/// Engine method + arguments
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "method", content = "data", rename_all = "camelCase")]
pub enum EngineCall {
    #[serde(rename_all = "camelCase")]
    CreateRouter { media_codecs: Vec<RtpCodecCapability> },
    CreateWebRtcTransport,
    #[serde(rename_all = "camelCase")]
    SetMaxIncomingBitrate { transport_id: String, bitrate: u32 },
    #[serde(rename_all = "camelCase")]
    ConnectWebRtcTransport {
        transport_id: String,
        dtls_parameters: Value,
    },
    #[serde(rename_all = "camelCase")]
    Produce {
        transport_id: String,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    },
    #[serde(rename_all = "camelCase")]
    CreatePlainTransport { rtcp_mux: bool, comedia: bool },
    #[serde(rename_all = "camelCase")]
    ConnectPlainTransport {
        transport_id: String,
        ip: String,
        port: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rtcp_port: Option<u16>,
    },
    #[serde(rename_all = "camelCase")]
    Consume {
        transport_id: String,
        producer_id: String,
        rtp_capabilities: RtpCapabilities,
        paused: bool,
    },
    #[serde(rename_all = "camelCase")]
    ResumeConsumer { consumer_id: String },
    #[serde(rename_all = "camelCase")]
    RequestKeyFrame { consumer_id: String },
    #[serde(rename_all = "camelCase")]
    CloseTransport { transport_id: String },
}

impl EngineCall {
    pub fn method(&self) -> &'static str {
        match self {
            EngineCall::CreateRouter { .. } => "createRouter",
            EngineCall::CreateWebRtcTransport => "createWebRtcTransport",
            EngineCall::SetMaxIncomingBitrate { .. } => "setMaxIncomingBitrate",
            EngineCall::ConnectWebRtcTransport { .. } => "connectWebRtcTransport",
            EngineCall::Produce { .. } => "produce",
            EngineCall::CreatePlainTransport { .. } => "createPlainTransport",
            EngineCall::ConnectPlainTransport { .. } => "connectPlainTransport",
            EngineCall::Consume { .. } => "consume",
            EngineCall::ResumeConsumer { .. } => "resumeConsumer",
            EngineCall::RequestKeyFrame { .. } => "requestKeyFrame",
            EngineCall::CloseTransport { .. } => "closeTransport",
        }
    }
}

/// Reply received from a media worker
#[derive(Debug, Serialize, Deserialize)]
pub struct EngineReply {
    pub ok: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Payload of a successful `createRouter`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterCreated {
    pub id: String,
    pub rtp_capabilities: RtpCapabilities,
}
