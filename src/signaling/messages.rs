use crate::combine::CombineOutcome;
use crate::error::RecordError;
use crate::media::{MediaKind, RtpCapabilities, RtpParameters, WebRtcTransportInfo};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client → server signaling message, tagged by `action`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    CreateTransport { session_id: String },

    #[serde(rename_all = "camelCase")]
    ConnectTransport {
        session_id: String,
        transport_id: String,
        dtls_parameters: Value,
    },

    #[serde(rename_all = "camelCase")]
    Produce {
        session_id: String,
        transport_id: String,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    },

    #[serde(rename_all = "camelCase")]
    StartRecord { session_id: String },

    #[serde(rename_all = "camelCase")]
    StopRecord { session_id: String },

    #[serde(rename_all = "camelCase")]
    StartCombine {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
}

impl ClientMessage {
    pub fn action(&self) -> &'static str {
        match self {
            ClientMessage::CreateTransport { .. } => "create-transport",
            ClientMessage::ConnectTransport { .. } => "connect-transport",
            ClientMessage::Produce { .. } => "produce",
            ClientMessage::StartRecord { .. } => "start-record",
            ClientMessage::StopRecord { .. } => "stop-record",
            ClientMessage::StartCombine { .. } => "start-combine",
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            ClientMessage::CreateTransport { session_id }
            | ClientMessage::ConnectTransport { session_id, .. }
            | ClientMessage::Produce { session_id, .. }
            | ClientMessage::StartRecord { session_id }
            | ClientMessage::StopRecord { session_id } => Some(session_id),
            ClientMessage::StartCombine { session_id } => session_id.as_deref(),
        }
    }
}

/// Server → client signaling message, tagged by `action`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// First message on every connection
    #[serde(rename_all = "camelCase")]
    RouterRtpCapabilities {
        router_rtp_capabilities: RtpCapabilities,
        session_id: String,
    },

    CreateTransport(WebRtcTransportInfo),

    ConnectTransport,

    Produce { id: String, kind: MediaKind },

    StartRecord,

    StopRecord,

    StartCombine(CombineOutcome),

    #[serde(rename_all = "camelCase")]
    Error {
        request_action: String,
        code: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn error(request_action: &str, error: &RecordError) -> Self {
        ServerMessage::Error {
            request_action: request_action.to_string(),
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            ServerMessage::RouterRtpCapabilities { .. } => "router-rtp-capabilities",
            ServerMessage::CreateTransport(_) => "create-transport",
            ServerMessage::ConnectTransport => "connect-transport",
            ServerMessage::Produce { .. } => "produce",
            ServerMessage::StartRecord => "start-record",
            ServerMessage::StopRecord => "stop-record",
            ServerMessage::StartCombine(_) => "start-combine",
            ServerMessage::Error { .. } => "error",
        }
    }
}
