use super::types::RtpCodecCapability;
use serde_json::json;

/// Router media codecs: Opus, VP8, VP9 (profile 2) and H264 baseline
pub fn default_media_codecs() -> Vec<RtpCodecCapability> {
    serde_json::from_value(json!([
        {
            "kind": "audio",
            "mimeType": "audio/opus",
            "clockRate": 48000,
            "channels": 2
        },
        {
            "kind": "video",
            "mimeType": "video/VP8",
            "clockRate": 90000,
            "parameters": { "x-google-start-bitrate": 1000 }
        },
        {
            "kind": "video",
            "mimeType": "video/VP9",
            "clockRate": 90000,
            "parameters": { "profile-id": 2, "x-google-start-bitrate": 1000 }
        },
        {
            "kind": "video",
            "mimeType": "video/H264",
            "clockRate": 90000,
            "parameters": {
                "packetization-mode": 1,
                "profile-level-id": "42e01f",
                "level-asymmetry-allowed": 1,
                "x-google-start-bitrate": 1000
            }
        }
    ]))
    .unwrap_or_default()
}
