use super::messages::{EngineCall, EngineReply, EngineRequest, RouterCreated};
use crate::media::{
    ConsumerInfo, MediaKind, MediaRouter, MediaWorker, PlainTransportInfo, ProducerInfo,
    RtpCapabilities, RtpCodecCapability, RtpParameters, WebRtcTransportInfo,
};
use anyhow::{Context, Result};
use async_nats::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Connect to NATS server
pub async fn connect(url: &str, request_timeout: Duration) -> Result<Client> {
    info!("Connecting to NATS at {}", url);

    let client = async_nats::ConnectOptions::new()
        .request_timeout(Some(request_timeout))
        .connect(url)
        .await
        .context("Failed to connect to NATS")?;

    info!("Connected to NATS successfully");

    Ok(client)
}

async fn call<T: DeserializeOwned>(
    client: &Client,
    subject: &str,
    router_id: Option<&str>,
    call: EngineCall,
) -> Result<T> {
    let method = call.method();
    let request = EngineRequest {
        router_id: router_id.map(str::to_string),
        call,
    };
    let payload = serde_json::to_vec(&request)?;

    debug!("Engine request {} on {}", method, subject);

    let message = client
        .request(subject.to_string(), payload.into())
        .await
        .with_context(|| format!("Engine request {} failed", method))?;

    let reply: EngineReply = serde_json::from_slice(&message.payload)
        .with_context(|| format!("Malformed reply to {}", method))?;

    if !reply.ok {
        anyhow::bail!(
            "Engine rejected {}: {}",
            method,
            reply.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    serde_json::from_value(reply.data).with_context(|| format!("Unexpected reply to {}", method))
}

/// Media worker reachable on a NATS subject
pub struct NatsWorker {
    client: Client,
    subject: String,
}

impl NatsWorker {
    pub fn new(client: Client, subject: String) -> Self {
        Self { client, subject }
    }
}

#[async_trait::async_trait]
impl MediaWorker for NatsWorker {
    fn name(&self) -> &str {
        &self.subject
    }

    async fn create_router(
        &self,
        media_codecs: &[RtpCodecCapability],
    ) -> Result<Arc<dyn MediaRouter>> {
        let created: RouterCreated = call(
            &self.client,
            &self.subject,
            None,
            EngineCall::CreateRouter {
                media_codecs: media_codecs.to_vec(),
            },
        )
        .await?;

        info!(
            "Router {} created on {} ({} codecs)",
            created.id,
            self.subject,
            created.rtp_capabilities.codecs.len()
        );

        Ok(Arc::new(NatsMediaRouter {
            client: self.client.clone(),
            subject: self.subject.clone(),
            id: created.id,
            rtp_capabilities: created.rtp_capabilities,
        }))
    }
}

/// Router hosted by a NATS media worker
pub struct NatsMediaRouter {
    client: Client,
    subject: String,
    id: String,
    rtp_capabilities: RtpCapabilities,
}

impl NatsMediaRouter {
    async fn request<T: DeserializeOwned>(&self, call: EngineCall) -> Result<T> {
        self::call(&self.client, &self.subject, Some(&self.id), call).await
    }

    /// Request whose reply carries no payload worth decoding
    async fn command(&self, call: EngineCall) -> Result<()> {
        self.request::<Value>(call).await.map(|_| ())
    }
}

#[async_trait::async_trait]
impl MediaRouter for NatsMediaRouter {
    fn id(&self) -> &str {
        &self.id
    }

    fn rtp_capabilities(&self) -> &RtpCapabilities {
        &self.rtp_capabilities
    }

    async fn create_webrtc_transport(&self) -> Result<WebRtcTransportInfo> {
        self.request(EngineCall::CreateWebRtcTransport).await
    }

    async fn set_max_incoming_bitrate(&self, transport_id: &str, bitrate: u32) -> Result<()> {
        self.command(EngineCall::SetMaxIncomingBitrate {
            transport_id: transport_id.to_string(),
            bitrate,
        })
        .await
    }

    async fn connect_webrtc_transport(
        &self,
        transport_id: &str,
        dtls_parameters: Value,
    ) -> Result<()> {
        self.command(EngineCall::ConnectWebRtcTransport {
            transport_id: transport_id.to_string(),
            dtls_parameters,
        })
        .await
    }

    async fn produce(
        &self,
        transport_id: &str,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<ProducerInfo> {
        self.request(EngineCall::Produce {
            transport_id: transport_id.to_string(),
            kind,
            rtp_parameters,
        })
        .await
    }

    async fn create_plain_transport(&self, rtcp_mux: bool) -> Result<PlainTransportInfo> {
        self.request(EngineCall::CreatePlainTransport {
            rtcp_mux,
            comedia: false,
        })
        .await
    }

    async fn connect_plain_transport(
        &self,
        transport_id: &str,
        ip: &str,
        port: u16,
        rtcp_port: Option<u16>,
    ) -> Result<PlainTransportInfo> {
        self.request(EngineCall::ConnectPlainTransport {
            transport_id: transport_id.to_string(),
            ip: ip.to_string(),
            port,
            rtcp_port,
        })
        .await
    }

    async fn consume(
        &self,
        transport_id: &str,
        producer_id: &str,
        rtp_capabilities: &RtpCapabilities,
        paused: bool,
    ) -> Result<ConsumerInfo> {
        self.request(EngineCall::Consume {
            transport_id: transport_id.to_string(),
            producer_id: producer_id.to_string(),
            rtp_capabilities: rtp_capabilities.clone(),
            paused,
        })
        .await
    }

    async fn resume_consumer(&self, consumer_id: &str) -> Result<()> {
        self.command(EngineCall::ResumeConsumer {
            consumer_id: consumer_id.to_string(),
        })
        .await
    }

    async fn request_key_frame(&self, consumer_id: &str) -> Result<()> {
        self.command(EngineCall::RequestKeyFrame {
            consumer_id: consumer_id.to_string(),
        })
        .await
    }

    async fn close_transport(&self, transport_id: &str) -> Result<()> {
        self.command(EngineCall::CloseTransport {
            transport_id: transport_id.to_string(),
        })
        .await
    }
}
