use super::types::{
    ConsumerInfo, MediaKind, PlainTransportInfo, ProducerInfo, RtpCapabilities,
    RtpCodecCapability, RtpParameters, WebRtcTransportInfo,
};
use anyhow::Result;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// Router on the external media engine
///
/// The engine performs all packet forwarding, ICE and DTLS. This trait is the
/// narrow request/response contract used by the orchestration layer:
/// - NATS: requests forwarded to an external media worker
/// - Tests: in-memory fake recording every call
#[async_trait::async_trait]
pub trait MediaRouter: Send + Sync {
    fn id(&self) -> &str;

    /// Capability set negotiated from the configured media codecs
    fn rtp_capabilities(&self) -> &RtpCapabilities;

    async fn create_webrtc_transport(&self) -> Result<WebRtcTransportInfo>;

    async fn set_max_incoming_bitrate(&self, transport_id: &str, bitrate: u32) -> Result<()>;

    async fn connect_webrtc_transport(&self, transport_id: &str, dtls_parameters: Value)
        -> Result<()>;

    async fn produce(
        &self,
        transport_id: &str,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<ProducerInfo>;

    async fn create_plain_transport(&self, rtcp_mux: bool) -> Result<PlainTransportInfo>;

    /// Point a plain transport at a remote RTP (and optionally RTCP) port
    async fn connect_plain_transport(
        &self,
        transport_id: &str,
        ip: &str,
        port: u16,
        rtcp_port: Option<u16>,
    ) -> Result<PlainTransportInfo>;

    async fn consume(
        &self,
        transport_id: &str,
        producer_id: &str,
        rtp_capabilities: &RtpCapabilities,
        paused: bool,
    ) -> Result<ConsumerInfo>;

    async fn resume_consumer(&self, consumer_id: &str) -> Result<()>;

    async fn request_key_frame(&self, consumer_id: &str) -> Result<()>;

    /// Close a transport and everything created on it
    async fn close_transport(&self, transport_id: &str) -> Result<()>;
}

/// Worker process of the media engine, able to host routers
#[async_trait::async_trait]
pub trait MediaWorker: Send + Sync {
    fn name(&self) -> &str;

    async fn create_router(&self, media_codecs: &[RtpCodecCapability])
        -> Result<Arc<dyn MediaRouter>>;
}

/// Ordered set of workers with a round-robin cursor
pub struct WorkerPool {
    workers: Vec<Arc<dyn MediaWorker>>,
    next: AtomicUsize,
}

impl WorkerPool {
    pub fn new(workers: Vec<Arc<dyn MediaWorker>>) -> Result<Self> {
        if workers.is_empty() {
            anyhow::bail!("Worker pool needs at least one worker");
        }

        Ok(Self {
            workers,
            next: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn next_worker(&self) -> Arc<dyn MediaWorker> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        Arc::clone(&self.workers[index])
    }

    /// Create a router on the next worker in turn
    pub async fn create_router(
        &self,
        media_codecs: &[RtpCodecCapability],
    ) -> Result<Arc<dyn MediaRouter>> {
        let worker = self.next_worker();
        info!("Creating router on worker {}", worker.name());
        worker.create_router(media_codecs).await
    }
}
