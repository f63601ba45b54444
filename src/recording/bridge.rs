use super::info::RtpSink;
use crate::error::{RecordError, RecordResult};
use crate::media::{MediaRouter, PlainTransportInfo, RtpCapabilities};
use crate::ports::PortAllocator;
use crate::session::{ConsumerEntry, ProducerEntry, SessionHandle, TransportRole};
use std::sync::Arc;
use tracing::{info, warn};

const SINK_IP: &str = "127.0.0.1";

/// Ports taken for one publish call, given back on drop unless committed
struct PortLease<'a> {
    pool: &'a PortAllocator,
    ports: Vec<u16>,
}

impl<'a> PortLease<'a> {
    fn new(pool: &'a PortAllocator) -> Self {
        Self {
            pool,
            ports: Vec::new(),
        }
    }

    fn acquire(&mut self) -> RecordResult<u16> {
        let port = self.pool.acquire()?;
        self.ports.push(port);
        Ok(port)
    }

    /// Hand ownership of the ports to the caller
    fn commit(mut self) -> Vec<u16> {
        std::mem::take(&mut self.ports)
    }
}

impl Drop for PortLease<'_> {
    fn drop(&mut self) {
        if !self.ports.is_empty() {
            warn!("Rolling back ports {:?}", self.ports);
            self.pool.release_all(&self.ports);
        }
    }
}

fn bridge_error(step: &str, err: anyhow::Error) -> RecordError {
    RecordError::BridgeFailed(format!("{}: {:#}", step, err))
}

/// Turns a producer into a paused consumer on a plain RTP transport pointed
/// at a local port, ready for an external recorder to listen on
pub struct PublishBridge {
    router: Arc<dyn MediaRouter>,
    ports: Arc<PortAllocator>,
}

impl PublishBridge {
    pub fn new(router: Arc<dyn MediaRouter>, ports: Arc<PortAllocator>) -> Self {
        Self { router, ports }
    }

    /// Publish `producer` of `session` to a local RTP sink.
    ///
    /// On success the transport, consumer and ports are registered on the
    /// session. On failure every port taken by this call is back in the pool
    /// and the transport, if created, is closed.
    pub async fn publish(
        &self,
        session: &SessionHandle,
        producer: &ProducerEntry,
        rtcp_mux: bool,
    ) -> RecordResult<RtpSink> {
        let rtp_capabilities = self
            .router
            .rtp_capabilities()
            .for_recording(producer.kind)
            .ok_or_else(|| {
                RecordError::BridgeFailed(format!("Router has no {} codec", producer.kind))
            })?;

        let transport = self
            .router
            .create_plain_transport(rtcp_mux)
            .await
            .map_err(|e| bridge_error("create plain transport", e))?;

        let mut lease = PortLease::new(&self.ports);

        let result = self
            .connect_and_consume(&transport, producer, &rtp_capabilities, &mut lease)
            .await;

        let sink = match result {
            Ok(sink) => sink,
            Err(e) => {
                self.close_quietly(&transport.id).await;
                return Err(e);
            }
        };

        {
            let mut session = session.lock().await;

            if session.is_closed() {
                let session_id = session.id().to_string();
                drop(session);
                self.close_quietly(&transport.id).await;
                return Err(RecordError::SessionNotFound(session_id));
            }

            session.add_transport(transport.id.clone(), TransportRole::PlainRtp);
            session.add_consumer(ConsumerEntry {
                id: sink.consumer_id.clone(),
                kind: sink.kind,
                transport_id: transport.id.clone(),
                paused: true,
            });
            session.track_ports(&lease.commit());
        }

        info!(
            "Published {} producer {} to {}:{} (rtcp: {:?})",
            producer.kind, producer.id, SINK_IP, sink.remote_rtp_port, sink.remote_rtcp_port
        );

        Ok(sink)
    }

    async fn connect_and_consume(
        &self,
        transport: &PlainTransportInfo,
        producer: &ProducerEntry,
        rtp_capabilities: &RtpCapabilities,
        lease: &mut PortLease<'_>,
    ) -> RecordResult<RtpSink> {
        let remote_rtp_port = lease.acquire()?;
        let remote_rtcp_port = if transport.rtcp_mux {
            None
        } else {
            Some(lease.acquire()?)
        };

        let connected = self
            .router
            .connect_plain_transport(&transport.id, SINK_IP, remote_rtp_port, remote_rtcp_port)
            .await
            .map_err(|e| bridge_error("connect plain transport", e))?;

        // Paused until the recorder is listening
        let consumer = self
            .router
            .consume(&transport.id, &producer.id, rtp_capabilities, true)
            .await
            .map_err(|e| bridge_error("consume", e))?;

        Ok(RtpSink {
            kind: producer.kind,
            transport_id: transport.id.clone(),
            consumer_id: consumer.id,
            remote_rtp_port,
            remote_rtcp_port,
            local_rtcp_port: connected.rtcp_local_port,
            rtp_capabilities: rtp_capabilities.clone(),
            rtp_parameters: consumer.rtp_parameters,
        })
    }

    async fn close_quietly(&self, transport_id: &str) {
        if let Err(e) = self.router.close_transport(transport_id).await {
            warn!("Failed to close plain transport {}: {:#}", transport_id, e);
        }
    }
}
