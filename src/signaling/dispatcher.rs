use super::messages::{ClientMessage, ServerMessage};
use crate::combine::CombinePipeline;
use crate::error::{RecordError, RecordResult};
use crate::media::{MediaKind, MediaRouter, RtpParameters};
use crate::recording::RecordingSupervisor;
use crate::session::{SessionHandle, SessionRegistry, TransportRole};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

fn engine_error(step: &str, err: anyhow::Error) -> RecordError {
    RecordError::BridgeFailed(format!("{}: {:#}", step, err))
}

/// Server side of the signaling protocol
///
/// One dispatcher serves every connection. Each inbound message is handled
/// independently; per-session state lives behind the session's own lock.
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    router: Arc<dyn MediaRouter>,
    supervisor: Arc<RecordingSupervisor>,
    combiner: Arc<CombinePipeline>,
    max_incoming_bitrate: Option<u32>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<SessionRegistry>,
        router: Arc<dyn MediaRouter>,
        supervisor: Arc<RecordingSupervisor>,
        combiner: Arc<CombinePipeline>,
        max_incoming_bitrate: Option<u32>,
    ) -> Self {
        Self {
            registry,
            router,
            supervisor,
            combiner,
            max_incoming_bitrate,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn combiner(&self) -> &Arc<CombinePipeline> {
        &self.combiner
    }

    /// Register a new connection and build its greeting
    pub async fn open_session(&self) -> RecordResult<(String, ServerMessage)> {
        let session_id = uuid::Uuid::new_v4().to_string();
        self.registry.create(&session_id).await?;

        let greeting = ServerMessage::RouterRtpCapabilities {
            router_rtp_capabilities: self.router.rtp_capabilities().clone(),
            session_id: session_id.clone(),
        };

        Ok((session_id, greeting))
    }

    /// Parse, handle and answer one text frame received on the connection
    /// owning `connection`.
    ///
    /// Failures become an `error` reply; nothing here is fatal to the connection.
    pub async fn handle_text(&self, connection: &str, text: &str) -> Option<String> {
        let reply = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => {
                let action = message.action();
                match self.handle(connection, message).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        error!("Failed to handle {}: {}", action, e);
                        ServerMessage::error(action, &e)
                    }
                }
            }
            Err(e) => {
                let action = serde_json::from_str::<Value>(text)
                    .ok()
                    .and_then(|v| v.get("action").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_else(|| "unknown".to_string());
                warn!("Unreadable signaling message ({}): {}", action, e);
                ServerMessage::error(&action, &RecordError::InvalidMessage(e.to_string()))
            }
        };

        match serde_json::to_string(&reply) {
            Ok(text) => Some(text),
            Err(e) => {
                error!("Failed to encode {} reply: {}", reply.action(), e);
                None
            }
        }
    }

    /// Handle one message. A message naming another connection's session is
    /// refused before it reaches the session.
    pub async fn handle(
        &self,
        connection: &str,
        message: ClientMessage,
    ) -> RecordResult<ServerMessage> {
        if let Some(session_id) = message.session_id() {
            if session_id != connection {
                warn!(
                    "{} from {} names session {}",
                    message.action(),
                    connection,
                    session_id
                );
                return Err(RecordError::SessionMismatch {
                    expected: connection.to_string(),
                    got: session_id.to_string(),
                });
            }
        }

        match message {
            ClientMessage::CreateTransport { session_id } => {
                self.create_transport(&session_id).await
            }
            ClientMessage::ConnectTransport {
                session_id,
                transport_id,
                dtls_parameters,
            } => {
                self.connect_transport(&session_id, &transport_id, dtls_parameters)
                    .await
            }
            ClientMessage::Produce {
                session_id,
                transport_id,
                kind,
                rtp_parameters,
            } => {
                self.produce(&session_id, &transport_id, kind, rtp_parameters)
                    .await
            }
            ClientMessage::StartRecord { session_id } => {
                info!("start-record for {}", session_id);
                let session = self.registry.get(&session_id).await?;
                self.supervisor.start(&session).await?;
                Ok(ServerMessage::StartRecord)
            }
            ClientMessage::StopRecord { session_id } => {
                info!("stop-record for {}", session_id);
                let session = self.registry.get(&session_id).await?;
                self.supervisor.stop(&session).await?;
                Ok(ServerMessage::StopRecord)
            }
            ClientMessage::StartCombine { session_id } => {
                info!("start-combine (from {:?})", session_id);
                let outcome = self.combiner.combine().await?;
                Ok(ServerMessage::StartCombine(outcome))
            }
        }
    }

    async fn create_transport(&self, session_id: &str) -> RecordResult<ServerMessage> {
        info!("create-transport for {}", session_id);
        let session = self.registry.get(session_id).await?;

        let transport = self
            .router
            .create_webrtc_transport()
            .await
            .map_err(|e| engine_error("create webrtc transport", e))?;

        if let Some(bitrate) = self.max_incoming_bitrate {
            if let Err(e) = self.router.set_max_incoming_bitrate(&transport.id, bitrate).await {
                warn!("Failed to set max incoming bitrate on {}: {:#}", transport.id, e);
            }
        }

        {
            let mut guard = session.lock().await;
            if guard.is_closed() {
                drop(guard);
                self.close_quietly(&transport.id).await;
                return Err(RecordError::SessionNotFound(session_id.to_string()));
            }
            guard.add_transport(transport.id.clone(), TransportRole::Send);
        }

        Ok(ServerMessage::CreateTransport(transport))
    }

    async fn connect_transport(
        &self,
        session_id: &str,
        transport_id: &str,
        dtls_parameters: Value,
    ) -> RecordResult<ServerMessage> {
        info!("connect-transport {} for {}", transport_id, session_id);
        let session = self.registry.get(session_id).await?;
        ensure_send_transport(&session, transport_id).await?;

        self.router
            .connect_webrtc_transport(transport_id, dtls_parameters)
            .await
            .map_err(|e| engine_error("connect webrtc transport", e))?;

        Ok(ServerMessage::ConnectTransport)
    }

    async fn produce(
        &self,
        session_id: &str,
        transport_id: &str,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> RecordResult<ServerMessage> {
        info!("produce {} on {} for {}", kind, transport_id, session_id);
        let session = self.registry.get(session_id).await?;
        ensure_send_transport(&session, transport_id).await?;

        let producer = self
            .router
            .produce(transport_id, kind, rtp_parameters)
            .await
            .map_err(|e| engine_error("produce", e))?;

        {
            let mut guard = session.lock().await;
            if guard.is_closed() {
                return Err(RecordError::SessionNotFound(session_id.to_string()));
            }
            guard.add_producer(producer.id.clone(), producer.kind);
        }

        info!("Producer {} ({}) added to {}", producer.id, producer.kind, session_id);

        Ok(ServerMessage::Produce {
            id: producer.id,
            kind: producer.kind,
        })
    }

    /// Connection gone: drop the session and release everything it owns
    pub async fn close_session(&self, session_id: &str) {
        match self.registry.remove(session_id).await {
            Ok(session) => self.supervisor.teardown(&session).await,
            Err(e) => warn!("Close of {} ignored: {}", session_id, e),
        }
    }

    /// Tear down every live session
    pub async fn shutdown(&self) {
        let ids = self.registry.ids().await;
        info!("Shutting down {} sessions", ids.len());

        for session_id in ids {
            self.close_session(&session_id).await;
        }
    }

    async fn close_quietly(&self, transport_id: &str) {
        if let Err(e) = self.router.close_transport(transport_id).await {
            warn!("Failed to close transport {}: {:#}", transport_id, e);
        }
    }
}

async fn ensure_send_transport(session: &SessionHandle, transport_id: &str) -> RecordResult<()> {
    let guard = session.lock().await;
    match guard.transport(transport_id) {
        Some(entry) if entry.role == TransportRole::Send => Ok(()),
        _ => Err(RecordError::TransportNotFound(transport_id.to_string())),
    }
}
