use super::queue::{CorrelationQueue, PendingAction};
use crate::error::{RecordError, RecordResult};
use crate::media::{MediaKind, RtpCapabilities, RtpParameters, WebRtcTransportInfo};
use crate::signaling::{ClientMessage, ServerMessage};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

type Reply = oneshot::Sender<RecordResult<ServerMessage>>;

/// What the client learnt from the server so far
#[derive(Debug, Clone, Default)]
pub struct ClientState {
    pub session_id: Option<String>,
    pub router_rtp_capabilities: Option<RtpCapabilities>,
    pub send_transport: Option<WebRtcTransportInfo>,
    pub recording: bool,
    pub last_error: Option<String>,
}

/// Client side of the signaling protocol, independent of the socket.
///
/// Outbound frames go to `outbound`; inbound frames are fed to `handle_text`.
/// `connect_transport` and `produce` park a reply slot in the correlation
/// queue and resolve when the matching acknowledgement (or error) arrives.
pub struct SignalingClient {
    outbound: mpsc::UnboundedSender<String>,
    pending: Mutex<CorrelationQueue<Reply>>,
    state: Mutex<ClientState>,
}

impl SignalingClient {
    pub fn new(outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            outbound,
            pending: Mutex::new(CorrelationQueue::new()),
            state: Mutex::new(ClientState::default()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, CorrelationQueue<Reply>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> ClientState {
        self.lock_state().clone()
    }

    fn send(&self, message: &ClientMessage) -> RecordResult<()> {
        let text = serde_json::to_string(message)
            .map_err(|e| RecordError::InvalidMessage(e.to_string()))?;
        debug!("Sending {}", message.action());
        self.outbound
            .send(text)
            .map_err(|_| RecordError::ChannelClosed)
    }

    fn session_id(&self) -> RecordResult<String> {
        self.lock_state()
            .session_id
            .clone()
            .ok_or_else(|| RecordError::SessionNotFound("(no session yet)".to_string()))
    }

    fn send_transport_id(&self) -> RecordResult<String> {
        self.lock_state()
            .send_transport
            .as_ref()
            .map(|t| t.id.clone())
            .ok_or_else(|| RecordError::TransportNotFound("(no send transport yet)".to_string()))
    }

    /// Feed one inbound frame
    pub fn handle_text(&self, text: &str) -> RecordResult<()> {
        let message: ServerMessage =
            serde_json::from_str(text).map_err(|e| RecordError::InvalidMessage(e.to_string()))?;
        self.handle_message(message)
    }

    pub fn handle_message(&self, message: ServerMessage) -> RecordResult<()> {
        match message {
            ServerMessage::RouterRtpCapabilities {
                router_rtp_capabilities,
                session_id,
            } => {
                info!("Joined as session {}", session_id);
                {
                    let mut state = self.lock_state();
                    state.session_id = Some(session_id.clone());
                    state.router_rtp_capabilities = Some(router_rtp_capabilities);
                }
                self.send(&ClientMessage::CreateTransport { session_id })
            }
            ServerMessage::CreateTransport(transport) => {
                info!("Send transport {} created", transport.id);
                self.lock_state().send_transport = Some(transport);
                Ok(())
            }
            reply @ ServerMessage::ConnectTransport => {
                self.resolve(PendingAction::ConnectTransport, Ok(reply))
            }
            reply @ ServerMessage::Produce { .. } => {
                self.resolve(PendingAction::Produce, Ok(reply))
            }
            ServerMessage::StartRecord => {
                info!("Recording started");
                self.lock_state().recording = true;
                Ok(())
            }
            ServerMessage::StopRecord => {
                info!("Recording stopped");
                self.lock_state().recording = false;
                Ok(())
            }
            ServerMessage::StartCombine(outcome) => {
                info!("Combine finished: {:?} -> {:?}", outcome.status, outcome.output);
                Ok(())
            }
            ServerMessage::Error {
                request_action,
                code,
                message,
            } => {
                warn!("Server rejected {} ({}): {}", request_action, code, message);
                {
                    let mut state = self.lock_state();
                    state.last_error = Some(message.clone());
                    if request_action == "start-record" {
                        state.recording = false;
                    }
                }

                match PendingAction::from_action(&request_action) {
                    Some(action) => self.resolve(
                        action,
                        Err(RecordError::Rejected {
                            action: request_action,
                            code,
                            message,
                        }),
                    ),
                    None => Ok(()),
                }
            }
        }
    }

    fn resolve(
        &self,
        action: PendingAction,
        result: RecordResult<ServerMessage>,
    ) -> RecordResult<()> {
        let reply = self.pending().take(action)?;
        if reply.send(result).is_err() {
            debug!("Caller of {} went away before the reply", action.as_str());
        }
        Ok(())
    }

    /// Send a request and wait for its acknowledgement
    async fn request(
        &self,
        action: PendingAction,
        message: ClientMessage,
    ) -> RecordResult<ServerMessage> {
        let (tx, rx) = oneshot::channel();
        self.pending().push(action, tx)?;

        if let Err(e) = self.send(&message) {
            let _ = self.pending().take(action);
            return Err(e);
        }

        rx.await.map_err(|_| RecordError::ChannelClosed)?
    }

    /// Hand the local DTLS parameters to the server's send transport
    pub async fn connect_transport(&self, dtls_parameters: Value) -> RecordResult<()> {
        let message = ClientMessage::ConnectTransport {
            session_id: self.session_id()?,
            transport_id: self.send_transport_id()?,
            dtls_parameters,
        };

        self.request(PendingAction::ConnectTransport, message)
            .await
            .map(|_| ())
    }

    /// Announce a local track; resolves to the server's producer id
    pub async fn produce(
        &self,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> RecordResult<String> {
        let message = ClientMessage::Produce {
            session_id: self.session_id()?,
            transport_id: self.send_transport_id()?,
            kind,
            rtp_parameters,
        };

        match self.request(PendingAction::Produce, message).await? {
            ServerMessage::Produce { id, .. } => Ok(id),
            other => Err(RecordError::InvalidMessage(format!(
                "Expected produce reply, got {}",
                other.action()
            ))),
        }
    }

    pub fn start_record(&self) -> RecordResult<()> {
        let session_id = self.session_id()?;
        self.send(&ClientMessage::StartRecord { session_id })
    }

    pub fn stop_record(&self) -> RecordResult<()> {
        let session_id = self.session_id()?;
        self.send(&ClientMessage::StopRecord { session_id })
    }

    pub fn start_combine(&self) -> RecordResult<()> {
        let session_id = self.lock_state().session_id.clone();
        self.send(&ClientMessage::StartCombine { session_id })
    }
}
