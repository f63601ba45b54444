use super::bridge::PublishBridge;
use super::command::{self, RecorderCommand};
use super::info::RecordInfo;
use super::process::{self, ProcessSpawner};
use crate::config::RecorderConfig;
use crate::error::{RecordError, RecordResult};
use crate::media::{MediaKind, MediaRouter};
use crate::ports::PortAllocator;
use crate::session::{ProducerEntry, RecordingResources, RecordingState, SessionHandle};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Owns the recorder lifecycle of every session
///
/// Start: bridge every producer (paused consumers), spawn the recorder, wait
/// the settle delay, then resume each consumer and ask for a keyframe.
/// Stop, teardown and failed starts all go through `release`, which stops
/// the recorder before its ports return to the pool.
pub struct RecordingSupervisor {
    router: Arc<dyn MediaRouter>,
    ports: Arc<PortAllocator>,
    bridge: PublishBridge,
    spawner: Arc<dyn ProcessSpawner>,
    config: RecorderConfig,
}

impl RecordingSupervisor {
    pub fn new(
        router: Arc<dyn MediaRouter>,
        ports: Arc<PortAllocator>,
        spawner: Arc<dyn ProcessSpawner>,
        config: RecorderConfig,
    ) -> Self {
        Self {
            bridge: PublishBridge::new(Arc::clone(&router), Arc::clone(&ports)),
            router,
            ports,
            spawner,
            config,
        }
    }

    pub fn ports(&self) -> &Arc<PortAllocator> {
        &self.ports
    }

    /// Start recording every producer of the session
    pub async fn start(&self, session: &SessionHandle) -> RecordResult<RecordInfo> {
        let (session_id, producers) = {
            let mut guard = session.lock().await;
            let session_id = guard.id().to_string();

            if guard.is_closed() {
                return Err(RecordError::SessionNotFound(session_id));
            }
            if !guard.recording().is_idle() {
                return Err(RecordError::AlreadyRecording(session_id));
            }
            if guard.producers().is_empty() {
                return Err(RecordError::BridgeFailed(format!(
                    "Session {} has no producers to record",
                    session_id
                )));
            }
            // The recorder takes one stream per kind
            if let Some(kind) = duplicate_kind(guard.producers()) {
                return Err(RecordError::BridgeFailed(format!(
                    "Session {} has more than one {} producer",
                    session_id, kind
                )));
            }

            *guard.recording_mut() = RecordingState::Starting { cancelled: false };
            (session_id, guard.producers().to_vec())
        };

        info!("Starting recording for {} ({} producers)", session_id, producers.len());

        let mut record_info = RecordInfo::new(&session_id);
        let rtcp_mux = self.config.process.rtcp_mux();

        for producer in &producers {
            match self.bridge.publish(session, producer, rtcp_mux).await {
                Ok(sink) => record_info.insert(sink),
                Err(e) => {
                    error!("Failed to publish {} for {}: {}", producer.id, session_id, e);
                    self.abort(session).await;
                    return Err(e);
                }
            }
        }

        let command = match command::build(&self.config, &record_info) {
            Ok(command) => command,
            Err(e) => {
                self.abort(session).await;
                return Err(e);
            }
        };

        let process = match self.spawner.spawn(&session_id, &command).await {
            Ok(process) => process,
            Err(e) => {
                error!("Failed to spawn recorder for {}: {}", session_id, e);
                self.abort(session).await;
                return Err(e);
            }
        };

        {
            let mut guard = session.lock().await;
            let cancelled = guard.is_closed()
                || matches!(guard.recording(), RecordingState::Starting { cancelled: true });

            if cancelled {
                info!("Recording for {} was cancelled while starting", session_id);
                let mut resources = guard.take_recording_resources();
                resources.process = Some(process);
                drop(guard);
                self.release(&session_id, resources).await;
                return Err(RecordError::StartCancelled(session_id));
            }

            *guard.recording_mut() = RecordingState::Active(process);
        }

        self.resume_consumers(session, &session_id, &record_info, &command)
            .await;

        Ok(record_info)
    }

    /// Resume the paused consumers once the recorder had time to bind
    async fn resume_consumers(
        &self,
        session: &SessionHandle,
        session_id: &str,
        record_info: &RecordInfo,
        command: &RecorderCommand,
    ) {
        // TODO: replace the fixed delay with a readiness probe on the sink ports
        tokio::time::sleep(self.config.settle_delay()).await;

        for sink in record_info.sinks() {
            if !session.lock().await.is_recording() {
                warn!("Recording for {} ended before consumers resumed", session_id);
                return;
            }

            if let Err(e) = self.router.resume_consumer(&sink.consumer_id).await {
                warn!("Failed to resume consumer {}: {:#}", sink.consumer_id, e);
                continue;
            }
            if let Err(e) = self.router.request_key_frame(&sink.consumer_id).await {
                warn!("Failed to request keyframe on {}: {:#}", sink.consumer_id, e);
            }

            session.lock().await.mark_resumed(&sink.consumer_id);
        }

        info!(
            "Recording {} for {} into {}",
            record_info.file_name,
            session_id,
            command.output_path.display()
        );
    }

    /// Stop the session's recording.
    ///
    /// A recording still starting is cancelled; the starting task releases it
    /// and fails with `StartCancelled`.
    pub async fn stop(&self, session: &SessionHandle) -> RecordResult<()> {
        let (session_id, resources) = {
            let mut guard = session.lock().await;
            let session_id = guard.id().to_string();

            match guard.recording_mut() {
                RecordingState::Idle => return Err(RecordError::NotRecording(session_id)),
                RecordingState::Starting { cancelled } => {
                    *cancelled = true;
                    info!("Cancelling recording start for {}", session_id);
                    return Ok(());
                }
                RecordingState::Active(_) => {}
            }

            (session_id, guard.take_recording_resources())
        };

        info!("Stopping recording for {}", session_id);
        self.release(&session_id, resources).await;
        Ok(())
    }

    /// Release everything a disconnected session owns
    pub async fn teardown(&self, session: &SessionHandle) {
        let (session_id, resources, transports) = {
            let mut guard = session.lock().await;
            guard.close();

            if let RecordingState::Starting { cancelled } = guard.recording_mut() {
                *cancelled = true;
            }

            let resources = guard.take_recording_resources();
            (guard.id().to_string(), resources, guard.take_transports())
        };

        info!("Tearing down session {}", session_id);
        self.release(&session_id, resources).await;

        for transport_id in transports {
            if let Err(e) = self.router.close_transport(&transport_id).await {
                warn!("Failed to close transport {}: {:#}", transport_id, e);
            }
        }
    }

    /// Undo a start that failed before the recorder was running
    async fn abort(&self, session: &SessionHandle) {
        let (session_id, resources) = {
            let mut guard = session.lock().await;
            (guard.id().to_string(), guard.take_recording_resources())
        };
        self.release(&session_id, resources).await;
    }

    /// Stop the recorder, then return its ports and close its transports
    async fn release(&self, session_id: &str, resources: RecordingResources) {
        let RecordingResources {
            process,
            ports,
            transports,
        } = resources;

        if let Some(mut recorder) = process {
            let grace = self.config.stop_timeout();
            if let Err(e) = process::shutdown(recorder.as_mut(), grace).await {
                error!("Failed to terminate recorder for {}: {}", session_id, e);
            }
        }

        self.ports.release_all(&ports);

        for transport_id in transports {
            if let Err(e) = self.router.close_transport(&transport_id).await {
                warn!("Failed to close plain transport {}: {:#}", transport_id, e);
            }
        }

        info!("Released {} ports for {}", ports.len(), session_id);
    }
}

fn duplicate_kind(producers: &[ProducerEntry]) -> Option<MediaKind> {
    let mut seen = HashSet::new();
    producers.iter().map(|p| p.kind).find(|kind| !seen.insert(*kind))
}
