use super::stats::SessionStats;
use crate::media::MediaKind;
use crate::recording::RecorderProcess;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a transport is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportRole {
    /// WebRTC transport the participant sends media on
    Send,
    /// Plain RTP transport feeding a local recording sink
    PlainRtp,
}

#[derive(Debug, Clone)]
pub struct TransportEntry {
    pub id: String,
    pub role: TransportRole,
}

#[derive(Debug, Clone)]
pub struct ProducerEntry {
    pub id: String,
    pub kind: MediaKind,
}

/// Consumer created on a plain transport for recording
#[derive(Debug, Clone)]
pub struct ConsumerEntry {
    pub id: String,
    pub kind: MediaKind,
    pub transport_id: String,
    pub paused: bool,
}

/// Recording lifecycle of a session
pub enum RecordingState {
    Idle,
    /// `start-record` is bridging producers and spawning the recorder.
    /// `cancelled` is set by a stop or teardown arriving meanwhile.
    Starting { cancelled: bool },
    Active(Box<dyn RecorderProcess>),
}

impl std::fmt::Debug for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingState::Idle => f.write_str("Idle"),
            RecordingState::Starting { cancelled } => f
                .debug_struct("Starting")
                .field("cancelled", cancelled)
                .finish(),
            RecordingState::Active(_) => f.write_str("Active(..)"),
        }
    }
}

impl RecordingState {
    pub fn is_idle(&self) -> bool {
        matches!(self, RecordingState::Idle)
    }
}

/// Everything a recording owns, detached from the session for release
pub struct RecordingResources {
    pub process: Option<Box<dyn RecorderProcess>>,
    pub ports: Vec<u16>,
    pub transports: Vec<String>,
}

/// One connected participant and the engine resources it owns
#[derive(Debug)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    transports: Vec<TransportEntry>,
    producers: Vec<ProducerEntry>,
    consumers: Vec<ConsumerEntry>,
    remote_ports: Vec<u16>,
    recording: RecordingState,
    closed: bool,
}

impl Session {
    pub fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            transports: Vec::new(),
            producers: Vec::new(),
            consumers: Vec::new(),
            remote_ports: Vec::new(),
            recording: RecordingState::Idle,
            closed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn add_transport(&mut self, id: String, role: TransportRole) {
        self.transports.push(TransportEntry { id, role });
    }

    pub fn transport(&self, id: &str) -> Option<&TransportEntry> {
        self.transports.iter().find(|t| t.id == id)
    }

    pub fn transports(&self) -> &[TransportEntry] {
        &self.transports
    }

    pub fn add_producer(&mut self, id: String, kind: MediaKind) {
        self.producers.push(ProducerEntry { id, kind });
    }

    pub fn producers(&self) -> &[ProducerEntry] {
        &self.producers
    }

    pub fn add_consumer(&mut self, consumer: ConsumerEntry) {
        self.consumers.push(consumer);
    }

    pub fn consumers(&self) -> &[ConsumerEntry] {
        &self.consumers
    }

    pub fn mark_resumed(&mut self, consumer_id: &str) {
        if let Some(consumer) = self.consumers.iter_mut().find(|c| c.id == consumer_id) {
            consumer.paused = false;
        }
    }

    pub fn track_ports(&mut self, ports: &[u16]) {
        self.remote_ports.extend_from_slice(ports);
    }

    pub fn remote_ports(&self) -> &[u16] {
        &self.remote_ports
    }

    pub fn recording(&self) -> &RecordingState {
        &self.recording
    }

    pub fn recording_mut(&mut self) -> &mut RecordingState {
        &mut self.recording
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.recording, RecordingState::Active(_))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Mark the session as torn down; later commits must be refused
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Detach the recorder, its ports, consumers and plain transports.
    ///
    /// The port list is emptied in the same step so the same port can never be
    /// released twice on behalf of this session.
    pub fn take_recording_resources(&mut self) -> RecordingResources {
        let process = match std::mem::replace(&mut self.recording, RecordingState::Idle) {
            RecordingState::Active(process) => Some(process),
            _ => None,
        };

        let (plain, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.transports)
            .into_iter()
            .partition(|t| t.role == TransportRole::PlainRtp);
        self.transports = kept;
        self.consumers.clear();

        RecordingResources {
            process,
            ports: std::mem::take(&mut self.remote_ports),
            transports: plain.into_iter().map(|t| t.id).collect(),
        }
    }

    /// Detach every remaining transport id (used once the session is closed)
    pub fn take_transports(&mut self) -> Vec<String> {
        self.producers.clear();
        std::mem::take(&mut self.transports)
            .into_iter()
            .map(|t| t.id)
            .collect()
    }

    pub fn stats(&self) -> SessionStats {
        let uptime = Utc::now().signed_duration_since(self.created_at);

        SessionStats {
            session_id: self.id.clone(),
            created_at: self.created_at,
            uptime_secs: uptime.num_milliseconds() as f64 / 1000.0,
            transports_count: self.transports.len(),
            producers_count: self.producers.len(),
            consumers_count: self.consumers.len(),
            allocated_ports: self.remote_ports.clone(),
            is_recording: self.is_recording(),
        }
    }
}
