use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of a session's owned resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    /// When the signaling connection was accepted
    pub created_at: DateTime<Utc>,

    /// Seconds since `created_at`
    pub uptime_secs: f64,

    /// WebRTC and plain RTP transports
    pub transports_count: usize,

    pub producers_count: usize,

    /// Recording consumers
    pub consumers_count: usize,

    /// Ports currently held from the port pool
    pub allocated_ports: Vec<u16>,

    /// Whether a recorder process is running
    pub is_recording: bool,
}
