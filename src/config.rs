use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub media: MediaConfig,
    pub ports: PortsConfig,
    pub recorder: RecorderConfig,
    pub combine: CombineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub nats_url: String,
    /// Worker subjects, used round-robin when creating routers
    pub workers: Vec<String>,
    pub request_timeout_ms: u64,
    pub max_incoming_bitrate: Option<u32>,
}

impl MediaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortsConfig {
    pub min: u16,
    pub max: u16,
}

/// External recorder flavour, chosen once for the whole process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderProcess {
    #[serde(alias = "FFmpeg")]
    Ffmpeg,
    #[serde(alias = "GStreamer")]
    Gstreamer,
}

impl RecorderProcess {
    /// GStreamer receives RTCP on its own port, FFmpeg expects it muxed
    pub fn rtcp_mux(&self) -> bool {
        matches!(self, RecorderProcess::Ffmpeg)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecorderConfig {
    pub process: RecorderProcess,
    pub ffmpeg_path: String,
    pub gstreamer_path: String,
    pub output_dir: PathBuf,
    pub settle_delay_ms: u64,
    /// How long a stopped recorder may take to finalize before it is killed
    pub stop_timeout_ms: u64,
}

impl RecorderConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CombineConfig {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub ffmpeg_path: String,
    pub output_extension: String,
}

impl Config {
    /// Defaults, then `path` (if it exists), then `SFU_RECORDER__*` environment
    pub fn load(path: &str) -> Result<Self> {
        let settings = Self::builder()?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("SFU_RECORDER").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        Ok(settings.try_deserialize()?)
    }

    /// Built-in defaults only
    pub fn defaults() -> Result<Self> {
        Ok(Self::builder()?.build()?.try_deserialize()?)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(config::Config::builder()
            .set_default("service.name", "sfu-recorder")?
            .set_default("service.http.bind", "0.0.0.0")?
            .set_default("service.http.port", 3030)?
            .set_default("media.nats_url", "nats://localhost:4222")?
            .set_default("media.workers", vec!["media.worker.0"])?
            .set_default("media.request_timeout_ms", 5000)?
            .set_default("media.max_incoming_bitrate", 1_500_000)?
            .set_default("ports.min", 20000)?
            .set_default("ports.max", 30000)?
            .set_default("recorder.process", "ffmpeg")?
            .set_default("recorder.ffmpeg_path", "ffmpeg")?
            .set_default("recorder.gstreamer_path", "gst-launch-1.0")?
            .set_default("recorder.output_dir", "files")?
            .set_default("recorder.settle_delay_ms", 1000)?
            .set_default("recorder.stop_timeout_ms", 5000)?
            .set_default("combine.source_dir", "files")?
            .set_default("combine.dest_dir", "files/completed")?
            .set_default("combine.ffmpeg_path", "ffmpeg")?
            .set_default("combine.output_extension", "mp4")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::defaults().unwrap();

        assert_eq!(cfg.service.http.port, 3030);
        assert_eq!(cfg.ports.min, 20000);
        assert_eq!(cfg.ports.max, 30000);
        assert_eq!(cfg.recorder.process, RecorderProcess::Ffmpeg);
        assert_eq!(cfg.recorder.settle_delay(), Duration::from_secs(1));
        assert_eq!(cfg.recorder.stop_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.combine.dest_dir, PathBuf::from("files/completed"));
        assert_eq!(cfg.media.workers, vec!["media.worker.0".to_string()]);
    }

    #[test]
    fn test_rtcp_mux_follows_recorder() {
        assert!(RecorderProcess::Ffmpeg.rtcp_mux());
        assert!(!RecorderProcess::Gstreamer.rtcp_mux());
    }
}
