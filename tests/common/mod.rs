// Shared fakes for the integration tests: an in-memory media router, a
// recorder spawner that never touches the OS, and a compositor runner.

#![allow(dead_code)]

use anyhow::Result;
use serde_json::{json, Map, Value};
use sfu_recorder::combine::{ToolOutput, ToolRunner};
use sfu_recorder::config::Config;
use sfu_recorder::media::{
    ConsumerInfo, MediaKind, MediaRouter, PlainTransportInfo, ProducerInfo, RtpCapabilities,
    RtpCodecCapability, RtpCodecParameters, RtpEncodingParameters, RtpParameters,
    WebRtcTransportInfo,
};
use sfu_recorder::recording::{ProcessSpawner, RecordInfo, RecorderCommand, RecorderProcess};
use sfu_recorder::{
    PortAllocator, RecordError, RecordResult, RecordingSupervisor, SessionHandle,
    SessionRegistry,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Media router
// ============================================================================

pub struct FakeRouter {
    capabilities: RtpCapabilities,
    next_id: AtomicUsize,
    calls: Mutex<Vec<String>>,
    /// method → calls still allowed to succeed
    failing: Mutex<HashMap<&'static str, usize>>,
    plain_transport_delay: Mutex<Option<Duration>>,
}

impl FakeRouter {
    pub fn new() -> Self {
        let codecs: Vec<RtpCodecCapability> = serde_json::from_value(json!([
            {
                "kind": "audio",
                "mimeType": "audio/opus",
                "preferredPayloadType": 100,
                "clockRate": 48000,
                "channels": 2,
                "rtcpFeedback": [{ "type": "transport-cc" }]
            },
            {
                "kind": "video",
                "mimeType": "video/VP8",
                "preferredPayloadType": 101,
                "clockRate": 90000,
                "rtcpFeedback": [{ "type": "nack" }, { "type": "ccm", "parameter": "fir" }]
            }
        ]))
        .unwrap();

        Self {
            capabilities: RtpCapabilities {
                codecs,
                header_extensions: Vec::new(),
            },
            next_id: AtomicUsize::new(1),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashMap::new()),
            plain_transport_delay: Mutex::new(None),
        }
    }

    /// Make every later call of `method` fail
    pub fn fail_on(&self, method: &'static str) {
        self.fail_after(method, 0);
    }

    /// Let `method` succeed `successes` more times, then fail
    pub fn fail_after(&self, method: &'static str, successes: usize) {
        self.failing.lock().unwrap().insert(method, successes);
    }

    /// Slow down plain transport creation, leaving a start in `Starting`
    pub fn delay_plain_transports(&self, delay: Duration) {
        *self.plain_transport_delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls of `method`, with their first argument
    pub fn calls_to(&self, method: &str) -> Vec<String> {
        let prefix = format!("{}:", method);
        self.calls()
            .into_iter()
            .filter_map(|call| call.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    fn record(&self, method: &'static str, arg: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("{}:{}", method, arg));
        if let Some(remaining) = self.failing.lock().unwrap().get_mut(method) {
            if *remaining == 0 {
                anyhow::bail!("{} refused by fake engine", method);
            }
            *remaining -= 1;
        }
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

#[async_trait::async_trait]
impl MediaRouter for FakeRouter {
    fn id(&self) -> &str {
        "router-1"
    }

    fn rtp_capabilities(&self) -> &RtpCapabilities {
        &self.capabilities
    }

    async fn create_webrtc_transport(&self) -> Result<WebRtcTransportInfo> {
        self.record("create_webrtc_transport", "")?;
        Ok(WebRtcTransportInfo {
            id: self.next_id("webrtc"),
            ice_parameters: json!({ "usernameFragment": "frag", "password": "pwd" }),
            ice_candidates: json!([]),
            dtls_parameters: json!({ "role": "auto", "fingerprints": [] }),
        })
    }

    async fn set_max_incoming_bitrate(&self, transport_id: &str, _bitrate: u32) -> Result<()> {
        self.record("set_max_incoming_bitrate", transport_id)
    }

    async fn connect_webrtc_transport(&self, transport_id: &str, _dtls: Value) -> Result<()> {
        self.record("connect_webrtc_transport", transport_id)
    }

    async fn produce(
        &self,
        transport_id: &str,
        kind: MediaKind,
        _rtp_parameters: RtpParameters,
    ) -> Result<ProducerInfo> {
        self.record("produce", transport_id)?;
        Ok(ProducerInfo {
            id: self.next_id("producer"),
            kind,
        })
    }

    async fn create_plain_transport(&self, rtcp_mux: bool) -> Result<PlainTransportInfo> {
        self.record("create_plain_transport", &rtcp_mux.to_string())?;
        let delay = *self.plain_transport_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(PlainTransportInfo {
            id: self.next_id("plain"),
            rtcp_mux,
            rtcp_local_port: None,
        })
    }

    async fn connect_plain_transport(
        &self,
        transport_id: &str,
        _ip: &str,
        _port: u16,
        rtcp_port: Option<u16>,
    ) -> Result<PlainTransportInfo> {
        self.record("connect_plain_transport", transport_id)?;
        Ok(PlainTransportInfo {
            id: transport_id.to_string(),
            rtcp_mux: rtcp_port.is_none(),
            rtcp_local_port: rtcp_port.map(|_| 45000),
        })
    }

    async fn consume(
        &self,
        transport_id: &str,
        producer_id: &str,
        rtp_capabilities: &RtpCapabilities,
        paused: bool,
    ) -> Result<ConsumerInfo> {
        self.record("consume", producer_id)?;
        assert!(paused, "recording consumers start paused");

        let codec = &rtp_capabilities.codecs[0];
        Ok(ConsumerInfo {
            id: self.next_id(&format!("consumer-{}", transport_id)),
            kind: codec.kind,
            rtp_parameters: RtpParameters {
                mid: None,
                codecs: vec![RtpCodecParameters {
                    mime_type: codec.mime_type.clone(),
                    payload_type: codec.preferred_payload_type.unwrap_or(96),
                    clock_rate: codec.clock_rate,
                    channels: codec.channels,
                    parameters: Map::new(),
                    rtcp_feedback: codec.rtcp_feedback.clone(),
                }],
                encodings: vec![RtpEncodingParameters {
                    ssrc: Some(1234),
                    ..Default::default()
                }],
                header_extensions: Vec::new(),
                rtcp: Some(json!({ "cname": "fake" })),
            },
            paused,
        })
    }

    async fn resume_consumer(&self, consumer_id: &str) -> Result<()> {
        self.record("resume_consumer", consumer_id)
    }

    async fn request_key_frame(&self, consumer_id: &str) -> Result<()> {
        self.record("request_key_frame", consumer_id)
    }

    async fn close_transport(&self, transport_id: &str) -> Result<()> {
        self.record("close_transport", transport_id)
    }
}

// ============================================================================
// Recorder processes
// ============================================================================

/// Records every signal it gets in `signals`. Exits on interrupt unless
/// `stubborn` is set, in which case only a kill ends it.
pub struct FakeProcess {
    terminated: Arc<AtomicUsize>,
    signals: Arc<Mutex<Vec<&'static str>>>,
    stubborn: bool,
    interrupted: bool,
    exited: bool,
}

impl FakeProcess {
    fn exit(&mut self) {
        if !self.exited {
            self.exited = true;
            self.terminated.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait::async_trait]
impl RecorderProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(4242)
    }

    fn has_exited(&mut self) -> RecordResult<bool> {
        Ok(self.exited)
    }

    fn interrupt(&mut self) -> RecordResult<()> {
        self.signals.lock().unwrap().push("interrupt");
        self.interrupted = true;
        Ok(())
    }

    async fn wait(&mut self) -> RecordResult<()> {
        if self.stubborn || !self.interrupted {
            std::future::pending::<()>().await;
        }
        self.signals.lock().unwrap().push("exit");
        self.exit();
        Ok(())
    }

    async fn kill(&mut self) -> RecordResult<()> {
        self.signals.lock().unwrap().push("kill");
        self.exit();
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSpawner {
    pub commands: Mutex<Vec<RecorderCommand>>,
    pub terminated: Arc<AtomicUsize>,
    pub signals: Arc<Mutex<Vec<&'static str>>>,
    /// Spawned recorders ignore the interrupt
    pub stubborn: AtomicBool,
    pub fail: AtomicBool,
}

impl FakeSpawner {
    pub fn spawned(&self) -> usize {
        self.commands.lock().unwrap().len()
    }

    pub fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }

    pub fn signals(&self) -> Vec<&'static str> {
        self.signals.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ProcessSpawner for FakeSpawner {
    async fn spawn(
        &self,
        _session_id: &str,
        command: &RecorderCommand,
    ) -> RecordResult<Box<dyn RecorderProcess>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RecordError::ExternalToolFailure {
                tool: command.program.clone(),
                status: "spawn failed".to_string(),
                stderr: "No such file or directory".to_string(),
            });
        }

        self.commands.lock().unwrap().push(command.clone());
        Ok(Box::new(FakeProcess {
            terminated: Arc::clone(&self.terminated),
            signals: Arc::clone(&self.signals),
            stubborn: self.stubborn.load(Ordering::SeqCst),
            interrupted: false,
            exited: false,
        }))
    }
}

// ============================================================================
// Compositor
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum RunnerMode {
    /// Exit 0 and write the output file
    Succeed,
    /// Exit 1 with diagnostics
    Fail,
    /// Exit 0 without writing anything
    NoOutput,
}

pub struct FakeRunner {
    mode: RunnerMode,
    pub runs: Mutex<Vec<Vec<String>>>,
}

impl FakeRunner {
    pub fn new(mode: RunnerMode) -> Self {
        Self {
            mode,
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn runs(&self) -> Vec<Vec<String>> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ToolRunner for FakeRunner {
    async fn run(&self, _program: &str, args: &[String]) -> RecordResult<ToolOutput> {
        self.runs.lock().unwrap().push(args.to_vec());

        match self.mode {
            RunnerMode::Succeed => {
                if let Some(output) = args.last() {
                    tokio::fs::write(output, b"combined").await?;
                }
                Ok(ToolOutput {
                    success: true,
                    status: "exit status: 0".to_string(),
                    stderr: String::new(),
                })
            }
            RunnerMode::Fail => Ok(ToolOutput {
                success: false,
                status: "exit status: 1".to_string(),
                stderr: "Invalid data found when processing input".to_string(),
            }),
            RunnerMode::NoOutput => Ok(ToolOutput {
                success: true,
                status: "exit status: 0".to_string(),
                stderr: String::new(),
            }),
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Defaults with every directory under `root` and a short settle delay
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::defaults().unwrap();
    config.recorder.output_dir = root.join("files");
    config.recorder.settle_delay_ms = 10;
    config.recorder.stop_timeout_ms = 100;
    config.combine.source_dir = root.join("files");
    config.combine.dest_dir = root.join("files/completed");
    config.ports.min = 20000;
    config.ports.max = 20009;
    config
}

pub struct Harness {
    pub router: Arc<FakeRouter>,
    pub spawner: Arc<FakeSpawner>,
    pub ports: Arc<PortAllocator>,
    pub registry: Arc<SessionRegistry>,
    pub supervisor: Arc<RecordingSupervisor>,
}

impl Harness {
    pub fn new(config: &Config) -> Self {
        let router = Arc::new(FakeRouter::new());
        let spawner = Arc::new(FakeSpawner::default());
        let ports = Arc::new(PortAllocator::new(config.ports.min, config.ports.max));
        let supervisor = Arc::new(RecordingSupervisor::new(
            Arc::clone(&router) as Arc<dyn MediaRouter>,
            Arc::clone(&ports),
            Arc::clone(&spawner) as Arc<dyn ProcessSpawner>,
            config.recorder.clone(),
        ));

        Self {
            router,
            spawner,
            ports,
            registry: Arc::new(SessionRegistry::new()),
            supervisor,
        }
    }

    /// Session with one producer per kind in `kinds`
    pub async fn session(&self, session_id: &str, kinds: &[MediaKind]) -> SessionHandle {
        let session = self.registry.create(session_id).await.unwrap();
        {
            let mut guard = session.lock().await;
            for (i, kind) in kinds.iter().enumerate() {
                guard.add_producer(format!("{}-producer-{}", session_id, i), *kind);
            }
        }
        session
    }

    pub async fn start(&self, session: &SessionHandle) -> RecordResult<RecordInfo> {
        self.supervisor.start(session).await
    }
}

pub const SETTLE: Duration = Duration::from_millis(10);
