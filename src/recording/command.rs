//! Command lines for the external recorder
//!
//! - FFmpeg: reads an SDP description from stdin, RTCP muxed with RTP
//! - GStreamer: a single `gst-launch-1.0` pipeline, RTCP on separate ports

use super::info::{RecordInfo, RtpSink};
use crate::config::{RecorderConfig, RecorderProcess};
use crate::error::{RecordError, RecordResult};
use crate::media::{MediaKind, RtpCodecParameters};
use std::path::PathBuf;

const SINK_IP: &str = "127.0.0.1";

/// Fully resolved recorder invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Written to the child's stdin, which is then closed
    pub stdin: Option<String>,
    pub output_path: PathBuf,
}

impl RecorderCommand {
    /// Human-readable form for logs
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn codec_of(sink: &RtpSink) -> RecordResult<&RtpCodecParameters> {
    sink.rtp_parameters.primary_codec().ok_or_else(|| {
        RecordError::BridgeFailed(format!("Consumer {} has no negotiated codec", sink.consumer_id))
    })
}

/// Build the configured recorder's command for `info`
pub fn build(config: &RecorderConfig, info: &RecordInfo) -> RecordResult<RecorderCommand> {
    if info.is_empty() {
        return Err(RecordError::BridgeFailed("Nothing to record".to_string()));
    }

    match config.process {
        RecorderProcess::Ffmpeg => ffmpeg_command(config, info),
        RecorderProcess::Gstreamer => gstreamer_command(config, info),
    }
}

/// SDP describing every sink, video before audio
pub fn create_sdp(info: &RecordInfo) -> RecordResult<String> {
    let mut lines = vec![
        "v=0".to_string(),
        format!("o=- 0 0 IN IP4 {}", SINK_IP),
        "s=FFmpeg".to_string(),
        format!("c=IN IP4 {}", SINK_IP),
        "t=0 0".to_string(),
    ];

    for sink in info.sinks() {
        let codec = codec_of(sink)?;
        let pt = codec.payload_type;

        lines.push(format!("m={} {} RTP/AVP {}", sink.kind, sink.remote_rtp_port, pt));
        lines.push(match (sink.kind, codec.channels) {
            (MediaKind::Audio, Some(channels)) => format!(
                "a=rtpmap:{} {}/{}/{}",
                pt,
                codec.encoding_name(),
                codec.clock_rate,
                channels
            ),
            _ => format!("a=rtpmap:{} {}/{}", pt, codec.encoding_name(), codec.clock_rate),
        });
        lines.push("a=sendonly".to_string());
    }

    let mut sdp = lines.join("\n");
    sdp.push('\n');
    Ok(sdp)
}

fn ffmpeg_command(config: &RecorderConfig, info: &RecordInfo) -> RecordResult<RecorderCommand> {
    let output_path = config.output_dir.join(format!("{}.webm", info.file_name));

    let mut args: Vec<String> = [
        "-loglevel",
        "debug",
        "-protocol_whitelist",
        "pipe,udp,rtp",
        "-fflags",
        "+genpts",
        "-f",
        "sdp",
        "-i",
        "pipe:0",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if info.video.is_some() {
        args.extend(["-map", "0:v:0", "-c:v", "copy"].iter().map(|s| s.to_string()));
    }

    if info.audio.is_some() {
        args.extend(
            ["-map", "0:a:0", "-strict", "-2", "-c:a", "copy"]
                .iter()
                .map(|s| s.to_string()),
        );
    }

    args.push("-flags".to_string());
    args.push("+global_header".to_string());
    args.push(output_path.to_string_lossy().into_owned());

    Ok(RecorderCommand {
        program: config.ffmpeg_path.clone(),
        args,
        stdin: Some(create_sdp(info)?),
        output_path,
    })
}

/// Depayloader chain into the muxer for a codec
fn depayloader(kind: MediaKind, codec: &RtpCodecParameters) -> RecordResult<Vec<&'static str>> {
    let name = codec.encoding_name().to_ascii_uppercase();
    match (kind, name.as_str()) {
        (MediaKind::Video, "VP8") => Ok(vec!["rtpvp8depay"]),
        (MediaKind::Video, "VP9") => Ok(vec!["rtpvp9depay"]),
        (MediaKind::Audio, "OPUS") => Ok(vec!["rtpopusdepay", "!", "opusparse"]),
        _ => Err(RecordError::BridgeFailed(format!(
            "GStreamer recorder cannot mux {} codec {} into webm",
            kind, name
        ))),
    }
}

fn gstreamer_command(
    config: &RecorderConfig,
    info: &RecordInfo,
) -> RecordResult<RecorderCommand> {
    let output_path = config.output_dir.join(format!("{}.webm", info.file_name));

    let mut args: Vec<String> = vec!["--eos-on-shutdown".to_string()];
    let push = |args: &mut Vec<String>, tokens: &[&str]| {
        args.extend(tokens.iter().map(|t| t.to_string()));
    };

    args.push("rtpbin".to_string());
    args.push("name=rtpbin".to_string());
    args.push("latency=50".to_string());
    args.push("buffer-mode=0".to_string());

    let cname = info
        .sinks()
        .find_map(|sink| sink.rtp_parameters.rtcp.as_ref())
        .and_then(|rtcp| rtcp.get("cname"))
        .and_then(|cname| cname.as_str());
    if let Some(cname) = cname {
        args.push(format!(
            "sdes=application/x-rtp-source-sdes, cname=(string){}",
            cname
        ));
    }

    let mut rtcp_args = Vec::new();

    for (index, sink) in info.sinks().enumerate() {
        let codec = codec_of(sink)?;
        let depay = depayloader(sink.kind, codec)?;

        let mut caps = format!(
            "application/x-rtp,media=(string){},clock-rate=(int){},payload=(int){},encoding-name=(string){}",
            sink.kind,
            codec.clock_rate,
            codec.payload_type,
            codec.encoding_name().to_ascii_uppercase()
        );
        if let Some(ssrc) = sink.rtp_parameters.primary_ssrc() {
            caps.push_str(&format!(",ssrc=(uint){}", ssrc));
        }

        args.push("udpsrc".to_string());
        args.push(format!("port={}", sink.remote_rtp_port));
        args.push(format!("caps={}", caps));
        push(&mut args, &["!"]);
        args.push(format!("rtpbin.recv_rtp_sink_{}", index));
        push(&mut args, &["rtpbin.", "!", "queue", "!"]);
        push(&mut args, &depay);
        push(&mut args, &["!", "mux."]);

        if let (Some(remote_rtcp), Some(local_rtcp)) = (sink.remote_rtcp_port, sink.local_rtcp_port)
        {
            rtcp_args.push("udpsrc".to_string());
            rtcp_args.push(format!("address={}", SINK_IP));
            rtcp_args.push(format!("port={}", remote_rtcp));
            rtcp_args.push("!".to_string());
            rtcp_args.push(format!("rtpbin.recv_rtcp_sink_{}", index));
            rtcp_args.push(format!("rtpbin.send_rtcp_src_{}", index));
            rtcp_args.push("!".to_string());
            rtcp_args.push("udpsink".to_string());
            rtcp_args.push(format!("host={}", SINK_IP));
            rtcp_args.push(format!("port={}", local_rtcp));
            rtcp_args.push(format!("bind-address={}", SINK_IP));
            rtcp_args.push(format!("bind-port={}", remote_rtcp));
            rtcp_args.push("sync=false".to_string());
            rtcp_args.push("async=false".to_string());
        }
    }

    push(&mut args, &["webmmux", "name=mux", "!", "filesink"]);
    args.push(format!("location={}", output_path.to_string_lossy()));
    args.extend(rtcp_args);

    Ok(RecorderCommand {
        program: config.gstreamer_path.clone(),
        args,
        stdin: None,
        output_path,
    })
}
