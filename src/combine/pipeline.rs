use super::layout::{layout_for, MAX_INPUTS};
use crate::config::CombineConfig;
use crate::error::{RecordError, RecordResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Container extensions picked up from the source directory
pub const MEDIA_EXTENSIONS: [&str; 3] = ["mkv", "mp4", "webm"];

/// Result of one external tool run
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub status: String,
    pub stderr: String,
}

/// Runs the compositor
///
/// - `SystemRunner`: real child process
/// - Tests: fakes that write (or refuse to write) the output file
#[async_trait::async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> RecordResult<ToolOutput>;
}

pub struct SystemRunner;

#[async_trait::async_trait]
impl ToolRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String]) -> RecordResult<ToolOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| RecordError::ExternalToolFailure {
                tool: program.to_string(),
                status: "spawn failed".to_string(),
                stderr: e.to_string(),
            })?;

        Ok(ToolOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Compositor invocation derived from the scanned inputs
#[derive(Debug, Clone, PartialEq)]
pub struct CombinePlan {
    pub inputs: Vec<PathBuf>,
    pub args: Vec<String>,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CombineStatus {
    NoFiles,
    Completed,
}

/// What a combine run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombineOutcome {
    pub status: CombineStatus,
    pub output: Option<String>,
    pub inputs: Vec<String>,
}

fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            MEDIA_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Regular files in `dir` with a recognised extension, sorted by name.
/// A missing directory holds no recordings.
pub async fn scan_inputs(dir: &Path) -> RecordResult<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut inputs = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_media_file(&path) {
            inputs.push(path);
        }
    }

    inputs.sort();
    Ok(inputs)
}

/// Build the compositor arguments for `inputs`.
///
/// Returns `None` for an empty input list. More inputs than the layout table
/// covers is `LayoutUnavailable`.
pub fn plan(
    inputs: &[PathBuf],
    dest_dir: &Path,
    extension: &str,
    timestamp_millis: i64,
) -> RecordResult<Option<CombinePlan>> {
    let n = inputs.len();
    if n == 0 {
        return Ok(None);
    }
    if n > MAX_INPUTS {
        return Err(RecordError::LayoutUnavailable(n));
    }

    let output = dest_dir.join(format!("{}-{}.{}", timestamp_millis, n, extension));
    let mut args = Vec::new();

    for input in inputs {
        args.push("-i".to_string());
        args.push(input.display().to_string());
    }

    if n > 1 {
        let layout = layout_for(n).ok_or(RecordError::LayoutUnavailable(n))?;
        let video: String = (0..n).map(|i| format!("[{}:v]", i)).collect();
        let audio: String = (0..n).map(|i| format!("[{}:a]", i)).collect();

        args.push("-filter_complex".to_string());
        args.push(format!(
            "{}xstack=inputs={}:layout={}[v];{}amix=inputs={}[a]",
            video, n, layout, audio, n
        ));
        args.extend(["-map", "[v]", "-map", "[a]"].map(String::from));
    }

    args.push(output.display().to_string());

    Ok(Some(CombinePlan {
        inputs: inputs.to_vec(),
        args,
        output,
    }))
}

/// Merges finished recordings into one composite file
pub struct CombinePipeline {
    config: CombineConfig,
    runner: Arc<dyn ToolRunner>,
    /// One run at a time; a second caller would race on the same inputs
    running: Mutex<()>,
}

impl CombinePipeline {
    pub fn new(config: CombineConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            config,
            runner,
            running: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &CombineConfig {
        &self.config
    }

    /// Combine everything in the source directory.
    ///
    /// Sources are deleted only after the tool succeeded and the output exists.
    pub async fn combine(&self) -> RecordResult<CombineOutcome> {
        let _running = self.running.lock().await;

        let inputs = scan_inputs(&self.config.source_dir).await?;
        let names: Vec<String> = inputs
            .iter()
            .filter_map(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();

        let plan = match plan(
            &inputs,
            &self.config.dest_dir,
            &self.config.output_extension,
            Utc::now().timestamp_millis(),
        )? {
            Some(plan) => plan,
            None => {
                info!("No recordings to combine in {}", self.config.source_dir.display());
                return Ok(CombineOutcome {
                    status: CombineStatus::NoFiles,
                    output: None,
                    inputs: names,
                });
            }
        };

        tokio::fs::create_dir_all(&self.config.dest_dir).await?;

        info!(
            "Combining {} recordings into {}",
            plan.inputs.len(),
            plan.output.display()
        );

        let started = Instant::now();
        let output = self.runner.run(&self.config.ffmpeg_path, &plan.args).await?;

        if !output.success {
            error!("Combine failed ({}): {}", output.status, output.stderr);
            return Err(RecordError::ExternalToolFailure {
                tool: self.config.ffmpeg_path.clone(),
                status: output.status,
                stderr: output.stderr,
            });
        }

        if !tokio::fs::try_exists(&plan.output).await.unwrap_or(false) {
            error!("Combine produced no output at {}", plan.output.display());
            return Err(RecordError::ExternalToolFailure {
                tool: self.config.ffmpeg_path.clone(),
                status: format!("missing output {}", plan.output.display()),
                stderr: output.stderr,
            });
        }

        for input in &plan.inputs {
            match tokio::fs::remove_file(input).await {
                Ok(()) => info!("Deleted {} after successful conversion", input.display()),
                Err(e) => warn!("Failed to delete {}: {}", input.display(), e),
            }
        }

        info!(
            "Combined {} recordings in {:.1}s",
            plan.inputs.len(),
            started.elapsed().as_secs_f64()
        );

        Ok(CombineOutcome {
            status: CombineStatus::Completed,
            output: Some(plan.output.display().to_string()),
            inputs: names,
        })
    }
}
