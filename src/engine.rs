use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use crate::config::Config;
use crate::models::VideoInfo;
use crate::plan::{DownloadPlan, PostProcessor};

/// The external extraction and download/transcode engine.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Fetches metadata and the raw format list without downloading media.
    async fn extract_info(&self, url: &str) -> Result<VideoInfo>;

    /// Runs a plan to completion, writing files to its output template.
    async fn download(&self, plan: &DownloadPlan) -> Result<()>;
}

/// `MediaEngine` backed by the `yt-dlp` binary (which drives FFmpeg).
pub struct YtDlp {
    binary: String,
    ffmpeg_location: Option<String>,
}

impl YtDlp {
    pub fn from_config(config: &Config) -> Self {
        Self {
            binary: config.ytdlp_path.clone(),
            ffmpeg_location: config.ffmpeg_location.clone(),
        }
    }
}

#[async_trait]
impl MediaEngine for YtDlp {
    async fn extract_info(&self, url: &str) -> Result<VideoInfo> {
        let output = Command::new(&self.binary)
            .args(extract_args(url))
            .output()
            .await
            .map_err(|e| anyhow!("Failed to start {}: {}", self.binary, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!("yt-dlp failed: {}", stderr);
            return Err(anyhow!(stderr));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }

    async fn download(&self, plan: &DownloadPlan) -> Result<()> {
        let args = download_args(plan, self.ffmpeg_location.as_deref());
        tracing::debug!("Running {} {:?}", self.binary, args);

        // stdout is inherited so yt-dlp's own progress shows in the server log.
        let output = Command::new(&self.binary)
            .args(&args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| anyhow!("Failed to start {}: {}", self.binary, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!("Download failed for {}: {}", plan.url, stderr);
            return Err(anyhow!(stderr));
        }
        Ok(())
    }
}

fn extract_args(url: &str) -> Vec<String> {
    [
        "--dump-single-json",
        "--simulate",
        "--playlist-items",
        "1",
        "--no-warnings",
        "--",
        url,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Translates a plan into yt-dlp command-line arguments, URL last after `--`
/// so a client-supplied URL is never parsed as an option.
pub fn download_args(plan: &DownloadPlan, ffmpeg_location: Option<&str>) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-f".into(),
        plan.format_code.clone(),
        "-o".into(),
        plan.output_template.clone(),
        "--no-playlist".into(),
    ];

    if plan.merge {
        if let Some(container) = plan.output_container {
            args.push("--merge-output-format".into());
            args.push(container.ext().into());
        }
    }

    for step in &plan.postprocessors {
        match step {
            PostProcessor::ConvertVideo { container } => {
                args.push("--recode-video".into());
                args.push(container.ext().into());
            }
            PostProcessor::ExtractAudio { codec, quality_kbps } => {
                args.push("--extract-audio".into());
                args.push("--audio-format".into());
                args.push(codec.ext().into());
                args.push("--audio-quality".into());
                args.push(format!("{}K", quality_kbps));
            }
            PostProcessor::AudioFilter { filter_chain } => {
                args.push("--postprocessor-args".into());
                args.push(format!("ExtractAudio+ffmpeg_o:-af {}", filter_chain));
            }
        }
    }

    if let Some(location) = ffmpeg_location {
        args.push("--ffmpeg-location".into());
        args.push(location.to_string());
    }

    args.push("--".into());
    args.push(plan.url.clone());
    args
}
