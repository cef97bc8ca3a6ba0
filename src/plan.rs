use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::models::{ChoiceKind, Container};
use crate::ranker::{ENHANCED_AUDIO_BITRATE, ENHANCED_AUDIO_CONTAINER, VIDEO_CONTAINER};

static ILLEGAL_FILENAME_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]"#).unwrap());

/// Token yt-dlp uses to join a video and an audio selector into one merge.
pub const MERGE_COMBINATOR: char = '+';
/// Label prefix older clients send back for the 8D entry.
pub const ENHANCED_AUDIO_MARKER: &str = "8D Surround Sound";
/// Output extension placeholder resolved by yt-dlp itself.
pub const NATIVE_EXT_PLACEHOLDER: &str = "%(ext)s";

/// FFmpeg filter chain that produces the 8D effect.
pub const EIGHT_D_FILTER_CHAIN: &str = "aresample=44100,channelsplit=channel_layout=stereo:channels=FL|FR,apulsator=hz=0.08:volume=1:offset=0.25,loudnorm";

/// Which of the three download paths a request takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Merge,
    EnhancedAudio,
    Plain,
}

impl Selection {
    /// A merge selector always wins. Otherwise the echoed `kind` or, for
    /// clients that do not send it, the reserved label marks the 8D entry.
    pub fn resolve(kind: Option<ChoiceKind>, format_code: &str, format_name: &str) -> Self {
        if format_code.contains(MERGE_COMBINATOR) {
            Selection::Merge
        } else if kind == Some(ChoiceKind::EnhancedAudio) || format_name.contains(ENHANCED_AUDIO_MARKER) {
            Selection::EnhancedAudio
        } else {
            Selection::Plain
        }
    }
}

/// One post-processing step for the download engine, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub enum PostProcessor {
    /// Re-containerizes the (merged) video.
    ConvertVideo { container: Container },
    /// Extracts the audio stream and transcodes it.
    ExtractAudio { codec: Container, quality_kbps: u32 },
    /// Runs an FFmpeg `-af` filter chain over the extracted audio.
    AudioFilter { filter_chain: String },
}

/// Everything the download engine needs to run one job.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadPlan {
    pub url: String,
    pub format_code: String,
    pub output_template: String,
    pub merge: bool,
    pub postprocessors: Vec<PostProcessor>,
    pub output_container: Option<Container>,
}

/// Escapes `%` so yt-dlp copies the text into the file name literally.
fn escape_template(text: &str) -> String {
    text.replace('%', "%%")
}

/// Removes characters that are illegal in common filesystems.
pub fn sanitize_title(title: &str) -> String {
    ILLEGAL_FILENAME_CHARS.replace_all(title, "").into_owned()
}

/// Builds the job for a chosen menu entry. `url` must already be normalized.
pub fn build_plan(
    url: &str,
    format_code: &str,
    format_name: &str,
    title: &str,
    kind: Option<ChoiceKind>,
    download_dir: &Path,
) -> DownloadPlan {
    let (merge, postprocessors, output_container) = match Selection::resolve(kind, format_code, format_name) {
        Selection::Merge => (
            true,
            vec![PostProcessor::ConvertVideo { container: VIDEO_CONTAINER }],
            Some(VIDEO_CONTAINER),
        ),
        Selection::EnhancedAudio => (
            false,
            vec![
                PostProcessor::ExtractAudio {
                    codec: ENHANCED_AUDIO_CONTAINER,
                    quality_kbps: ENHANCED_AUDIO_BITRATE,
                },
                PostProcessor::AudioFilter {
                    filter_chain: EIGHT_D_FILTER_CHAIN.to_string(),
                },
            ],
            Some(ENHANCED_AUDIO_CONTAINER),
        ),
        Selection::Plain => (false, Vec::new(), None),
    };

    let out_ext = output_container.map_or(NATIVE_EXT_PLACEHOLDER, Container::ext);
    let file_name = format!(
        "{} - {}.{}",
        escape_template(&sanitize_title(title)),
        escape_template(&sanitize_title(format_name)),
        out_ext
    );

    DownloadPlan {
        url: url.to_string(),
        format_code: format_code.to_string(),
        output_template: download_dir.join(file_name).to_string_lossy().to_string(),
        merge,
        postprocessors,
        output_container,
    }
}
