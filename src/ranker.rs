//! Turns the raw format list from yt-dlp into the video and audio menus.
//!
//! Muxed formats are never offered. Video entries always ask yt-dlp to merge
//! the best video at a tier with the best m4a audio, and audio entries point
//! at one exact audio-only format.

use crate::models::{AudioChoice, ChoiceKind, Container, RawFormat, VideoChoice};

/// Standard vertical-resolution buckets, in menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    P2160,
    P1440,
    P1080,
    P720,
    P480,
    P360,
}

impl Tier {
    pub const ALL: [Tier; 6] = [
        Tier::P2160,
        Tier::P1440,
        Tier::P1080,
        Tier::P720,
        Tier::P480,
        Tier::P360,
    ];

    pub fn height(self) -> u32 {
        match self {
            Tier::P2160 => 2160,
            Tier::P1440 => 1440,
            Tier::P1080 => 1080,
            Tier::P720 => 720,
            Tier::P480 => 480,
            Tier::P360 => 360,
        }
    }

    pub fn from_height(height: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|tier| tier.height() == height)
    }

    fn choice(self) -> VideoChoice {
        let height = self.height();
        VideoChoice {
            format_name: format!("{}p {}", height, VIDEO_CONTAINER.label()),
            format_code: format!(
                "bestvideo[height<={}][ext={}]+bestaudio[ext={}]",
                height,
                VIDEO_CONTAINER.ext(),
                MERGE_AUDIO_CONTAINER.ext()
            ),
            resolution: format!("{}p", height),
            kind: ChoiceKind::Video,
        }
    }
}

/// Container every video entry is filtered on and merged into.
pub const VIDEO_CONTAINER: Container = Container::Mp4;
/// Container of the audio half of a merged video entry.
pub const MERGE_AUDIO_CONTAINER: Container = Container::M4a;
/// Audio containers offered as plain downloads, in no particular order.
pub const NATURAL_AUDIO_CONTAINERS: [Container; 2] = [Container::M4a, Container::Webm];

pub const ENHANCED_AUDIO_LABEL: &str = "8D Surround Sound (FFmpeg)";
pub const ENHANCED_AUDIO_QUALITY: &str = "8D Audio";
pub const ENHANCED_AUDIO_CONTAINER: Container = Container::Mp3;
pub const ENHANCED_AUDIO_BITRATE: u32 = 320;

/// Builds `(video_choices, audio_choices)` from the engine's format list.
pub fn rank_formats(formats: &[RawFormat]) -> (Vec<VideoChoice>, Vec<AudioChoice>) {
    (video_choices(formats), audio_choices(formats))
}

pub fn video_choices(formats: &[RawFormat]) -> Vec<VideoChoice> {
    let mut present = [false; Tier::ALL.len()];

    for format in formats {
        if !format.is_video_only() || format.container() != Some(VIDEO_CONTAINER) {
            continue;
        }
        if let Some(tier) = format.height.and_then(Tier::from_height) {
            // Only presence matters; the selector is derived from the tier.
            present[tier as usize] = true;
        }
    }

    Tier::ALL
        .into_iter()
        .filter(|tier| present[*tier as usize])
        .map(Tier::choice)
        .collect()
}

pub fn audio_choices(formats: &[RawFormat]) -> Vec<AudioChoice> {
    let mut candidates: Vec<(&RawFormat, f64)> = formats
        .iter()
        .filter(|f| f.is_audio_only() && f.has_sample_rate())
        .filter_map(|f| f.bitrate().map(|abr| (f, abr)))
        .collect();
    // Stable sort: equal bitrates keep the engine's order.
    candidates.sort_by(|(_, a), (_, b)| b.total_cmp(a));

    let mut choices: Vec<AudioChoice> = Vec::new();
    let mut seen_bitrates: Vec<f64> = Vec::new();

    for (format, abr) in candidates {
        let Some(container) = format
            .container()
            .filter(|c| NATURAL_AUDIO_CONTAINERS.contains(c))
        else {
            continue;
        };
        if seen_bitrates.contains(&abr) {
            continue;
        }

        let quality_tag = if choices.is_empty() {
            format!("Highest Quality ({}kbps {})", abr, container.label())
        } else {
            format!("{}kbps ({})", abr, container.label())
        };

        choices.push(AudioChoice {
            format_name: quality_tag.clone(),
            format_code: format.format_id.clone(),
            resolution: quality_tag,
            ext: container.label(),
            abr,
            kind: ChoiceKind::NaturalAudio,
        });
        seen_bitrates.push(abr);
    }

    if let Some(enhanced) = choices.first().map(enhanced_choice) {
        choices.push(enhanced);
    }

    choices.reverse();
    choices
}

/// The synthesized 8D entry, re-using the source entry's selector.
fn enhanced_choice(source: &AudioChoice) -> AudioChoice {
    AudioChoice {
        format_name: ENHANCED_AUDIO_LABEL.to_string(),
        format_code: source.format_code.clone(),
        resolution: ENHANCED_AUDIO_QUALITY.to_string(),
        ext: ENHANCED_AUDIO_CONTAINER.label(),
        abr: f64::from(ENHANCED_AUDIO_BITRATE),
        kind: ChoiceKind::EnhancedAudio,
    }
}
