use anyhow::anyhow;
use serde::{Deserialize, Serialize, Serializer};

// === Containers ===

/// Container extensions the service reasons about.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mp4,
    M4a,
    Webm,
    Mp3,
}

impl Container {
    pub fn from_ext(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" => Some(Container::Mp4),
            "m4a" => Some(Container::M4a),
            "webm" => Some(Container::Webm),
            "mp3" => Some(Container::Mp3),
            _ => None,
        }
    }

    pub fn ext(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::M4a => "m4a",
            Container::Webm => "webm",
            Container::Mp3 => "mp3",
        }
    }

    /// Upper-case form shown to users, e.g. `M4A`.
    pub fn label(self) -> String {
        self.ext().to_ascii_uppercase()
    }
}

// === yt-dlp Output Models ===

/// Top-level JSON from `yt-dlp --dump-single-json`. A playlist result carries
/// `entries` instead of `formats`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct VideoInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration_string: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
    #[serde(default)]
    pub entries: Option<Vec<VideoInfo>>,
}

impl VideoInfo {
    /// Unwraps a playlist result to its first entry; single videos pass through.
    pub fn into_single(self) -> anyhow::Result<VideoInfo> {
        match self.entries {
            Some(entries) => entries
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("playlist contains no entries")),
            None => Ok(self),
        }
    }
}

/// One raw format as listed by the extraction engine.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RawFormat {
    pub format_id: String,
    #[serde(default)]
    pub ext: String,
    /// `"none"` when the stream carries no video.
    #[serde(default)]
    pub vcodec: Option<String>,
    /// `"none"` when the stream carries no audio.
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Average audio bitrate in KBit/s.
    #[serde(default)]
    pub abr: Option<f64>,
    /// Audio sample rate in Hz.
    #[serde(default)]
    pub asr: Option<f64>,
}

impl RawFormat {
    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref() != Some("none")
    }

    pub fn has_audio(&self) -> bool {
        self.acodec.as_deref() != Some("none")
    }

    pub fn is_video_only(&self) -> bool {
        self.has_video() && !self.has_audio()
    }

    pub fn is_audio_only(&self) -> bool {
        self.has_audio() && !self.has_video()
    }

    pub fn container(&self) -> Option<Container> {
        Container::from_ext(&self.ext)
    }

    /// Bitrate, only when populated with a non-zero value.
    pub fn bitrate(&self) -> Option<f64> {
        self.abr.filter(|abr| *abr > 0.0)
    }

    pub fn has_sample_rate(&self) -> bool {
        self.asr.is_some_and(|asr| asr > 0.0)
    }
}

// === Menu Models ===

/// What a menu entry stands for. Clients echo it back on download so the
/// plan builder does not have to guess from the display name.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceKind {
    Video,
    NaturalAudio,
    EnhancedAudio,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VideoChoice {
    pub format_name: String,
    pub format_code: String,
    pub resolution: String,
    pub kind: ChoiceKind,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AudioChoice {
    pub format_name: String,
    pub format_code: String,
    /// Free-text quality label; named `resolution` on the wire.
    pub resolution: String,
    pub ext: String,
    #[serde(serialize_with = "serialize_bitrate")]
    pub abr: f64,
    pub kind: ChoiceKind,
}

/// Writes whole-number bitrates as JSON integers (`320`, not `320.0`).
fn serialize_bitrate<S: Serializer>(abr: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if abr.is_finite() && abr.fract() == 0.0 && *abr >= 0.0 && *abr <= u64::MAX as f64 {
        serializer.serialize_u64(*abr as u64)
    } else {
        serializer.serialize_f64(*abr)
    }
}

// === API Request/Response Models ===

/// JSON body of `POST /get_formats`.
#[derive(Deserialize, Debug, Default)]
pub struct FormatRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct FormatsResponse {
    pub status: &'static str,
    pub title: String,
    pub duration: String,
    pub views: u64,
    pub channel: String,
    pub thumbnail: Option<String>,
    pub video_formats: Vec<VideoChoice>,
    pub audio_formats: Vec<AudioChoice>,
}

/// JSON body of `POST /download_specific`.
#[derive(Deserialize, Debug, Default)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub format_code: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub format_name: Option<String>,
    /// Echo of the menu entry's `kind`; older clients omit it.
    #[serde(default)]
    pub kind: Option<ChoiceKind>,
}

#[derive(Serialize, Debug)]
pub struct DownloadResponse {
    pub status: &'static str,
    pub title: String,
    pub format: String,
    pub message: String,
}
