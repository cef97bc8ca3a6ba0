use crate::{
    error::AppError,
    models::{DownloadRequest, DownloadResponse, FormatRequest, FormatsResponse},
    plan::build_plan,
    ranker::rank_formats,
    url::normalize_url,
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::path::PathBuf;

/// Returns the field's value, or `None` when it is absent or blank.
fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ===================================================================
//                          FORMATS HANDLER
// ===================================================================

/// # POST /get_formats - Lists the video and audio menus for a URL.
pub async fn get_formats(
    State(state): State<AppState>,
    payload: Result<Json<FormatRequest>, JsonRejection>,
) -> Result<Json<FormatsResponse>, AppError> {
    let url = payload
        .ok()
        .and_then(|Json(req)| required(req.url))
        .ok_or_else(|| AppError::MissingInput("No URL was provided.".to_string()))?;

    let cleaned_url = normalize_url(&url);
    tracing::info!("Fetching formats for URL: {}", cleaned_url);

    let info = state
        .engine
        .extract_info(&cleaned_url)
        .await
        .and_then(|info| info.into_single())
        .map_err(AppError::Extraction)?;

    let (video_formats, audio_formats) = rank_formats(&info.formats);
    if video_formats.is_empty() && audio_formats.is_empty() {
        return Err(AppError::NoFormatsAvailable);
    }

    let title = info.title.unwrap_or_else(|| "Unknown Title".to_string());
    tracing::info!(
        "Built {} video and {} audio choices from {} formats for '{}'",
        video_formats.len(),
        audio_formats.len(),
        info.formats.len(),
        title
    );

    Ok(Json(FormatsResponse {
        status: "success",
        title,
        duration: info.duration_string.unwrap_or_else(|| "N/A".to_string()),
        views: info.view_count.unwrap_or(0),
        channel: info.uploader.unwrap_or_else(|| "Unknown".to_string()),
        thumbnail: info.thumbnail,
        video_formats,
        audio_formats,
    }))
}

// ===================================================================
//                          DOWNLOAD HANDLER
// ===================================================================

/// # POST /download_specific - Downloads one menu entry and waits for it to finish.
pub async fn download_specific(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Json<DownloadResponse>, AppError> {
    let Json(req) = payload.map_err(|_| AppError::MissingInput("URL or format code is missing.".to_string()))?;

    let (Some(url), Some(format_code)) = (required(req.url), required(req.format_code)) else {
        return Err(AppError::MissingInput("URL or format code is missing.".to_string()));
    };
    let title = required(req.title).ok_or_else(|| AppError::MissingInput("Video title is missing.".to_string()))?;
    let format_name = required(req.format_name).unwrap_or_else(|| format_code.clone());

    let cleaned_url = normalize_url(&url);
    tracing::info!("Starting download for: {} ({})", title, format_name);

    let download_dir = PathBuf::from(&state.config.download_directory);
    tokio::fs::create_dir_all(&download_dir)
        .await
        .map_err(|e| AppError::Download(anyhow::anyhow!("cannot create {}: {}", download_dir.display(), e)))?;

    let plan = build_plan(&cleaned_url, &format_code, &format_name, &title, req.kind, &download_dir);
    state.engine.download(&plan).await.map_err(AppError::Download)?;

    tracing::info!("Finished download: {}", plan.output_template);
    Ok(Json(DownloadResponse {
        status: "success",
        title,
        format: format_name,
        message: "Download successful!".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        engine::MediaEngine,
        models::{ChoiceKind, Container, RawFormat, VideoInfo},
        plan::{DownloadPlan, PostProcessor},
    };
    use anyhow::anyhow;
    use async_trait::async_trait;
    use axum::{body::to_bytes, http::StatusCode, response::IntoResponse};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeEngine {
        info: Option<VideoInfo>,
        fail_download: Option<String>,
        extracted_urls: Mutex<Vec<String>>,
        plans: Mutex<Vec<DownloadPlan>>,
    }

    #[async_trait]
    impl MediaEngine for FakeEngine {
        async fn extract_info(&self, url: &str) -> anyhow::Result<VideoInfo> {
            self.extracted_urls.lock().unwrap().push(url.to_string());
            self.info.clone().ok_or_else(|| anyhow!("ERROR: Video unavailable"))
        }

        async fn download(&self, plan: &DownloadPlan) -> anyhow::Result<()> {
            self.plans.lock().unwrap().push(plan.clone());
            match &self.fail_download {
                Some(msg) => Err(anyhow!(msg.clone())),
                None => Ok(()),
            }
        }
    }

    fn state_with(engine: FakeEngine) -> (AppState, Arc<FakeEngine>) {
        let engine = Arc::new(engine);
        let download_dir = std::env::temp_dir().join("media-menu-handler-tests");
        let state = AppState {
            config: Arc::new(Config {
                download_directory: download_dir.to_string_lossy().to_string(),
                ..Config::default()
            }),
            engine: engine.clone(),
        };
        (state, engine)
    }

    fn sample_info() -> VideoInfo {
        VideoInfo {
            title: Some("Demo".into()),
            duration_string: Some("3:32".into()),
            view_count: Some(1234),
            uploader: Some("Channel".into()),
            thumbnail: Some("https://i.ytimg.com/vi/abc/hq.jpg".into()),
            formats: vec![
                RawFormat {
                    format_id: "137".into(),
                    ext: "mp4".into(),
                    vcodec: Some("avc1".into()),
                    acodec: Some("none".into()),
                    height: Some(1080),
                    ..RawFormat::default()
                },
                RawFormat {
                    format_id: "22".into(),
                    ext: "mp4".into(),
                    vcodec: Some("avc1".into()),
                    acodec: Some("mp4a.40.2".into()),
                    height: Some(720),
                    ..RawFormat::default()
                },
                RawFormat {
                    format_id: "140".into(),
                    ext: "m4a".into(),
                    vcodec: Some("none".into()),
                    acodec: Some("mp4a.40.2".into()),
                    abr: Some(128.0),
                    asr: Some(44100.0),
                    ..RawFormat::default()
                },
            ],
            entries: None,
        }
    }

    fn format_request(url: Option<&str>) -> Result<Json<FormatRequest>, JsonRejection> {
        Ok(Json(FormatRequest { url: url.map(String::from) }))
    }

    fn download_request(
        format_code: &str,
        format_name: &str,
        kind: Option<ChoiceKind>,
    ) -> Result<Json<DownloadRequest>, JsonRejection> {
        Ok(Json(DownloadRequest {
            url: Some("https://www.youtube.com/watch?v=abc&list=PL1".into()),
            format_code: Some(format_code.into()),
            title: Some("Demo: Part 1?".into()),
            format_name: Some(format_name.into()),
            kind,
        }))
    }

    async fn error_body(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn formats_lists_menus_for_normalized_url() {
        let (state, engine) = state_with(FakeEngine {
            info: Some(sample_info()),
            ..FakeEngine::default()
        });

        let Json(resp) = get_formats(State(state), format_request(Some("https://youtu.be/abc?si=x")))
            .await
            .unwrap();

        assert_eq!(engine.extracted_urls.lock().unwrap().as_slice(), ["https://youtu.be/abc"]);
        assert_eq!(resp.status, "success");
        assert_eq!(resp.title, "Demo");
        assert_eq!(resp.views, 1234);
        assert_eq!(resp.video_formats.len(), 1);
        assert_eq!(resp.video_formats[0].format_name, "1080p MP4");
        assert_eq!(resp.audio_formats.len(), 2);
        assert_eq!(resp.audio_formats[0].kind, ChoiceKind::EnhancedAudio);
        assert_eq!(resp.audio_formats[1].format_name, "Highest Quality (128kbps M4A)");

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["audio_formats"][0]["abr"].as_u64(), Some(320));
        assert_eq!(json["audio_formats"][0]["ext"], "MP3");
        assert_eq!(json["channel"], "Channel");
    }

    #[tokio::test]
    async fn formats_takes_first_playlist_entry_and_fills_defaults() {
        let mut entry = sample_info();
        entry.title = None;
        entry.uploader = None;
        entry.view_count = None;
        entry.duration_string = None;
        let (state, _) = state_with(FakeEngine {
            info: Some(VideoInfo {
                title: Some("Playlist".into()),
                entries: Some(vec![entry, VideoInfo::default()]),
                ..VideoInfo::default()
            }),
            ..FakeEngine::default()
        });

        let Json(resp) = get_formats(State(state), format_request(Some("https://youtu.be/abc")))
            .await
            .unwrap();
        assert_eq!(resp.title, "Unknown Title");
        assert_eq!(resp.channel, "Unknown");
        assert_eq!(resp.duration, "N/A");
        assert_eq!(resp.views, 0);
        assert_eq!(resp.video_formats.len(), 1);
    }

    #[tokio::test]
    async fn formats_rejects_missing_url() {
        let (state, engine) = state_with(FakeEngine::default());
        let err = get_formats(State(state.clone()), format_request(None)).await.unwrap_err();
        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let err = get_formats(State(state), format_request(Some("  "))).await.unwrap_err();
        assert!(matches!(err, AppError::MissingInput(_)));
        assert!(engine.extracted_urls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn formats_without_eligible_streams_is_not_found() {
        let mut info = sample_info();
        info.formats.retain(|f| f.format_id == "22");
        let (state, _) = state_with(FakeEngine {
            info: Some(info),
            ..FakeEngine::default()
        });

        let err = get_formats(State(state), format_request(Some("https://youtu.be/abc")))
            .await
            .unwrap_err();
        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn formats_reports_extraction_failure() {
        let (state, _) = state_with(FakeEngine::default());
        let err = get_formats(State(state), format_request(Some("https://youtu.be/gone")))
            .await
            .unwrap_err();
        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("Video unavailable"));
        assert!(message.contains("--upgrade yt-dlp"));
    }

    #[tokio::test]
    async fn download_of_enhanced_entry_builds_mp3_plan() {
        let (state, engine) = state_with(FakeEngine::default());

        let Json(resp) = download_specific(
            State(state),
            download_request("140", "8D Surround Sound (FFmpeg)", Some(ChoiceKind::EnhancedAudio)),
        )
        .await
        .unwrap();
        assert_eq!(resp.status, "success");
        assert_eq!(resp.title, "Demo: Part 1?");
        assert_eq!(resp.format, "8D Surround Sound (FFmpeg)");

        let plans = engine.plans.lock().unwrap();
        let plan = &plans[0];
        assert_eq!(plan.url, "https://www.youtube.com/watch");
        assert_eq!(plan.postprocessors.len(), 2);
        assert_eq!(plan.output_container, Some(Container::Mp3));
        assert!(plan
            .output_template
            .ends_with("Demo Part 1 - 8D Surround Sound (FFmpeg).mp3"));
    }

    #[tokio::test]
    async fn download_of_video_entry_merges() {
        let (state, engine) = state_with(FakeEngine::default());
        download_specific(
            State(state),
            download_request("bestvideo[height<=1080][ext=mp4]+bestaudio[ext=m4a]", "1080p MP4", None),
        )
        .await
        .unwrap();

        let plans = engine.plans.lock().unwrap();
        assert!(plans[0].merge);
        assert_eq!(
            plans[0].postprocessors[0],
            PostProcessor::ConvertVideo { container: Container::Mp4 }
        );
    }

    #[tokio::test]
    async fn download_rejects_missing_fields() {
        let (state, engine) = state_with(FakeEngine::default());

        let mut req = DownloadRequest {
            url: Some("https://youtu.be/abc".into()),
            title: Some("Demo".into()),
            ..DownloadRequest::default()
        };
        let err = download_specific(State(state.clone()), Ok(Json(req))).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        req = DownloadRequest {
            url: Some("https://youtu.be/abc".into()),
            format_code: Some("140".into()),
            ..DownloadRequest::default()
        };
        let err = download_specific(State(state), Ok(Json(req))).await.unwrap_err();
        assert!(matches!(err, AppError::MissingInput(_)));

        assert!(engine.plans.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unwritable_download_dir_is_a_download_failure() {
        let blocker = std::env::temp_dir().join("media-menu-handler-tests-blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let engine = Arc::new(FakeEngine::default());
        let state = AppState {
            config: Arc::new(Config {
                download_directory: blocker.join("nested").to_string_lossy().to_string(),
                ..Config::default()
            }),
            engine: engine.clone(),
        };

        let err = download_specific(State(state), download_request("140", "128kbps (M4A)", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Download(_)));
        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("cannot create"));
        assert!(message.contains("FFmpeg"));
        assert!(engine.plans.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn download_failure_embeds_engine_error() {
        let (state, _) = state_with(FakeEngine {
            fail_download: Some("ffprobe and ffmpeg not found".into()),
            ..FakeEngine::default()
        });

        let err = download_specific(State(state), download_request("140", "128kbps (M4A)", None))
            .await
            .unwrap_err();
        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("ffprobe and ffmpeg not found"));
        assert!(message.contains("FFmpeg"));
    }
}
