use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    /// A required request field was absent or empty.
    MissingInput(String),
    /// The ranker produced neither video nor audio choices.
    NoFormatsAvailable,
    /// The extraction engine failed while listing formats.
    Extraction(anyhow::Error),
    /// The download/transcode engine failed.
    Download(anyhow::Error),
    Internal(anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingInput(_) => StatusCode::BAD_REQUEST,
            AppError::NoFormatsAvailable => StatusCode::NOT_FOUND,
            AppError::Extraction(_) | AppError::Download(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The user-facing text placed in the `message` field.
    pub fn message(&self) -> String {
        match self {
            AppError::MissingInput(msg) => msg.clone(),
            AppError::NoFormatsAvailable => {
                "No downloadable format was found for this video.".to_string()
            }
            AppError::Extraction(e) => format!(
                "Failed to fetch formats. Cause: {}. Please run 'pip install --upgrade yt-dlp' and try again.",
                e
            ),
            AppError::Download(e) => format!(
                "Download failed. Cause: {}. Please 1) install or verify FFmpeg, and 2) run 'pip install --upgrade yt-dlp'.",
                e
            ),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Internal(e) => tracing::error!("Internal server error: {:?}", e),
            AppError::Extraction(e) => tracing::error!("Format extraction error (yt-dlp): {}", e),
            AppError::Download(e) => tracing::error!("Download error (yt-dlp): {}", e),
            _ => {}
        }

        let body = Json(json!({ "status": "error", "message": self.message() }));
        (self.status_code(), body).into_response()
    }
}

// Lets `?` turn any stray error into `AppError::Internal`.
impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}
