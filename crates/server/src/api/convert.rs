//! Conversion endpoint.
//!
//! Accepts an SVG upload plus output options as a multipart form and
//! runs it through the orchestrator. Numeric options are clamped to
//! their valid ranges rather than rejected; variant flags default to
//! on, matching the upload form.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use svgmoji_core::{
    ConversionRequest, ConvertError, EmojiSpec, GifSpec, OutputArtifact, QueueStats, StickerSpec,
    VariantSet,
};

use crate::state::AppState;

const DEFAULT_GIF_WIDTH: u32 = 386;
const DEFAULT_GIF_HEIGHT: u32 = 310;
const DEFAULT_FPS: u32 = 30;
const DEFAULT_DURATION_SECS: f64 = 2.0;
const DEFAULT_EMOJI_SIZE: u32 = 100;

/// Form fields accompanying the SVG upload.
#[derive(Debug)]
struct ConvertForm {
    svg: Option<String>,
    gif_width: u32,
    gif_height: u32,
    fps: u32,
    duration_secs: f64,
    emoji_size: u32,
    generate_gif: bool,
    generate_webm: bool,
    generate_sticker: bool,
    sticker_source_w: Option<u32>,
    sticker_source_h: Option<u32>,
}

impl Default for ConvertForm {
    fn default() -> Self {
        Self {
            svg: None,
            gif_width: DEFAULT_GIF_WIDTH,
            gif_height: DEFAULT_GIF_HEIGHT,
            fps: DEFAULT_FPS,
            duration_secs: DEFAULT_DURATION_SECS,
            emoji_size: DEFAULT_EMOJI_SIZE,
            generate_gif: true,
            generate_webm: true,
            generate_sticker: true,
            sticker_source_w: None,
            sticker_source_h: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ArtifactResponse {
    pub filename: String,
    pub url: String,
    pub size_bytes: u64,
    pub meets_platform_limit: bool,
    pub width: u32,
    pub height: u32,
}

impl ArtifactResponse {
    fn from_artifact(artifact: &OutputArtifact) -> Self {
        let filename = artifact
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            url: format!("/api/download/{filename}"),
            filename,
            size_bytes: artifact.size_bytes,
            meets_platform_limit: artifact.meets_platform_limit,
            width: artifact.width,
            height: artifact.height,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub job_id: String,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gif: Option<ArtifactResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<ArtifactResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticker: Option<ArtifactResponse>,
}

#[derive(Debug, Serialize)]
pub struct ConvertErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueueStats>,
}

/// POST /api/convert
pub async fn convert(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ConvertResponse>, impl IntoResponse> {
    let form = parse_form(multipart)
        .await
        .map_err(|msg| error_response(StatusCode::BAD_REQUEST, msg, None))?;

    let variants = build_variants(&form);

    let svg = match form.svg {
        Some(svg) if svg.contains("<svg") => svg,
        Some(_) => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "Uploaded file is not an SVG document".to_string(),
                None,
            ))
        }
        None => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "No SVG file uploaded".to_string(),
                None,
            ))
        }
    };

    let job_id = Uuid::new_v4().to_string();
    info!(
        job_id = %job_id,
        gif = variants.gif.is_some(),
        emoji = variants.emoji.is_some(),
        sticker = variants.sticker.is_some(),
        "Conversion requested"
    );

    let request = ConversionRequest {
        job_id,
        svg,
        variants,
    };

    let result = state
        .orchestrator()
        .convert(request, None)
        .await
        .map_err(|e| map_convert_error(&state, e))?;

    Ok(Json(ConvertResponse {
        job_id: result.job_id,
        duration_ms: result.duration_ms,
        gif: result.outputs.gif.as_ref().map(ArtifactResponse::from_artifact),
        emoji: result.outputs.emoji.as_ref().map(ArtifactResponse::from_artifact),
        sticker: result
            .outputs
            .sticker
            .as_ref()
            .map(ArtifactResponse::from_artifact),
    }))
}

async fn parse_form(mut multipart: Multipart) -> Result<ConvertForm, String> {
    let mut form = ConvertForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Malformed multipart body: {e}"))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "svg" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| format!("Failed to read file: {e}"))?;
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|_| "Uploaded file is not valid UTF-8".to_string())?;
                form.svg = Some(text);
            }
            "gifWidth" => {
                if let Some(v) = parse_u32(field).await {
                    form.gif_width = v.clamp(16, 2048);
                }
            }
            "gifHeight" => {
                if let Some(v) = parse_u32(field).await {
                    form.gif_height = v.clamp(16, 2048);
                }
            }
            "fps" => {
                if let Some(v) = parse_u32(field).await {
                    form.fps = v.clamp(1, 60);
                }
            }
            "duration" => {
                if let Ok(text) = field.text().await {
                    if let Ok(v) = text.trim().parse::<f64>() {
                        form.duration_secs = v.clamp(0.5, 10.0);
                    }
                }
            }
            "emojiSize" => {
                if let Some(v) = parse_u32(field).await {
                    form.emoji_size = v.clamp(16, 512);
                }
            }
            "generateGif" => form.generate_gif = parse_flag(field).await,
            "generateWebm" => form.generate_webm = parse_flag(field).await,
            "generateSticker" => form.generate_sticker = parse_flag(field).await,
            "stickerSourceW" => form.sticker_source_w = parse_u32(field).await,
            "stickerSourceH" => form.sticker_source_h = parse_u32(field).await,
            _ => {}
        }
    }

    Ok(form)
}

async fn parse_u32(field: axum::extract::multipart::Field<'_>) -> Option<u32> {
    field.text().await.ok()?.trim().parse().ok()
}

/// Flags default to on; only an explicit "false" disables a variant.
async fn parse_flag(field: axum::extract::multipart::Field<'_>) -> bool {
    field.text().await.map(|t| t != "false").unwrap_or(true)
}

fn build_variants(form: &ConvertForm) -> VariantSet {
    VariantSet {
        gif: form.generate_gif.then(|| GifSpec {
            width: form.gif_width,
            height: form.gif_height,
            fps: form.fps,
            duration_secs: form.duration_secs,
        }),
        emoji: form.generate_webm.then(|| EmojiSpec {
            size: form.emoji_size,
            fps: form.fps,
            duration_secs: form.duration_secs,
        }),
        sticker: form.generate_sticker.then(|| StickerSpec {
            source_width: form.sticker_source_w.unwrap_or(form.gif_width),
            source_height: form.sticker_source_h.unwrap_or(form.gif_height),
            fps: form.fps,
            duration_secs: form.duration_secs,
        }),
    }
}

fn map_convert_error(
    state: &AppState,
    error: ConvertError,
) -> (StatusCode, Json<ConvertErrorResponse>) {
    use svgmoji_core::{AdmissionError, PoolError};

    let message = error.to_string();
    match &error {
        ConvertError::Admission(AdmissionError::CapacityExceeded { .. })
        | ConvertError::Admission(AdmissionError::QueueTimeout(_)) => error_response(
            StatusCode::TOO_MANY_REQUESTS,
            message,
            Some(state.queue_stats()),
        ),
        ConvertError::Admission(AdmissionError::ShuttingDown) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, message, None)
        }
        ConvertError::Pool(PoolError::Draining) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, message, None)
        }
        _ if error.is_invalid_input() => error_response(StatusCode::BAD_REQUEST, message, None),
        _ => error_response(StatusCode::INTERNAL_SERVER_ERROR, message, None),
    }
}

fn error_response(
    status: StatusCode,
    error: String,
    queue: Option<QueueStats>,
) -> (StatusCode, Json<ConvertErrorResponse>) {
    (status, Json(ConvertErrorResponse { error, queue }))
}
