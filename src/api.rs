use std::sync::Arc;
use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::briefs::{Channel, ChannelSelection};
use crate::error::PipelineError;
use crate::pipeline::{GenerationReport, Pipeline};
use crate::reference::ReferenceImage;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/briefs", get(list_briefs))
        .route("/api/generate", post(generate))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(AppState { pipeline })
}

pub async fn serve(bind: String, pipeline: Arc<Pipeline>) -> Result<()> {
    let app = router(pipeline);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!("contentgen API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Serialize)]
struct BriefItem {
    channel: Channel,
    name: &'static str,
    count: usize,
    personas: Vec<String>,
    concepts: Vec<String>,
}

async fn list_briefs(State(st): State<AppState>) -> Json<Vec<BriefItem>> {
    let items = st
        .pipeline
        .briefs()
        .iter()
        .map(|b| BriefItem {
            channel: b.channel,
            name: b.channel.display_name(),
            count: b.count,
            personas: b.personas.iter().map(|p| p.name.clone()).collect(),
            concepts: b.concepts.clone(),
        })
        .collect();
    Json(items)
}

/// Multipart fields: `title`, `channel` (amazon | meta | both, default both), `image`.
async fn generate(State(st): State<AppState>, mut form: Multipart) -> Result<Json<GenerationReport>, ApiErr> {
    let mut title: Option<String> = None;
    let mut selection = ChannelSelection::Both;
    let mut upload: Option<(Vec<u8>, String)> = None;

    while let Some(field) = form.next_field().await.map_err(|e| ApiErr::bad_request(e.to_string()))? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => title = Some(field.text().await.map_err(|e| ApiErr::bad_request(e.to_string()))?),
            "channel" => {
                let raw = field.text().await.map_err(|e| ApiErr::bad_request(e.to_string()))?;
                selection = ChannelSelection::parse(&raw)
                    .ok_or_else(|| ApiErr::bad_request(format!("unknown channel '{raw}', expected amazon, meta or both")))?;
            }
            "image" => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(|e| ApiErr::bad_request(e.to_string()))?;
                if !bytes.is_empty() {
                    upload = Some((bytes.to_vec(), name));
                }
            }
            _ => {}
        }
    }

    let title = title.unwrap_or_default();
    if title.trim().is_empty() {
        return Err(PipelineError::UserInputIncomplete("product title".into()).into());
    }
    let Some((bytes, name)) = upload else {
        return Err(PipelineError::UserInputIncomplete("reference image".into()).into());
    };

    let reference = tokio::task::spawn_blocking(move || ReferenceImage::from_bytes(&bytes, &name))
        .await
        .map_err(ApiErr::internal)??;

    let report = st.pipeline.generate(&title, Some(&reference), selection).await?;
    Ok(Json(report))
}

#[derive(Debug)]
struct ApiErr {
    status: StatusCode,
    code: String,
    message: String,
    raw: Option<String>,
}

impl ApiErr {
    fn internal(e: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal_error".to_string(),
            message: format!("Internal error: {}", e),
            raw: None,
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, code: "bad_request".to_string(), message: message.into(), raw: None }
    }
}

impl From<PipelineError> for ApiErr {
    fn from(e: PipelineError) -> Self {
        let status = match &e {
            PipelineError::UserInputIncomplete(_) => StatusCode::BAD_REQUEST,
            PipelineError::MalformedModelOutput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Upstream { .. } | PipelineError::Transport { .. } => StatusCode::BAD_GATEWAY,
            PipelineError::MissingCredential(_) | PipelineError::Config(_) | PipelineError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        tracing::warn!(code = e.code(), error = %e, "generation request failed");
        Self { status, code: e.code().to_string(), message: e.to_string(), raw: e.raw_body().map(str::to_string) }
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> axum::response::Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            code: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            raw: Option<String>,
        }
        (self.status, Json(ErrorResponse { error: self.message, code: self.code, raw: self.raw })).into_response()
    }
}
