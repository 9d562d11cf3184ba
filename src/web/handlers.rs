use actix_web::{web, HttpResponse, Responder};
use log::{error, info};
use serde_json::json;
use tokio::sync::mpsc;

use crate::error::RelayError;
use crate::relay::{FragmentStream, RelaySession};
use crate::web::models::{ChatRequest, ModelList};
use crate::AppState;

// Health check endpoint
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

// Model listing, proxied from the backend; refreshes the catalog as a side effect
pub async fn models(data: web::Data<AppState>) -> Result<HttpResponse, RelayError> {
    let models = data.backend.list_models().await.map_err(|e| {
        error!("Ollama connect error: {}", e);
        e
    })?;
    data.catalog.record(&models);
    Ok(HttpResponse::Ok().json(ModelList { models }))
}

// Chat relay endpoint
pub async fn chat(
    data: web::Data<AppState>,
    req: web::Json<ChatRequest>,
) -> Result<HttpResponse, RelayError> {
    let ChatRequest {
        model,
        messages,
        stream,
    } = req.into_inner();

    data.catalog.ensure_valid(&model, &data.backend).await?;
    if messages.is_empty() {
        return Err(RelayError::InvalidRequest(
            "at least one message is required".to_string(),
        ));
    }

    if stream == Some(false) {
        let answer = data.backend.chat(&model, &messages).await?;
        return Ok(HttpResponse::Ok().json(answer));
    }

    let session = RelaySession::new(&data.config);
    let session_id = session.id();
    info!(
        "Relay session {} started: model {}, {} messages",
        session_id,
        model,
        messages.len()
    );

    // Failures up to here answer with a JSON error; after this point they end the body.
    let chunks = data.backend.open_chat_stream(&model, &messages).await?;

    let (tx, rx) = mpsc::channel(data.config.channel_capacity);
    let body = FragmentStream::new(rx, session.cancel_token());
    actix_web::rt::spawn(session.pump(chunks, tx));

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .insert_header(("X-Relay-Session", session_id.to_string()))
        .streaming(body))
}
