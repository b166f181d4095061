use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;

use crate::metrics::METRICS;
use crate::models::RawMessage;
use crate::services::now_millis;
use crate::state::AppState;

/// Webhook 请求体：单条、数组或 {"messages": [...]}
#[derive(Deserialize)]
#[serde(untagged)]
pub enum IngestRequest {
    Batch(Vec<RawMessage>),
    Wrapped { messages: Vec<RawMessage> },
    Single(RawMessage),
}

impl IngestRequest {
    fn into_messages(self) -> Vec<RawMessage> {
        match self {
            IngestRequest::Batch(messages) | IngestRequest::Wrapped { messages } => messages,
            IngestRequest::Single(message) => vec![message],
        }
    }
}

pub async fn ingest_messages(
    data: web::Data<AppState>,
    req: web::Json<IngestRequest>,
) -> impl Responder {
    let messages = req.into_inner().into_messages();
    let received = messages.len();

    let report = data.engine.ingest_batch(messages, now_millis());
    METRICS.record_ingest(&report);

    log::debug!(
        "Webhook batch: {} received, {} accepted, {} duplicates",
        received,
        report.accepted,
        report.duplicates
    );

    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "received": received,
        "accepted": report.accepted,
        "duplicates": report.duplicates,
        "completed_processes": report.completed_processes
    }))
}
