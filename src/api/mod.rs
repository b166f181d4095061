pub mod channels;
pub mod ingest;
pub mod metrics;
pub mod updates;

pub use channels::{channel_events, get_channel, list_channels, list_processes, remove_channel, trigger_sweep};
pub use ingest::ingest_messages;
pub use metrics::get_metrics;
pub use updates::{recent_updates, stream_updates};

use actix_web::{web, HttpResponse, Responder};

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy"
    }))
}

/// 注册全部路由
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/messages", web::post().to(ingest_messages))
        .route("/api/channels", web::get().to(list_channels))
        .route("/api/channels/{id}", web::get().to(get_channel))
        .route("/api/channels/{id}", web::delete().to(remove_channel))
        .route("/api/channels/{id}/events", web::get().to(channel_events))
        .route("/api/processes", web::get().to(list_processes))
        .route("/api/sweep", web::post().to(trigger_sweep))
        .route("/api/updates", web::get().to(recent_updates))
        .route("/api/updates/stream", web::get().to(stream_updates))
        .route("/metrics", web::get().to(get_metrics))
        .route("/health", web::get().to(health));
}
