use actix_web::{web, HttpResponse, Responder};

use crate::metrics::METRICS;
use crate::services::now_millis;
use crate::state::AppState;

pub async fn list_channels(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.engine.channel_states())
}

pub async fn get_channel(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    match data.engine.channel_state(&id) {
        Some(state) => HttpResponse::Ok().json(state),
        None => not_found(&id),
    }
}

/// 完整事件历史；已读/未读由调用方自行处理
pub async fn channel_events(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    match data.engine.channel_events(&id) {
        Some(events) => HttpResponse::Ok().json(events),
        None => not_found(&id),
    }
}

pub async fn remove_channel(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    if data.engine.remove_channel(&id) {
        METRICS.reset_channel(&id);
        HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "message": format!("Channel '{}' removed", id)
        }))
    } else {
        not_found(&id)
    }
}

pub async fn list_processes(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.engine.running_processes())
}

/// 立即执行一次延迟扫描和超时检查
pub async fn trigger_sweep(data: web::Data<AppState>) -> impl Responder {
    let now = now_millis();
    let alerts = data.engine.sweep_delays(now);
    let timed_out = data.engine.expire_timeouts(now);
    METRICS.record_alerts(&alerts);
    METRICS.record_timeouts(&timed_out);

    HttpResponse::Ok().json(serde_json::json!({
        "alerts": alerts,
        "timed_out": timed_out
    }))
}

fn not_found(id: &str) -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({
        "status": "error",
        "message": format!("Channel '{}' not found", id)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::RawMessage;
    use crate::state::new_state;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};

    #[actix_rt::test]
    async fn test_channel_lifecycle_endpoints() {
        let state = new_state(EngineConfig::default()).unwrap();
        let started = now_millis() as f64 / 1000.0 - 3630.0;
        state
            .engine
            .ingest(&RawMessage::new("C01", "KBAuto 요청갯수 : 10", started), now_millis());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/channels/C01").to_request();
        let channel: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(channel["status"], "in_progress");
        assert_eq!(channel["requested_count"], 10);

        let req = test::TestRequest::post().uri("/api/sweep").to_request();
        let sweep: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(sweep["alerts"].as_array().unwrap().len(), 1);
        assert_eq!(sweep["alerts"][0]["elapsed_minutes"], 60);

        let req = test::TestRequest::get().uri("/api/processes").to_request();
        let running: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(running.as_array().unwrap().is_empty());

        let req = test::TestRequest::delete().uri("/api/channels/C01").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/channels/C01/events").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
