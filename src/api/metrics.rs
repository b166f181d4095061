use actix_web::{web, HttpResponse, Responder};

use crate::metrics::METRICS;
use crate::state::AppState;

pub async fn get_metrics(data: web::Data<AppState>) -> impl Responder {
    // 用最新快照刷新 gauge
    let states = data.engine.channel_states();
    let running = data.engine.running_processes();
    METRICS.refresh_channels(&states, &running);

    match METRICS.render() {
        Ok(metrics_text) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(metrics_text),
        Err(e) => {
            log::error!("Failed to render metrics: {}", e);
            HttpResponse::InternalServerError().body("Failed to render metrics")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::RawMessage;
    use crate::state::new_state;
    use actix_web::{test, App};

    #[actix_rt::test]
    async fn test_metrics_endpoint_exports_channel_state() {
        let state = new_state(EngineConfig::default()).unwrap();
        state
            .engine
            .ingest(&RawMessage::new("metrics-C1", "X 요청갯수 : 4", 1.0), 1_000);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let body = test::call_and_read_body(&app, req).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains(r#"job_channel_requested_count{channel="metrics-C1"} 4"#));
        assert!(text.contains(r#"job_running_processes{channel="metrics-C1"} 1"#));
    }
}
