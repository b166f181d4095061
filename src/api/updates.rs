use actix_web::http::header;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpdatesQuery {
    #[serde(default)]
    pub since: u64,
}

/// 缓冲区中序号大于 since 的变更，供迟到的订阅者补拉
pub async fn recent_updates(
    data: web::Data<AppState>,
    query: web::Query<UpdatesQuery>,
) -> impl Responder {
    HttpResponse::Ok().json(data.publisher.recent(query.since))
}

/// SSE 推送
pub async fn stream_updates(data: web::Data<AppState>) -> impl Responder {
    let receiver = data.publisher.subscribe();
    log::info!(
        "SSE subscriber connected ({} active)",
        data.publisher.subscriber_count()
    );
    let stream = BroadcastStream::new(receiver).filter_map(|item| match item {
        Ok(update) => {
            let json = serde_json::to_string(&update).ok()?;
            Some(Ok::<_, Infallible>(web::Bytes::from(format!(
                "id: {}\ndata: {}\n\n",
                update.seq, json
            ))))
        }
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            log::warn!("SSE subscriber lagged, {} updates skipped", skipped);
            None
        }
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::RawMessage;
    use crate::state::new_state;
    use actix_web::{test, App};

    #[actix_rt::test]
    async fn test_recent_updates_since() {
        let state = new_state(EngineConfig::default()).unwrap();
        state.engine.ingest(&RawMessage::new("C01", "X 요청갯수 : 1", 1.0), 1_000);
        state.engine.ingest(&RawMessage::new("C01", "X 작업갯수 : 1", 2.0), 2_000);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/updates").to_request();
        let all: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(all.as_array().unwrap().len(), 2);
        assert_eq!(all[1]["type"], "channel_state");
        assert_eq!(all[1]["data"]["status"], "completed");

        let req = test::TestRequest::get().uri("/api/updates?since=1").to_request();
        let newer: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(newer.as_array().unwrap().len(), 1);
        assert_eq!(newer[0]["seq"], 2);
    }
}
