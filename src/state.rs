use crate::config::EngineConfig;
use crate::errors::ConfigError;
use crate::services::{BroadcastPublisher, JobEngine};
use std::sync::Arc;

/// HTTP 处理器与后台任务共享的状态
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<JobEngine>,
    pub publisher: Arc<BroadcastPublisher>,
}

pub fn new_state(config: EngineConfig) -> Result<AppState, ConfigError> {
    let publisher = Arc::new(BroadcastPublisher::new(config.publisher_buffer));
    let engine = Arc::new(JobEngine::new(config, publisher.clone())?);

    Ok(AppState { engine, publisher })
}
