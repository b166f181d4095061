use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::EngineConfig;
use crate::metrics::METRICS;
use crate::services::engine::{now_millis, JobEngine};
use crate::services::source::MessageSource;

/// 定时任务的间隔
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeIntervals {
    /// 延迟扫描 + 频道超时检查
    pub check: Duration,
    /// 消息源轮询
    pub fetch: Duration,
}

impl From<&EngineConfig> for RuntimeIntervals {
    fn from(config: &EngineConfig) -> Self {
        Self {
            check: Duration::from_secs(config.check_interval_seconds),
            fetch: Duration::from_secs(config.fetch_interval_seconds),
        }
    }
}

/// 引擎的后台定时任务（检查与拉取互相独立）
pub struct EngineRuntime;

impl EngineRuntime {
    pub fn start(
        engine: Arc<JobEngine>,
        intervals: RuntimeIntervals,
        source: Option<Arc<dyn MessageSource>>,
    ) -> RuntimeHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut tasks = vec![tokio::spawn(run_checks(
            engine.clone(),
            intervals.check,
            shutdown_rx.clone(),
        ))];

        if let Some(source) = source {
            log::info!(
                "Polling '{}' every {}s",
                source.name(),
                intervals.fetch.as_secs_f64()
            );
            tasks.push(tokio::spawn(run_fetch(engine, source, intervals.fetch, shutdown_rx)));
        }

        RuntimeHandle {
            shutdown: shutdown_tx,
            tasks,
        }
    }
}

pub struct RuntimeHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RuntimeHandle {
    /// 停止所有定时任务；正在执行的一轮会先完成
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                log::error!("Background task ended abnormally: {}", e);
            }
        }
        log::info!("Background tasks stopped");
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn run_checks(engine: Arc<JobEngine>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = ticker(period);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                if *shutdown.borrow() {
                    break;
                }
                let now = now_millis();

                let alerts = engine.sweep_delays(now);
                METRICS.record_alerts(&alerts);
                for alert in &alerts {
                    log::warn!("{}", alert.render_text());
                }

                let expired = engine.expire_timeouts(now);
                METRICS.record_timeouts(&expired);
                log::debug!(
                    "Check pass: {} alerts, {} timeouts, {} channels awaiting timeout",
                    alerts.len(),
                    expired.len(),
                    engine.pending_timeouts()
                );
            }
        }
    }
}

async fn run_fetch(
    engine: Arc<JobEngine>,
    source: Arc<dyn MessageSource>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = ticker(period);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                if *shutdown.borrow() {
                    break;
                }
                match tokio::time::timeout(period, source.fetch()).await {
                    Ok(Ok(messages)) => {
                        let report = engine.ingest_batch(messages, now_millis());
                        METRICS.record_ingest(&report);
                        if report.accepted > 0 {
                            log::info!(
                                "Fetched {} new messages from '{}' ({} duplicates)",
                                report.accepted,
                                source.name(),
                                report.duplicates
                            );
                        }
                    }
                    Ok(Err(e)) => {
                        log::warn!("Fetch from '{}' failed, keeping previous state: {:#}", source.name(), e);
                    }
                    Err(_) => {
                        log::warn!("Fetch from '{}' timed out, keeping previous state", source.name());
                    }
                }
            }
        }
    }
}
