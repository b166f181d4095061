use prometheus::{
    Encoder, GaugeVec, CounterVec, Opts, Registry, TextEncoder,
    register_gauge_vec_with_registry, register_counter_vec_with_registry,
};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{ChannelState, ChannelStatus, DelayAlert, RunningProcess};
use crate::services::engine::IngestReport;

pub struct MetricsRegistry {
    registry: Registry,

    // Gauge metrics
    pub channel_status: GaugeVec,
    pub channel_requested_count: GaugeVec,
    pub channel_completed_count: GaugeVec,
    pub channel_error_count: GaugeVec,
    pub channel_progress_percent: GaugeVec,
    pub channel_last_updated: GaugeVec,
    pub running_processes: GaugeVec,

    // Counter metrics
    pub messages_ingested: CounterVec,
    pub delay_alerts: CounterVec,
    pub channel_timeouts: CounterVec,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let registry = Registry::new();

        let channel_labels = &["channel"];

        // 指标名固定且只注册一次，注册失败属于编程错误
        let channel_status = register_gauge_vec_with_registry!(
            Opts::new("job_channel_status", "Channel status (1 for the current status label)"),
            &["channel", "status"],
            registry
        ).expect("register job_channel_status");

        let channel_requested_count = register_gauge_vec_with_registry!(
            Opts::new("job_channel_requested_count", "Requested item count of the current session"),
            channel_labels,
            registry
        ).expect("register job_channel_requested_count");

        let channel_completed_count = register_gauge_vec_with_registry!(
            Opts::new("job_channel_completed_count", "Completed item count of the current session"),
            channel_labels,
            registry
        ).expect("register job_channel_completed_count");

        let channel_error_count = register_gauge_vec_with_registry!(
            Opts::new("job_channel_error_count", "Error count of the current session"),
            channel_labels,
            registry
        ).expect("register job_channel_error_count");

        let channel_progress_percent = register_gauge_vec_with_registry!(
            Opts::new("job_channel_progress_percent", "Progress of the current session (0-100)"),
            channel_labels,
            registry
        ).expect("register job_channel_progress_percent");

        let channel_last_updated = register_gauge_vec_with_registry!(
            Opts::new("job_channel_last_updated_timestamp_seconds", "Timestamp of the newest channel event"),
            channel_labels,
            registry
        ).expect("register job_channel_last_updated_timestamp_seconds");

        let running_processes = register_gauge_vec_with_registry!(
            Opts::new("job_running_processes", "Started jobs still waiting for completion"),
            channel_labels,
            registry
        ).expect("register job_running_processes");

        let messages_ingested = register_counter_vec_with_registry!(
            Opts::new("job_messages_ingested_total", "Messages accepted by the engine"),
            &["channel", "kind"],
            registry
        ).expect("register job_messages_ingested_total");

        let delay_alerts = register_counter_vec_with_registry!(
            Opts::new("job_delay_alerts_total", "Delay alerts emitted"),
            channel_labels,
            registry
        ).expect("register job_delay_alerts_total");

        let channel_timeouts = register_counter_vec_with_registry!(
            Opts::new("job_channel_timeouts_total", "Sessions that timed out without completion"),
            channel_labels,
            registry
        ).expect("register job_channel_timeouts_total");

        Self {
            registry,
            channel_status,
            channel_requested_count,
            channel_completed_count,
            channel_error_count,
            channel_progress_percent,
            channel_last_updated,
            running_processes,
            messages_ingested,
            delay_alerts,
            channel_timeouts,
        }
    }

    pub fn render(&self) -> Result<String, Box<dyn std::error::Error>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn record_ingest(&self, report: &IngestReport) {
        for event in &report.events {
            self.messages_ingested
                .with_label_values(&[event.channel_id.as_str(), event.kind])
                .inc();
        }
    }

    pub fn record_alerts(&self, alerts: &[DelayAlert]) {
        for alert in alerts {
            self.delay_alerts
                .with_label_values(&[alert.process_key.channel_id.as_str()])
                .inc();
        }
    }

    pub fn record_timeouts(&self, channels: &[String]) {
        for channel in channels {
            self.channel_timeouts.with_label_values(&[channel.as_str()]).inc();
        }
    }

    /// 用引擎快照刷新频道 gauge
    pub fn refresh_channels(&self, states: &[ChannelState], running: &[RunningProcess]) {
        let mut running_by_channel: HashMap<&str, usize> = HashMap::new();
        for process in running {
            *running_by_channel.entry(process.key.channel_id.as_str()).or_default() += 1;
        }

        for state in states {
            let channel = state.channel_id.as_str();
            for status in ChannelStatus::ALL {
                self.channel_status
                    .with_label_values(&[channel, status.as_str()])
                    .set(if status == state.status { 1.0 } else { 0.0 });
            }

            self.channel_requested_count
                .with_label_values(&[channel])
                .set(state.requested_count as f64);
            self.channel_completed_count
                .with_label_values(&[channel])
                .set(state.completed_count as f64);
            self.channel_error_count
                .with_label_values(&[channel])
                .set(state.error_count as f64);
            self.channel_progress_percent
                .with_label_values(&[channel])
                .set(state.progress_percent as f64);
            self.channel_last_updated
                .with_label_values(&[channel])
                .set(state.last_updated as f64 / 1000.0);
            self.running_processes
                .with_label_values(&[channel])
                .set(running_by_channel.get(channel).copied().unwrap_or(0) as f64);
        }
    }

    /// 频道被删除后清理其指标
    pub fn reset_channel(&self, channel: &str) {
        for status in ChannelStatus::ALL {
            let _ = self.channel_status.remove_label_values(&[channel, status.as_str()]);
        }
        let _ = self.channel_requested_count.remove_label_values(&[channel]);
        let _ = self.channel_completed_count.remove_label_values(&[channel]);
        let _ = self.channel_error_count.remove_label_values(&[channel]);
        let _ = self.channel_progress_percent.remove_label_values(&[channel]);
        let _ = self.channel_last_updated.remove_label_values(&[channel]);
        let _ = self.running_processes.remove_label_values(&[channel]);
    }
}

lazy_static! {
    pub static ref METRICS: Arc<MetricsRegistry> = Arc::new(MetricsRegistry::new());
}
