use crate::models::DelayAlert;
use crate::services::correlator::ProcessCorrelator;

const MS_PER_MINUTE: i64 = 60_000;

/// 延迟检测：扫描运行中的作业，超过阈值即告警并移出运行集合
///
/// 每个作业一生最多触发一次告警（先告警后丢弃）。
#[derive(Debug, Clone, Copy)]
pub struct DelayDetector {
    threshold_ms: i64,
}

impl DelayDetector {
    pub fn new(threshold_ms: i64) -> Self {
        Self { threshold_ms }
    }

    /// 扫描一个频道，返回本次产生的告警；不会失败
    pub fn sweep(&self, correlator: &mut ProcessCorrelator, now: i64) -> Vec<DelayAlert> {
        // 开始时间非法的条目直接丢弃，避免永久卡住
        let stale = correlator.drain_where(|p| p.start_time <= 0);
        for process in &stale {
            log::warn!(
                "Dropping running process {} with invalid start time {}",
                process.key,
                process.start_time
            );
        }

        let threshold = self.threshold_ms;
        correlator
            .drain_where(|p| now.saturating_sub(p.start_time) > threshold)
            .into_iter()
            .map(|process| {
                let elapsed_minutes = (now - process.start_time) / MS_PER_MINUTE;
                log::info!(
                    "⚠️ Delay detected for {}: {} minutes without completion",
                    process.key,
                    elapsed_minutes
                );
                DelayAlert {
                    process_key: process.key,
                    elapsed_minutes,
                    source_message: process.source_message,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PatternConfig;
    use crate::models::{EventKind, LifecycleEvent, RawMessage};
    use crate::services::parser::MessageParser;

    fn correlator_with(texts: &[(&str, f64)]) -> ProcessCorrelator {
        let parser = MessageParser::new(&PatternConfig::default()).unwrap();
        let mut correlator = ProcessCorrelator::new("C01");
        for (text, ts) in texts {
            let event = parser.parse(&RawMessage::new("C01", *text, *ts));
            correlator.ingest(&event, parser.patterns());
        }
        correlator
    }

    #[test]
    fn test_alert_fires_once_just_past_threshold() {
        let t0: i64 = 1_000_000;
        let detector = DelayDetector::new(15 * MS_PER_MINUTE);
        let mut correlator = correlator_with(&[("KBAuto 요청갯수 : 10", 1000.0)]);

        // 恰好等于阈值时不告警
        assert!(detector.sweep(&mut correlator, t0 + 15 * 60_000).is_empty());
        assert_eq!(correlator.len(), 1);

        let alerts = detector.sweep(&mut correlator, t0 + 15 * 60_000 + 1);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].elapsed_minutes, 15);
        assert_eq!(alerts[0].process_key.client, "KBAuto");
        assert_eq!(alerts[0].source_message, "KBAuto 요청갯수 : 10");
        assert!(correlator.is_empty());

        assert!(detector.sweep(&mut correlator, t0 + 60 * 60_000).is_empty());
    }

    #[test]
    fn test_only_overdue_processes_alert() {
        let detector = DelayDetector::new(3 * MS_PER_MINUTE);
        let mut correlator = correlator_with(&[("A1 요청갯수 : 1", 0.5), ("B2 요청갯수 : 1", 200.0)]);

        let alerts = detector.sweep(&mut correlator, 500 + 3 * 60_000 + 10);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].process_key.client, "A1");
        assert!(correlator.get("B2").is_some());
    }

    #[test]
    fn test_invalid_start_time_is_dropped_without_alert() {
        let detector = DelayDetector::new(MS_PER_MINUTE);
        let mut correlator = ProcessCorrelator::new("C01");
        let patterns = PatternConfig::default().compile().unwrap();
        let event = LifecycleEvent {
            kind: EventKind::Start {
                client: "Broken".to_string(),
                requested_count: 1,
            },
            timestamp: 0,
            original_text: "Broken 요청갯수 : 1".to_string(),
        };
        correlator.ingest(&event, &patterns);

        assert!(detector.sweep(&mut correlator, 10 * 60_000).is_empty());
        assert!(correlator.is_empty());
    }
}
