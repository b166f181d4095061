use serde::Serialize;

use crate::models::{ChannelState, ChannelStatus, EventKind, LifecycleEvent};

/// 外部超时信号：某个会话在 at 时刻被判定超时
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeoutMark {
    /// 被超时的会话开始时间
    pub session_start: i64,
    pub at: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct AggregatorSettings {
    pub count_unknown_as_error: bool,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            count_unknown_as_error: true,
        }
    }
}

/// 由有序事件历史推导频道状态
///
/// 最近一次 Start 定义当前会话；其后第一个同客户端的 Complete 结束会话。
/// 会话窗口内的 Error（以及可选的 Unknown）计入错误数。
/// 结果只取决于参数，不持有任何可变状态。
pub fn recompute(
    channel_id: &str,
    events: &[LifecycleEvent],
    timeout: Option<TimeoutMark>,
    settings: AggregatorSettings,
) -> ChannelState {
    let mut state = ChannelState::idle(channel_id);
    state.last_updated = events.iter().map(|e| e.timestamp).max().unwrap_or(0);

    let Some(session_idx) = events.iter().rposition(LifecycleEvent::is_start) else {
        // 没有任何会话但出现了错误消息
        let errors = events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::Error))
            .count() as u64;
        if errors > 0 {
            state.status = ChannelStatus::Error;
            state.error_count = errors;
            state.has_error = true;
        }
        return state;
    };

    let session = &events[session_idx];
    let (client, requested) = match &session.kind {
        EventKind::Start {
            client,
            requested_count,
        } => (client.as_str(), *requested_count),
        _ => return state,
    };

    state.status = ChannelStatus::InProgress;
    state.client = Some(client.to_string());
    state.requested_count = requested;
    state.start_time = Some(session.timestamp);

    let mut observed_errors: u64 = 0;
    let mut completion: Option<(u64, i64)> = None;

    for event in &events[session_idx + 1..] {
        match &event.kind {
            EventKind::Complete {
                client: c,
                completed_count,
            } if c == client => {
                completion = Some((*completed_count, event.timestamp));
                break;
            }
            EventKind::Error => observed_errors += 1,
            EventKind::Unknown { .. } if settings.count_unknown_as_error && !event.is_synthetic() => {
                observed_errors += 1
            }
            _ => {}
        }
    }

    match completion {
        Some((completed, end_time)) => {
            let shortfall = requested.saturating_sub(completed);
            state.status = ChannelStatus::Completed;
            state.completed_count = completed;
            state.error_count = observed_errors.max(shortfall);
            state.has_error = state.error_count > 0;
            state.progress_percent = progress(requested, completed);
            state.end_time = Some(end_time);
        }
        None => {
            state.error_count = observed_errors;
            state.has_error = observed_errors > 0;

            if let Some(mark) = timeout.filter(|m| m.session_start == session.timestamp) {
                state.status = ChannelStatus::Timeout;
                state.has_error = true;
                state.end_time = Some(mark.at);
                state.last_updated = state.last_updated.max(mark.at);
            }
        }
    }

    state
}

fn progress(requested: u64, completed: u64) -> u8 {
    if requested == 0 {
        return 100;
    }
    let percent = completed.saturating_mul(100) / requested;
    percent.min(100) as u8
}
