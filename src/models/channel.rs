use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Idle,
    InProgress,
    Completed,
    Error,
    Timeout,
}

impl ChannelStatus {
    pub const ALL: [ChannelStatus; 5] = [
        ChannelStatus::Idle,
        ChannelStatus::InProgress,
        ChannelStatus::Completed,
        ChannelStatus::Error,
        ChannelStatus::Timeout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Idle => "idle",
            ChannelStatus::InProgress => "in_progress",
            ChannelStatus::Completed => "completed",
            ChannelStatus::Error => "error",
            ChannelStatus::Timeout => "timeout",
        }
    }
}

/// 频道状态快照，由事件历史推导
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelState {
    pub channel_id: String,
    pub status: ChannelStatus,
    /// 当前会话的客户端
    pub client: Option<String>,
    pub requested_count: u64,
    pub completed_count: u64,
    pub error_count: u64,
    pub has_error: bool,
    /// 进度百分比 (0-100)
    pub progress_percent: u8,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub last_updated: i64,
}

impl ChannelState {
    pub fn idle(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            status: ChannelStatus::Idle,
            client: None,
            requested_count: 0,
            completed_count: 0,
            error_count: 0,
            has_error: false,
            progress_percent: 0,
            start_time: None,
            end_time: None,
            last_updated: 0,
        }
    }

    /// 会话是否仍在进行
    pub fn is_open(&self) -> bool {
        self.status == ChannelStatus::InProgress
    }
}
