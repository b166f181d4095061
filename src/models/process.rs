use serde::Serialize;

/// 作业关联键：(频道, 客户端名)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProcessKey {
    pub channel_id: String,
    pub client: String,
}

impl ProcessKey {
    pub fn new(channel_id: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            client: client.into(),
        }
    }
}

impl std::fmt::Display for ProcessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.channel_id, self.client)
    }
}

/// 已开始但尚未完成的作业
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunningProcess {
    pub key: ProcessKey,
    /// 开始时间（毫秒）
    pub start_time: i64,
    pub requested_count: u64,
    /// 开始消息原文
    pub source_message: String,
}
