use serde::Serialize;

use crate::models::ProcessKey;

/// 告警文本标记，解析器遇到后直接归类为 Unknown
pub const DELAYED_TAG: &str = "[DELAYED]";

/// 延迟告警：作业超过阈值仍未完成
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayAlert {
    pub process_key: ProcessKey,
    pub elapsed_minutes: i64,
    pub source_message: String,
}

impl DelayAlert {
    /// 人类可读的告警文本
    pub fn render_text(&self) -> String {
        format!(
            "{} {} has not completed after {} minutes: {}",
            DELAYED_TAG, self.process_key, self.elapsed_minutes, self.source_message
        )
    }
}
