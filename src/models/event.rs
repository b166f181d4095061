use serde::Serialize;

/// 无法识别的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownReason {
    /// 不匹配任何模式
    Unmatched,
    /// 数量字段不是整数
    MalformedCount,
    /// 系统自己合成的告警文本，永远不参与生命周期计算
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    Start { client: String, requested_count: u64 },
    Complete { client: String, completed_count: u64 },
    Error,
    Unknown { reason: UnknownReason },
}

/// 解析后的生命周期事件，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleEvent {
    #[serde(flatten)]
    pub kind: EventKind,
    /// 毫秒时间戳
    pub timestamp: i64,
    pub original_text: String,
}

impl LifecycleEvent {
    pub fn is_start(&self) -> bool {
        matches!(self.kind, EventKind::Start { .. })
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(
            self.kind,
            EventKind::Unknown {
                reason: UnknownReason::Synthetic
            }
        )
    }

    /// 用于指标标签
    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            EventKind::Start { .. } => "start",
            EventKind::Complete { .. } => "complete",
            EventKind::Error => "error",
            EventKind::Unknown { .. } => "unknown",
        }
    }
}
