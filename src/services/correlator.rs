use std::collections::HashMap;

use crate::config::CompiledPatterns;
use crate::models::{EventKind, LifecycleEvent, ProcessKey, RunningProcess};
use crate::services::relatedness::is_related;

/// 单个频道内正在运行的作业集合
///
/// 事件必须按时间戳非递减顺序送入；乱序由调用方负责排序。
#[derive(Debug, Clone)]
pub struct ProcessCorrelator {
    channel_id: String,
    running: HashMap<ProcessKey, RunningProcess>,
}

impl ProcessCorrelator {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            running: HashMap::new(),
        }
    }

    /// 消费一个事件，返回被结束事件匹配并移除的作业
    pub fn ingest(&mut self, event: &LifecycleEvent, patterns: &CompiledPatterns) -> Vec<RunningProcess> {
        match &event.kind {
            EventKind::Start {
                client,
                requested_count,
            } => {
                let key = ProcessKey::new(self.channel_id.clone(), client.clone());
                let process = RunningProcess {
                    key: key.clone(),
                    start_time: event.timestamp,
                    requested_count: *requested_count,
                    source_message: event.original_text.clone(),
                };

                // 同一客户端只跟踪最新的一次开始
                if let Some(previous) = self.running.insert(key, process) {
                    log::debug!(
                        "Start for {} superseded previous start at {}",
                        previous.key,
                        previous.start_time
                    );
                }
                Vec::new()
            }
            EventKind::Complete { client, .. } => self.complete(client, event, patterns, None),
            EventKind::Error | EventKind::Unknown { .. } => Vec::new(),
        }
    }

    /// 消费一个迟到的事件（早于已处理的最新事件）
    ///
    /// 只有结束事件生效，且只匹配在它之前开始的作业；迟到的开始不进入运行集合。
    pub fn ingest_late(&mut self, event: &LifecycleEvent, patterns: &CompiledPatterns) -> Vec<RunningProcess> {
        match &event.kind {
            EventKind::Complete { client, .. } => self.complete(client, event, patterns, Some(event.timestamp)),
            _ => Vec::new(),
        }
    }

    fn complete(
        &mut self,
        client: &str,
        event: &LifecycleEvent,
        patterns: &CompiledPatterns,
        started_by: Option<i64>,
    ) -> Vec<RunningProcess> {
        let matched = self.match_complete(client, &event.original_text, patterns, started_by);
        if matched.is_empty() {
            log::debug!(
                "Complete for '{}' in {} matched no running process",
                client,
                self.channel_id
            );
        } else if matched.len() > 1 {
            log::debug!(
                "Complete for '{}' in {} matched {} running processes",
                client,
                self.channel_id,
                matched.len()
            );
        }

        matched
            .into_iter()
            .filter_map(|key| self.running.remove(&key))
            .collect()
    }

    // 客户端相同直接匹配，否则按文本相关性匹配
    fn match_complete(
        &self,
        client: &str,
        text: &str,
        patterns: &CompiledPatterns,
        started_by: Option<i64>,
    ) -> Vec<ProcessKey> {
        let mut keys: Vec<ProcessKey> = self
            .running
            .values()
            .filter(|p| started_by.map_or(true, |ts| p.start_time <= ts))
            .filter(|p| p.key.client == client || is_related(&p.source_message, text, patterns))
            .map(|p| p.key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn running(&self) -> impl Iterator<Item = &RunningProcess> {
        self.running.values()
    }

    /// 移除满足条件的作业并返回
    pub fn drain_where<F>(&mut self, mut predicate: F) -> Vec<RunningProcess>
    where
        F: FnMut(&RunningProcess) -> bool,
    {
        let keys: Vec<ProcessKey> = self
            .running
            .values()
            .filter(|p| predicate(p))
            .map(|p| p.key.clone())
            .collect();

        let mut drained: Vec<RunningProcess> = keys
            .into_iter()
            .filter_map(|key| self.running.remove(&key))
            .collect();
        drained.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.key.cmp(&b.key)));
        drained
    }
}

#[cfg(test)]
impl ProcessCorrelator {
    pub fn get(&self, client: &str) -> Option<&RunningProcess> {
        self.running.values().find(|p| p.key.client == client)
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }
}
