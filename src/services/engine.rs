use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::EngineConfig;
use crate::errors::ConfigError;
use crate::models::{ChannelState, DelayAlert, LifecycleEvent, RawMessage, RunningProcess};
use crate::services::aggregator::{recompute, AggregatorSettings, TimeoutMark};
use crate::services::correlator::ProcessCorrelator;
use crate::services::delay_detector::DelayDetector;
use crate::services::parser::MessageParser;
use crate::services::publisher::{EngineUpdate, UpdatePublisher};
use crate::services::timeout_schedule::TimeoutSchedule;

/// 当前 Unix 时间（毫秒）
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// 单条消息的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Accepted {
        event: LifecycleEvent,
        /// 被该事件结束的运行中作业
        completed: Vec<RunningProcess>,
        state_changed: bool,
    },
    /// 相同时间戳 + 文本已处理过
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestedEvent {
    pub channel_id: String,
    pub kind: &'static str,
}

/// 批量处理结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub accepted: usize,
    pub duplicates: usize,
    pub completed_processes: usize,
    pub events: Vec<IngestedEvent>,
}

/// 单个频道拥有的全部状态，只能在频道锁内修改
struct ChannelSlot {
    history: Vec<LifecycleEvent>,
    seen: HashSet<(i64, String)>,
    correlator: ProcessCorrelator,
    last_correlated: Option<i64>,
    /// 已淘汰事件的最大时间戳，更早的消息不再接收
    retention_floor: Option<i64>,
    timeout: Option<TimeoutMark>,
    state: ChannelState,
}

impl ChannelSlot {
    fn new(channel_id: &str) -> Self {
        Self {
            history: Vec::new(),
            seen: HashSet::new(),
            correlator: ProcessCorrelator::new(channel_id),
            last_correlated: None,
            retention_floor: None,
            timeout: None,
            state: ChannelState::idle(channel_id),
        }
    }

    // 只淘汰当前会话之前的事件
    fn evict(&mut self, cap: usize) {
        if cap == 0 || self.history.len() <= cap {
            return;
        }
        let session_idx = self
            .history
            .iter()
            .rposition(LifecycleEvent::is_start)
            .unwrap_or(self.history.len());
        let excess = (self.history.len() - cap).min(session_idx);
        for event in self.history.drain(..excess) {
            self.retention_floor = Some(self.retention_floor.map_or(event.timestamp, |f| f.max(event.timestamp)));
            self.seen.remove(&(event.timestamp, event.original_text));
        }
    }
}

/// 作业监控引擎
///
/// 显式构造一次，通过 Arc 共享给 HTTP 处理器与定时任务。
/// 每个频道一把锁（单写者），频道之间互不阻塞。
pub struct JobEngine {
    config: EngineConfig,
    parser: MessageParser,
    detector: DelayDetector,
    settings: AggregatorSettings,
    channels: RwLock<HashMap<String, Arc<Mutex<ChannelSlot>>>>,
    timeouts: Mutex<TimeoutSchedule>,
    publisher: Arc<dyn UpdatePublisher>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl JobEngine {
    pub fn new(config: EngineConfig, publisher: Arc<dyn UpdatePublisher>) -> Result<Self, ConfigError> {
        config.validate()?;
        let parser = MessageParser::new(&config.patterns)?;
        let detector = DelayDetector::new(config.delay_threshold_ms());
        let settings = AggregatorSettings {
            count_unknown_as_error: config.count_unknown_as_error,
        };

        Ok(Self {
            config,
            parser,
            detector,
            settings,
            channels: RwLock::new(HashMap::new()),
            timeouts: Mutex::new(TimeoutSchedule::new()),
            publisher,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn slot(&self, channel_id: &str) -> Option<Arc<Mutex<ChannelSlot>>> {
        let channels = self.channels.read().unwrap_or_else(|p| p.into_inner());
        channels.get(channel_id).cloned()
    }

    fn slot_or_create(&self, channel_id: &str) -> Arc<Mutex<ChannelSlot>> {
        if let Some(slot) = self.slot(channel_id) {
            return slot;
        }
        let mut channels = self.channels.write().unwrap_or_else(|p| p.into_inner());
        channels
            .entry(channel_id.to_string())
            .or_insert_with(|| {
                log::info!("📡 Tracking new channel '{}'", channel_id);
                Arc::new(Mutex::new(ChannelSlot::new(channel_id)))
            })
            .clone()
    }

    fn slots(&self) -> Vec<(String, Arc<Mutex<ChannelSlot>>)> {
        let channels = self.channels.read().unwrap_or_else(|p| p.into_inner());
        let mut slots: Vec<_> = channels
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();
        slots.sort_by(|a, b| a.0.cmp(&b.0));
        slots
    }

    /// 处理一条原始消息
    pub fn ingest(&self, raw: &RawMessage, now: i64) -> IngestOutcome {
        let event = self.parser.parse(raw);
        log::debug!(
            "[{}] {} @{}: {}",
            raw.channel_id,
            event.kind_label(),
            event.timestamp,
            raw.text
        );

        let (completed, changed_state) = loop {
            let slot = self.slot_or_create(&raw.channel_id);
            let mut guard = lock(&slot);
            // 拿到锁之前频道可能已被拆除，重新注册后再处理
            if !self.is_registered(&raw.channel_id, &slot) {
                continue;
            }
            match self.apply(&mut guard, &event, now) {
                Some(applied) => break applied,
                None => return IngestOutcome::Duplicate,
            }
        };

        let state_changed = changed_state.is_some();
        if let Some(state) = changed_state {
            self.publisher.publish(EngineUpdate::ChannelState(state));
        }

        IngestOutcome::Accepted {
            event,
            completed,
            state_changed,
        }
    }

    fn is_registered(&self, channel_id: &str, slot: &Arc<Mutex<ChannelSlot>>) -> bool {
        let channels = self.channels.read().unwrap_or_else(|p| p.into_inner());
        channels
            .get(channel_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    // 在频道锁内处理事件；重复消息返回 None
    fn apply(
        &self,
        slot: &mut ChannelSlot,
        event: &LifecycleEvent,
        now: i64,
    ) -> Option<(Vec<RunningProcess>, Option<ChannelState>)> {
        let channel_id = slot.state.channel_id.clone();

        if slot.retention_floor.is_some_and(|floor| event.timestamp <= floor) {
            log::debug!("[{}] Message older than retained history ignored", channel_id);
            return None;
        }

        let dedup_key = (event.timestamp, event.original_text.clone());
        if !slot.seen.insert(dedup_key) {
            log::debug!("[{}] Duplicate message ignored: {}", channel_id, event.original_text);
            return None;
        }

        let pos = slot.history.partition_point(|e| e.timestamp <= event.timestamp);
        slot.history.insert(pos, event.clone());

        let patterns = self.parser.patterns();
        let last_correlated = slot.last_correlated;
        let completed = match last_correlated {
            Some(last) if event.timestamp < last => {
                log::warn!(
                    "[{}] Late {} at {} (newest {})",
                    channel_id,
                    event.kind_label(),
                    event.timestamp,
                    last
                );
                slot.correlator.ingest_late(event, patterns)
            }
            _ => {
                slot.last_correlated = Some(event.timestamp);
                slot.correlator.ingest(event, patterns)
            }
        };
        for process in &completed {
            log::info!(
                "✓ {} completed after {} ms",
                process.key,
                event.timestamp - process.start_time
            );
        }

        slot.evict(self.config.max_history_per_channel);

        let state = recompute(&channel_id, &slot.history, slot.timeout, self.settings);
        self.reschedule_timeout(&state, now);

        let changed = if state != slot.state {
            if state.status != slot.state.status {
                log::info!(
                    "[{}] {} -> {}",
                    channel_id,
                    slot.state.status.as_str(),
                    state.status.as_str()
                );
            }
            slot.state = state.clone();
            Some(state)
        } else {
            None
        };
        Some((completed, changed))
    }

    // 会话进行中则刷新无活动超时，否则取消
    fn reschedule_timeout(&self, state: &ChannelState, now: i64) {
        let mut timeouts = lock(&self.timeouts);
        match (state.is_open(), state.start_time) {
            (true, Some(session_start)) => timeouts.schedule(
                &state.channel_id,
                session_start,
                now.saturating_add(self.config.channel_timeout_ms()),
            ),
            _ => {
                timeouts.cancel(&state.channel_id);
            }
        }
    }

    /// 批量处理：按频道分组，组内按时间戳稳定排序后依次处理
    pub fn ingest_batch(&self, messages: Vec<RawMessage>, now: i64) -> IngestReport {
        let mut grouped: BTreeMap<String, Vec<RawMessage>> = BTreeMap::new();
        for message in messages {
            grouped.entry(message.channel_id.clone()).or_default().push(message);
        }

        let mut report = IngestReport::default();
        for (channel_id, mut batch) in grouped {
            batch.sort_by_key(RawMessage::timestamp_ms);
            for raw in &batch {
                match self.ingest(raw, now) {
                    IngestOutcome::Accepted { event, completed, .. } => {
                        report.accepted += 1;
                        report.completed_processes += completed.len();
                        report.events.push(IngestedEvent {
                            channel_id: channel_id.clone(),
                            kind: event.kind_label(),
                        });
                    }
                    IngestOutcome::Duplicate => report.duplicates += 1,
                }
            }
        }
        report
    }

    /// 延迟扫描：对所有频道运行检测器并发布告警
    pub fn sweep_delays(&self, now: i64) -> Vec<DelayAlert> {
        let mut alerts = Vec::new();
        for (_, slot) in self.slots() {
            let mut slot = lock(&slot);
            alerts.extend(self.detector.sweep(&mut slot.correlator, now));
        }

        for alert in &alerts {
            self.publisher.publish(EngineUpdate::DelayAlert(alert.clone()));
        }
        alerts
    }

    /// 触发到期的频道超时，返回超时的频道
    pub fn expire_timeouts(&self, now: i64) -> Vec<String> {
        let due = lock(&self.timeouts).pop_due(now);

        let mut expired = Vec::new();
        for entry in due {
            let Some(slot) = self.slot(&entry.channel_id) else {
                continue;
            };

            let state = {
                let mut slot = lock(&slot);
                // 会话已经结束或被新会话替换
                if !slot.state.is_open() || slot.state.start_time != Some(entry.session_start) {
                    continue;
                }
                slot.timeout = Some(TimeoutMark {
                    session_start: entry.session_start,
                    at: entry.deadline,
                });
                let state = recompute(&entry.channel_id, &slot.history, slot.timeout, self.settings);
                slot.state = state.clone();
                state
            };

            log::warn!(
                "⏱ Channel '{}' timed out waiting for completion (session started at {})",
                entry.channel_id,
                entry.session_start
            );
            self.publisher.publish(EngineUpdate::ChannelState(state));
            expired.push(entry.channel_id);
        }
        expired
    }

    pub fn channel_state(&self, channel_id: &str) -> Option<ChannelState> {
        self.slot(channel_id).map(|slot| lock(&slot).state.clone())
    }

    pub fn channel_states(&self) -> Vec<ChannelState> {
        self.slots()
            .into_iter()
            .map(|(_, slot)| lock(&slot).state.clone())
            .collect()
    }

    /// 完整事件历史（不按已读状态过滤）
    pub fn channel_events(&self, channel_id: &str) -> Option<Vec<LifecycleEvent>> {
        self.slot(channel_id).map(|slot| lock(&slot).history.clone())
    }

    pub fn running_processes(&self) -> Vec<RunningProcess> {
        let mut running: Vec<RunningProcess> = self
            .slots()
            .into_iter()
            .flat_map(|(_, slot)| lock(&slot).correlator.running().cloned().collect::<Vec<_>>())
            .collect();
        running.sort_by(|a, b| a.key.cmp(&b.key));
        running
    }

    pub fn pending_timeouts(&self) -> usize {
        lock(&self.timeouts).len()
    }

    /// 拆除频道：删除全部状态并取消其定时器
    pub fn remove_channel(&self, channel_id: &str) -> bool {
        let removed = {
            let mut channels = self.channels.write().unwrap_or_else(|p| p.into_inner());
            channels.remove(channel_id)
        };
        // 等待正在处理该频道的写入结束，再取消它可能刚调度的超时
        let removed = match removed {
            Some(slot) => {
                let _guard = lock(&slot);
                lock(&self.timeouts).cancel(channel_id);
                true
            }
            None => {
                lock(&self.timeouts).cancel(channel_id);
                false
            }
        };

        if removed {
            log::info!("Channel '{}' removed", channel_id);
            self.publisher.publish(EngineUpdate::ChannelRemoved {
                channel_id: channel_id.to_string(),
            });
        }
        removed
    }

    /// 取消所有待触发的超时
    pub fn shutdown(&self) {
        lock(&self.timeouts).clear();
    }
}
