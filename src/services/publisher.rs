use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::broadcast;

use crate::models::{ChannelState, DelayAlert};

/// 引擎对外发布的变更
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EngineUpdate {
    ChannelState(ChannelState),
    DelayAlert(DelayAlert),
    ChannelRemoved { channel_id: String },
}

/// 带序号的变更，供迟到的订阅者补拉
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequencedUpdate {
    pub seq: u64,
    #[serde(flatten)]
    pub update: EngineUpdate,
}

pub trait UpdatePublisher: Send + Sync {
    fn publish(&self, update: EngineUpdate);
}

/// 不发布任何内容
#[cfg(test)]
#[derive(Debug, Default)]
pub struct NullPublisher;

#[cfg(test)]
impl UpdatePublisher for NullPublisher {
    fn publish(&self, _update: EngineUpdate) {}
}

struct Ring {
    next_seq: u64,
    items: VecDeque<SequencedUpdate>,
}

/// 广播发布器：broadcast 扇出 + 有界环形缓冲
///
/// 订阅者落后或断开不会影响引擎。
pub struct BroadcastPublisher {
    sender: broadcast::Sender<SequencedUpdate>,
    capacity: usize,
    ring: Mutex<Ring>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            capacity,
            ring: Mutex::new(Ring {
                next_seq: 1,
                items: VecDeque::with_capacity(capacity),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SequencedUpdate> {
        self.sender.subscribe()
    }

    /// 返回序号大于 since 的缓冲变更
    pub fn recent(&self, since: u64) -> Vec<SequencedUpdate> {
        match self.ring.lock() {
            Ok(ring) => ring.items.iter().filter(|u| u.seq > since).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl UpdatePublisher for BroadcastPublisher {
    fn publish(&self, update: EngineUpdate) {
        let sequenced = {
            let Ok(mut ring) = self.ring.lock() else {
                log::error!("Update ring lock poisoned, dropping update");
                return;
            };
            let sequenced = SequencedUpdate {
                seq: ring.next_seq,
                update,
            };
            ring.next_seq += 1;
            if ring.items.len() == self.capacity {
                ring.items.pop_front();
            }
            ring.items.push_back(sequenced.clone());
            sequenced
        };

        // 没有订阅者时 send 返回错误，忽略即可
        let _ = self.sender.send(sequenced);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn removed(id: &str) -> EngineUpdate {
        EngineUpdate::ChannelRemoved {
            channel_id: id.to_string(),
        }
    }

    #[test]
    fn test_ring_is_bounded() {
        let publisher = BroadcastPublisher::new(2);
        publisher.publish(removed("a"));
        publisher.publish(removed("b"));
        publisher.publish(removed("c"));

        let recent = publisher.recent(0);
        let seqs: Vec<u64> = recent.iter().map(|u| u.seq).collect();
        assert_eq!(seqs, vec![2, 3]);
        assert_eq!(publisher.recent(2).len(), 1);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let publisher = BroadcastPublisher::new(4);
        publisher.publish(removed("a"));
        assert_eq!(publisher.subscriber_count(), 0);
        assert_eq!(publisher.recent(0).len(), 1);
    }

    #[tokio::test]
    async fn test_subscriber_receives_updates() {
        let publisher = BroadcastPublisher::new(4);
        let mut rx = publisher.subscribe();
        publisher.publish(removed("a"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.seq, 1);
        assert_eq!(received.update, removed("a"));

        // 丢弃订阅者后继续发布不受影响
        drop(rx);
        publisher.publish(removed("b"));
        assert_eq!(publisher.recent(0).len(), 2);
    }

    #[test]
    fn test_update_serialization() {
        let json = serde_json::to_value(SequencedUpdate {
            seq: 7,
            update: removed("C01"),
        })
        .unwrap();
        assert_eq!(json["seq"], 7);
        assert_eq!(json["type"], "channel_removed");
        assert_eq!(json["data"]["channel_id"], "C01");
    }
}
