use std::collections::{BTreeSet, HashMap};

/// 已到期的频道超时
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueTimeout {
    pub channel_id: String,
    pub session_start: i64,
    pub deadline: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    session_start: i64,
    deadline: i64,
}

/// 按频道索引的超时队列
///
/// 每个频道最多一个待触发条目；重新调度会替换旧条目。
#[derive(Debug, Default)]
pub struct TimeoutSchedule {
    by_channel: HashMap<String, Entry>,
    queue: BTreeSet<(i64, String)>,
}

impl TimeoutSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, channel_id: &str, session_start: i64, deadline: i64) {
        self.cancel(channel_id);
        self.by_channel.insert(
            channel_id.to_string(),
            Entry {
                session_start,
                deadline,
            },
        );
        self.queue.insert((deadline, channel_id.to_string()));
    }

    pub fn cancel(&mut self, channel_id: &str) -> bool {
        match self.by_channel.remove(channel_id) {
            Some(entry) => {
                self.queue.remove(&(entry.deadline, channel_id.to_string()));
                true
            }
            None => false,
        }
    }

    /// 弹出所有 deadline <= now 的条目
    pub fn pop_due(&mut self, now: i64) -> Vec<DueTimeout> {
        let mut due = Vec::new();
        while let Some((deadline, _)) = self.queue.first() {
            if *deadline > now {
                break;
            }
            let Some((deadline, channel_id)) = self.queue.pop_first() else {
                break;
            };
            if let Some(entry) = self.by_channel.remove(&channel_id) {
                due.push(DueTimeout {
                    channel_id,
                    session_start: entry.session_start,
                    deadline,
                });
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.by_channel.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.by_channel.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_channel.clear();
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_due_in_deadline_order() {
        let mut schedule = TimeoutSchedule::new();
        schedule.schedule("B", 1, 200);
        schedule.schedule("A", 1, 100);
        schedule.schedule("C", 1, 300);

        let due = schedule.pop_due(250);
        let ids: Vec<_> = due.iter().map(|d| d.channel_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(schedule.len(), 1);
        assert!(schedule.pop_due(250).is_empty());
    }

    #[test]
    fn test_reschedule_replaces_entry() {
        let mut schedule = TimeoutSchedule::new();
        schedule.schedule("A", 1, 100);
        schedule.schedule("A", 50, 500);

        assert!(schedule.pop_due(100).is_empty());
        let due = schedule.pop_due(500);
        assert_eq!(
            due,
            vec![DueTimeout {
                channel_id: "A".to_string(),
                session_start: 50,
                deadline: 500
            }]
        );
    }

    #[test]
    fn test_cancel() {
        let mut schedule = TimeoutSchedule::new();
        schedule.schedule("A", 1, 100);
        assert!(schedule.cancel("A"));
        assert!(!schedule.cancel("A"));
        assert!(schedule.pop_due(1000).is_empty());
        assert!(schedule.is_empty());
    }
}
