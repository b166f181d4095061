use regex::Regex;

use crate::config::{CompiledPatterns, PatternConfig};
use crate::errors::ConfigError;
use crate::models::{EventKind, LifecycleEvent, RawMessage, UnknownReason};

/// 消息解析器：原始文本 -> 生命周期事件
///
/// 匹配顺序：合成告警标记 → 开始模式 → 结束模式 → 错误关键字。
/// 纯函数，不会失败；无法识别的文本归类为 Unknown。
#[derive(Debug, Clone)]
pub struct MessageParser {
    patterns: CompiledPatterns,
}

impl MessageParser {
    pub fn new(config: &PatternConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            patterns: config.compile()?,
        })
    }

    pub fn patterns(&self) -> &CompiledPatterns {
        &self.patterns
    }

    pub fn parse(&self, raw: &RawMessage) -> LifecycleEvent {
        LifecycleEvent {
            kind: self.classify(&raw.text),
            timestamp: raw.timestamp_ms(),
            original_text: raw.text.clone(),
        }
    }

    pub fn classify(&self, text: &str) -> EventKind {
        // 告警文本是系统自己生成的，不能再当成新事件
        if self.is_synthetic(text) {
            return EventKind::Unknown {
                reason: UnknownReason::Synthetic,
            };
        }

        if let Some(result) = match_lifecycle(&self.patterns.start, text) {
            return match result {
                Ok((client, count)) => EventKind::Start {
                    client,
                    requested_count: count,
                },
                Err(reason) => EventKind::Unknown { reason },
            };
        }

        if let Some(result) = match_lifecycle(&self.patterns.end, text) {
            return match result {
                Ok((client, count)) => EventKind::Complete {
                    client,
                    completed_count: count,
                },
                Err(reason) => EventKind::Unknown { reason },
            };
        }

        if self.is_error(text) {
            return EventKind::Error;
        }

        EventKind::Unknown {
            reason: UnknownReason::Unmatched,
        }
    }

    pub fn is_synthetic(&self, text: &str) -> bool {
        self.patterns
            .synthetic_markers
            .iter()
            .any(|marker| text.contains(marker.as_str()))
    }

    pub fn is_error(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        if self
            .patterns
            .error_keywords
            .iter()
            .any(|kw| lowered.contains(kw.as_str()))
        {
            return true;
        }

        self.patterns
            .http_error
            .as_ref()
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    }
}

/// 返回 None 表示没有模式命中；Some(Err) 表示命中但数量非法
fn match_lifecycle(
    patterns: &[Regex],
    text: &str,
) -> Option<Result<(String, u64), UnknownReason>> {
    patterns.iter().find_map(|re| {
        let caps = re.captures(text)?;
        let client = caps.name("client")?.as_str().trim();
        let count = caps.name("count")?.as_str().trim();

        if client.is_empty() {
            return Some(Err(UnknownReason::Unmatched));
        }

        Some(
            count
                .replace(',', "")
                .parse::<u64>()
                .map(|n| (client.to_string(), n))
                .map_err(|_| UnknownReason::MalformedCount),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DelayAlert;
    use crate::models::ProcessKey;

    fn parser() -> MessageParser {
        MessageParser::new(&PatternConfig::default()).unwrap()
    }

    fn kind(text: &str) -> EventKind {
        parser().classify(text)
    }

    #[test]
    fn test_start_message() {
        for (text, client, n) in [
            ("KBAuto 요청갯수 : 10", "KBAuto", 10),
            ("Shinhan Card 요청 갯수: 0", "Shinhan Card", 0),
            ("  NH 요청개수 :1,200 ", "NH", 1200),
        ] {
            assert_eq!(
                kind(text),
                EventKind::Start {
                    client: client.to_string(),
                    requested_count: n
                },
                "text: {}",
                text
            );
        }
    }

    #[test]
    fn test_complete_message() {
        assert_eq!(
            kind("KBAuto 작업갯수 : 8"),
            EventKind::Complete {
                client: "KBAuto".to_string(),
                completed_count: 8
            }
        );
        assert_eq!(
            kind("KBAuto 완료갯수 : 3"),
            EventKind::Complete {
                client: "KBAuto".to_string(),
                completed_count: 3
            }
        );
    }

    #[test]
    fn test_malformed_count_is_unknown() {
        assert_eq!(
            kind("KBAuto 요청갯수 : ten"),
            EventKind::Unknown {
                reason: UnknownReason::MalformedCount
            }
        );
    }

    #[test]
    fn test_error_keywords() {
        assert_eq!(kind("NullPointerException at line 3"), EventKind::Error);
        assert_eq!(kind("배치 처리 중 오류 발생"), EventKind::Error);
        assert_eq!(kind("upload FAILED"), EventKind::Error);
        assert_eq!(kind("callback returned HTTP 503"), EventKind::Error);
        assert_eq!(kind("status=404 for /api"), EventKind::Error);
        assert_eq!(kind("504 Gateway Timeout"), EventKind::Error);
        assert_eq!(kind("upstream answered 429 Too Many Requests"), EventKind::Error);
    }

    #[test]
    fn test_plain_text_is_unknown() {
        assert_eq!(
            kind("점심 메뉴 공지"),
            EventKind::Unknown {
                reason: UnknownReason::Unmatched
            }
        );
        // 单独的三位数不算 HTTP 错误
        assert_eq!(
            kind("processed 500 rows"),
            EventKind::Unknown {
                reason: UnknownReason::Unmatched
            }
        );
    }

    #[test]
    fn test_alert_text_short_circuits() {
        let alert = DelayAlert {
            process_key: ProcessKey::new("C01", "KBAuto"),
            elapsed_minutes: 20,
            source_message: "KBAuto 요청갯수 : 10 error".to_string(),
        };
        assert_eq!(
            kind(&alert.render_text()),
            EventKind::Unknown {
                reason: UnknownReason::Synthetic
            }
        );
    }

    #[test]
    fn test_parse_keeps_text_and_timestamp() {
        let event = parser().parse(&RawMessage::new("C01", "KBAuto 요청갯수 : 10", 1000.0));
        assert_eq!(event.timestamp, 1_000_000);
        assert_eq!(event.original_text, "KBAuto 요청갯수 : 10");
        assert!(event.is_start());
    }
}
