use serde::{Deserialize, Deserializer, Serialize};

/// 原始消息（来自聊天集成的一行文本）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    /// 消息文本
    pub text: String,
    /// Unix 时间戳（秒，可带小数；兼容 Slack 的字符串 ts）
    #[serde(deserialize_with = "deserialize_seconds")]
    pub timestamp: f64,
    /// 频道 ID
    #[serde(alias = "channel", alias = "channel_id")]
    pub channel_id: String,
}

impl RawMessage {
    #[cfg(test)]
    pub fn new(channel_id: impl Into<String>, text: impl Into<String>, timestamp: f64) -> Self {
        Self {
            text: text.into(),
            timestamp,
            channel_id: channel_id.into(),
        }
    }

    /// 毫秒时间戳；非法值（NaN、无穷、负数）返回 0
    pub fn timestamp_ms(&self) -> i64 {
        seconds_to_millis(self.timestamp)
    }
}

pub fn seconds_to_millis(seconds: f64) -> i64 {
    if !seconds.is_finite() || seconds < 0.0 {
        return 0;
    }
    (seconds * 1000.0).round() as i64
}

fn deserialize_seconds<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(f64),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Number(n) => Ok(n),
        Seconds::Text(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slack_string_timestamp() {
        let raw: RawMessage = serde_json::from_str(
            r#"{"text":"KBAuto 요청갯수 : 10","timestamp":"1700000000.000100","channel":"C01"}"#,
        )
        .unwrap();
        assert_eq!(raw.channel_id, "C01");
        assert_eq!(raw.timestamp_ms(), 1_700_000_000_000);
    }

    #[test]
    fn test_invalid_timestamp_maps_to_zero() {
        assert_eq!(seconds_to_millis(f64::NAN), 0);
        assert_eq!(seconds_to_millis(-3.0), 0);
        assert_eq!(seconds_to_millis(1.5), 1500);
    }
}
