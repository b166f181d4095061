pub mod patterns;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::ConfigError;
pub use patterns::{CompiledPatterns, PatternConfig};

/// 运行环境，决定默认阈值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Production,
    Development,
}

/// 引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 作业开始后多少分钟未完成即告警
    pub delay_threshold_minutes: u64,
    /// 延迟扫描间隔（秒）
    pub check_interval_seconds: u64,
    /// 外部拉取间隔（秒），仅驱动消息源轮询
    pub fetch_interval_seconds: u64,
    /// 频道进入 InProgress 后的无活动超时（分钟）
    pub channel_timeout_minutes: u64,
    /// 每个频道保留的最大事件数
    pub max_history_per_channel: usize,
    /// 会话窗口内的 Unknown 消息是否计为错误
    pub count_unknown_as_error: bool,
    /// 推送缓冲区大小
    pub publisher_buffer: usize,
    #[serde(default)]
    pub patterns: PatternConfig,
}

impl EngineConfig {
    pub fn for_profile(profile: Profile) -> Self {
        let (delay, check, fetch) = match profile {
            Profile::Production => (15, 30, 15),
            Profile::Development => (3, 10, 10),
        };

        Self {
            delay_threshold_minutes: delay,
            check_interval_seconds: check,
            fetch_interval_seconds: fetch,
            channel_timeout_minutes: 10,
            max_history_per_channel: 5000,
            count_unknown_as_error: true,
            publisher_buffer: 256,
            patterns: PatternConfig::default(),
        }
    }

    /// 从 JSON 文件加载，缺失字段使用 profile 默认值
    pub fn load(path: &Path, profile: Profile) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text, profile).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(text: &str, profile: Profile) -> Result<Self, serde_json::Error> {
        let mut base = serde_json::to_value(Self::for_profile(profile))?;
        let overrides: serde_json::Value = serde_json::from_str(text)?;
        merge_json(&mut base, overrides);
        serde_json::from_value(base)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("delay_threshold_minutes", self.delay_threshold_minutes),
            ("check_interval_seconds", self.check_interval_seconds),
            ("fetch_interval_seconds", self.fetch_interval_seconds),
            ("channel_timeout_minutes", self.channel_timeout_minutes),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        if self.publisher_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                field: "publisher_buffer",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn delay_threshold_ms(&self) -> i64 {
        minutes_to_ms(self.delay_threshold_minutes)
    }

    pub fn channel_timeout_ms(&self) -> i64 {
        minutes_to_ms(self.channel_timeout_minutes)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::for_profile(Profile::Production)
    }
}

fn minutes_to_ms(minutes: u64) -> i64 {
    i64::try_from(minutes.saturating_mul(60_000)).unwrap_or(i64::MAX)
}

// 对象逐字段合并，其他类型直接覆盖
fn merge_json(base: &mut serde_json::Value, overrides: serde_json::Value) {
    match (base, overrides) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_profile_defaults() {
        assert_eq!(EngineConfig::for_profile(Profile::Production).delay_threshold_minutes, 15);
        assert_eq!(EngineConfig::for_profile(Profile::Development).delay_threshold_minutes, 3);
        assert_eq!(EngineConfig::default().delay_threshold_ms(), 15 * 60_000);
    }

    #[test]
    fn test_partial_file_overrides_profile() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"delay_threshold_minutes": 7, "patterns": {{"error_keywords": ["boom"]}}}}"#
        )
        .unwrap();

        let config = EngineConfig::load(file.path(), Profile::Development).unwrap();
        assert_eq!(config.delay_threshold_minutes, 7);
        assert_eq!(config.check_interval_seconds, 10);
        assert_eq!(config.patterns.error_keywords, vec!["boom".to_string()]);
        // 未覆盖的模式保持默认
        assert_eq!(config.patterns.start_patterns.len(), 1);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = EngineConfig::load(Path::new("/nonexistent/job-monitor.json"), Profile::Production)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = EngineConfig {
            check_interval_seconds: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
