use clap::Parser;
use std::path::PathBuf;

use crate::config::{EngineConfig, Profile};
use crate::errors::ConfigError;

/// Job Monitor - 聊天消息驱动的批处理作业监控
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// 监听端口
    #[arg(short, long, env = "PORT", default_value_t = 9999)]
    pub port: u16,

    /// 监听地址
    #[arg(short = 'a', long, env = "ADDRESS", default_value = "0.0.0.0")]
    pub address: String,

    /// 运行环境（决定默认阈值）
    #[arg(long, env = "JOB_MONITOR_PROFILE", value_enum, default_value_t = Profile::Production)]
    pub profile: Profile,

    /// JSON 配置文件
    #[arg(short, long, env = "JOB_MONITOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// 延迟告警阈值（分钟）
    #[arg(long, env = "DELAY_THRESHOLD_MINUTES")]
    pub delay_threshold_minutes: Option<u64>,

    /// 延迟扫描间隔（秒）
    #[arg(long, env = "CHECK_INTERVAL_SECONDS")]
    pub check_interval_seconds: Option<u64>,

    /// 消息拉取间隔（秒）
    #[arg(long, env = "FETCH_INTERVAL_SECONDS")]
    pub fetch_interval_seconds: Option<u64>,

    /// 外部抓取程序写入的消息文件（JSON 数组或 JSON Lines）
    #[arg(short = 'm', long, env = "MESSAGES_FILE")]
    pub messages_file: Option<PathBuf>,
}

impl CommandArgs {
    /// profile 默认值 < 配置文件 < 命令行
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path, self.profile)?,
            None => EngineConfig::for_profile(self.profile),
        };

        if let Some(v) = self.delay_threshold_minutes {
            config.delay_threshold_minutes = v;
        }
        if let Some(v) = self.check_interval_seconds {
            config.check_interval_seconds = v;
        }
        if let Some(v) = self.fetch_interval_seconds {
            config.fetch_interval_seconds = v;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_profile() {
        let args = CommandArgs::parse_from([
            "job-monitor",
            "--profile",
            "development",
            "--delay-threshold-minutes",
            "5",
        ]);
        let config = args.engine_config().unwrap();
        assert_eq!(config.delay_threshold_minutes, 5);
        assert_eq!(config.check_interval_seconds, 10);
    }

    #[test]
    fn test_zero_override_rejected() {
        let args = CommandArgs::parse_from(["job-monitor", "--check-interval-seconds", "0"]);
        assert!(args.engine_config().is_err());
    }
}
