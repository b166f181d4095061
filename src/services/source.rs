use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;

use crate::models::RawMessage;

/// 原始消息来源（外部协作方）
///
/// 拉取失败由调用方记录日志，引擎保持上一次的状态。
#[async_trait]
pub trait MessageSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> anyhow::Result<Vec<RawMessage>>;
}

/// 读取外部抓取程序维护的消息文件（JSON 数组或 JSON Lines）
///
/// 每次都读取全部内容，重复投递由引擎去重。
pub struct FileMessageSource {
    path: PathBuf,
    name: String,
}

impl FileMessageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("file:{}", path.display());
        Self { path, name }
    }
}

#[async_trait]
impl MessageSource for FileMessageSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> anyhow::Result<Vec<RawMessage>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        parse_messages(&text)
    }
}

pub fn parse_messages(text: &str) -> anyhow::Result<Vec<RawMessage>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("invalid JSON message array");
    }

    let mut messages = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<RawMessage>(line) {
            Ok(message) => messages.push(message),
            Err(e) => log::warn!("Skipping malformed message on line {}: {}", idx + 1, e),
        }
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_json_lines_skips_bad_lines() {
        let text = r#"{"text":"KBAuto 요청갯수 : 10","timestamp":1000,"channel_id":"C01"}
not json

{"text":"KBAuto 작업갯수 : 8","timestamp":"2000.5","channel":"C01"}"#;
        let messages = parse_messages(text).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].timestamp_ms(), 2_000_500);
    }

    #[test]
    fn test_parse_json_array() {
        let messages =
            parse_messages(r#"[{"text":"a","timestamp":1,"channel_id":"C"}]"#).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(parse_messages("[{").is_err());
    }

    #[tokio::test]
    async fn test_file_source_reads_spool() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"text":"X 요청갯수 : 1","timestamp":5,"channel_id":"C9"}}"#).unwrap();

        let source = FileMessageSource::new(file.path());
        let messages = source.fetch().await.unwrap();
        assert_eq!(messages[0].channel_id, "C9");
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let source = FileMessageSource::new("/nonexistent/messages.jsonl");
        assert!(source.fetch().await.is_err());
    }
}
