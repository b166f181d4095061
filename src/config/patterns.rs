use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::models::DELAYED_TAG;

/// 消息识别模式（纯数据，可由配置文件覆盖）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// 开始模式，必须包含命名分组 client 与 count
    pub start_patterns: Vec<String>,
    /// 结束模式，必须包含命名分组 client 与 count
    pub end_patterns: Vec<String>,
    /// 作业 ID 提取模式（命名分组 id，或第 1 个分组）
    pub process_id_patterns: Vec<String>,
    /// 错误关键字，大小写不敏感的子串匹配
    pub error_keywords: Vec<String>,
    /// HTTP 4xx/5xx 状态码匹配
    pub http_error_pattern: Option<String>,
    /// 合成告警文本的标记
    pub synthetic_markers: Vec<String>,
    /// 生成关联签名时忽略的词
    pub stop_words: Vec<String>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            start_patterns: vec![
                r"^\s*(?P<client>.+?)\s+요청\s?[갯개]수\s*:\s*(?P<count>\S+)\s*$".to_string(),
            ],
            end_patterns: vec![
                r"^\s*(?P<client>.+?)\s+(?:작업|완료)\s?[갯개]수\s*:\s*(?P<count>\S+)\s*$".to_string(),
            ],
            process_id_patterns: vec![
                r"(?i)\b(?:job|process|batch)[-_ ]?id\s*[:=]\s*(?P<id>[A-Za-z0-9_.-]+)".to_string(),
                r"\[(?P<id>[A-Z][A-Z0-9]+-\d+)\]".to_string(),
            ],
            error_keywords: ["error", "exception", "failed", "failure", "에러", "오류", "실패"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            http_error_pattern: Some(
                concat!(
                    r"(?i)\b(?:(?:http|status|code)[\s:/=]*[45]\d{2}\b",
                    r"|[45]\d{2}\s+(?:bad request|unauthorized|forbidden|not found|method not allowed",
                    r"|request timeout|conflict|payload too large|too many requests",
                    r"|internal server error|not implemented|bad gateway|service unavailable|gateway timeout))",
                )
                .to_string(),
            ),
            synthetic_markers: vec![DELAYED_TAG.to_string(), "지연 알림".to_string()],
            stop_words: [
                "the", "a", "an", "and", "or", "of", "to", "in", "on", "for", "is", "at", "by",
                "with", "from", "job", "count", "요청갯수", "요청개수", "작업갯수", "작업개수",
                "완료갯수", "요청", "작업", "완료", "갯수", "개수",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// 编译后的模式集合
#[derive(Debug, Clone)]
pub struct CompiledPatterns {
    pub start: Vec<Regex>,
    pub end: Vec<Regex>,
    pub process_id: Vec<Regex>,
    /// 已转小写
    pub error_keywords: Vec<String>,
    pub http_error: Option<Regex>,
    pub synthetic_markers: Vec<String>,
    /// 已转小写
    pub stop_words: Vec<String>,
}

impl PatternConfig {
    pub fn compile(&self) -> Result<CompiledPatterns, ConfigError> {
        let start = compile_lifecycle("start_patterns", &self.start_patterns)?;
        let end = compile_lifecycle("end_patterns", &self.end_patterns)?;

        let process_id = self
            .process_id_patterns
            .iter()
            .map(|p| compile_one("process_id_patterns", p))
            .collect::<Result<Vec<_>, _>>()?;

        let http_error = match &self.http_error_pattern {
            Some(p) if !p.trim().is_empty() => Some(compile_one("http_error_pattern", p)?),
            _ => None,
        };

        Ok(CompiledPatterns {
            start,
            end,
            process_id,
            error_keywords: lowercase_non_empty(&self.error_keywords),
            http_error,
            synthetic_markers: self
                .synthetic_markers
                .iter()
                .filter(|m| !m.is_empty())
                .cloned()
                .collect(),
            stop_words: lowercase_non_empty(&self.stop_words),
        })
    }
}

fn compile_one(field: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        field,
        pattern: pattern.to_string(),
        source,
    })
}

fn compile_lifecycle(field: &'static str, patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    if patterns.is_empty() {
        return Err(ConfigError::InvalidValue {
            field,
            message: "at least one pattern is required".to_string(),
        });
    }

    patterns
        .iter()
        .map(|p| {
            let regex = compile_one(field, p)?;
            for group in ["client", "count"] {
                if !regex.capture_names().flatten().any(|name| name == group) {
                    return Err(ConfigError::MissingGroup {
                        field,
                        pattern: p.clone(),
                        group,
                    });
                }
            }
            Ok(regex)
        })
        .collect()
}

fn lowercase_non_empty(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}
