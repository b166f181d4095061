use std::collections::BTreeSet;

use crate::config::CompiledPatterns;

/// 共享关键字达到该数量即视为相关
pub const MIN_SHARED_KEYWORDS: usize = 2;
/// 单个共享关键字长度（字符数）达到该值即视为相关
pub const LONG_KEYWORD_CHARS: usize = 5;
/// 签名最多使用的词数
const SIGNATURE_WORDS: usize = 3;

/// 从消息文本提取的作业标识
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CorrelationId {
    /// 由 process_id_patterns 提取的显式 ID
    Explicit(String),
    /// 由最长的 1~3 个有效词组成的签名
    Signature(String),
}

/// 提取标识：优先显式 ID，其次签名；文本没有有效词时返回 None
pub fn extract_identifier(text: &str, patterns: &CompiledPatterns) -> Option<CorrelationId> {
    for re in &patterns.process_id {
        if let Some(caps) = re.captures(text) {
            let id = caps.name("id").or_else(|| caps.get(1));
            if let Some(id) = id {
                let id = id.as_str().trim();
                if !id.is_empty() {
                    return Some(CorrelationId::Explicit(id.to_string()));
                }
            }
        }
    }

    signature(text, &patterns.stop_words).map(CorrelationId::Signature)
}

/// 规范化后的有效词：小写、去标点、去停用词和纯数字，保持出现顺序并去重
pub fn meaningful_words(text: &str, stop_words: &[String]) -> Vec<String> {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut seen = BTreeSet::new();
    normalized
        .split_whitespace()
        .filter(|w| !w.chars().all(|c| c.is_numeric()))
        .filter(|w| !stop_words.iter().any(|s| s.as_str() == *w))
        .filter(|w| seen.insert(w.to_string()))
        .map(str::to_string)
        .collect()
}

fn signature(text: &str, stop_words: &[String]) -> Option<String> {
    let mut words = meaningful_words(text, stop_words);
    if words.is_empty() {
        return None;
    }

    // 稳定排序：等长时保留出现顺序
    words.sort_by_key(|w| std::cmp::Reverse(w.chars().count()));
    words.truncate(SIGNATURE_WORDS);
    words.sort();
    Some(words.join("|"))
}

/// 关键字重叠判定：≥2 个共享词，或 1 个长度 ≥5 的共享词
pub fn keywords_overlap(a: &str, b: &str, stop_words: &[String]) -> bool {
    let left: BTreeSet<String> = meaningful_words(a, stop_words).into_iter().collect();
    let right: BTreeSet<String> = meaningful_words(b, stop_words).into_iter().collect();

    let shared: Vec<&String> = left.intersection(&right).collect();
    shared.len() >= MIN_SHARED_KEYWORDS
        || shared.iter().any(|w| w.chars().count() >= LONG_KEYWORD_CHARS)
}

/// 两段文本是否属于同一作业
///
/// 两边都有显式 ID 时只比较 ID；否则签名相同即相关；最后退化为关键字重叠。
pub fn is_related(a: &str, b: &str, patterns: &CompiledPatterns) -> bool {
    let left = extract_identifier(a, patterns);
    let right = extract_identifier(b, patterns);

    match (&left, &right) {
        (Some(CorrelationId::Explicit(x)), Some(CorrelationId::Explicit(y))) => return x == y,
        (Some(x), Some(y)) if x == y => return true,
        _ => {}
    }

    keywords_overlap(a, b, &patterns.stop_words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PatternConfig;

    fn patterns() -> CompiledPatterns {
        PatternConfig::default().compile().unwrap()
    }

    #[test]
    fn test_meaningful_words_normalization() {
        let words = meaningful_words("KBAuto, 요청갯수 : 10 -- the Sync!", &patterns().stop_words);
        assert_eq!(words, vec!["kbauto".to_string(), "sync".to_string()]);
    }

    #[test]
    fn test_explicit_id_wins() {
        let p = patterns();
        assert_eq!(
            extract_identifier("nightly export job_id=exp-42 started", &p),
            Some(CorrelationId::Explicit("exp-42".to_string()))
        );
        assert!(is_related("export job_id=exp-42 begin", "job_id=exp-42 done", &p));
        // 显式 ID 不同，即使关键字重叠也不相关
        assert!(!is_related(
            "settlement export job_id=a1",
            "settlement export job_id=b2",
            &p
        ));
    }

    #[test]
    fn test_signature_uses_longest_words() {
        let p = patterns();
        assert_eq!(
            extract_identifier("run settlement batch for ab", &p),
            Some(CorrelationId::Signature("batch|run|settlement".to_string()))
        );
        assert_eq!(extract_identifier("12 34 : --", &p), None);
    }

    #[test]
    fn test_keyword_overlap_thresholds() {
        let stop = patterns().stop_words;
        // 一个长词
        assert!(keywords_overlap("KBAuto 요청갯수 : 10", "KBAuto 작업갯수 : 8", &stop));
        // 两个短词
        assert!(keywords_overlap("kb api sync", "kb api done", &stop));
        // 只有一个短词
        assert!(!keywords_overlap("KB 요청갯수 : 1", "KB 작업갯수 : 1", &stop));
        assert!(!keywords_overlap("alpha", "omega", &stop));
    }
}
