use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use tracing::warn;

use crate::models::AlertMessage;

/**
 * 关键词扫描器 - 使用 Aho-Corasick 算法进行多模式匹配
 *
 * 执行大小写敏感的子串匹配，不是单词边界匹配。
 * 一行命中多个关键词也只产生一条告警。
 */
pub struct KeywordScanner {
    ac: Option<AhoCorasick>,
    keywords: Vec<String>,
}

impl KeywordScanner {
    /**
     * 创建扫描器
     *
     * 空字符串关键词会被忽略，否则它会匹配每一行
     */
    pub fn new(keywords: &[String]) -> Self {
        let keywords: Vec<String> = keywords.iter().filter(|k| !k.is_empty()).cloned().collect();

        let ac = if keywords.is_empty() {
            None
        } else {
            match AhoCorasickBuilder::new()
                .match_kind(MatchKind::LeftmostFirst)
                .build(&keywords)
            {
                Ok(ac) => Some(ac),
                Err(e) => {
                    warn!(error = %e, "Failed to build Aho-Corasick automaton, keyword scanning disabled");
                    None
                }
            }
        };

        Self { ac, keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// 行中是否包含任意关键词
    pub fn matches(&self, line: &str) -> bool {
        self.ac.as_ref().is_some_and(|ac| ac.is_match(line))
    }

    /// 对每个命中的行产生一条告警，保持行顺序
    pub fn scan<S: AsRef<str>>(&self, lines: &[S]) -> Vec<AlertMessage> {
        lines
            .iter()
            .map(|line| AsRef::<str>::as_ref(line))
            .filter(|line| self.matches(line))
            .map(AlertMessage::from_log_line)
            .collect()
    }
}

/// 无状态的扫描入口
pub fn scan<S: AsRef<str>>(lines: &[S], keywords: &[String]) -> Vec<AlertMessage> {
    KeywordScanner::new(keywords).scan(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn keywords(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_one_alert_per_matching_line() {
        let lines = vec![
            "2024 ERROR disk full",
            "2024 INFO all good",
            "2024 ERROR CRITICAL meltdown",
        ];
        let alerts = scan(&lines, &keywords(&["ERROR", "CRITICAL"]));

        assert_eq!(alerts.len(), 2);
        assert!(alerts[0].text.contains("disk full"));
        assert!(alerts[1].text.contains("meltdown"));
    }

    #[rstest]
    #[case("an error occurred", false)]
    #[case("an ERROR occurred", true)]
    #[case("TERRORS", true)]
    #[case("", false)]
    fn test_case_sensitive_substring(#[case] line: &str, #[case] expected: bool) {
        let scanner = KeywordScanner::new(&keywords(&["ERROR"]));
        assert_eq!(scanner.matches(line), expected);
    }

    #[test]
    fn test_empty_keyword_set_matches_nothing() {
        let scanner = KeywordScanner::new(&[]);
        assert!(scanner.scan(&["ERROR everywhere"]).is_empty());

        let scanner = KeywordScanner::new(&keywords(&[""]));
        assert!(scanner.keywords().is_empty());
        assert!(scanner.scan(&["anything"]).is_empty());
    }
}
