use regex::{Regex, RegexBuilder};

use crate::errors::{AppError, AppResult};

/// Compiles a comma-separated list into case-insensitive patterns. Empty
/// input (or blank segments) yields an empty list. Matching is unanchored, so
/// substrings match.
pub fn compile_patterns(list: &str) -> AppResult<Vec<Regex>> {
    let mut compiled = Vec::new();

    for pattern in list.split(',') {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            continue;
        }

        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| AppError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        compiled.push(re);
    }

    Ok(compiled)
}

pub fn matches_any(name: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|p| p.is_match(name))
}

/// A namespace token is treated as a regex iff it contains a regex
/// metacharacter; otherwise it is an exact name.
pub fn is_regex_pattern(token: &str) -> bool {
    token
        .chars()
        .any(|c| matches!(c, '.' | '*' | '+' | '?' | '^' | '$' | '{' | '}' | '(' | ')' | '|' | '[' | ']' | '\\'))
}

/// Client-side pod-name filter. A pod is admitted iff it matches any include
/// pattern (or the include list is empty) and matches no exclude pattern.
/// Exclude wins over include.
#[derive(Clone, Debug, Default)]
pub struct PodFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl PodFilter {
    pub fn new(include: Vec<Regex>, exclude: Vec<Regex>) -> Self {
        Self { include, exclude }
    }

    pub fn admits(&self, pod_name: &str) -> bool {
        if !self.include.is_empty() && !matches_any(pod_name, &self.include) {
            return false;
        }
        !matches_any(pod_name, &self.exclude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_compiles_to_nothing() {
        assert!(compile_patterns("").unwrap().is_empty());
        assert!(compile_patterns(" , ,").unwrap().is_empty());
    }

    #[test]
    fn patterns_match_substrings_case_insensitively() {
        let patterns = compile_patterns("frontend-.*,BACKEND").unwrap();
        assert_eq!(patterns.len(), 2);
        assert!(matches_any("my-frontend-abc", &patterns));
        assert!(matches_any("backend-7", &patterns));
        assert!(!matches_any("database-xyz", &patterns));
    }

    #[test]
    fn bad_patterns_are_rejected() {
        assert!(matches!(
            compile_patterns("valid,("),
            Err(AppError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn regex_tokens_are_detected() {
        assert!(!is_regex_pattern("dev-team1"));
        assert!(is_regex_pattern("dev-.*"));
        assert!(is_regex_pattern("^prod$"));
        assert!(is_regex_pattern("a|b"));
        assert!(is_regex_pattern(r"a\d"));
    }

    #[test]
    fn exclude_wins_over_include() {
        let filter = PodFilter::new(
            compile_patterns("api-.*").unwrap(),
            compile_patterns("api-test").unwrap(),
        );
        assert!(!filter.admits("api-test-7"));
        assert!(filter.admits("api-prod-1"));
        assert!(!filter.admits("web-1"));
    }

    #[test]
    fn empty_include_admits_everything_not_excluded() {
        let filter = PodFilter::new(Vec::new(), compile_patterns("canary").unwrap());
        assert!(filter.admits("web-1"));
        assert!(!filter.admits("web-canary-2"));
    }
}
