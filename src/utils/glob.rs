//! 압축 해제 필터용 글로브 매칭
//!
//! `*` (0개 이상 임의 문자), `?` (임의 1문자) 지원. 대소문자 무시.
//! 필터는 엔트리 경로의 각 구성 요소(디렉토리/파일 이름)에 대해 검사한다.

/// 패턴에 글로브 와일드카드(`*` 또는 `?`)가 포함되어 있는지 확인
pub fn is_glob_pattern(s: &str) -> bool {
    s.contains('*') || s.contains('?')
}

/// 글로브 패턴 매칭 (대소문자 무시, UTF-8 안전)
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let text: Vec<char> = text.to_lowercase().chars().collect();
    glob_match_chars(&pattern, &text)
}

fn glob_match_chars(pattern: &[char], text: &[char]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(&'*'), _) if text.is_empty() => glob_match_chars(&pattern[1..], text),
        (Some(_), None) => pattern.iter().all(|&c| c == '*'),
        (None, Some(_)) => false,
        (Some(&'*'), Some(_)) => {
            glob_match_chars(&pattern[1..], text) || glob_match_chars(pattern, &text[1..])
        }
        (Some(&'?'), Some(_)) => glob_match_chars(&pattern[1..], &text[1..]),
        (Some(&p), Some(&t)) => p == t && glob_match_chars(&pattern[1..], &text[1..]),
    }
}

/// `|` 로 구분된 필터 문자열을 패턴 목록으로 분리
pub fn split_filters(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 엔트리 경로의 구성 요소 중 하나라도 필터에 걸리는지 확인
///
/// 경로 구분자는 `/` 와 `\` 모두 허용한다.
pub fn matches_any_component(patterns: &[String], entry_path: &str) -> bool {
    if patterns.is_empty() {
        return false;
    }
    entry_path
        .split(['/', '\\'])
        .filter(|c| !c.is_empty())
        .any(|component| {
            patterns.iter().any(|p| {
                if is_glob_pattern(p) {
                    glob_match(p, component)
                } else {
                    p.to_lowercase() == component.to_lowercase()
                }
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_glob_pattern() {
        assert!(is_glob_pattern("*.rs"));
        assert!(is_glob_pattern("test?"));
        assert!(!is_glob_pattern("Thumbs.db"));
        assert!(!is_glob_pattern(""));
    }

    #[test]
    fn test_exact_match_ignores_case() {
        assert!(glob_match("thumbs.db", "Thumbs.db"));
        assert!(!glob_match("thumbs.db", "thumbs.dbx"));
    }

    #[test]
    fn test_wildcards() {
        assert!(glob_match("*.tmp", "cache.tmp"));
        assert!(!glob_match("*.tmp", "cache.txt"));
        assert!(glob_match("?.rs", "a.rs"));
        assert!(!glob_match("?.rs", "ab.rs"));
        assert!(glob_match("*", ""));
        assert!(glob_match("**", "abc"));
        assert!(!glob_match("", "a"));
    }

    #[test]
    fn test_korean_filenames() {
        assert!(glob_match("*임시*", "나의_임시_파일"));
        assert!(glob_match("*.txt", "한글파일.txt"));
    }

    #[test]
    fn test_split_filters() {
        assert_eq!(
            split_filters(".DS_Store| Thumbs.db ||__MACOSX"),
            vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                "__MACOSX".to_string()
            ]
        );
        assert!(split_filters("").is_empty());
    }

    #[test]
    fn test_matches_any_component() {
        let filters = split_filters("__MACOSX|*.tmp|desktop.ini");
        assert!(matches_any_component(&filters, "__MACOSX/foo/._bar"));
        assert!(matches_any_component(&filters, "docs/build.TMP"));
        assert!(matches_any_component(&filters, "sub\\Desktop.ini"));
        assert!(!matches_any_component(&filters, "docs/readme.md"));
        assert!(!matches_any_component(&[], "__MACOSX/x"));
    }
}
