//! 토픽 정규화 -- 점으로 구분된 로거 이름을 슬래시 토픽 경로로 변환
//!
//! ```text
//! com.example.Foo   -> decanter/collect/log/com/example/Foo
//! my-app_v2.Foo Bar -> decanter/collect/log/myappv2/FooBar
//! a..b              -> decanter/collect/log/a//b
//! ```
//!
//! ASCII 영문자와 숫자는 그대로, `.`은 `/`로 옮기고 나머지 문자는 버립니다.
//! 끝에 붙은 `/`만 제거하며 내부의 연속 구분자는 합치지 않습니다.

use crate::event::{TOPIC_SEPARATOR, Topic};

/// 로그 수집 토픽 루트
pub const LOG_TOPIC_ROOT: &str = "decanter/collect/log";

/// 로거 이름을 로그 토픽 문자열로 정규화합니다.
///
/// 전역 함수이며 실패하지 않습니다. 정규화 결과가 비거나 구분자 하나뿐이면
/// 루트 토픽(`decanter/collect/log`)을 반환하여 토픽이 `/`로 끝나지 않게 합니다.
pub fn normalize(name: &str) -> String {
    let mut skeleton: String = name
        .chars()
        .filter_map(|ch| match ch {
            c if c.is_ascii_alphanumeric() => Some(c),
            '.' => Some(TOPIC_SEPARATOR),
            _ => None,
        })
        .collect();

    // 길이 1 미만으로는 줄이지 않음
    while skeleton.len() > 1 && skeleton.ends_with(TOPIC_SEPARATOR) {
        skeleton.pop();
    }

    if skeleton.is_empty() || skeleton == "/" {
        return LOG_TOPIC_ROOT.to_owned();
    }

    format!("{LOG_TOPIC_ROOT}{TOPIC_SEPARATOR}{skeleton}")
}

/// 로거 이름에서 [`Topic`]을 만듭니다.
pub fn logger_topic(name: &str) -> Topic {
    // normalize()는 항상 루트 접두어를 포함
    Topic::from_non_empty(normalize(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_class_name() {
        assert_eq!(
            normalize("com.example.Foo"),
            "decanter/collect/log/com/example/Foo"
        );
    }

    #[test]
    fn punctuation_is_dropped_not_escaped() {
        assert_eq!(
            normalize("my-app_v2.Foo Bar"),
            "decanter/collect/log/myappv2/FooBar"
        );
    }

    #[test]
    fn doubled_separator_is_preserved() {
        assert_eq!(normalize("a..b"), "decanter/collect/log/a//b");
    }

    #[test]
    fn trailing_separators_are_stripped() {
        assert_eq!(normalize("com.example..."), "decanter/collect/log/com/example");
    }

    #[test]
    fn leading_separator_is_kept() {
        assert_eq!(normalize(".root"), "decanter/collect/log//root");
    }

    #[test]
    fn non_ascii_letters_are_dropped() {
        assert_eq!(normalize("café.Ünit"), "decanter/collect/log/caf/nit");
    }

    #[test]
    fn empty_name_falls_back_to_root() {
        assert_eq!(normalize(""), LOG_TOPIC_ROOT);
        assert_eq!(normalize("---"), LOG_TOPIC_ROOT);
        assert_eq!(normalize("..."), LOG_TOPIC_ROOT);
    }

    #[test]
    fn logger_topic_wraps_normalized_name() {
        let topic = logger_topic("org.apache.camel");
        assert_eq!(topic.as_str(), "decanter/collect/log/org/apache/camel");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn segments_are_alphanumeric(name in "[a-zA-Z0-9._ $-]{0,64}") {
                let topic = normalize(&name);
                let path = topic.strip_prefix(LOG_TOPIC_ROOT).unwrap_or(&topic);
                for segment in path.split('/') {
                    prop_assert!(segment.chars().all(|c| c.is_ascii_alphanumeric()));
                }
            }

            #[test]
            fn never_empty_never_trailing_separator(name in any::<String>()) {
                let topic = normalize(&name);
                prop_assert!(!topic.is_empty());
                prop_assert!(!topic.ends_with('/'));
                prop_assert!(topic.starts_with(LOG_TOPIC_ROOT));
            }

            #[test]
            fn legal_names_keep_alphanumeric_skeleton(
                parts in prop::collection::vec("[a-zA-Z0-9]{1,12}", 1..6)
            ) {
                let name = parts.join(".");
                let expected = format!("{LOG_TOPIC_ROOT}/{}", parts.join("/"));
                prop_assert_eq!(normalize(&name), expected);
            }
        }
    }
}
