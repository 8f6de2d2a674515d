#![no_main]

use decanter_core::topic::{LOG_TOPIC_ROOT, logger_topic, normalize};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|name: &str| {
    let topic = normalize(name);

    // 항상 루트 아래에 있고, 구분자로 끝나지 않으며, 허용 문자만 포함해야 한다
    assert!(topic.starts_with(LOG_TOPIC_ROOT));
    assert!(!topic.ends_with('/'));
    assert!(topic.chars().all(|c| c.is_ascii_alphanumeric() || c == '/'));

    // logger_topic은 같은 문자열의 Topic을 만들어야 한다
    assert_eq!(logger_topic(name).as_str(), topic);
});
