#![no_main]

use arbitrary::Arbitrary;
use decanter_core::publish::TopicFilter;
use libfuzzer_sys::fuzz_target;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    pattern: String,
    topic: String,
}

fuzz_target!(|input: FuzzInput| {
    // 잘못된 패턴은 Err, 올바른 패턴은 매칭 중 패닉 없이 동작해야 한다
    if let Ok(filter) = TopicFilter::new(input.pattern.as_str()) {
        let matched = filter.matches(&input.topic);
        if filter.pattern() == "*" && !input.topic.is_empty() {
            assert!(matched);
        }
    }
});
