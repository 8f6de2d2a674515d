#![no_main]

use decanter_collector::HostIdentity;
use decanter_collector::socket::record;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // 크래시나 패닉 없이 Ok 또는 Err을 반환해야 한다
    if let Ok(record) = record::decode(data) {
        let logger_name = record.logger_name.clone();
        let event = record.into_event(&HostIdentity::default(), Some("fuzz"));
        assert_eq!(event.attribute_str("loggerName"), Some(logger_name.as_str()));
        assert!(event.topic().as_str().starts_with("decanter/collect/log"));
    }
});
