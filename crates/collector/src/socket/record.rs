//! 로그 레코드 와이어 형식과 이벤트 매핑
//!
//! 각 프레임은 `"kind"` 태그가 붙은 JSON 레코드 하나입니다.
//!
//! ```text
//! {"kind":"logging_event","logger_name":"com.example.Foo","timestamp":1700000000123,
//!  "level":"INFO","message":"hello","mdc":{"user":"alice"}}
//! ```
//!
//! 알 수 없는 `kind`나 잘못된 JSON은 레코드 단위 디코딩 실패로, 호출자가 로그를
//! 남기고 건너뜁니다.

use std::collections::BTreeMap;

use decanter_core::event::{Attributes, Event, keys, render_value};
use decanter_core::topic::logger_topic;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CollectorError;
use crate::host::HostIdentity;

/// 로그 이벤트의 `type` 값
pub const LOG_EVENT_TYPE: &str = "log";

/// 와이어 레코드 (태그된 변형)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireRecord {
    /// 로깅 이벤트
    LoggingEvent(LoggingRecord),
}

/// 로깅 이벤트 레코드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingRecord {
    pub logger_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger_class: Option<String>,
    /// epoch 밀리초
    pub timestamp: i64,
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_name: Option<String>,
    #[serde(default)]
    pub message: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_message: Option<String>,
    /// 진단 컨텍스트 (MDC)
    #[serde(default)]
    pub mdc: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationInfo>,
    /// 스택 트레이스 (줄 단위)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throwable: Option<Vec<String>>,
}

/// 호출 위치 정보. 각 필드는 알려진 경우에만 존재합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_name: Option<String>,
}

impl LoggingRecord {
    /// 필수 필드만으로 레코드를 생성합니다.
    pub fn new(
        logger_name: impl Into<String>,
        level: impl Into<String>,
        timestamp: i64,
        message: impl Into<Value>,
    ) -> Self {
        Self {
            logger_name: logger_name.into(),
            logger_class: None,
            timestamp,
            level: level.into(),
            thread_name: None,
            message: message.into(),
            rendered_message: None,
            mdc: BTreeMap::new(),
            location: None,
            throwable: None,
        }
    }

    /// 정규화된 로그 이벤트로 변환합니다.
    ///
    /// 토픽은 로거 이름을 정규화하여 만들고, 레코드의 타임스탬프는 그대로 전달됩니다.
    pub fn into_event(self, host: &HostIdentity, instance_name: Option<&str>) -> Event {
        let topic = logger_topic(&self.logger_name);
        let mut attrs = Attributes::new();

        host.apply(&mut attrs);
        attrs.insert(keys::TIMESTAMP.to_owned(), Value::from(self.timestamp));
        if let Some(class) = self.logger_class {
            attrs.insert("loggerClass".to_owned(), Value::from(class));
        }
        attrs.insert("loggerName".to_owned(), Value::from(self.logger_name));
        if let Some(thread) = self.thread_name {
            attrs.insert("threadName".to_owned(), Value::from(thread));
        }

        let rendered = self
            .rendered_message
            .unwrap_or_else(|| render_value(&self.message));
        attrs.insert("message".to_owned(), self.message);
        attrs.insert("renderedMessage".to_owned(), Value::from(rendered));
        attrs.insert("level".to_owned(), Value::from(self.level));

        let mdc: Attributes = self
            .mdc
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect();
        attrs.insert("MDC".to_owned(), Value::Object(mdc));

        if let Some(loc) = self.location {
            if let Some(class) = loc.class_name {
                attrs.insert("loc.class".to_owned(), Value::from(class));
            }
            if let Some(file) = loc.file_name {
                attrs.insert("loc.file".to_owned(), Value::from(file));
            }
            if let Some(line) = loc.line_number {
                attrs.insert("loc.line".to_owned(), Value::from(line));
            }
            if let Some(method) = loc.method_name {
                attrs.insert("loc.method".to_owned(), Value::from(method));
            }
        }

        if let Some(lines) = self.throwable {
            let flattened: String = lines.iter().map(|line| format!("{line}\n")).collect();
            attrs.insert("throwable".to_owned(), Value::from(flattened));
        }

        attrs.insert(keys::TYPE.to_owned(), Value::from(LOG_EVENT_TYPE));
        if let Some(name) = instance_name {
            attrs.insert(keys::INSTANCE_NAME.to_owned(), Value::from(name));
        }

        Event::new(topic, attrs)
    }
}

/// 프레임 하나를 레코드로 디코딩합니다.
pub fn decode(frame: &[u8]) -> Result<LoggingRecord, CollectorError> {
    match serde_json::from_slice::<WireRecord>(frame) {
        Ok(WireRecord::LoggingEvent(record)) => Ok(record),
        Err(e) => Err(CollectorError::Decode(e.to_string())),
    }
}

/// 레코드를 프레임 페이로드로 인코딩합니다 (구분자/길이 접두어 제외).
pub fn encode(record: &LoggingRecord) -> Result<Vec<u8>, CollectorError> {
    serde_json::to_vec(&WireRecord::LoggingEvent(record.clone()))
        .map_err(|e| CollectorError::Decode(e.to_string()))
}
