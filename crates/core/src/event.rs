//! 이벤트 모델 -- 모든 수집기가 수렴하는 정규화된 토픽 + 속성 레코드
//!
//! [`Event`]는 수집 경계(소켓 역직렬화, 워크플로 알림, 버스 이벤트)에서 생성되고,
//! 생성 직후의 보강 단계에서만 속성이 채워진 뒤 퍼블리시 싱크에 정확히 한 번 전달됩니다.
//! 생성 이후에는 토픽과 속성을 변경할 수 있는 API가 없습니다.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecanterError;

/// 이벤트 속성 맵 (문자열 키 → JSON 값)
///
/// 값은 항상 원시 타입 또는 문자열로 렌더링된 구조 데이터입니다.
/// 소켓, 연결 같은 전송 계층 타입은 들어올 수 없습니다.
pub type Attributes = serde_json::Map<String, Value>;

/// 토픽 구분자
pub const TOPIC_SEPARATOR: char = '/';

/// Camel 이벤트 토픽
pub const CAMEL_EVENT_TOPIC: &str = "decanter/collect/camel/event";

/// EventAdmin 브리지 토픽 접두어 (원래 토픽이 그대로 뒤에 붙음)
pub const EVENTADMIN_TOPIC_PREFIX: &str = "decanter/collect/eventadmin/";

/// 예약 속성 키
pub mod keys {
    /// 수집기 종류 (`log`, `camelEvent`, `eventadmin`)
    pub const TYPE: &str = "type";
    /// 원래 이벤트의 종류
    pub const EVENT_TYPE: &str = "eventType";
    /// 이벤트 시각 (epoch 밀리초). 없으면 싱크가 수신 시각으로 채웁니다.
    pub const TIMESTAMP: &str = "timestamp";
    /// 로컬 호스트 주소
    pub const HOST_ADDRESS: &str = "hostAddress";
    /// 로컬 호스트명
    pub const HOST_NAME: &str = "hostName";
    /// 설정된 인스턴스 이름
    pub const INSTANCE_NAME: &str = "instanceName";
}

/// 슬래시로 구분된 계층형 토픽
///
/// 비어 있지 않음이 보장됩니다. 정규화 과정에서 생긴 내부의 연속 구분자(`a//b`)는
/// 그대로 보존됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// 토픽을 생성합니다. 빈 문자열은 거부합니다.
    pub fn new(topic: impl Into<String>) -> Result<Self, DecanterError> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(DecanterError::InvalidTopic {
                topic,
                reason: "topic must not be empty".to_owned(),
            });
        }
        Ok(Self(topic))
    }

    /// 비어 있지 않음이 이미 보장된 문자열로 토픽을 만듭니다.
    pub(crate) fn from_non_empty(topic: String) -> Self {
        debug_assert!(!topic.is_empty());
        Self(topic)
    }

    /// 토픽 문자열을 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 토픽 세그먼트를 순서대로 반환합니다.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(TOPIC_SEPARATOR)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Topic {
    type Error = DecanterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

/// 정규화된 이벤트 (Canonical Event)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    topic: Topic,
    attributes: Attributes,
}

impl Event {
    /// 토픽과 완성된 속성 맵으로 이벤트를 생성합니다.
    pub fn new(topic: Topic, attributes: Attributes) -> Self {
        Self { topic, attributes }
    }

    /// 이벤트 토픽
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// 전체 속성 맵
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// 단일 속성 값을 조회합니다.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// 문자열 속성 값을 조회합니다.
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// 예약 키 `timestamp`에 명시된 이벤트 시각 (epoch 밀리초)
    pub fn timestamp(&self) -> Option<i64> {
        self.attributes.get(keys::TIMESTAMP).and_then(Value::as_i64)
    }

    /// 토픽과 속성으로 분해합니다.
    pub fn into_parts(self) -> (Topic, Attributes) {
        (self.topic, self.attributes)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event[{}] type={} attributes={}",
            self.topic,
            self.attribute_str(keys::TYPE).unwrap_or("-"),
            self.attributes.len(),
        )
    }
}

/// 값을 사람이 읽을 수 있는 문자열로 렌더링합니다.
///
/// 문자열은 따옴표 없이 그대로, 그 외 값은 JSON 표기로 변환합니다.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 현재 시각을 epoch 밀리초로 반환합니다.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
