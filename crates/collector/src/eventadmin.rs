//! EventAdmin 버스 이벤트 수집기
//!
//! 버스에 이미 퍼블리시된 이벤트를 받아 `decanter/collect/eventadmin/<원래 토픽>`으로
//! 다시 퍼블리시합니다.
//!
//! # 속성 변환
//! - `type` → `eventType` (값이 null이면 `eventadmin`)
//! - `subject` (대소문자 무시) → 보안 주체 종류별 이름 목록 (`"UserPrincipal": "alice,bob"`)
//! - 그 외 속성은 그대로 복사
//! - `type = eventadmin`, `hostAddress`, `hostName`, `instanceName` 추가

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use decanter_core::config::{EventAdminConfig, GeneralConfig};
use decanter_core::event::{Attributes, EVENTADMIN_TOPIC_PREFIX, Event, Topic, keys, render_value};
use decanter_core::metrics as m;
use decanter_core::publish::{EventPublisher, TopicFilter};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::CollectorError;
use crate::host::HostIdentity;

/// EventAdmin 이벤트의 `type` 값 (null `type`의 `eventType` 대체값이기도 함)
pub const EVENTADMIN_EVENT_TYPE: &str = "eventadmin";

/// 보안 주체
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// 주체 종류 (예: `UserPrincipal`, `RolePrincipal`)
    pub kind: String,
    pub name: String,
}

impl Principal {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// 보안 주체 집합
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subject {
    pub principals: Vec<Principal>,
}

impl Subject {
    pub fn new(principals: Vec<Principal>) -> Self {
        Self { principals }
    }

    /// 종류별로 이름을 쉼표로 이어 붙인 맵을 만듭니다 (주체 순서 유지).
    pub fn to_attribute(&self) -> Value {
        let mut grouped: BTreeMap<&str, String> = BTreeMap::new();
        for principal in &self.principals {
            grouped
                .entry(principal.kind.as_str())
                .and_modify(|names| {
                    names.push(',');
                    names.push_str(&principal.name);
                })
                .or_insert_with(|| principal.name.clone());
        }
        Value::Object(
            grouped
                .into_iter()
                .map(|(kind, names)| (kind.to_owned(), Value::from(names)))
                .collect(),
        )
    }
}

/// 버스 이벤트 속성 값
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Value(Value),
    Subject(Subject),
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Subject> for PropertyValue {
    fn from(subject: Subject) -> Self {
        Self::Subject(subject)
    }
}

/// 버스 이벤트
#[derive(Debug, Clone, PartialEq)]
pub struct BusEvent {
    pub topic: String,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl BusEvent {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// 이미 정규화된 이벤트를 버스 이벤트로 변환합니다.
    pub fn from_event(event: &Event) -> Self {
        Self {
            topic: event.topic().to_string(),
            properties: event
                .attributes()
                .iter()
                .map(|(k, v)| (k.clone(), PropertyValue::Value(v.clone())))
                .collect(),
        }
    }
}

/// EventAdmin 수집기 설정
#[derive(Debug, Clone, Default)]
pub struct EventAdminCollectorConfig {
    pub excluded_topics: Vec<TopicFilter>,
    pub instance_name: Option<String>,
}

impl EventAdminCollectorConfig {
    pub fn from_core(
        eventadmin: &EventAdminConfig,
        general: &GeneralConfig,
    ) -> Result<Self, CollectorError> {
        let excluded_topics = eventadmin
            .excluded_topics
            .iter()
            .map(|pattern| {
                TopicFilter::new(pattern.as_str()).map_err(|e| CollectorError::Config {
                    field: "eventadmin.excluded_topics".to_owned(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            excluded_topics,
            instance_name: general.instance_name().map(str::to_owned),
        })
    }
}

/// EventAdmin 수집기
pub struct EventAdminCollector {
    config: EventAdminCollectorConfig,
    publisher: Arc<dyn EventPublisher>,
    host: HostIdentity,
    published: AtomicU64,
    skipped: AtomicU64,
}

impl EventAdminCollector {
    /// 로컬 호스트 정보로 수집기를 생성합니다.
    pub fn new(config: EventAdminCollectorConfig, publisher: Arc<dyn EventPublisher>) -> Self {
        Self::with_host(config, publisher, HostIdentity::local().clone())
    }

    pub fn with_host(
        config: EventAdminCollectorConfig,
        publisher: Arc<dyn EventPublisher>,
        host: HostIdentity,
    ) -> Self {
        Self {
            config,
            publisher,
            host,
            published: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    /// 제외 목록에 걸리는 토픽인지 확인합니다.
    ///
    /// 이 수집기가 만든 `decanter/collect/eventadmin/` 아래 토픽은 설정과 무관하게
    /// 항상 제외됩니다. 그렇지 않으면 자기 출력을 다시 수집합니다.
    pub fn is_excluded(&self, topic: &str) -> bool {
        topic.starts_with(EVENTADMIN_TOPIC_PREFIX)
            || self
                .config
                .excluded_topics
                .iter()
                .any(|filter| filter.matches(topic))
    }

    /// 버스 이벤트를 정규화된 이벤트로 변환합니다.
    pub fn to_event(&self, bus_event: &BusEvent) -> Result<Event, CollectorError> {
        let topic = Topic::new(format!("{EVENTADMIN_TOPIC_PREFIX}{}", bus_event.topic))
            .map_err(|e| CollectorError::Enrich(e.to_string()))?;

        let mut attrs = Attributes::new();
        attrs.insert(keys::TYPE.to_owned(), Value::from(EVENTADMIN_EVENT_TYPE));
        if let Some(name) = &self.config.instance_name {
            attrs.insert(keys::INSTANCE_NAME.to_owned(), Value::from(name.as_str()));
        }
        self.host.apply(&mut attrs);

        for (key, value) in &bus_event.properties {
            if key == keys::TYPE {
                let event_type = match value {
                    PropertyValue::Value(Value::Null) => Value::from(EVENTADMIN_EVENT_TYPE),
                    PropertyValue::Value(v) => Value::from(render_value(v)),
                    PropertyValue::Subject(s) => s.to_attribute(),
                };
                attrs.insert(keys::EVENT_TYPE.to_owned(), event_type);
            } else if key.eq_ignore_ascii_case("subject") {
                // Subject가 아닌 값은 버림
                if let PropertyValue::Subject(subject) = value {
                    attrs.insert(key.clone(), subject.to_attribute());
                }
            } else {
                let value = match value {
                    PropertyValue::Value(v) => v.clone(),
                    PropertyValue::Subject(s) => s.to_attribute(),
                };
                attrs.insert(key.clone(), value);
            }
        }

        Ok(Event::new(topic, attrs))
    }

    /// 버스 이벤트 하나를 처리합니다. 퍼블리시했으면 `true`를 반환합니다.
    pub fn handle(&self, bus_event: &BusEvent) -> bool {
        if self.is_excluded(&bus_event.topic) {
            debug!(topic = bus_event.topic.as_str(), "skipping excluded topic");
            self.skipped.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(m::EVENTS_FILTERED_TOTAL, m::LABEL_SOURCE => m::SOURCE_EVENTADMIN)
                .increment(1);
            return false;
        }

        let event = match self.to_event(bus_event) {
            Ok(event) => event,
            Err(e) => {
                warn!(topic = bus_event.topic.as_str(), error = %e, "failed to map bus event");
                return false;
            }
        };

        trace!(topic = %event.topic(), "publishing eventadmin event");
        match self.publisher.publish(event) {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::EVENTS_PUBLISHED_TOTAL, m::LABEL_SOURCE => m::SOURCE_EVENTADMIN)
                    .increment(1);
                true
            }
            Err(e) => {
                warn!(topic = bus_event.topic.as_str(), error = %e, "failed to publish eventadmin event");
                metrics::counter!(m::PUBLISH_FAILURES_TOTAL, m::LABEL_SOURCE => m::SOURCE_EVENTADMIN)
                    .increment(1);
                false
            }
        }
    }

    /// 퍼블리시된 이벤트 수
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// 제외 목록으로 건너뛴 이벤트 수
    pub fn skipped_count(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// 채널이 닫히거나 취소될 때까지 버스 이벤트를 처리합니다.
    pub async fn run(&self, mut rx: mpsc::Receiver<BusEvent>, cancel: CancellationToken) {
        info!("eventadmin collector started");

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(bus_event) => {
                        self.handle(&bus_event);
                    }
                    None => {
                        debug!("bus event channel closed");
                        break;
                    }
                },
                _ = cancel.cancelled() => {
                    debug!("eventadmin collector received shutdown signal");
                    break;
                }
            }
        }

        info!(
            published = self.published_count(),
            skipped = self.skipped_count(),
            "eventadmin collector stopped"
        );
    }
}
