//! 퍼블리시 싱크 -- 수집기가 정규화된 이벤트를 내보내는 경계
//!
//! [`EventPublisher`]는 fire-and-forget 퍼블리시 연산입니다. 수집기는 반환된 에러를
//! 로그로만 남기고 이벤트를 버리며, 어떤 에러도 수집 루프를 멈추지 않습니다.
//!
//! [`EventBus`]는 `tokio::sync::broadcast` 기반의 인프로세스 구현입니다.
//! 구독자는 [`TopicFilter`]로 관심 토픽만 골라 받습니다. `timestamp` 속성이 없는
//! 이벤트에는 버스가 수신 시각을 채웁니다.
//!
//! # 토픽 필터 형식
//! ```text
//! decanter/collect/log/com/example/Foo   정확히 일치
//! decanter/collect/*                      decanter/collect/ 아래의 모든 토픽
//! *                                       모든 토픽
//! ```

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{trace, warn};

use serde_json::Value;

use crate::error::{DecanterError, PublishError};
use crate::event::{Event, TOPIC_SEPARATOR, keys, now_millis};

/// 이벤트 퍼블리시 trait
///
/// 구현체는 이벤트를 소비하고 즉시 반환해야 합니다. 전달 보장이나 재시도는 없습니다.
pub trait EventPublisher: Send + Sync {
    /// 이벤트를 퍼블리시합니다.
    fn publish(&self, event: Event) -> Result<(), PublishError>;
}

impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    fn publish(&self, event: Event) -> Result<(), PublishError> {
        (**self).publish(event)
    }
}

/// 구독 토픽 필터 (OSGi EventAdmin 규칙)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFilter {
    pattern: String,
}

impl TopicFilter {
    /// 필터를 생성합니다.
    ///
    /// `*`는 단독이거나 마지막 세그먼트로만 올 수 있습니다.
    pub fn new(pattern: impl Into<String>) -> Result<Self, DecanterError> {
        let pattern = pattern.into();
        let invalid = |reason: &str| DecanterError::InvalidTopic {
            topic: pattern.clone(),
            reason: reason.to_owned(),
        };

        if pattern.is_empty() {
            return Err(invalid("filter must not be empty"));
        }
        if let Some(pos) = pattern.find('*') {
            let is_last = pos == pattern.len() - 1;
            let is_segment = pos == 0 || pattern[..pos].ends_with(TOPIC_SEPARATOR);
            if !is_last || !is_segment {
                return Err(invalid("'*' is only allowed as the whole last segment"));
            }
        }
        Ok(Self { pattern })
    }

    /// 모든 토픽에 매칭되는 필터
    pub fn all() -> Self {
        Self {
            pattern: "*".to_owned(),
        }
    }

    /// 필터 패턴 문자열
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// 토픽이 필터에 매칭되는지 확인합니다.
    pub fn matches(&self, topic: &str) -> bool {
        match self.pattern.strip_suffix('*') {
            // "a/b/*"는 "a/b/" 아래의 토픽에만 매칭 ("a/b" 자체는 제외)
            Some(prefix) => topic.starts_with(prefix) && topic.len() > prefix.len(),
            None => self.pattern == topic,
        }
    }
}

/// 인프로세스 이벤트 버스
///
/// 구독자가 없을 때의 퍼블리시는 에러가 아닙니다 (이벤트는 조용히 버려짐).
/// 느린 구독자는 백프레셔 없이 이벤트를 잃습니다.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Arc<Event>>,
}

impl EventBus {
    /// 구독자별 버퍼 용량으로 버스를 생성합니다.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// 필터에 매칭되는 이벤트만 받는 구독을 생성합니다.
    pub fn subscribe(&self, filter: TopicFilter) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            filter,
        }
    }

    /// 현재 구독자 수
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// `timestamp`가 없는 이벤트에 수신 시각을 채웁니다.
fn with_reception_time(event: Event) -> Event {
    if event.attribute(keys::TIMESTAMP).is_some() {
        return event;
    }
    let (topic, mut attributes) = event.into_parts();
    attributes.insert(keys::TIMESTAMP.to_owned(), Value::from(now_millis()));
    Event::new(topic, attributes)
}

impl EventPublisher for EventBus {
    fn publish(&self, event: Event) -> Result<(), PublishError> {
        let event = with_reception_time(event);
        let topic = event.topic().clone();
        match self.tx.send(Arc::new(event)) {
            Ok(receivers) => trace!(topic = %topic, receivers, "event published"),
            Err(_) => trace!(topic = %topic, "event published with no subscribers"),
        }
        Ok(())
    }
}

/// 버스 구독
pub struct Subscription {
    rx: broadcast::Receiver<Arc<Event>>,
    filter: TopicFilter,
}

impl Subscription {
    /// 필터에 매칭되는 다음 이벤트를 기다립니다.
    ///
    /// 버스가 닫히면 `None`을 반환합니다. 뒤처져서 잃은 이벤트는 경고만 남깁니다.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.filter.matches(event.topic().as_str()) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        filter = self.filter.pattern(),
                        skipped, "subscriber lagging, events dropped"
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// 구독 필터
    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Attributes, Topic};
    use std::sync::Mutex;
    use tokio::time::{Duration, timeout};

    fn event(topic: &str) -> Event {
        Event::new(Topic::new(topic).unwrap(), Attributes::new())
    }

    #[test]
    fn filter_exact_match() {
        let filter = TopicFilter::new("decanter/collect/camel/event").unwrap();
        assert!(filter.matches("decanter/collect/camel/event"));
        assert!(!filter.matches("decanter/collect/camel/event/x"));
        assert!(!filter.matches("decanter/collect/camel"));
    }

    #[test]
    fn filter_wildcard_subtree() {
        let filter = TopicFilter::new("decanter/collect/*").unwrap();
        assert!(filter.matches("decanter/collect/log/com/example"));
        assert!(filter.matches("decanter/collect/eventadmin/jmx"));
        assert!(!filter.matches("decanter/collect"));
        assert!(!filter.matches("decanter/collector/x"));
        assert!(!filter.matches("other/topic"));
    }

    #[test]
    fn filter_all() {
        assert!(TopicFilter::all().matches("anything/at/all"));
        assert!(TopicFilter::new("*").unwrap().matches("jmx"));
    }

    #[test]
    fn filter_rejects_misplaced_wildcard() {
        assert!(TopicFilter::new("").is_err());
        assert!(TopicFilter::new("decanter/*/log").is_err());
        assert!(TopicFilter::new("decanter/col*").is_err());
    }

    #[tokio::test]
    async fn bus_delivers_to_matching_subscribers() {
        let bus = EventBus::new(16);
        let mut logs = bus.subscribe(TopicFilter::new("decanter/collect/log/*").unwrap());
        let mut all = bus.subscribe(TopicFilter::all());

        bus.publish(event("decanter/collect/eventadmin/jmx")).unwrap();
        bus.publish(event("decanter/collect/log/com/example")).unwrap();

        let first = timeout(Duration::from_secs(1), logs.recv())
            .await
            .expect("should not timeout")
            .expect("bus open");
        assert_eq!(first.topic().as_str(), "decanter/collect/log/com/example");

        let a = all.recv().await.unwrap();
        let b = all.recv().await.unwrap();
        assert_eq!(a.topic().as_str(), "decanter/collect/eventadmin/jmx");
        assert_eq!(b.topic().as_str(), "decanter/collect/log/com/example");
    }

    #[test]
    fn bus_without_subscribers_is_not_an_error() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.publish(event("decanter/collect/log/x")).is_ok());
    }

    #[tokio::test]
    async fn subscription_ends_when_bus_dropped() {
        let bus = EventBus::new(4);
        let mut sub = bus.subscribe(TopicFilter::all());
        drop(bus);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_and_continues() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe(TopicFilter::all());
        for i in 0..5 {
            bus.publish(event(&format!("t/{i}"))).unwrap();
        }
        // 용량 2 -> 마지막 두 개만 남음
        let next = sub.recv().await.unwrap();
        assert_eq!(next.topic().as_str(), "t/3");
    }

    #[tokio::test]
    async fn bus_fills_missing_timestamp_only() {
        let bus = EventBus::new(4);
        let mut sub = bus.subscribe(TopicFilter::all());

        let mut attrs = Attributes::new();
        attrs.insert(keys::TIMESTAMP.to_owned(), serde_json::json!(42));
        bus.publish(Event::new(Topic::new("a").unwrap(), attrs)).unwrap();
        bus.publish(event("b")).unwrap();

        assert_eq!(sub.recv().await.unwrap().timestamp(), Some(42));
        let stamped = sub.recv().await.unwrap().timestamp().unwrap();
        assert!(stamped > 1_600_000_000_000);
    }

    struct Recorder(Mutex<Vec<Event>>);

    impl EventPublisher for Recorder {
        fn publish(&self, event: Event) -> Result<(), PublishError> {
            self.0.lock().unwrap().push(event);
            Ok(())
        }
    }

    #[test]
    fn arc_publisher_delegates() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let publisher: Arc<dyn EventPublisher> = recorder.clone();
        publisher.publish(event("a/b")).unwrap();
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }
}
