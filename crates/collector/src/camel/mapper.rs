//! 알림 → 기본 속성 맵

use decanter_core::event::{Attributes, keys};
use serde_json::Value;

use super::types::{EventSource, Notification};

/// Camel 이벤트의 `type` 값
pub const CAMEL_EVENT_TYPE: &str = "camelEvent";

/// 모든 알림에 공통인 속성을 만듭니다.
///
/// 익스체인지 출처의 세부 정보는 익스텐더가 추가합니다.
pub fn base_attributes(notification: &Notification, instance_name: Option<&str>) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert(keys::TYPE.to_owned(), Value::from(CAMEL_EVENT_TYPE));
    attrs.insert(
        keys::EVENT_TYPE.to_owned(),
        Value::from(notification.kind.as_str()),
    );
    attrs.insert(keys::TIMESTAMP.to_owned(), Value::from(notification.timestamp));

    match &notification.source {
        Some(EventSource::Route(route)) => {
            attrs.insert("routeId".to_owned(), Value::from(route.id.as_str()));
            attrs.insert(
                "camelContextName".to_owned(),
                Value::from(route.context_name.as_str()),
            );
        }
        Some(EventSource::Context(context)) => {
            attrs.insert(
                "camelContextName".to_owned(),
                Value::from(context.name.as_str()),
            );
        }
        Some(EventSource::Exchange(_)) | None => {}
    }

    if let Some(cause) = &notification.cause {
        attrs.insert("cause".to_owned(), Value::from(cause.as_str()));
    }
    if let Some(name) = instance_name {
        attrs.insert(keys::INSTANCE_NAME.to_owned(), Value::from(name));
    }
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camel::types::{Exchange, NotificationKind};

    #[test]
    fn route_notification() {
        let n = Notification::route(NotificationKind::RouteStarted, "r1", "ctx").with_timestamp(99);
        let attrs = base_attributes(&n, Some("node-1"));
        assert_eq!(attrs["type"], "camelEvent");
        assert_eq!(attrs["eventType"], "RouteStartedEvent");
        assert_eq!(attrs["timestamp"], 99);
        assert_eq!(attrs["routeId"], "r1");
        assert_eq!(attrs["camelContextName"], "ctx");
        assert_eq!(attrs["instanceName"], "node-1");
    }

    #[test]
    fn context_notification_with_cause() {
        let n = Notification::context(NotificationKind::ContextStopped, "ctx").with_cause("shutdown");
        let attrs = base_attributes(&n, None);
        assert_eq!(attrs["camelContextName"], "ctx");
        assert_eq!(attrs["cause"], "shutdown");
        assert!(!attrs.contains_key("routeId"));
        assert!(!attrs.contains_key("instanceName"));
    }

    #[test]
    fn exchange_details_left_to_extender() {
        let n = Notification::exchange(NotificationKind::ExchangeSent, Exchange::new("ID", "ctx"));
        let attrs = base_attributes(&n, None);
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs["eventType"], "ExchangeSentEvent");
    }
}
