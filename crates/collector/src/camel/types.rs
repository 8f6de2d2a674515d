//! 워크플로 엔진 알림 모델
//!
//! 알림의 출처는 익스체인지, 라우트, 컨텍스트 중 정확히 하나입니다
//! ([`EventSource`]). 서비스 실패처럼 엔티티가 아닌 출처는 `source: None`으로
//! 표현되며 항상 거부됩니다.

use std::fmt;

use decanter_core::event::{Attributes, now_millis};
use serde_json::Value;

/// 알림 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    ContextStarting,
    ContextStarted,
    ContextStopping,
    ContextStopped,
    RouteAdded,
    RouteStarted,
    RouteStopped,
    RouteRemoved,
    ExchangeCreated,
    ExchangeCompleted,
    ExchangeFailed,
    ExchangeFailureHandled,
    ExchangeRedelivery,
    ExchangeSending,
    ExchangeSent,
    ServiceStartupFailure,
    ServiceStopFailure,
}

impl NotificationKind {
    /// `eventType` 속성에 쓰이는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContextStarting => "CamelContextStartingEvent",
            Self::ContextStarted => "CamelContextStartedEvent",
            Self::ContextStopping => "CamelContextStoppingEvent",
            Self::ContextStopped => "CamelContextStoppedEvent",
            Self::RouteAdded => "RouteAddedEvent",
            Self::RouteStarted => "RouteStartedEvent",
            Self::RouteStopped => "RouteStoppedEvent",
            Self::RouteRemoved => "RouteRemovedEvent",
            Self::ExchangeCreated => "ExchangeCreatedEvent",
            Self::ExchangeCompleted => "ExchangeCompletedEvent",
            Self::ExchangeFailed => "ExchangeFailedEvent",
            Self::ExchangeFailureHandled => "ExchangeFailureHandledEvent",
            Self::ExchangeRedelivery => "ExchangeRedeliveryEvent",
            Self::ExchangeSending => "ExchangeSendingEvent",
            Self::ExchangeSent => "ExchangeSentEvent",
            Self::ServiceStartupFailure => "ServiceStartupFailureEvent",
            Self::ServiceStopFailure => "ServiceStopFailureEvent",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 메시지 교환 패턴
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExchangePattern {
    #[default]
    InOnly,
    InOut,
    InOptionalOut,
}

impl fmt::Display for ExchangePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InOnly => f.write_str("InOnly"),
            Self::InOut => f.write_str("InOut"),
            Self::InOptionalOut => f.write_str("InOptionalOut"),
        }
    }
}

/// 메시지 본문과 그 타입 이름
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub type_name: String,
    pub value: Value,
}

impl Body {
    pub fn new(type_name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            type_name: type_name.into(),
            value: value.into(),
        }
    }
}

/// 메시지 (헤더 + 선택적 본문)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub headers: Attributes,
    pub body: Option<Body>,
}

impl Message {
    /// 본문을 가진 메시지를 생성합니다.
    pub fn with_body(body: Body) -> Self {
        Self {
            headers: Attributes::new(),
            body: Some(body),
        }
    }

    /// 헤더를 추가합니다.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// 익스체인지 (작업 단위)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exchange {
    pub exchange_id: String,
    pub context_name: String,
    /// 익스체인지를 시작한 라우트 (없을 수 있음)
    pub from_route_id: Option<String>,
    pub from_endpoint_uri: Option<String>,
    pub pattern: ExchangePattern,
    pub properties: Attributes,
    pub in_message: Message,
    pub out_message: Option<Message>,
    /// 첨부된 예외의 문자열 표현
    pub exception: Option<String>,
    /// 지나온 라우트 노드 라벨 (추적 정보가 없으면 `None`)
    pub traced_nodes: Option<Vec<String>>,
}

impl Exchange {
    pub fn new(exchange_id: impl Into<String>, context_name: impl Into<String>) -> Self {
        Self {
            exchange_id: exchange_id.into(),
            context_name: context_name.into(),
            ..Default::default()
        }
    }

    pub fn from_route(mut self, route_id: impl Into<String>) -> Self {
        self.from_route_id = Some(route_id.into());
        self
    }

    pub fn from_endpoint(mut self, uri: impl Into<String>) -> Self {
        self.from_endpoint_uri = Some(uri.into());
        self
    }

    pub fn pattern(mut self, pattern: ExchangePattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn in_message(mut self, message: Message) -> Self {
        self.in_message = message;
        self
    }

    pub fn out_message(mut self, message: Message) -> Self {
        self.out_message = Some(message);
        self
    }

    pub fn exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    pub fn traced(mut self, nodes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.traced_nodes = Some(nodes.into_iter().map(Into::into).collect());
        self
    }
}

/// 라우트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub id: String,
    pub context_name: String,
}

/// CamelContext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub name: String,
}

/// 알림 출처 (상호 배타적인 세 가지 엔티티)
#[derive(Debug, Clone, PartialEq)]
pub enum EventSource {
    Exchange(Box<Exchange>),
    Route(Route),
    Context(Context),
}

/// 워크플로 엔진 알림
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub source: Option<EventSource>,
    /// epoch 밀리초
    pub timestamp: i64,
    /// 실패 알림의 원인
    pub cause: Option<String>,
}

impl Notification {
    /// 현재 시각으로 알림을 생성합니다.
    pub fn new(kind: NotificationKind, source: Option<EventSource>) -> Self {
        Self {
            kind,
            source,
            timestamp: now_millis(),
            cause: None,
        }
    }

    pub fn exchange(kind: NotificationKind, exchange: Exchange) -> Self {
        Self::new(kind, Some(EventSource::Exchange(Box::new(exchange))))
    }

    pub fn route(kind: NotificationKind, id: impl Into<String>, context_name: impl Into<String>) -> Self {
        Self::new(
            kind,
            Some(EventSource::Route(Route {
                id: id.into(),
                context_name: context_name.into(),
            })),
        )
    }

    pub fn context(kind: NotificationKind, name: impl Into<String>) -> Self {
        Self::new(kind, Some(EventSource::Context(Context { name: name.into() })))
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}
