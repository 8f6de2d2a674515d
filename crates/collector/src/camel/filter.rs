//! 알림 포함 규칙
//!
//! 판정 순서:
//! 1. 출처 종류의 무시 플래그가 켜져 있으면 거부
//! 2. 알림 종류의 무시 플래그가 켜져 있으면 거부
//! 3. 출처별 정규식 매칭
//!    - 익스체인지: 컨텍스트 이름 매칭 AND (시작 라우트가 있으면) 라우트 ID 매칭
//!    - 라우트: 컨텍스트 이름과 라우트 ID 모두 매칭
//!    - 컨텍스트: 컨텍스트 이름 매칭
//! 4. 그 외(출처 없음)는 거부
//!
//! 정규식은 문자열 전체에 매칭되어야 합니다.

use decanter_core::config::CamelConfig;
use regex::Regex;

use super::types::{EventSource, Notification, NotificationKind};
use crate::error::CollectorError;

/// 무시 플래그 모음
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IgnoreFlags {
    pub exchange_events: bool,
    pub route_events: bool,
    pub camel_context_events: bool,
    pub exchange_created: bool,
    pub exchange_completed: bool,
    pub exchange_failed: bool,
    pub exchange_redelivery: bool,
    pub exchange_sending: bool,
    pub exchange_sent: bool,
    pub service_startup_failure: bool,
    pub service_stop_failure: bool,
}

impl IgnoreFlags {
    pub fn from_core(camel: &CamelConfig) -> Self {
        Self {
            exchange_events: camel.ignore_exchange_events,
            route_events: camel.ignore_route_events,
            camel_context_events: camel.ignore_camel_context_events,
            exchange_created: camel.ignore_exchange_created_events,
            exchange_completed: camel.ignore_exchange_completed_events,
            exchange_failed: camel.ignore_exchange_failed_events,
            exchange_redelivery: camel.ignore_exchange_redelivery_events,
            exchange_sending: camel.ignore_exchange_sending_events,
            exchange_sent: camel.ignore_exchange_sent_events,
            service_startup_failure: camel.ignore_service_startup_failure_events,
            service_stop_failure: camel.ignore_service_stop_failure_events,
        }
    }

    fn ignores_source(&self, source: Option<&EventSource>) -> bool {
        match source {
            Some(EventSource::Exchange(_)) => self.exchange_events,
            Some(EventSource::Route(_)) => self.route_events,
            Some(EventSource::Context(_)) => self.camel_context_events,
            None => false,
        }
    }

    fn ignores_kind(&self, kind: NotificationKind) -> bool {
        use NotificationKind as K;
        match kind {
            K::ExchangeCreated => self.exchange_created,
            K::ExchangeCompleted => self.exchange_completed,
            K::ExchangeFailed | K::ExchangeFailureHandled => self.exchange_failed,
            K::ExchangeRedelivery => self.exchange_redelivery,
            K::ExchangeSending => self.exchange_sending,
            K::ExchangeSent => self.exchange_sent,
            K::ServiceStartupFailure => self.service_startup_failure,
            K::ServiceStopFailure => self.service_stop_failure,
            K::ContextStarting
            | K::ContextStarted
            | K::ContextStopping
            | K::ContextStopped
            | K::RouteAdded
            | K::RouteStarted
            | K::RouteStopped
            | K::RouteRemoved => false,
        }
    }

    /// 출처 또는 종류 플래그에 의해 무시되는지 확인합니다.
    pub fn is_ignored(&self, notification: &Notification) -> bool {
        self.ignores_source(notification.source.as_ref()) || self.ignores_kind(notification.kind)
    }
}

/// 전체 매칭 정규식
#[derive(Debug, Clone)]
pub struct FullMatch {
    pattern: String,
    regex: Regex,
}

impl FullMatch {
    /// 패턴을 `^(?:...)$`로 고정하여 컴파일합니다.
    pub fn new(field: &'static str, pattern: &str) -> Result<Self, CollectorError> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|source| CollectorError::Pattern { field, source })?;
        Ok(Self {
            pattern: pattern.to_owned(),
            regex,
        })
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    /// 설정에 적힌 원래 패턴
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// 컴파일된 포함 규칙
///
/// 평가 중에는 읽기 전용이며, 설정 변경은 새 인스턴스로 통째로 교체합니다.
#[derive(Debug, Clone)]
pub struct NotifierRules {
    context_matcher: FullMatch,
    route_matcher: FullMatch,
    ignore: IgnoreFlags,
}

impl NotifierRules {
    pub fn new(
        context_pattern: &str,
        route_pattern: &str,
        ignore: IgnoreFlags,
    ) -> Result<Self, CollectorError> {
        Ok(Self {
            context_matcher: FullMatch::new("camel.camel_context_matcher", context_pattern)?,
            route_matcher: FullMatch::new("camel.route_matcher", route_pattern)?,
            ignore,
        })
    }

    /// core 설정 섹션에서 규칙을 컴파일합니다.
    pub fn from_core(camel: &CamelConfig) -> Result<Self, CollectorError> {
        Self::new(
            &camel.camel_context_matcher,
            &camel.route_matcher,
            IgnoreFlags::from_core(camel),
        )
    }

    pub fn ignore_flags(&self) -> &IgnoreFlags {
        &self.ignore
    }

    pub fn context_pattern(&self) -> &str {
        self.context_matcher.pattern()
    }

    pub fn route_pattern(&self) -> &str {
        self.route_matcher.pattern()
    }

    /// 알림을 퍼블리시해야 하는지 판정합니다.
    pub fn is_enabled(&self, notification: &Notification) -> bool {
        if self.ignore.is_ignored(notification) {
            return false;
        }

        match &notification.source {
            Some(EventSource::Exchange(exchange)) => {
                let context_matches = self.context_matcher.is_match(&exchange.context_name);
                match &exchange.from_route_id {
                    Some(route_id) => context_matches && self.route_matcher.is_match(route_id),
                    None => context_matches,
                }
            }
            Some(EventSource::Route(route)) => {
                self.context_matcher.is_match(&route.context_name)
                    && self.route_matcher.is_match(&route.id)
            }
            Some(EventSource::Context(context)) => self.context_matcher.is_match(&context.name),
            None => false,
        }
    }
}
