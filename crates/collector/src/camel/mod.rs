//! Camel 이벤트 알림기 -- 규칙 기반 필터링 및 보강
//!
//! 워크플로 엔진의 생명주기 알림을 받아 포함 규칙([`NotifierRules`])으로 판정하고,
//! 통과한 알림을 `decanter/collect/camel/event` 토픽으로 퍼블리시합니다.
//!
//! # 처리 흐름
//! ```text
//! Notification -> is_enabled (ignore flags, regex) -> base_attributes
//!              -> DefaultExchangeExtender -> custom extender -> publish
//! ```
//!
//! 설정은 `RwLock<Arc<_>>` 뒤에 있으며 [`CamelEventNotifier::reconfigure`]가 통째로
//! 교체합니다. 알림 하나는 처음 읽은 스냅샷으로 끝까지 평가됩니다.

pub mod extender;
pub mod filter;
pub mod mapper;
pub mod types;

pub use extender::{DefaultExchangeExtender, EXCEPTION_CAUGHT_PROPERTY, ExchangeExtender};
pub use filter::{IgnoreFlags, NotifierRules};
pub use mapper::{CAMEL_EVENT_TYPE, base_attributes};
pub use types::{
    Body, Context, EventSource, Exchange, ExchangePattern, Message, Notification,
    NotificationKind, Route,
};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use decanter_core::config::{CamelConfig, GeneralConfig};
use decanter_core::event::{CAMEL_EVENT_TOPIC, Event, Topic};
use decanter_core::metrics as m;
use decanter_core::publish::EventPublisher;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::CollectorError;

/// 교체 가능한 알림기 설정 묶음
#[derive(Debug, Clone)]
pub struct NotifierSettings {
    pub rules: NotifierRules,
    pub extender: DefaultExchangeExtender,
}

impl NotifierSettings {
    /// core 설정 섹션에서 생성합니다. 정규식이 잘못되면 에러를 반환합니다.
    pub fn from_core(camel: &CamelConfig) -> Result<Self, CollectorError> {
        Ok(Self {
            rules: NotifierRules::from_core(camel)?,
            extender: DefaultExchangeExtender {
                include_properties: camel.include_properties,
                include_headers: camel.include_headers,
                include_body: camel.include_body,
            },
        })
    }
}

/// Camel 이벤트 알림기
pub struct CamelEventNotifier {
    settings: RwLock<Arc<NotifierSettings>>,
    custom_extender: Option<Arc<dyn ExchangeExtender>>,
    publisher: Arc<dyn EventPublisher>,
    instance_name: Option<String>,
    published: AtomicU64,
    filtered: AtomicU64,
}

impl CamelEventNotifier {
    /// 새 알림기를 생성합니다.
    pub fn new(settings: NotifierSettings, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            settings: RwLock::new(Arc::new(settings)),
            custom_extender: None,
            publisher,
            instance_name: None,
            published: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
        }
    }

    /// core 설정에서 알림기를 생성합니다.
    pub fn from_core(
        camel: &CamelConfig,
        general: &GeneralConfig,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<Self, CollectorError> {
        Ok(Self::new(NotifierSettings::from_core(camel)?, publisher)
            .with_instance_name(general.instance_name().map(str::to_owned)))
    }

    /// 기본 보강 이후에 실행할 사용자 정의 익스텐더를 등록합니다.
    pub fn with_extender(mut self, extender: Arc<dyn ExchangeExtender>) -> Self {
        self.custom_extender = Some(extender);
        self
    }

    /// 이벤트에 붙일 인스턴스 이름을 지정합니다.
    pub fn with_instance_name(mut self, instance_name: Option<String>) -> Self {
        self.instance_name = instance_name;
        self
    }

    /// 현재 설정 스냅샷
    pub fn settings(&self) -> Arc<NotifierSettings> {
        Arc::clone(&self.settings.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// 설정을 교체합니다. 진행 중인 평가는 이전 스냅샷으로 끝납니다.
    pub fn reconfigure(&self, settings: NotifierSettings) {
        info!(
            context_matcher = settings.rules.context_pattern(),
            route_matcher = settings.rules.route_pattern(),
            "camel notifier reconfigured"
        );
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(settings);
    }

    /// 알림이 현재 규칙을 통과하는지 확인합니다.
    pub fn is_enabled(&self, notification: &Notification) -> bool {
        self.settings().rules.is_enabled(notification)
    }

    /// 판정 후 통과하면 퍼블리시합니다. 퍼블리시했으면 `true`를 반환합니다.
    pub fn handle(&self, notification: &Notification) -> bool {
        let settings = self.settings();
        if !settings.rules.is_enabled(notification) {
            trace!(kind = %notification.kind, "notification filtered");
            self.filtered.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(m::EVENTS_FILTERED_TOTAL, m::LABEL_SOURCE => m::SOURCE_CAMEL)
                .increment(1);
            return false;
        }
        self.publish_with(&settings, notification)
    }

    /// 판정 없이 이벤트를 만들어 퍼블리시합니다.
    ///
    /// 보강이나 퍼블리시 실패는 로그만 남기고 이벤트를 버립니다.
    pub fn notify(&self, notification: &Notification) {
        let settings = self.settings();
        self.publish_with(&settings, notification);
    }

    fn publish_with(&self, settings: &NotifierSettings, notification: &Notification) -> bool {
        let event = match self.build_event(settings, notification) {
            Ok(event) => event,
            Err(e) => {
                warn!(kind = %notification.kind, error = %e, "failed to handle camel event");
                return false;
            }
        };

        match self.publisher.publish(event) {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::EVENTS_PUBLISHED_TOTAL, m::LABEL_SOURCE => m::SOURCE_CAMEL)
                    .increment(1);
                true
            }
            Err(e) => {
                warn!(kind = %notification.kind, error = %e, "failed to publish camel event");
                metrics::counter!(m::PUBLISH_FAILURES_TOTAL, m::LABEL_SOURCE => m::SOURCE_CAMEL)
                    .increment(1);
                false
            }
        }
    }

    fn build_event(
        &self,
        settings: &NotifierSettings,
        notification: &Notification,
    ) -> Result<Event, CollectorError> {
        let mut attrs = base_attributes(notification, self.instance_name.as_deref());

        if let Some(EventSource::Exchange(exchange)) = &notification.source {
            settings.extender.extend(&mut attrs, exchange)?;
            if let Some(custom) = &self.custom_extender {
                custom.extend(&mut attrs, exchange)?;
            }
        }

        let topic = Topic::new(CAMEL_EVENT_TOPIC).map_err(|e| CollectorError::Enrich(e.to_string()))?;
        Ok(Event::new(topic, attrs))
    }

    /// 퍼블리시된 이벤트 수
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// 규칙에 의해 걸러진 알림 수
    pub fn filtered_count(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    /// 채널이 닫히거나 취소될 때까지 알림을 처리합니다.
    pub async fn run(&self, mut rx: mpsc::Receiver<Notification>, cancel: CancellationToken) {
        info!("camel event notifier started");

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(notification) => {
                        self.handle(&notification);
                    }
                    None => {
                        debug!("notification channel closed");
                        break;
                    }
                },
                _ = cancel.cancelled() => {
                    debug!("camel event notifier received shutdown signal");
                    break;
                }
            }
        }

        info!(
            published = self.published_count(),
            filtered = self.filtered_count(),
            "camel event notifier stopped"
        );
    }
}
