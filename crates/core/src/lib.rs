#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod publish;
pub mod topic;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, DecanterError, LifecycleError, PublishError};

// 설정
pub use config::DecanterConfig;

// 이벤트
pub use event::{Attributes, Event, Topic};

// 퍼블리시 싱크
pub use publish::{EventBus, EventPublisher, Subscription, TopicFilter};

// 토픽 정규화
pub use topic::{logger_topic, normalize};
