#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`socket`]: 원격 로깅 레코드를 받는 TCP 리스너 (프레이밍, 레코드 디코딩)
//! - [`camel`]: 워크플로 엔진 생명주기 알림 필터링 및 보강
//! - [`eventadmin`]: 버스 이벤트를 `decanter/collect/eventadmin/...`으로 재퍼블리시
//! - [`host`]: 로컬 호스트 주소/이름 조회
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! TCP clients  -> SocketCollector      -\
//! Notification -> CamelEventNotifier   ---> EventPublisher (EventBus)
//! BusEvent     -> EventAdminCollector  -/
//! ```

pub mod camel;
pub mod error;
pub mod eventadmin;
pub mod host;
pub mod socket;

// --- 주요 타입 re-export ---

// 에러
pub use error::CollectorError;

// 호스트 정보
pub use host::HostIdentity;

// 소켓 수집기
pub use socket::{
    Framing, ListenerState, LoggingRecord, SocketCollector, SocketCollectorConfig,
    SocketStatsSnapshot,
};

// Camel 알림기
pub use camel::{CamelEventNotifier, ExchangeExtender, Notification, NotifierSettings};

// EventAdmin 수집기
pub use eventadmin::{BusEvent, EventAdminCollector, EventAdminCollectorConfig, PropertyValue, Subject};
