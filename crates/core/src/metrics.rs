//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 수집기는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않았으면 호출은 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `decanter_`
//! - 수집기명: `socket_`, `events_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds`, 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use decanter_core::metrics as m;
//!
//! metrics::counter!(m::EVENTS_PUBLISHED_TOTAL, m::LABEL_SOURCE => m::SOURCE_LOG).increment(1);
//! ```

// ─── 레이블 ────────────────────────────────────────────────────────

/// 수집 소스 레이블 키
pub const LABEL_SOURCE: &str = "source";

/// 드롭 사유 레이블 키 (decode, oversize, io)
pub const LABEL_REASON: &str = "reason";

/// 소켓 로그 수집기
pub const SOURCE_LOG: &str = "log";

/// Camel 이벤트 알림기
pub const SOURCE_CAMEL: &str = "camel";

/// EventAdmin 수집기
pub const SOURCE_EVENTADMIN: &str = "eventadmin";

// ─── Socket 메트릭 ─────────────────────────────────────────────────

/// Socket: 수락된 연결 수 (counter)
pub const SOCKET_CONNECTIONS_ACCEPTED_TOTAL: &str = "decanter_socket_connections_accepted_total";

/// Socket: 연결 상한 초과로 거부된 연결 수 (counter)
pub const SOCKET_CONNECTIONS_REJECTED_TOTAL: &str = "decanter_socket_connections_rejected_total";

/// Socket: 현재 활성 연결 수 (gauge)
pub const SOCKET_ACTIVE_CONNECTIONS: &str = "decanter_socket_active_connections";

/// Socket: 수신된 레코드 수 (counter)
pub const SOCKET_RECORDS_RECEIVED_TOTAL: &str = "decanter_socket_records_received_total";

/// Socket: 드롭된 레코드 수 (counter, label: reason)
pub const SOCKET_RECORDS_DROPPED_TOTAL: &str = "decanter_socket_records_dropped_total";

// ─── 이벤트 메트릭 ─────────────────────────────────────────────────

/// 퍼블리시된 이벤트 수 (counter, label: source)
pub const EVENTS_PUBLISHED_TOTAL: &str = "decanter_events_published_total";

/// 규칙에 의해 걸러진 이벤트 수 (counter, label: source)
pub const EVENTS_FILTERED_TOTAL: &str = "decanter_events_filtered_total";

/// 퍼블리시 실패 수 (counter, label: source)
pub const PUBLISH_FAILURES_TOTAL: &str = "decanter_publish_failures_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "decanter_daemon_uptime_seconds";

/// Daemon: 활성화된 수집기 수 (gauge)
pub const DAEMON_COLLECTORS_ENABLED: &str = "decanter_daemon_collectors_enabled";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "decanter_daemon_build_info";

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Socket
    describe_counter!(
        SOCKET_CONNECTIONS_ACCEPTED_TOTAL,
        "Total number of accepted log socket connections"
    );
    describe_counter!(
        SOCKET_CONNECTIONS_REJECTED_TOTAL,
        "Connections rejected because the connection bound was reached"
    );
    describe_gauge!(
        SOCKET_ACTIVE_CONNECTIONS,
        "Log socket connections currently being read"
    );
    describe_counter!(
        SOCKET_RECORDS_RECEIVED_TOTAL,
        "Total number of framed records read from log sockets"
    );
    describe_counter!(
        SOCKET_RECORDS_DROPPED_TOTAL,
        "Records dropped before publishing (decode, oversize, io)"
    );

    // Events
    describe_counter!(
        EVENTS_PUBLISHED_TOTAL,
        "Events handed to the publish sink, per collector"
    );
    describe_counter!(
        EVENTS_FILTERED_TOTAL,
        "Events rejected by collector rules, per collector"
    );
    describe_counter!(
        PUBLISH_FAILURES_TOTAL,
        "Events the publish sink refused, per collector"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Decanter daemon uptime in seconds");
    describe_gauge!(
        DAEMON_COLLECTORS_ENABLED,
        "Number of collectors enabled in the daemon"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
