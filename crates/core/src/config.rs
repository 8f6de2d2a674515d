//! 설정 관리 -- decanter.toml 파싱 및 런타임 설정
//!
//! [`DecanterConfig`]는 모든 수집기의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DECANTER_SOCKET_BIND_ADDR=127.0.0.1:4560` 형식)
//! 3. 설정 파일 (`decanter.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), decanter_core::error::DecanterError> {
//! use decanter_core::config::DecanterConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = DecanterConfig::load("decanter.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = DecanterConfig::parse("[socket]\nbind_addr = \"127.0.0.1:4560\"")?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DecanterError};

/// Decanter 통합 설정
///
/// 각 수집기는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecanterConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 소켓 수집기 설정
    #[serde(default)]
    pub socket: SocketConfig,
    /// Camel 이벤트 알림기 설정
    #[serde(default)]
    pub camel: CamelConfig,
    /// EventAdmin 수집기 설정
    #[serde(default)]
    pub eventadmin: EventAdminConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl DecanterConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DecanterError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DecanterError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DecanterError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DecanterError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DecanterError> {
        toml::from_str(toml_str).map_err(|e| {
            DecanterError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DECANTER_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DECANTER_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DECANTER_GENERAL_LOG_FORMAT");
        override_string(
            &mut self.general.instance_name,
            "DECANTER_GENERAL_INSTANCE_NAME",
        );

        // Socket
        override_bool(&mut self.socket.enabled, "DECANTER_SOCKET_ENABLED");
        override_string(&mut self.socket.bind_addr, "DECANTER_SOCKET_BIND_ADDR");
        override_usize(
            &mut self.socket.max_connections,
            "DECANTER_SOCKET_MAX_CONNECTIONS",
        );
        override_string(&mut self.socket.framing, "DECANTER_SOCKET_FRAMING");
        override_usize(
            &mut self.socket.max_message_size,
            "DECANTER_SOCKET_MAX_MESSAGE_SIZE",
        );
        override_u64(
            &mut self.socket.shutdown_grace_secs,
            "DECANTER_SOCKET_SHUTDOWN_GRACE_SECS",
        );

        // Camel
        override_bool(&mut self.camel.enabled, "DECANTER_CAMEL_ENABLED");
        override_string(
            &mut self.camel.camel_context_matcher,
            "DECANTER_CAMEL_CAMEL_CONTEXT_MATCHER",
        );
        override_string(
            &mut self.camel.route_matcher,
            "DECANTER_CAMEL_ROUTE_MATCHER",
        );
        override_bool(&mut self.camel.include_body, "DECANTER_CAMEL_INCLUDE_BODY");
        override_bool(
            &mut self.camel.include_headers,
            "DECANTER_CAMEL_INCLUDE_HEADERS",
        );
        override_bool(
            &mut self.camel.include_properties,
            "DECANTER_CAMEL_INCLUDE_PROPERTIES",
        );
        for (flag, env_key) in self.camel.ignore_flags_mut() {
            override_bool(flag, env_key);
        }

        // EventAdmin
        override_bool(&mut self.eventadmin.enabled, "DECANTER_EVENTADMIN_ENABLED");
        override_csv(
            &mut self.eventadmin.excluded_topics,
            "DECANTER_EVENTADMIN_EXCLUDED_TOPICS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "DECANTER_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "DECANTER_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "DECANTER_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "DECANTER_METRICS_ENDPOINT");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 정규식 컴파일 검증은 알림기 생성 시점에 수행됩니다.
    pub fn validate(&self) -> Result<(), DecanterError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.socket.enabled {
            if self.socket.bind_addr.parse::<SocketAddr>().is_err() {
                return Err(invalid(
                    "socket.bind_addr",
                    format!("'{}' is not a socket address", self.socket.bind_addr),
                ));
            }
            if self.socket.max_connections == 0 {
                return Err(invalid("socket.max_connections", "must be at least 1"));
            }
            if self.socket.max_message_size == 0 {
                return Err(invalid("socket.max_message_size", "must be at least 1"));
            }
            let valid_framings = ["newline", "length_prefixed"];
            if !valid_framings.contains(&self.socket.framing.as_str()) {
                return Err(invalid(
                    "socket.framing",
                    format!("must be one of: {}", valid_framings.join(", ")),
                ));
            }
        }

        if self.camel.enabled {
            if self.camel.camel_context_matcher.is_empty() {
                return Err(invalid("camel.camel_context_matcher", "must not be empty"));
            }
            if self.camel.route_matcher.is_empty() {
                return Err(invalid("camel.route_matcher", "must not be empty"));
            }
        }

        if self.eventadmin.enabled
            && self.eventadmin.excluded_topics.iter().any(String::is_empty)
        {
            return Err(invalid(
                "eventadmin.excluded_topics",
                "topic filters must not be empty",
            ));
        }

        if self.metrics.enabled && !self.metrics.endpoint.starts_with('/') {
            return Err(invalid("metrics.endpoint", "must start with '/'"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> DecanterError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 인스턴스 이름. 비어 있지 않으면 모든 이벤트에 `instanceName`으로 붙습니다.
    pub instance_name: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            instance_name: String::new(),
        }
    }
}

impl GeneralConfig {
    /// 설정된 인스턴스 이름 (빈 문자열이면 `None`)
    pub fn instance_name(&self) -> Option<&str> {
        Some(self.instance_name.as_str()).filter(|name| !name.is_empty())
    }
}

/// 소켓 수집기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub bind_addr: String,
    /// 동시 연결 상한
    pub max_connections: usize,
    /// 레코드 프레이밍 (newline, length_prefixed)
    pub framing: String,
    /// 레코드 하나의 최대 크기 (바이트)
    pub max_message_size: usize,
    /// 종료 시 진행 중인 연결을 기다리는 시간 (초)
    pub shutdown_grace_secs: u64,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: "0.0.0.0:4560".to_owned(),
            max_connections: 256,
            framing: "newline".to_owned(),
            max_message_size: 1024 * 1024, // 1MB
            shutdown_grace_secs: 2,
        }
    }
}

/// Camel 이벤트 알림기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CamelConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// CamelContext 이름에 전체 매칭되어야 하는 정규식
    pub camel_context_matcher: String,
    /// 라우트 ID에 전체 매칭되어야 하는 정규식
    pub route_matcher: String,
    /// 메시지 본문 포함 여부
    pub include_body: bool,
    /// 메시지 헤더 포함 여부
    pub include_headers: bool,
    /// 익스체인지 속성 포함 여부
    pub include_properties: bool,
    pub ignore_exchange_events: bool,
    pub ignore_route_events: bool,
    pub ignore_camel_context_events: bool,
    pub ignore_exchange_created_events: bool,
    pub ignore_exchange_completed_events: bool,
    /// `ExchangeFailed`와 `ExchangeFailureHandled` 모두에 적용됩니다.
    pub ignore_exchange_failed_events: bool,
    pub ignore_exchange_redelivery_events: bool,
    pub ignore_exchange_sending_events: bool,
    pub ignore_exchange_sent_events: bool,
    pub ignore_service_startup_failure_events: bool,
    pub ignore_service_stop_failure_events: bool,
}

impl Default for CamelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            camel_context_matcher: ".*".to_owned(),
            route_matcher: ".*".to_owned(),
            include_body: true,
            include_headers: true,
            include_properties: true,
            ignore_exchange_events: false,
            ignore_route_events: false,
            ignore_camel_context_events: false,
            ignore_exchange_created_events: false,
            ignore_exchange_completed_events: false,
            ignore_exchange_failed_events: false,
            ignore_exchange_redelivery_events: false,
            ignore_exchange_sending_events: false,
            ignore_exchange_sent_events: false,
            ignore_service_startup_failure_events: false,
            ignore_service_stop_failure_events: false,
        }
    }
}

impl CamelConfig {
    fn ignore_flags_mut(&mut self) -> [(&mut bool, &'static str); 11] {
        [
            (
                &mut self.ignore_exchange_events,
                "DECANTER_CAMEL_IGNORE_EXCHANGE_EVENTS",
            ),
            (
                &mut self.ignore_route_events,
                "DECANTER_CAMEL_IGNORE_ROUTE_EVENTS",
            ),
            (
                &mut self.ignore_camel_context_events,
                "DECANTER_CAMEL_IGNORE_CAMEL_CONTEXT_EVENTS",
            ),
            (
                &mut self.ignore_exchange_created_events,
                "DECANTER_CAMEL_IGNORE_EXCHANGE_CREATED_EVENTS",
            ),
            (
                &mut self.ignore_exchange_completed_events,
                "DECANTER_CAMEL_IGNORE_EXCHANGE_COMPLETED_EVENTS",
            ),
            (
                &mut self.ignore_exchange_failed_events,
                "DECANTER_CAMEL_IGNORE_EXCHANGE_FAILED_EVENTS",
            ),
            (
                &mut self.ignore_exchange_redelivery_events,
                "DECANTER_CAMEL_IGNORE_EXCHANGE_REDELIVERY_EVENTS",
            ),
            (
                &mut self.ignore_exchange_sending_events,
                "DECANTER_CAMEL_IGNORE_EXCHANGE_SENDING_EVENTS",
            ),
            (
                &mut self.ignore_exchange_sent_events,
                "DECANTER_CAMEL_IGNORE_EXCHANGE_SENT_EVENTS",
            ),
            (
                &mut self.ignore_service_startup_failure_events,
                "DECANTER_CAMEL_IGNORE_SERVICE_STARTUP_FAILURE_EVENTS",
            ),
            (
                &mut self.ignore_service_stop_failure_events,
                "DECANTER_CAMEL_IGNORE_SERVICE_STOP_FAILURE_EVENTS",
            ),
        ]
    }
}

/// EventAdmin 수집기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventAdminConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수집하지 않을 토픽 필터 목록 (`decanter/*` 형식)
    pub excluded_topics: Vec<String>,
}

impl Default for EventAdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // 자기 출력을 다시 수집하지 않도록
            excluded_topics: vec!["decanter/*".to_owned()],
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// Prometheus 엔드포인트 수신 주소
    pub listen_addr: String,
    /// Prometheus 엔드포인트 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = DecanterConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert!(config.general.instance_name().is_none());
        assert_eq!(config.socket.bind_addr, "0.0.0.0:4560");
        assert_eq!(config.socket.max_connections, 256);
        assert_eq!(config.socket.shutdown_grace_secs, 2);
        assert_eq!(config.camel.camel_context_matcher, ".*");
        assert!(config.camel.include_body);
        assert!(!config.camel.ignore_exchange_events);
        assert_eq!(config.eventadmin.excluded_topics, vec!["decanter/*"]);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        DecanterConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = DecanterConfig::parse("").unwrap();
        assert_eq!(config.socket.framing, "newline");
        assert_eq!(config.camel.route_matcher, ".*");
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[socket]
bind_addr = "127.0.0.1:14560"

[camel]
ignore_route_events = true
route_matcher = "audit-.*"
"#;
        let config = DecanterConfig::parse(toml).unwrap();
        assert_eq!(config.socket.bind_addr, "127.0.0.1:14560");
        // max_connections는 기본값 유지
        assert_eq!(config.socket.max_connections, 256);
        assert!(config.camel.ignore_route_events);
        assert!(!config.camel.ignore_exchange_events);
        assert_eq!(config.camel.route_matcher, "audit-.*");
    }

    #[test]
    fn instance_name_is_optional() {
        let config = DecanterConfig::parse("[general]\ninstance_name = \"node-1\"").unwrap();
        assert_eq!(config.general.instance_name(), Some("node-1"));
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = DecanterConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            DecanterError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = DecanterConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_bad_bind_addr() {
        let mut config = DecanterConfig::default();
        config.socket.bind_addr = "localhost".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("socket.bind_addr"));
    }

    #[test]
    fn validate_skips_socket_checks_when_disabled() {
        let mut config = DecanterConfig::default();
        config.socket.enabled = false;
        config.socket.bind_addr = "not-an-addr".to_owned();
        config.socket.max_connections = 0;
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_connections() {
        let mut config = DecanterConfig::default();
        config.socket.max_connections = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_connections"));
    }

    #[test]
    fn validate_rejects_unknown_framing() {
        let mut config = DecanterConfig::default();
        config.socket.framing = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("framing"));
    }

    #[test]
    fn validate_rejects_empty_matcher() {
        let mut config = DecanterConfig::default();
        config.camel.route_matcher = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("route_matcher"));
    }

    #[test]
    fn validate_rejects_relative_metrics_endpoint() {
        let mut config = DecanterConfig::default();
        config.metrics.enabled = true;
        config.metrics.endpoint = "metrics".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("metrics.endpoint"));
    }

    #[test]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_DECANTER_STR", "overridden") };
        override_string(&mut val, "TEST_DECANTER_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_DECANTER_STR") };
    }

    #[test]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = false;
        // SAFETY: 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_DECANTER_BOOL_BAD", "not-a-bool") };
        override_bool(&mut val, "TEST_DECANTER_BOOL_BAD");
        assert!(!val); // 원래 값 유지
        unsafe { std::env::remove_var("TEST_DECANTER_BOOL_BAD") };
    }

    #[test]
    fn env_override_u16() {
        let mut val = 9464_u16;
        // SAFETY: 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_DECANTER_U16", "9100") };
        override_u16(&mut val, "TEST_DECANTER_U16");
        assert_eq!(val, 9100);
        unsafe { std::env::remove_var("TEST_DECANTER_U16") };
    }

    #[test]
    fn env_override_csv_trims_and_drops_empty() {
        let mut val = vec!["a".to_owned()];
        // SAFETY: 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_DECANTER_CSV", "x/*, y ,,z") };
        override_csv(&mut val, "TEST_DECANTER_CSV");
        assert_eq!(val, vec!["x/*", "y", "z"]);
        unsafe { std::env::remove_var("TEST_DECANTER_CSV") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_DECANTER_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = DecanterConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = DecanterConfig::parse(&toml_str).unwrap();
        assert_eq!(config.socket.bind_addr, parsed.socket.bind_addr);
        assert_eq!(
            config.eventadmin.excluded_topics,
            parsed.eventadmin.excluded_topics
        );
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = DecanterConfig::from_file("/nonexistent/path/decanter.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DecanterError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
