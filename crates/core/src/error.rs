//! 에러 타입 -- 도메인별 에러 정의

/// Decanter 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum DecanterError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 퍼블리시 싱크 에러
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    /// 수집기 생명주기 에러
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// 유효하지 않은 토픽
    #[error("invalid topic '{topic}': {reason}")]
    InvalidTopic { topic: String, reason: String },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 퍼블리시 싱크 에러
///
/// 코어는 이 에러를 로그로만 남기고 이벤트를 버립니다. 재시도하지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// 싱크가 닫혀 더 이상 이벤트를 받을 수 없음
    #[error("sink closed: {0}")]
    Closed(String),

    /// 싱크가 이벤트를 거부함
    #[error("event rejected: {0}")]
    Rejected(String),
}

/// 수집기 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// 현재 상태에서 허용되지 않는 전이
    #[error("invalid state transition: {operation} while {state}")]
    InvalidState { operation: String, state: String },

    /// 초기화 실패
    #[error("init failed: {0}")]
    InitFailed(String),
}
