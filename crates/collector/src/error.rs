//! 수집기 에러 타입
//!
//! [`CollectorError`]는 수집기 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<CollectorError> for DecanterError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.
//!
//! 레코드 단위, 이벤트 단위 에러는 로그만 남기고 버려지며 여기서 전파되는 것은
//! 시작 시점의 치명적 에러(바인드 실패, 잘못된 정규식 등)뿐입니다.

use decanter_core::error::{ConfigError, DecanterError, LifecycleError};

/// 수집기 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// 리스너 바인드 실패
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// 바인드하려던 주소
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// 현재 상태에서 허용되지 않는 연산
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// 레코드 디코딩 실패 (레코드 단위로 복구 가능)
    #[error("decode error: {0}")]
    Decode(String),

    /// 프레임이 최대 크기를 초과 (연결 종료)
    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config { field: String, reason: String },

    /// 정규식 컴파일 에러
    #[error("invalid pattern for {field}: {source}")]
    Pattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },

    /// 이벤트 보강 실패 (이벤트 단위로 복구 가능)
    #[error("enrichment failed: {0}")]
    Enrich(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CollectorError> for DecanterError {
    fn from(err: CollectorError) -> Self {
        match err {
            CollectorError::Config { field, reason } => {
                DecanterError::Config(ConfigError::InvalidValue { field, reason })
            }
            CollectorError::Pattern { field, source } => {
                DecanterError::Config(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: source.to_string(),
                })
            }
            CollectorError::InvalidState { operation, state } => {
                DecanterError::Lifecycle(LifecycleError::InvalidState {
                    operation: operation.to_owned(),
                    state,
                })
            }
            CollectorError::Io(e) => DecanterError::Io(e),
            other => DecanterError::Lifecycle(LifecycleError::InitFailed(other.to_string())),
        }
    }
}
