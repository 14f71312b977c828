//! Driver Error Types
//!
//! 엔진 에러 정의

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::bolt::{BoltError, BoltErrorCode, FailureMessage};

// ============================================================================
// DriverError - 엔진 에러
// ============================================================================

/// 엔진 에러
///
/// `Clone`이므로 커서에 저장된 실패를 호출마다 그대로 다시 돌려줄 수 있습니다.
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    /// 잘못된 인자 (외부 북마크, 지원하지 않는 데이터베이스 선택, 잘못된 fetch size)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 프로토콜 위반 (연결을 더 이상 쓸 수 없음)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 서버가 보낸 FAILURE
    #[error("Server error: {code} - {message}")]
    Server {
        /// 서버 상태 코드
        code: String,
        /// 서버 메시지
        message: String,
    },

    /// 이전 실패 때문에 서버가 요청을 무시함
    #[error("Request ignored: {0}")]
    Ignored(String),

    /// 연결 에러
    #[error("Connection error: {0}")]
    Connection(String),

    /// I/O 에러
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),

    /// 이미 소비된 결과
    #[error("Result consumed: {0}")]
    ResultConsumed(String),

    /// 기대한 레코드 수와 다름 (`single`)
    #[error("No such record: {0}")]
    NoSuchRecord(String),

    /// 타임아웃 에러
    #[error("Timeout: {0}")]
    Timeout(String),
}

impl DriverError {
    /// 잘못된 인자 에러 생성
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// 프로토콜 에러 생성
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// 서버 에러 생성
    pub fn server(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Server {
            code: code.into(),
            message: message.into(),
        }
    }

    /// 연결 에러 생성
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// 타임아웃 에러 생성
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// IGNORED 응답에 대한 에러 생성
    ///
    /// 앞선 FAILURE가 있으면 그 내용을 함께 담습니다.
    pub fn ignored(cause: Option<&DriverError>) -> Self {
        match cause {
            Some(cause) => Self::Ignored(format!("after earlier failure: {}", cause)),
            None => Self::Ignored("no earlier failure recorded".to_string()),
        }
    }

    /// 서버 에러 코드 (Server 변형일 때)
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Server { code, .. } => Some(code),
            _ => None,
        }
    }

    /// 연결을 더 이상 쓸 수 없게 만드는 에러인지 여부
    ///
    /// 서버가 요청 자체를 읽지 못했다고 알린 FAILURE도 포함합니다.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Protocol(_) | Self::Connection(_) | Self::Io(_) => true,
            Self::Server { code, .. } => BoltErrorCode::is_fatal(code),
            _ => false,
        }
    }

    /// 요청 자체가 잘못된 서버 에러인지 여부
    pub fn is_client_error(&self) -> bool {
        self.code().is_some_and(BoltErrorCode::is_client_error)
    }

    /// 재시도 가능 여부 (분류만 하며 이 크레이트는 재시도하지 않음)
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Io(_) | Self::Timeout(_) => true,
            Self::Server { code, .. } => BoltErrorCode::is_transient(code),
            _ => false,
        }
    }
}

impl From<io::Error> for DriverError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<&FailureMessage> for DriverError {
    fn from(failure: &FailureMessage) -> Self {
        Self::server(failure.code.clone(), failure.message.clone())
    }
}

impl From<BoltError> for DriverError {
    fn from(err: BoltError) -> Self {
        match err {
            BoltError::Io(e) => Self::Io(Arc::new(e)),
            BoltError::ConnectionClosed => Self::connection("connection closed by peer"),
            BoltError::Handshake(e) => Self::connection(e.to_string()),
            other => Self::protocol(other.to_string()),
        }
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// 엔진 결과 타입
pub type DriverResult<T> = Result<T, DriverError>;

// ============================================================================
// Tests
// ============================================================================
