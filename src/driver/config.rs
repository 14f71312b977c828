//! Protocol Configuration
//!
//! 엔진 설정 및 트랜잭션 설정

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{DriverError, DriverResult};
use crate::bolt::codec::DEFAULT_MAX_MESSAGE_SIZE;
use crate::bolt::handshake::{default_proposals, VersionProposal};
use crate::bolt::{AccessMode, PackStreamValue};

// ============================================================================
// FetchSize - 배치 크기
// ============================================================================

/// PULL 한 번에 요청하는 레코드 수
///
/// 양수 n 또는 전체를 뜻하는 [`FetchSize::ALL`] (-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct FetchSize(i64);

impl FetchSize {
    /// 전체 레코드 (무제한)
    pub const ALL: FetchSize = FetchSize(-1);

    /// 기본 배치 크기
    pub const DEFAULT: FetchSize = FetchSize(1000);

    /// 배치 크기 생성 (0과 -1이 아닌 음수는 거부)
    pub fn new(n: i64) -> DriverResult<Self> {
        if n > 0 || n == -1 {
            Ok(Self(n))
        } else {
            Err(DriverError::invalid_argument(format!(
                "The record fetch size may not be 0 or negative (other than -1 for all). Given: {}",
                n
            )))
        }
    }

    /// 전체 요청 여부
    pub fn is_all(self) -> bool {
        self.0 == -1
    }

    /// PULL의 `n` 값
    pub fn value(self) -> i64 {
        self.0
    }
}

impl Default for FetchSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i64> for FetchSize {
    type Error = DriverError;

    fn try_from(n: i64) -> Result<Self, Self::Error> {
        Self::new(n)
    }
}

impl From<FetchSize> for i64 {
    fn from(size: FetchSize) -> Self {
        size.0
    }
}

impl fmt::Display for FetchSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            write!(f, "ALL")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

// ============================================================================
// DatabaseName - 데이터베이스 이름
// ============================================================================

/// 쿼리 대상 데이터베이스
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum DatabaseName {
    /// 서버 기본 데이터베이스 (메시지에 `db`를 쓰지 않음)
    #[default]
    Default,
    /// 이름이 지정된 데이터베이스
    Named(String),
}

impl DatabaseName {
    /// 이름 지정 데이터베이스 생성
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// 메시지에 쓸 이름
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Default => None,
            Self::Named(name) => Some(name),
        }
    }

    /// 기본 데이터베이스 여부
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

impl fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "<default database>"),
            Self::Named(name) => write!(f, "{}", name),
        }
    }
}

// ============================================================================
// TransactionConfig - 트랜잭션 설정
// ============================================================================

/// 트랜잭션 설정 (BEGIN 및 자동 커밋 RUN에 쓰임)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionConfig {
    /// 타임아웃
    pub timeout: Option<Duration>,
    /// 메타데이터
    pub metadata: HashMap<String, PackStreamValue>,
    /// 접근 모드
    pub mode: AccessMode,
    /// 임퍼소네이트 사용자
    pub imp_user: Option<String>,
}

impl TransactionConfig {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 타임아웃 설정
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 메타데이터 추가
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<PackStreamValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// 읽기 전용 설정
    pub fn with_read_access(mut self) -> Self {
        self.mode = AccessMode::Read;
        self
    }

    /// 임퍼소네이트 사용자 설정
    pub fn with_imp_user(mut self, user: impl Into<String>) -> Self {
        self.imp_user = Some(user.into());
        self
    }
}

// ============================================================================
// ProtocolConfig - 엔진 설정
// ============================================================================

/// 엔진 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// 기본 fetch size
    pub fetch_size: FetchSize,
    /// 최대 메시지 크기 (바이트)
    pub max_message_size: usize,
    /// 커서 생성 시 RUN 응답을 기다릴지 여부
    pub wait_for_run_response: bool,
    /// 핸드셰이크 응답 대기 시간
    pub handshake_timeout: Duration,
    /// 핸드셰이크 제안 목록 (선호 순)
    #[serde(skip, default = "default_proposals")]
    pub proposed_versions: Vec<VersionProposal>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            fetch_size: FetchSize::DEFAULT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            wait_for_run_response: false,
            handshake_timeout: Duration::from_secs(30),
            proposed_versions: default_proposals(),
        }
    }
}

impl ProtocolConfig {
    /// 빌더 패턴으로 설정 생성
    pub fn builder() -> ProtocolConfigBuilder {
        ProtocolConfigBuilder::default()
    }
}

/// 엔진 설정 빌더
#[derive(Debug, Clone, Default)]
pub struct ProtocolConfigBuilder {
    config: ProtocolConfig,
}

impl ProtocolConfigBuilder {
    /// fetch size 설정
    pub fn fetch_size(mut self, size: FetchSize) -> Self {
        self.config.fetch_size = size;
        self
    }

    /// 최대 메시지 크기 설정
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// RUN 응답 대기 설정
    pub fn wait_for_run_response(mut self, wait: bool) -> Self {
        self.config.wait_for_run_response = wait;
        self
    }

    /// 핸드셰이크 타임아웃 설정
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// 핸드셰이크 제안 설정
    pub fn proposed_versions(mut self, proposals: Vec<VersionProposal>) -> Self {
        self.config.proposed_versions = proposals;
        self
    }

    /// 설정 빌드
    pub fn build(self) -> DriverResult<ProtocolConfig> {
        let proposals = self.config.proposed_versions.len();
        if proposals == 0 || proposals > 4 {
            return Err(DriverError::invalid_argument(format!(
                "Expected 1 to 4 version proposals, got {}",
                proposals
            )));
        }
        if self.config.max_message_size == 0 {
            return Err(DriverError::invalid_argument("max_message_size must be positive"));
        }
        if self.config.handshake_timeout.is_zero() {
            return Err(DriverError::invalid_argument("handshake_timeout must be positive"));
        }
        Ok(self.config)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::BoltVersion;

    #[test]
    fn test_fetch_size_validation() {
        assert_eq!(FetchSize::new(5).unwrap().value(), 5);
        assert!(FetchSize::new(-1).unwrap().is_all());
        assert!(matches!(FetchSize::new(0), Err(DriverError::InvalidArgument(_))));
        assert!(FetchSize::new(-2).is_err());
        assert_eq!(FetchSize::ALL.to_string(), "ALL");
    }

    #[test]
    fn test_database_name() {
        assert!(DatabaseName::default().is_default());
        assert_eq!(DatabaseName::default().name(), None);
        assert_eq!(DatabaseName::named("movies").name(), Some("movies"));
    }

    #[test]
    fn test_builder() {
        let config = ProtocolConfig::builder()
            .fetch_size(FetchSize::new(50).unwrap())
            .wait_for_run_response(true)
            .build()
            .unwrap();
        assert_eq!(config.fetch_size.value(), 50);
        assert!(config.wait_for_run_response);
    }

    #[test]
    fn test_builder_rejects_bad_proposals() {
        let five = vec![VersionProposal::exact(BoltVersion::V4_4); 5];
        assert!(ProtocolConfig::builder().proposed_versions(five).build().is_err());
        assert!(ProtocolConfig::builder().proposed_versions(vec![]).build().is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config: ProtocolConfig =
            serde_json::from_str(r#"{"fetch_size": -1, "max_message_size": 1024}"#).unwrap();
        assert!(config.fetch_size.is_all());
        assert_eq!(config.max_message_size, 1024);
        assert_eq!(config.proposed_versions, default_proposals());

        assert!(serde_json::from_str::<ProtocolConfig>(r#"{"fetch_size": 0}"#).is_err());
    }

    #[test]
    fn test_config_serializes_fetch_size_as_integer() {
        let json = serde_json::to_value(ProtocolConfig::default()).unwrap();
        assert_eq!(json["fetch_size"], 1000);
        assert!(json.get("proposed_versions").is_none());
    }

    #[test]
    fn test_transaction_config() {
        let config = TransactionConfig::new()
            .with_timeout(Duration::from_secs(2))
            .with_metadata("app", "billing")
            .with_read_access();
        assert_eq!(config.mode, AccessMode::Read);
        assert_eq!(config.metadata.get("app").and_then(|v| v.as_str()), Some("billing"));
    }
}
