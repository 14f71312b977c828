//! Protocol Versions
//!
//! 버전별 동작 테이블
//!
//! 각 버전은 [`BoltProtocol`] 항목 하나입니다. 새 버전은 이전 항목을 복사하고
//! 바뀐 슬롯만 덮어씁니다.
//!
//! | 버전 | 추가 기능 |
//! |------|-----------|
//! | 3.0  | 트랜잭션 메타데이터 |
//! | 4.0  | 데이터베이스 선택, 배치 PULL, qid |
//! | 4.1  | NOOP 청크 |
//! | 4.2  | - |
//! | 4.3  | ROUTE |
//! | 4.4  | 임퍼소네이션 |

pub mod format;
mod v3;
mod v4;

pub use format::{MessageFormat, V3_FORMAT, V4_FORMAT};

use std::fmt;

use bitflags::bitflags;
use tracing::debug;

use super::bookmark::{BookmarkHolder, BookmarkSet};
use super::config::{DatabaseName, FetchSize, TransactionConfig};
use super::connection::Connection;
use super::cursor::{CursorFactory, Query};
use super::error::{DriverError, DriverResult};
use super::handlers::{
    BeginTxResponseHandler, CommitTxResponseHandler, RollbackTxResponseHandler, TransactionContext,
};
use crate::bolt::{BeginMessage, BoltError, BoltRequest, BoltVersion, RunMessage, TransactionMetadata};

// ============================================================================
// Capabilities - 버전별 기능
// ============================================================================

bitflags! {
    /// 협상된 버전이 지원하는 기능
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// RUN/BEGIN의 `db`로 데이터베이스 선택
        const DATABASE_SELECTION = 1 << 0;
        /// PULL/DISCARD에 배치 크기 `n`
        const BOUNDED_PULL = 1 << 1;
        /// 명시적 트랜잭션의 쿼리 ID
        const QUERY_ID = 1 << 2;
        /// 트랜잭션 타임아웃과 메타데이터
        const TRANSACTION_METADATA = 1 << 3;
        /// ROUTE 메시지
        const ROUTE_MESSAGE = 1 << 4;
        /// 다른 사용자로 실행
        const IMPERSONATION = 1 << 5;
        /// 빈 청크(NOOP) 허용
        const NOOP_CHUNKS = 1 << 6;
    }
}

// ============================================================================
// BoltProtocol - 버전 항목
// ============================================================================

/// 커서 팩토리 생성 슬롯
///
/// 인자: 연결, RUN, 북마크 홀더(자동 커밋), 트랜잭션(명시적), RUN 응답 대기 여부, fetch size
pub type BuildCursorFactory = fn(
    Connection,
    RunMessage,
    Option<BookmarkHolder>,
    Option<TransactionContext>,
    bool,
    FetchSize,
) -> CursorFactory;

/// 데이터베이스 이름 검사 슬롯
pub type VerifyDatabase = fn(&DatabaseName) -> DriverResult<()>;

/// 프로토콜 버전 하나
///
/// 연결마다 핸드셰이크 때 하나가 정해지며 바뀌지 않습니다.
pub struct BoltProtocol {
    version: BoltVersion,
    capabilities: Capabilities,
    message_format: &'static MessageFormat,
    build_cursor_factory: BuildCursorFactory,
    verify_database: VerifyDatabase,
}

static REGISTRY: [BoltProtocol; 6] = [
    v3::BOLT_V3,
    v4::BOLT_V4_0,
    v4::BOLT_V4_1,
    v4::BOLT_V4_2,
    v4::BOLT_V4_3,
    v4::BOLT_V4_4,
];

impl BoltProtocol {
    /// 버전으로 조회
    pub fn for_version(version: BoltVersion) -> &'static BoltProtocol {
        let index = match version {
            BoltVersion::V3 => 0,
            BoltVersion::V4_0 => 1,
            BoltVersion::V4_1 => 2,
            BoltVersion::V4_2 => 3,
            BoltVersion::V4_3 => 4,
            BoltVersion::V4_4 => 5,
        };
        &REGISTRY[index]
    }

    /// 핸드셰이크 원시 값으로 조회
    pub fn for_raw(raw: u32) -> DriverResult<&'static BoltProtocol> {
        BoltVersion::from_u32(raw)
            .map(Self::for_version)
            .ok_or_else(|| BoltError::UnsupportedVersion(raw).into())
    }

    /// 등록된 모든 버전 (오래된 순)
    pub fn all() -> &'static [BoltProtocol] {
        &REGISTRY
    }

    /// 버전
    pub fn version(&self) -> BoltVersion {
        self.version
    }

    /// 지원 기능
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// 기능 지원 여부
    pub fn supports(&self, capability: Capabilities) -> bool {
        self.capabilities.contains(capability)
    }

    /// 메시지 코덱
    pub fn message_format(&self) -> &'static MessageFormat {
        self.message_format
    }

    /// 메시지 코덱 (버전 교체 없이 같은 인스턴스)
    pub fn create_message_format(&self) -> &'static MessageFormat {
        self.message_format
    }

    /// 데이터베이스 선택 가능 여부 검사 (메시지를 보내기 전)
    pub fn verify_database_name_before_transaction(&self, database: &DatabaseName) -> DriverResult<()> {
        (self.verify_database)(database)
    }

    /// 버전에 맞는 PULL 전략으로 커서 팩토리 생성
    pub fn build_result_cursor_factory(
        &self,
        connection: Connection,
        run: RunMessage,
        bookmark_holder: Option<BookmarkHolder>,
        tx: Option<TransactionContext>,
        wait_for_run_response: bool,
        fetch_size: FetchSize,
    ) -> CursorFactory {
        (self.build_cursor_factory)(connection, run, bookmark_holder, tx, wait_for_run_response, fetch_size)
    }

    // ========================================================================
    // 트랜잭션 연산
    // ========================================================================

    /// 자동 커밋 쿼리
    ///
    /// RUN에 북마크와 트랜잭션 설정을 담습니다. 스트림이 끝나면 서버가 돌려준
    /// 북마크가 `bookmark_holder`에 들어갑니다. `fetch_size`가 `None`이면
    /// 연결 설정의 값을 씁니다.
    pub fn run_in_auto_commit_transaction(
        &self,
        connection: &Connection,
        query: Query,
        bookmark_holder: &BookmarkHolder,
        config: &TransactionConfig,
        database: &DatabaseName,
        fetch_size: impl Into<Option<FetchSize>>,
    ) -> DriverResult<CursorFactory> {
        let fetch_size = fetch_size.into().unwrap_or(connection.config().fetch_size);
        self.verify_database_name_before_transaction(database)?;
        self.verify_impersonation(config)?;

        let extra = transaction_metadata(&bookmark_holder.get(), config, database);
        let run = RunMessage::new(query.text)
            .with_parameters(query.parameters)
            .with_extra(extra);
        Ok(self.build_result_cursor_factory(
            connection.clone(),
            run,
            Some(bookmark_holder.clone()),
            None,
            false,
            fetch_size,
        ))
    }

    /// 명시적 트랜잭션 안의 쿼리 (RUN의 extra는 비어 있음)
    ///
    /// `None`으로 준 값은 연결 설정에서 가져옵니다.
    pub fn run_in_explicit_transaction(
        &self,
        connection: &Connection,
        query: Query,
        tx: &TransactionContext,
        wait_for_run_response: impl Into<Option<bool>>,
        fetch_size: impl Into<Option<FetchSize>>,
    ) -> DriverResult<CursorFactory> {
        let defaults = connection.config();
        let wait_for_run_response = wait_for_run_response.into().unwrap_or(defaults.wait_for_run_response);
        let fetch_size = fetch_size.into().unwrap_or(defaults.fetch_size);
        let run = RunMessage::new(query.text).with_parameters(query.parameters);
        Ok(self.build_result_cursor_factory(
            connection.clone(),
            run,
            None,
            Some(tx.clone()),
            wait_for_run_response,
            fetch_size,
        ))
    }

    /// BEGIN 전송 후 응답 대기
    pub async fn begin_transaction(
        &self,
        connection: &Connection,
        bookmark: &BookmarkSet,
        config: &TransactionConfig,
        database: &DatabaseName,
    ) -> DriverResult<TransactionContext> {
        self.verify_database_name_before_transaction(database)?;
        self.verify_impersonation(config)?;

        let extra = transaction_metadata(bookmark, config, database);
        let (handler, rx) = BeginTxResponseHandler::new();
        connection.write(BoltRequest::Begin(BeginMessage::new(extra)), Box::new(handler))?;
        rx.await.map_err(|_| closed("BEGIN"))??;

        debug!(version = %self.version, %database, "transaction started");
        Ok(TransactionContext::new())
    }

    /// COMMIT 전송 후 서버가 돌려준 북마크 반환
    ///
    /// 홀더가 주어지면 결과가 반환되기 전에 갱신됩니다.
    pub async fn commit_transaction(
        &self,
        connection: &Connection,
        bookmark_holder: Option<&BookmarkHolder>,
    ) -> DriverResult<BookmarkSet> {
        let (handler, rx) = CommitTxResponseHandler::new(bookmark_holder.cloned());
        connection.write(BoltRequest::Commit, Box::new(handler))?;
        rx.await.map_err(|_| closed("COMMIT"))?
    }

    /// ROLLBACK 전송 후 응답 대기
    pub async fn rollback_transaction(&self, connection: &Connection) -> DriverResult<()> {
        let (handler, rx) = RollbackTxResponseHandler::new();
        connection.write(BoltRequest::Rollback, Box::new(handler))?;
        rx.await.map_err(|_| closed("ROLLBACK"))?
    }

    fn verify_impersonation(&self, config: &TransactionConfig) -> DriverResult<()> {
        match &config.imp_user {
            Some(user) if !self.supports(Capabilities::IMPERSONATION) => {
                Err(DriverError::invalid_argument(format!(
                    "Impersonation of '{}' is not supported in Bolt Protocol Version {}",
                    user, self.version
                )))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for BoltProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoltProtocol")
            .field("version", &self.version)
            .field("capabilities", &self.capabilities)
            .field("message_format", &self.message_format.name())
            .finish()
    }
}

impl PartialEq for BoltProtocol {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for BoltProtocol {}

fn closed(request: &str) -> DriverError {
    DriverError::connection(format!("connection closed before {} completed", request))
}

/// RUN(자동 커밋)과 BEGIN의 extra
fn transaction_metadata(
    bookmark: &BookmarkSet,
    config: &TransactionConfig,
    database: &DatabaseName,
) -> TransactionMetadata {
    let mut extra = TransactionMetadata::new()
        .with_bookmarks(bookmark.values())
        .with_mode(config.mode);
    if let Some(timeout) = config.timeout {
        extra = extra.with_timeout(timeout);
    }
    for (key, value) in &config.metadata {
        extra = extra.with_tx_metadata(key.clone(), value.clone());
    }
    if let Some(name) = database.name() {
        extra = extra.with_database(name);
    }
    if let Some(user) = &config.imp_user {
        extra = extra.with_imp_user(user.clone());
    }
    extra
}

// ============================================================================
// Tests
// ============================================================================
