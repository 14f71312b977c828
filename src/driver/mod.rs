//! Driver Module
//!
//! 클라이언트 쪽 Bolt 엔진 (연결 위의 요청/응답 상태 머신)
//!
//! # 구성
//!
//! - [`bookmark`]: 인과적 일관성 북마크 (BookmarkSet, BookmarkHolder)
//! - [`protocol`]: 버전별 동작 테이블과 메시지 포맷
//! - [`connection`]: 연결 핸들, FIFO 응답 디스패처, 전송 경계
//! - [`handlers`]: RUN / PULL / 트랜잭션 응답 핸들러
//! - [`cursor`]: 결과 커서와 커서 팩토리
//!
//! # Example
//!
//! ```ignore
//! use zeta4g_protocol::driver::{connection, BookmarkHolder, DatabaseName, FetchSize, ProtocolConfig, Query, TransactionConfig};
//!
//! let config = ProtocolConfig::default();
//! let conn = connection::io::connect(tcp_stream, &config).await?;
//! let bookmarks = BookmarkHolder::new();
//!
//! // 자동 커밋 쿼리
//! let mut cursor = conn
//!     .protocol()
//!     .run_in_auto_commit_transaction(
//!         &conn,
//!         Query::new("MATCH (n) RETURN n LIMIT 10"),
//!         &bookmarks,
//!         &TransactionConfig::default(),
//!         &DatabaseName::Default,
//!         FetchSize::new(100)?,
//!     )?
//!     .create()
//!     .await?;
//!
//! while let Some(record) = cursor.next().await? {
//!     println!("{}", record);
//! }
//! let summary = cursor.consume().await?;
//! ```

pub mod bookmark;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod handlers;
pub mod protocol;
mod error;

// Re-exports
pub use bookmark::{Bookmark, BookmarkHolder, BookmarkSet};
pub use config::{DatabaseName, FetchSize, ProtocolConfig, ProtocolConfigBuilder, TransactionConfig};
pub use connection::{ChannelSink, Connection, InboundMessageDispatcher, InboundSender, MessageSink};
pub use cursor::{CursorFactory, PullStrategy, Query, Record, ResultCursor, ResultSummary};
pub use error::{DriverError, DriverResult};
pub use handlers::{PullHandler, PullState, ResponseHandler, TransactionContext};
pub use protocol::{BoltProtocol, Capabilities, MessageFormat};

/// 파라미터 맵 생성 매크로
#[macro_export]
macro_rules! params {
    () => {
        std::collections::HashMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = std::collections::HashMap::new();
        $(
            map.insert($key.into(), $crate::bolt::PackStreamValue::from($value));
        )+
        map
    }};
}
