//! Cursor Factory
//!
//! 프로토콜 버전이 고른 스트림 방식으로 커서를 만듭니다.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::result::ResultCursor;
use super::summary::Query;
use super::{CursorShared, RunEntry, StreamEntry};
use crate::bolt::{BoltRequest, RunMessage};
use crate::driver::bookmark::BookmarkHolder;
use crate::driver::config::FetchSize;
use crate::driver::connection::Connection;
use crate::driver::error::DriverResult;
use crate::driver::handlers::{
    AutoPullResponseHandler, PullHandler, PullResponseHandler, RunResponseHandler, TransactionContext,
};

/// 결과를 당겨오는 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullStrategy {
    /// fetch size 단위 PULL
    Bounded(FetchSize),
    /// PULL 한 번으로 전체
    Auto,
}

/// 커서 팩토리
///
/// RUN 메시지와 스트림 방식이 정해진 상태이며, [`CursorFactory::create`]를
/// 호출해야 요청이 전송됩니다.
pub struct CursorFactory {
    connection: Connection,
    run: RunMessage,
    strategy: PullStrategy,
    bookmark_holder: Option<BookmarkHolder>,
    tx: Option<TransactionContext>,
    wait_for_run_response: bool,
}

impl CursorFactory {
    /// 새 팩토리
    pub fn new(
        connection: Connection,
        run: RunMessage,
        strategy: PullStrategy,
        bookmark_holder: Option<BookmarkHolder>,
        tx: Option<TransactionContext>,
        wait_for_run_response: bool,
    ) -> Self {
        Self {
            connection,
            run,
            strategy,
            bookmark_holder,
            tx,
            wait_for_run_response,
        }
    }

    /// 스트림 방식
    pub fn strategy(&self) -> PullStrategy {
        self.strategy
    }

    /// RUN 메시지
    pub fn run_message(&self) -> &RunMessage {
        &self.run
    }

    /// 생성 시 RUN 응답을 기다리는지 여부
    pub fn waits_for_run_response(&self) -> bool {
        self.wait_for_run_response
    }

    /// RUN 응답 대기 여부 변경
    pub fn wait_for_run_response(mut self, wait: bool) -> Self {
        self.wait_for_run_response = wait;
        self
    }

    /// RUN과 첫 PULL을 파이프라인으로 보내고 커서 생성
    ///
    /// RUN 응답을 기다리는 경우 RUN 실패가 여기서 바로 반환됩니다.
    /// 그렇지 않으면 첫 레코드 접근에서 드러납니다.
    pub async fn create(self) -> DriverResult<ResultCursor> {
        let mut pull: Box<dyn PullHandler> = match self.strategy {
            PullStrategy::Bounded(fetch_size) => Box::new(PullResponseHandler::new(
                fetch_size,
                self.bookmark_holder,
                self.tx.clone(),
            )),
            PullStrategy::Auto => Box::new(AutoPullResponseHandler::new(self.bookmark_holder, self.tx.clone())),
        };
        let run = match self.tx {
            Some(tx) => RunResponseHandler::in_transaction(tx),
            None => RunResponseHandler::new(),
        };

        let first = pull.first_request()?;
        let first_name = first.name();
        let query = Query::from(&self.run);
        let shared = Arc::new(CursorShared::new(run, pull));

        self.connection.write_all(vec![
            (BoltRequest::Run(self.run), Box::new(RunEntry::new(Arc::clone(&shared)))),
            (first, Box::new(StreamEntry::new(Arc::clone(&shared), first_name))),
        ])?;
        debug!(
            strategy = ?self.strategy,
            wait = self.wait_for_run_response,
            "query submitted"
        );

        let cursor = ResultCursor::new(self.connection, shared, query);
        if self.wait_for_run_response {
            cursor.keys().await?;
        }
        Ok(cursor)
    }
}

impl fmt::Debug for CursorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorFactory")
            .field("query", &self.run.query)
            .field("strategy", &self.strategy)
            .field("wait_for_run_response", &self.wait_for_run_response)
            .finish()
    }
}
