//! Auto PULL Response Handler
//!
//! PULL 한 번(n = -1)으로 전체 결과를 받는 스트림 핸들러

use super::pull::{PullHandler, PullState, StreamCore};
use super::run::RunSummary;
use super::transaction::TransactionContext;
use crate::bolt::{BoltRequest, PackStreamValue, PullMessage, SuccessMessage};
use crate::driver::bookmark::BookmarkHolder;
use crate::driver::error::{DriverError, DriverResult};

/// 전체 결과를 한 번에 요청하는 스트림 핸들러
///
/// 일시 정지 상태가 없습니다. 시작하면 완료나 실패까지 진행합니다.
/// 취소는 이후 레코드를 버리기만 하며 추가 요청을 보내지 않습니다.
#[derive(Debug)]
pub struct AutoPullResponseHandler {
    core: StreamCore,
}

impl AutoPullResponseHandler {
    /// 새 핸들러
    pub fn new(bookmark_holder: Option<BookmarkHolder>, tx: Option<TransactionContext>) -> Self {
        Self {
            core: StreamCore::new(bookmark_holder, tx),
        }
    }
}

impl PullHandler for AutoPullResponseHandler {
    fn state(&self) -> PullState {
        self.core.state()
    }

    fn failure(&self) -> Option<&DriverError> {
        self.core.failure()
    }

    fn summary(&self) -> Option<&SuccessMessage> {
        self.core.summary()
    }

    fn pop_record(&mut self) -> Option<Vec<PackStreamValue>> {
        self.core.pop_record()
    }

    fn peek_record(&self) -> Option<&Vec<PackStreamValue>> {
        self.core.peek_record()
    }

    fn buffered(&self) -> usize {
        self.core.buffered()
    }

    fn is_discarding(&self) -> bool {
        self.core.is_discarding()
    }

    fn first_request(&mut self) -> DriverResult<BoltRequest> {
        self.core.begin("PULL_ALL")?;
        Ok(BoltRequest::Pull(PullMessage::all()))
    }

    fn on_run_success(&mut self, run: &RunSummary) {
        self.core.on_run_success(run);
    }

    fn on_run_failure(&mut self, error: &DriverError) {
        self.core.on_run_failure(error);
    }

    fn on_record(&mut self, values: Vec<PackStreamValue>) -> DriverResult<()> {
        self.core.on_record(values)
    }

    fn on_success(&mut self, metadata: &SuccessMessage) -> DriverResult<Option<BoltRequest>> {
        self.core.expect_summary("PULL_ALL SUCCESS")?;
        if metadata.has_more() {
            return Err(DriverError::protocol("unbounded PULL answered with has_more"));
        }
        self.core.complete(metadata);
        Ok(None)
    }

    fn on_failure(&mut self, error: DriverError) -> DriverResult<()> {
        self.core.on_failure(error)
    }

    fn on_ignored(&mut self, error: DriverError) -> DriverResult<()> {
        self.core.on_ignored(error)
    }

    fn on_fatal(&mut self, error: DriverError) {
        self.core.on_fatal(error);
    }

    fn request_more(&mut self) -> Option<BoltRequest> {
        None
    }

    fn cancel(&mut self) -> Option<BoltRequest> {
        // Paused가 없으므로 항상 즉시 처리됩니다.
        self.core.cancel_without_request();
        None
    }
}
