//! PULL Response Handlers
//!
//! 결과 스트림 상태 머신 (fetch size 단위 PULL)

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, trace};

use super::run::RunSummary;
use super::transaction::TransactionContext;
use crate::bolt::{BoltRequest, DiscardMessage, PackStreamValue, PullMessage, SuccessMessage};
use crate::driver::bookmark::BookmarkHolder;
use crate::driver::config::FetchSize;
use crate::driver::error::{DriverError, DriverResult};

// ============================================================================
// PullState - 스트림 상태
// ============================================================================

/// 결과 스트림 상태
///
/// `Init → AwaitingRunResponse → Streaming → {Paused, Exhausted, Failed}`.
/// `Paused`에서 클라이언트가 더 요청하면 `Streaming`으로 돌아갑니다.
/// `Exhausted`와 `Failed`는 종료 상태입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PullState {
    /// 첫 PULL 전
    Init,
    /// 첫 PULL을 보냈고 RUN 응답을 기다림
    AwaitingRunResponse,
    /// 요청한 배치를 받는 중
    Streaming,
    /// 배치가 끝났고 서버에 레코드가 남음
    Paused,
    /// 스트림 완료
    Exhausted,
    /// 실패
    Failed,
}

impl PullState {
    /// 종료 상태 여부
    pub fn is_terminal(self) -> bool {
        matches!(self, PullState::Exhausted | PullState::Failed)
    }

    /// 서버 응답을 기다리는 중인지 여부
    pub fn is_in_flight(self) -> bool {
        matches!(self, PullState::AwaitingRunResponse | PullState::Streaming)
    }
}

impl fmt::Display for PullState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PullState::Init => "INIT",
            PullState::AwaitingRunResponse => "AWAITING_RUN_RESPONSE",
            PullState::Streaming => "STREAMING",
            PullState::Paused => "PAUSED",
            PullState::Exhausted => "EXHAUSTED",
            PullState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

// ============================================================================
// PullHandler - 스트림 핸들러 트레이트
// ============================================================================

/// 결과 스트림 핸들러
///
/// 연결 없이 메시지 순서만으로 검증할 수 있는 순수 상태 머신입니다.
/// 요청이 필요한 전이는 보낼 메시지를 돌려주며, 전송은 호출자가 합니다.
pub trait PullHandler: Send + fmt::Debug {
    /// 현재 상태
    fn state(&self) -> PullState;

    /// 첫 실패 (한 번 정해지면 바뀌지 않음)
    fn failure(&self) -> Option<&DriverError>;

    /// 스트림을 끝낸 SUCCESS 메타데이터
    fn summary(&self) -> Option<&SuccessMessage>;

    /// 버퍼에서 다음 레코드 꺼내기
    fn pop_record(&mut self) -> Option<Vec<PackStreamValue>>;

    /// 버퍼의 다음 레코드 보기
    fn peek_record(&self) -> Option<&Vec<PackStreamValue>>;

    /// 버퍼에 쌓인 레코드 수
    fn buffered(&self) -> usize;

    /// 남은 레코드를 버리는 중인지 여부
    fn is_discarding(&self) -> bool;

    /// RUN과 함께 보낼 첫 요청 (`Init → AwaitingRunResponse`)
    fn first_request(&mut self) -> DriverResult<BoltRequest>;

    /// RUN 성공
    fn on_run_success(&mut self, run: &RunSummary);

    /// RUN 실패
    fn on_run_failure(&mut self, error: &DriverError);

    /// RECORD 수신 (`Streaming`이 아니면 프로토콜 위반)
    fn on_record(&mut self, values: Vec<PackStreamValue>) -> DriverResult<()>;

    /// PULL/DISCARD의 SUCCESS 수신
    ///
    /// 바로 보내야 할 후속 요청(DISCARD)이 있으면 돌려줍니다.
    fn on_success(&mut self, metadata: &SuccessMessage) -> DriverResult<Option<BoltRequest>>;

    /// FAILURE 수신
    fn on_failure(&mut self, error: DriverError) -> DriverResult<()>;

    /// IGNORED 수신 (이미 실패했다면 흡수)
    fn on_ignored(&mut self, error: DriverError) -> DriverResult<()>;

    /// 연결 실패
    fn on_fatal(&mut self, error: DriverError);

    /// 다음 배치 요청 (`Paused → Streaming`)
    fn request_more(&mut self) -> Option<BoltRequest>;

    /// 남은 레코드 버리기
    ///
    /// 바로 보내야 할 DISCARD가 있으면 돌려줍니다. 요청이 진행 중이면
    /// 그 배치가 끝날 때 처리됩니다.
    fn cancel(&mut self) -> Option<BoltRequest>;
}

// ============================================================================
// StreamCore - 공통 상태
// ============================================================================

/// 두 스트림 핸들러가 공유하는 상태
#[derive(Debug)]
pub(crate) struct StreamCore {
    state: PullState,
    records: VecDeque<Vec<PackStreamValue>>,
    failure: Option<DriverError>,
    summary: Option<SuccessMessage>,
    qid: Option<i64>,
    discarding: bool,
    bookmark_holder: Option<BookmarkHolder>,
    tx: Option<TransactionContext>,
}

impl StreamCore {
    pub(crate) fn new(bookmark_holder: Option<BookmarkHolder>, tx: Option<TransactionContext>) -> Self {
        Self {
            state: PullState::Init,
            records: VecDeque::new(),
            failure: None,
            summary: None,
            qid: None,
            discarding: false,
            bookmark_holder,
            tx,
        }
    }

    pub(crate) fn state(&self) -> PullState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: PullState) {
        trace!(from = %self.state, to = %state, "pull state transition");
        self.state = state;
    }

    pub(crate) fn qid(&self) -> Option<i64> {
        self.qid
    }

    pub(crate) fn failure(&self) -> Option<&DriverError> {
        self.failure.as_ref()
    }

    pub(crate) fn summary(&self) -> Option<&SuccessMessage> {
        self.summary.as_ref()
    }

    pub(crate) fn pop_record(&mut self) -> Option<Vec<PackStreamValue>> {
        self.records.pop_front()
    }

    pub(crate) fn peek_record(&self) -> Option<&Vec<PackStreamValue>> {
        self.records.front()
    }

    pub(crate) fn buffered(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_discarding(&self) -> bool {
        self.discarding
    }

    pub(crate) fn set_discarding(&mut self) {
        self.discarding = true;
        self.records.clear();
    }

    pub(crate) fn begin(&mut self, handler: &str) -> DriverResult<()> {
        if self.state != PullState::Init {
            return Err(DriverError::protocol(format!(
                "{} already started (state {})",
                handler, self.state
            )));
        }
        self.set_state(PullState::AwaitingRunResponse);
        Ok(())
    }

    pub(crate) fn on_run_success(&mut self, run: &RunSummary) {
        self.qid = run.qid;
        if self.state == PullState::AwaitingRunResponse {
            self.set_state(PullState::Streaming);
        }
    }

    pub(crate) fn on_run_failure(&mut self, error: &DriverError) {
        if !self.state.is_terminal() {
            self.fail(error.clone());
        }
    }

    pub(crate) fn on_record(&mut self, values: Vec<PackStreamValue>) -> DriverResult<()> {
        if self.state != PullState::Streaming {
            return Err(DriverError::protocol(format!(
                "RECORD received in state {}",
                self.state
            )));
        }
        if !self.discarding {
            self.records.push_back(values);
        }
        Ok(())
    }

    /// SUCCESS가 올 수 있는 상태인지 확인
    pub(crate) fn expect_summary(&self, kind: &str) -> DriverResult<()> {
        if self.state != PullState::Streaming {
            return Err(DriverError::protocol(format!(
                "{} received in state {}",
                kind, self.state
            )));
        }
        Ok(())
    }

    pub(crate) fn complete(&mut self, metadata: &SuccessMessage) {
        if let Some(holder) = &self.bookmark_holder {
            holder.set_from_server(metadata.bookmark());
        }
        self.summary = Some(metadata.clone());
        self.discarding = false;
        self.set_state(PullState::Exhausted);
        debug!(bookmark = ?metadata.bookmark(), "result stream exhausted");
    }

    pub(crate) fn on_failure(&mut self, error: DriverError) -> DriverResult<()> {
        if self.state.is_terminal() {
            return Err(DriverError::protocol(format!(
                "FAILURE received in terminal state {}: {}",
                self.state, error
            )));
        }
        if let Some(tx) = &self.tx {
            tx.mark_terminated();
        }
        self.fail(error);
        Ok(())
    }

    pub(crate) fn on_ignored(&mut self, error: DriverError) -> DriverResult<()> {
        match self.state {
            PullState::Failed => Ok(()),
            PullState::Exhausted => Err(DriverError::protocol("IGNORED received after stream end")),
            _ => {
                self.fail(error);
                Ok(())
            }
        }
    }

    pub(crate) fn on_fatal(&mut self, error: DriverError) {
        if !self.state.is_terminal() {
            self.fail(error);
        }
    }

    /// 클라이언트 취소 중 공통 부분. 즉시 처리되면 `true`.
    pub(crate) fn cancel_without_request(&mut self) -> bool {
        match self.state {
            PullState::Init => {
                self.records.clear();
                self.set_state(PullState::Exhausted);
                true
            }
            PullState::Exhausted | PullState::Failed => {
                self.records.clear();
                true
            }
            PullState::AwaitingRunResponse | PullState::Streaming => {
                self.set_discarding();
                true
            }
            PullState::Paused => false,
        }
    }

    fn fail(&mut self, error: DriverError) {
        debug!(error = %error, state = %self.state, "result stream failed");
        self.records.clear();
        self.failure = Some(error);
        self.set_state(PullState::Failed);
    }
}

// ============================================================================
// PullResponseHandler - fetch size 단위 PULL
// ============================================================================

/// fetch size 단위로 PULL을 보내는 스트림 핸들러
///
/// 배치가 `has_more`로 끝나면 `Paused`가 되고, 클라이언트가 버퍼를 비운 뒤
/// [`PullHandler::request_more`]를 호출해야 다음 PULL이 나갑니다.
#[derive(Debug)]
pub struct PullResponseHandler {
    core: StreamCore,
    fetch_size: FetchSize,
}

impl PullResponseHandler {
    /// 새 핸들러
    ///
    /// `bookmark_holder`는 자동 커밋 쿼리에서만 주어집니다.
    pub fn new(
        fetch_size: FetchSize,
        bookmark_holder: Option<BookmarkHolder>,
        tx: Option<TransactionContext>,
    ) -> Self {
        Self {
            core: StreamCore::new(bookmark_holder, tx),
            fetch_size,
        }
    }

    /// 배치 크기
    pub fn fetch_size(&self) -> FetchSize {
        self.fetch_size
    }

    fn pull(&self) -> BoltRequest {
        BoltRequest::Pull(PullMessage::new(self.fetch_size.value(), self.core.qid()))
    }

    fn discard(&self) -> BoltRequest {
        BoltRequest::Discard(DiscardMessage::all_of(self.core.qid()))
    }
}

impl PullHandler for PullResponseHandler {
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
        self.core.begin("PULL")?;
        Ok(self.pull())
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
        self.core.expect_summary("PULL SUCCESS")?;
        if !metadata.has_more() {
            self.core.complete(metadata);
            return Ok(None);
        }
        if self.core.is_discarding() {
            // 스트림 상태는 유지하고 DISCARD의 응답을 기다립니다.
            return Ok(Some(self.discard()));
        }
        self.core.set_state(PullState::Paused);
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
        if self.core.state() != PullState::Paused {
            return None;
        }
        self.core.set_state(PullState::Streaming);
        Some(self.pull())
    }

    fn cancel(&mut self) -> Option<BoltRequest> {
        if self.core.cancel_without_request() {
            return None;
        }
        self.core.set_discarding();
        self.core.set_state(PullState::Streaming);
        Some(self.discard())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::bookmark::BookmarkSet;

    fn record(i: i64) -> Vec<PackStreamValue> {
        vec![PackStreamValue::Integer(i)]
    }

    fn run_summary(qid: Option<i64>) -> RunSummary {
        RunSummary::from_success(&SuccessMessage::run(&["n"], qid))
    }

    fn started(fetch: i64) -> PullResponseHandler {
        let mut handler = PullResponseHandler::new(FetchSize::new(fetch).unwrap(), None, None);
        handler.first_request().unwrap();
        handler.on_run_success(&run_summary(None));
        handler
    }

    #[test]
    fn test_first_request_is_bounded_pull() {
        let mut handler = PullResponseHandler::new(FetchSize::new(5).unwrap(), None, None);
        assert_eq!(handler.state(), PullState::Init);

        let request = handler.first_request().unwrap();
        assert_eq!(request, BoltRequest::Pull(PullMessage::new(5, None)));
        assert_eq!(handler.state(), PullState::AwaitingRunResponse);
        assert!(handler.first_request().is_err());
    }

    #[test]
    fn test_batch_with_more_pauses() {
        let mut handler = started(2);
        handler.on_record(record(1)).unwrap();
        handler.on_record(record(2)).unwrap();
        assert_eq!(handler.on_success(&SuccessMessage::has_more_records()).unwrap(), None);
        assert_eq!(handler.state(), PullState::Paused);
        assert_eq!(handler.buffered(), 2);

        assert_eq!(handler.pop_record(), Some(record(1)));
        let next = handler.request_more().unwrap();
        assert_eq!(next, BoltRequest::Pull(PullMessage::new(2, None)));
        assert_eq!(handler.state(), PullState::Streaming);
        assert!(handler.request_more().is_none());
    }

    #[test]
    fn test_subsequent_pulls_carry_qid() {
        let mut handler = PullResponseHandler::new(FetchSize::new(10).unwrap(), None, None);
        handler.first_request().unwrap();
        handler.on_run_success(&run_summary(Some(7)));
        handler.on_success(&SuccessMessage::has_more_records()).unwrap();
        assert_eq!(
            handler.request_more(),
            Some(BoltRequest::Pull(PullMessage::new(10, Some(7))))
        );
    }

    #[test]
    fn test_final_batch_exhausts_and_sets_bookmark() {
        let holder = BookmarkHolder::new();
        let mut handler = PullResponseHandler::new(FetchSize::new(5).unwrap(), Some(holder.clone()), None);
        handler.first_request().unwrap();
        handler.on_run_success(&run_summary(None));
        handler.on_record(record(1)).unwrap();
        handler.on_success(&SuccessMessage::stream_end(Some("db1:42"))).unwrap();

        assert_eq!(handler.state(), PullState::Exhausted);
        assert_eq!(handler.summary().and_then(|s| s.bookmark()), Some("db1:42"));
        assert_eq!(holder.get(), BookmarkSet::parse("db1:42"));
        assert_eq!(handler.pop_record(), Some(record(1)));
    }

    #[test]
    fn test_record_outside_streaming_is_violation() {
        let mut handler = PullResponseHandler::new(FetchSize::DEFAULT, None, None);
        assert!(matches!(handler.on_record(record(1)), Err(DriverError::Protocol(_))));

        handler.first_request().unwrap();
        assert!(handler.on_record(record(1)).is_err());

        let mut handler = started(1);
        handler.on_success(&SuccessMessage::stream_end(None)).unwrap();
        assert!(handler.on_record(record(1)).is_err());
    }

    #[test]
    fn test_failure_is_terminal_and_fixed() {
        let tx = TransactionContext::new();
        let mut handler = PullResponseHandler::new(FetchSize::new(3).unwrap(), None, Some(tx.clone()));
        handler.first_request().unwrap();
        handler.on_run_success(&run_summary(None));
        handler.on_record(record(1)).unwrap();

        let first = DriverError::server("Neo.TransientError.General.DatabaseUnavailable", "down");
        handler.on_failure(first).unwrap();
        assert_eq!(handler.state(), PullState::Failed);
        assert_eq!(handler.buffered(), 0);
        assert!(tx.is_terminated());

        let second = DriverError::server("Neo.ClientError.General.Unknown", "again");
        assert!(matches!(handler.on_failure(second), Err(DriverError::Protocol(_))));
        handler.on_ignored(DriverError::ignored(None)).unwrap();
        handler.on_fatal(DriverError::connection("gone"));
        assert_eq!(
            handler.failure().and_then(|e| e.code()),
            Some("Neo.TransientError.General.DatabaseUnavailable")
        );
    }

    #[test]
    fn test_run_failure_then_ignored_pull() {
        let mut handler = PullResponseHandler::new(FetchSize::DEFAULT, None, None);
        handler.first_request().unwrap();
        let err = DriverError::server("Neo.ClientError.Statement.SyntaxError", "bad");
        handler.on_run_failure(&err);
        assert_eq!(handler.state(), PullState::Failed);

        handler.on_ignored(DriverError::ignored(Some(&err))).unwrap();
        assert_eq!(handler.failure().and_then(|e| e.code()), err.code());
    }

    #[test]
    fn test_ignored_after_exhaustion_is_violation() {
        let mut handler = started(5);
        handler.on_success(&SuccessMessage::stream_end(None)).unwrap();
        assert!(handler.on_ignored(DriverError::ignored(None)).is_err());
    }

    #[test]
    fn test_cancel_when_paused_discards_immediately() {
        let mut handler = started(2);
        handler.on_record(record(1)).unwrap();
        handler.on_record(record(2)).unwrap();
        handler.on_success(&SuccessMessage::has_more_records()).unwrap();

        let request = handler.cancel().unwrap();
        assert_eq!(request, BoltRequest::Discard(DiscardMessage::all_of(None)));
        assert_eq!(handler.buffered(), 0);
        assert_eq!(handler.state(), PullState::Streaming);

        handler.on_success(&SuccessMessage::stream_end(Some("db1:9"))).unwrap();
        assert_eq!(handler.state(), PullState::Exhausted);
    }

    #[test]
    fn test_cancel_in_flight_discards_after_batch() {
        let mut handler = started(2);
        assert!(handler.cancel().is_none());
        assert!(handler.is_discarding());

        handler.on_record(record(1)).unwrap();
        assert_eq!(handler.buffered(), 0);

        let follow_up = handler.on_success(&SuccessMessage::has_more_records()).unwrap();
        assert_eq!(follow_up, Some(BoltRequest::Discard(DiscardMessage::all_of(None))));
        assert_eq!(handler.state(), PullState::Streaming);

        handler.on_success(&SuccessMessage::stream_end(None)).unwrap();
        assert_eq!(handler.state(), PullState::Exhausted);
        assert!(!handler.is_discarding());
    }

    #[test]
    fn test_cancel_in_terminal_state_is_noop() {
        let mut handler = started(2);
        handler.on_success(&SuccessMessage::stream_end(None)).unwrap();
        assert!(handler.cancel().is_none());
        assert_eq!(handler.state(), PullState::Exhausted);
    }
}
