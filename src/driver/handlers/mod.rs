//! Response Handlers
//!
//! 요청 하나에 대한 응답을 기다리는 상태 머신
//!
//! 연결은 요청을 보낸 순서대로 핸들러를 큐에 넣고, 도착한 응답을 항상 큐 맨
//! 앞의 핸들러에 전달합니다. RECORD는 맨 앞 핸들러에 쌓이고 SUCCESS, FAILURE,
//! IGNORED는 맨 앞 핸들러를 큐에서 꺼냅니다.
//!
//! - [`RunResponseHandler`]: RUN 응답 (결과 키, qid)
//! - [`PullResponseHandler`]: fetch size 단위로 PULL을 보내는 스트림
//! - [`AutoPullResponseHandler`]: PULL 한 번으로 전체를 받는 스트림
//! - [`BeginTxResponseHandler`] 등: 트랜잭션 제어 메시지

mod auto_pull;
mod pull;
mod run;
mod transaction;

pub use auto_pull::AutoPullResponseHandler;
pub use pull::{PullHandler, PullResponseHandler, PullState};
pub use run::{RunResponseHandler, RunState, RunSummary};
pub use transaction::{
    BeginTxResponseHandler, CommitTxResponseHandler, ResetResponseHandler, RollbackTxResponseHandler,
    TransactionContext,
};

use std::fmt;

use crate::bolt::{BoltRequest, PackStreamValue, SuccessMessage};

use super::error::{DriverError, DriverResult};

// ============================================================================
// ResponseHandler - 연결 큐의 항목
// ============================================================================

/// 연결의 FIFO 큐에 들어가는 응답 핸들러
///
/// 핸들러는 연결을 소유한 드라이버 태스크 안에서만 호출됩니다.
/// `Err`를 돌려주면 연결에 치명적인 프로토콜 위반으로 취급됩니다.
pub trait ResponseHandler: Send {
    /// 로그용 이름
    fn name(&self) -> &'static str;

    /// RECORD 수신 (기본: 프로토콜 위반)
    fn on_record(&mut self, values: Vec<PackStreamValue>) -> DriverResult<()> {
        drop(values);
        Err(DriverError::protocol(format!(
            "RECORD received while waiting for {} response",
            self.name()
        )))
    }

    /// SUCCESS 수신
    ///
    /// 후속 요청이 필요하면 `outbox`에 넣습니다. 다음 명령보다 먼저 전송됩니다.
    fn on_success(&mut self, metadata: SuccessMessage, outbox: &mut Outbox) -> DriverResult<()>;

    /// FAILURE 수신
    fn on_failure(&mut self, error: DriverError) -> DriverResult<()>;

    /// IGNORED 수신
    fn on_ignored(&mut self, error: DriverError) -> DriverResult<()> {
        self.on_failure(error)
    }

    /// 연결 실패로 응답을 더 받을 수 없음
    fn on_fatal(&mut self, error: DriverError);

    /// SUCCESS가 서버의 실패 상태를 지우는지 여부 (RESET)
    fn clears_failure(&self) -> bool {
        false
    }
}

impl fmt::Debug for dyn ResponseHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResponseHandler({})", self.name())
    }
}

// ============================================================================
// Outbox - 핸들러가 만든 후속 요청
// ============================================================================

/// 핸들러가 응답 처리 중에 만든 후속 요청
#[derive(Default)]
pub struct Outbox {
    pending: Vec<(BoltRequest, Box<dyn ResponseHandler>)>,
}

impl Outbox {
    /// 빈 아웃박스
    pub fn new() -> Self {
        Self::default()
    }

    /// 후속 요청 추가
    pub fn push(&mut self, request: BoltRequest, handler: Box<dyn ResponseHandler>) {
        self.pending.push((request, handler));
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// 대기 중인 요청 수
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// 넣은 순서대로 꺼내기
    pub fn drain(&mut self) -> impl Iterator<Item = (BoltRequest, Box<dyn ResponseHandler>)> + '_ {
        self.pending.drain(..)
    }
}

impl fmt::Debug for Outbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.pending.iter().map(|(request, _)| request.name()))
            .finish()
    }
}
