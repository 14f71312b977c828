//! Result Cursor
//!
//! RUN 핸들러와 스트림 핸들러 한 쌍을 묶어 레코드를 당겨오는 커서
//!
//! 연결의 드라이버 태스크는 큐 항목([`RunEntry`], [`StreamEntry`])을 통해
//! 공유 상태를 갱신하고, 커서는 같은 상태를 읽으며 변경 알림을 기다립니다.
//! PULL과 DISCARD는 요청마다 별도 큐 항목을 갖지만 스트림 상태는 하나입니다.

mod factory;
mod record;
mod result;
mod summary;

pub use factory::{CursorFactory, PullStrategy};
pub use record::Record;
pub use result::ResultCursor;
pub use summary::{Query, ResultSummary};

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::bolt::{PackStreamValue, SuccessMessage};

use super::error::{DriverError, DriverResult};
use super::handlers::{Outbox, PullHandler, ResponseHandler, RunResponseHandler};

// ============================================================================
// CursorShared - 커서와 드라이버 태스크의 공유 상태
// ============================================================================

#[derive(Debug)]
struct CursorState {
    run: RunResponseHandler,
    pull: Box<dyn PullHandler>,
}

impl CursorState {
    /// RUN 실패가 먼저, 그다음 스트림 실패
    fn failure(&self) -> Option<&DriverError> {
        self.run.failure().or_else(|| self.pull.failure())
    }
}

#[derive(Debug)]
struct CursorShared {
    state: Mutex<CursorState>,
    changed: Notify,
}

impl CursorShared {
    fn new(run: RunResponseHandler, pull: Box<dyn PullHandler>) -> Self {
        Self {
            state: Mutex::new(CursorState { run, pull }),
            changed: Notify::new(),
        }
    }

    /// 상태를 바꾸고 기다리는 커서를 깨움
    fn update<R>(&self, f: impl FnOnce(&mut CursorState) -> R) -> R {
        let result = f(&mut self.state.lock());
        self.changed.notify_waiters();
        result
    }

    /// `check`가 값을 돌려줄 때까지 대기
    async fn wait_for<T>(&self, mut check: impl FnMut(&mut CursorState) -> Option<T>) -> T {
        loop {
            // 상태를 보기 전에 등록해야 사이에 온 알림을 놓치지 않습니다.
            let notified = self.changed.notified();
            let ready = {
                let mut state = self.state.lock();
                check(&mut *state)
            };
            if let Some(value) = ready {
                return value;
            }
            notified.await;
        }
    }
}

// ============================================================================
// Queue Entries - 연결 큐 항목
// ============================================================================

/// RUN 응답을 받는 큐 항목
struct RunEntry {
    shared: Arc<CursorShared>,
}

impl RunEntry {
    fn new(shared: Arc<CursorShared>) -> Self {
        Self { shared }
    }
}

impl ResponseHandler for RunEntry {
    fn name(&self) -> &'static str {
        "RUN"
    }

    fn on_success(&mut self, metadata: SuccessMessage, _outbox: &mut Outbox) -> DriverResult<()> {
        self.shared.update(|state| {
            let summary = state.run.on_success(&metadata)?;
            state.pull.on_run_success(&summary);
            Ok(())
        })
    }

    fn on_failure(&mut self, error: DriverError) -> DriverResult<()> {
        self.shared.update(|state| {
            state.pull.on_run_failure(&error);
            state.run.on_failure(error)
        })
    }

    fn on_fatal(&mut self, error: DriverError) {
        self.shared.update(|state| {
            state.pull.on_fatal(error.clone());
            state.run.on_fatal(error);
        });
    }
}

/// PULL 또는 DISCARD 하나의 응답을 받는 큐 항목
struct StreamEntry {
    shared: Arc<CursorShared>,
    name: &'static str,
}

impl StreamEntry {
    fn new(shared: Arc<CursorShared>, name: &'static str) -> Self {
        Self { shared, name }
    }
}

impl ResponseHandler for StreamEntry {
    fn name(&self) -> &'static str {
        self.name
    }

    fn on_record(&mut self, values: Vec<PackStreamValue>) -> DriverResult<()> {
        self.shared.update(|state| state.pull.on_record(values))
    }

    fn on_success(&mut self, metadata: SuccessMessage, outbox: &mut Outbox) -> DriverResult<()> {
        let follow_up = self.shared.update(|state| state.pull.on_success(&metadata))?;
        if let Some(request) = follow_up {
            let name = request.name();
            outbox.push(request, Box::new(StreamEntry::new(Arc::clone(&self.shared), name)));
        }
        Ok(())
    }

    fn on_failure(&mut self, error: DriverError) -> DriverResult<()> {
        self.shared.update(|state| state.pull.on_failure(error))
    }

    fn on_ignored(&mut self, error: DriverError) -> DriverResult<()> {
        self.shared.update(|state| state.pull.on_ignored(error))
    }

    fn on_fatal(&mut self, error: DriverError) {
        self.shared.update(|state| state.pull.on_fatal(error));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::config::FetchSize;
    use crate::driver::handlers::{PullResponseHandler, PullState};

    fn shared(fetch: i64) -> Arc<CursorShared> {
        let mut pull = PullResponseHandler::new(FetchSize::new(fetch).unwrap(), None, None);
        pull.first_request().unwrap();
        Arc::new(CursorShared::new(RunResponseHandler::new(), Box::new(pull)))
    }

    #[test]
    fn test_run_failure_fails_stream() {
        let shared = shared(10);
        let mut run = RunEntry::new(Arc::clone(&shared));
        let mut pull = StreamEntry::new(Arc::clone(&shared), "PULL");

        run.on_failure(DriverError::Server {
            code: "Neo.ClientError.Statement.SyntaxError".into(),
            message: "bad".into(),
        })
        .unwrap();
        pull.on_ignored(DriverError::ignored(None)).unwrap();

        let state = shared.state.lock();
        assert_eq!(state.pull.state(), PullState::Failed);
        assert!(matches!(state.failure(), Some(DriverError::Server { .. })));
    }

    #[test]
    fn test_discarding_batch_queues_follow_up() {
        let shared = shared(2);
        let mut run = RunEntry::new(Arc::clone(&shared));
        let mut pull = StreamEntry::new(Arc::clone(&shared), "PULL");
        let mut outbox = Outbox::new();

        run.on_success(SuccessMessage::run(&["n"], None), &mut outbox).unwrap();
        assert!(shared.state.lock().pull.cancel().is_none());
        pull.on_record(vec![PackStreamValue::Integer(1)]).unwrap();
        pull.on_success(SuccessMessage::has_more_records(), &mut outbox).unwrap();

        assert_eq!(outbox.len(), 1);
        assert_eq!(shared.state.lock().pull.buffered(), 0);
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_update() {
        let shared = shared(10);
        let waiter = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                shared
                    .wait_for(|state| state.run.keys())
                    .await
            })
        };
        tokio::task::yield_now().await;

        let mut run = RunEntry::new(Arc::clone(&shared));
        run.on_success(SuccessMessage::run(&["a", "b"], None), &mut Outbox::new())
            .unwrap();
        assert_eq!(waiter.await.unwrap().len(), 2);
    }
}
