//! Transaction Handlers
//!
//! BEGIN / COMMIT / ROLLBACK / RESET 응답 핸들러

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::debug;

use super::{Outbox, ResponseHandler};
use crate::bolt::SuccessMessage;
use crate::driver::bookmark::{BookmarkHolder, BookmarkSet};
use crate::driver::error::{DriverError, DriverResult};

// ============================================================================
// TransactionContext - 명시적 트랜잭션 상태
// ============================================================================

/// 명시적 트랜잭션 상태
///
/// 트랜잭션 안의 쿼리가 실패하면 서버는 트랜잭션을 끝냅니다.
/// 이후 계층은 `is_terminated`로 커밋 대신 롤백만 가능함을 알 수 있습니다.
#[derive(Debug, Clone, Default)]
pub struct TransactionContext {
    terminated: Arc<AtomicBool>,
}

impl TransactionContext {
    /// 새 컨텍스트
    pub fn new() -> Self {
        Self::default()
    }

    /// 종료 표시
    pub fn mark_terminated(&self) {
        if !self.terminated.swap(true, Ordering::AcqRel) {
            debug!("explicit transaction terminated by failure");
        }
    }

    /// 종료 여부
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}

fn resolve<T>(slot: &mut Option<oneshot::Sender<DriverResult<T>>>, result: DriverResult<T>) {
    if let Some(sender) = slot.take() {
        // 수신측이 이미 사라졌다면 결과를 버립니다.
        let _ = sender.send(result);
    }
}

// ============================================================================
// BeginTxResponseHandler
// ============================================================================

/// BEGIN 응답 핸들러
#[derive(Debug)]
pub struct BeginTxResponseHandler {
    result: Option<oneshot::Sender<DriverResult<()>>>,
}

impl BeginTxResponseHandler {
    /// 핸들러와 결과 수신측 생성
    pub fn new() -> (Self, oneshot::Receiver<DriverResult<()>>) {
        let (tx, rx) = oneshot::channel();
        (Self { result: Some(tx) }, rx)
    }
}

impl ResponseHandler for BeginTxResponseHandler {
    fn name(&self) -> &'static str {
        "BEGIN"
    }

    fn on_success(&mut self, _metadata: SuccessMessage, _outbox: &mut Outbox) -> DriverResult<()> {
        resolve(&mut self.result, Ok(()));
        Ok(())
    }

    fn on_failure(&mut self, error: DriverError) -> DriverResult<()> {
        resolve(&mut self.result, Err(error));
        Ok(())
    }

    fn on_fatal(&mut self, error: DriverError) {
        resolve(&mut self.result, Err(error));
    }
}

// ============================================================================
// CommitTxResponseHandler
// ============================================================================

/// COMMIT 응답 핸들러
///
/// SUCCESS의 북마크를 [`BookmarkSet`]으로 돌려주고, 홀더가 있으면 갱신합니다.
/// 홀더는 결과가 전달되기 전에 갱신됩니다.
#[derive(Debug)]
pub struct CommitTxResponseHandler {
    holder: Option<BookmarkHolder>,
    result: Option<oneshot::Sender<DriverResult<BookmarkSet>>>,
}

impl CommitTxResponseHandler {
    /// 핸들러와 결과 수신측 생성
    pub fn new(holder: Option<BookmarkHolder>) -> (Self, oneshot::Receiver<DriverResult<BookmarkSet>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                holder,
                result: Some(tx),
            },
            rx,
        )
    }
}

impl ResponseHandler for CommitTxResponseHandler {
    fn name(&self) -> &'static str {
        "COMMIT"
    }

    fn on_success(&mut self, metadata: SuccessMessage, _outbox: &mut Outbox) -> DriverResult<()> {
        let token = metadata.bookmark();
        if let Some(holder) = &self.holder {
            holder.set_from_server(token);
        }
        let bookmark = token.map(BookmarkSet::parse).unwrap_or_else(BookmarkSet::empty);
        resolve(&mut self.result, Ok(bookmark));
        Ok(())
    }

    fn on_failure(&mut self, error: DriverError) -> DriverResult<()> {
        resolve(&mut self.result, Err(error));
        Ok(())
    }

    fn on_fatal(&mut self, error: DriverError) {
        resolve(&mut self.result, Err(error));
    }
}

// ============================================================================
// RollbackTxResponseHandler
// ============================================================================

/// ROLLBACK 응답 핸들러
#[derive(Debug)]
pub struct RollbackTxResponseHandler {
    result: Option<oneshot::Sender<DriverResult<()>>>,
}

impl RollbackTxResponseHandler {
    /// 핸들러와 결과 수신측 생성
    pub fn new() -> (Self, oneshot::Receiver<DriverResult<()>>) {
        let (tx, rx) = oneshot::channel();
        (Self { result: Some(tx) }, rx)
    }
}

impl ResponseHandler for RollbackTxResponseHandler {
    fn name(&self) -> &'static str {
        "ROLLBACK"
    }

    fn on_success(&mut self, _metadata: SuccessMessage, _outbox: &mut Outbox) -> DriverResult<()> {
        resolve(&mut self.result, Ok(()));
        Ok(())
    }

    fn on_failure(&mut self, error: DriverError) -> DriverResult<()> {
        resolve(&mut self.result, Err(error));
        Ok(())
    }

    fn on_fatal(&mut self, error: DriverError) {
        resolve(&mut self.result, Err(error));
    }
}

// ============================================================================
// ResetResponseHandler
// ============================================================================

/// RESET 응답 핸들러
///
/// 성공하면 연결의 실패 상태가 지워집니다.
#[derive(Debug)]
pub struct ResetResponseHandler {
    result: Option<oneshot::Sender<DriverResult<()>>>,
}

impl ResetResponseHandler {
    /// 핸들러와 결과 수신측 생성
    pub fn new() -> (Self, oneshot::Receiver<DriverResult<()>>) {
        let (tx, rx) = oneshot::channel();
        (Self { result: Some(tx) }, rx)
    }
}

impl ResponseHandler for ResetResponseHandler {
    fn name(&self) -> &'static str {
        "RESET"
    }

    fn on_success(&mut self, _metadata: SuccessMessage, _outbox: &mut Outbox) -> DriverResult<()> {
        resolve(&mut self.result, Ok(()));
        Ok(())
    }

    fn on_failure(&mut self, error: DriverError) -> DriverResult<()> {
        resolve(&mut self.result, Err(error));
        Ok(())
    }

    fn on_fatal(&mut self, error: DriverError) {
        resolve(&mut self.result, Err(error));
    }

    fn clears_failure(&self) -> bool {
        true
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_returns_bookmark_and_updates_holder() {
        let holder = BookmarkHolder::with_bookmark(BookmarkSet::parse("db1:42"));
        let (mut handler, rx) = CommitTxResponseHandler::new(Some(holder.clone()));

        let mut outbox = Outbox::new();
        handler
            .on_success(SuccessMessage::new().with("bookmark", "db1:57"), &mut outbox)
            .unwrap();

        let bookmark = rx.await.unwrap().unwrap();
        assert_eq!(bookmark, BookmarkSet::parse("db1:57"));
        assert_eq!(holder.get(), BookmarkSet::parse("db1:57"));
        assert!(outbox.is_empty());
    }

    #[tokio::test]
    async fn test_commit_without_bookmark_keeps_holder() {
        let holder = BookmarkHolder::with_bookmark(BookmarkSet::parse("db1:42"));
        let (mut handler, rx) = CommitTxResponseHandler::new(Some(holder.clone()));
        handler.on_success(SuccessMessage::new(), &mut Outbox::new()).unwrap();

        assert!(rx.await.unwrap().unwrap().is_canonical_empty());
        assert_eq!(holder.get(), BookmarkSet::parse("db1:42"));
    }

    #[tokio::test]
    async fn test_begin_failure_is_delivered() {
        let (mut handler, rx) = BeginTxResponseHandler::new();
        handler
            .on_failure(DriverError::server("Neo.ClientError.Transaction.InvalidBookmark", "bad"))
            .unwrap();
        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err.code(), Some("Neo.ClientError.Transaction.InvalidBookmark"));
    }

    #[tokio::test]
    async fn test_fatal_after_resolution_is_noop() {
        let (mut handler, rx) = RollbackTxResponseHandler::new();
        handler.on_success(SuccessMessage::new(), &mut Outbox::new()).unwrap();
        handler.on_fatal(DriverError::connection("late"));
        assert!(rx.await.unwrap().is_ok());
    }

    #[test]
    fn test_reset_clears_failure() {
        let (handler, _rx) = ResetResponseHandler::new();
        assert!(handler.clears_failure());
        let (begin, _rx) = BeginTxResponseHandler::new();
        assert!(!begin.clears_failure());
    }

    #[test]
    fn test_transaction_context_shared() {
        let tx = TransactionContext::new();
        let copy = tx.clone();
        assert!(!tx.is_terminated());
        copy.mark_terminated();
        assert!(tx.is_terminated());
    }
}
