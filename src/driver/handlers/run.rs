//! RUN Response Handler
//!
//! RUN 요청의 응답(SUCCESS 또는 FAILURE) 하나를 기다립니다.

use std::sync::Arc;

use crate::bolt::SuccessMessage;

use super::transaction::TransactionContext;
use crate::driver::error::{DriverError, DriverResult};

// ============================================================================
// RunSummary - RUN 성공 메타데이터
// ============================================================================

/// RUN SUCCESS에서 얻은 정보
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// 결과 키 (순서 유지)
    pub keys: Arc<[String]>,
    /// 명시적 트랜잭션 안의 쿼리 ID
    pub qid: Option<i64>,
    /// 첫 레코드까지 걸린 시간 (ms)
    pub t_first: Option<i64>,
    /// 쿼리가 실행된 데이터베이스
    pub db: Option<String>,
}

impl RunSummary {
    /// SUCCESS 메타데이터에서 생성
    pub fn from_success(metadata: &SuccessMessage) -> Self {
        Self {
            keys: metadata.fields().unwrap_or_default().into(),
            qid: metadata.qid(),
            t_first: metadata.t_first(),
            db: metadata.db().map(str::to_string),
        }
    }
}

// ============================================================================
// RunResponseHandler - RUN 상태 머신
// ============================================================================

/// RUN 응답 상태
#[derive(Debug, Clone)]
pub enum RunState {
    /// 응답 대기 중
    Pending,
    /// 성공
    Succeeded(RunSummary),
    /// 실패 (FAILURE 또는 IGNORED)
    Failed(DriverError),
}

/// RUN 응답 핸들러
///
/// 응답은 정확히 한 번만 받습니다. 두 번째 응답은 프로토콜 위반입니다.
#[derive(Debug)]
pub struct RunResponseHandler {
    state: RunState,
    tx: Option<TransactionContext>,
}

impl RunResponseHandler {
    /// 자동 커밋 쿼리용 핸들러
    pub fn new() -> Self {
        Self {
            state: RunState::Pending,
            tx: None,
        }
    }

    /// 명시적 트랜잭션 안의 쿼리용 핸들러 (실패 시 트랜잭션 종료 표시)
    pub fn in_transaction(tx: TransactionContext) -> Self {
        Self {
            state: RunState::Pending,
            tx: Some(tx),
        }
    }

    /// 현재 상태
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// 응답을 받았는지 여부
    pub fn is_done(&self) -> bool {
        !matches!(self.state, RunState::Pending)
    }

    /// 성공 메타데이터
    pub fn summary(&self) -> Option<&RunSummary> {
        match &self.state {
            RunState::Succeeded(summary) => Some(summary),
            _ => None,
        }
    }

    /// 결과 키
    pub fn keys(&self) -> Option<Arc<[String]>> {
        self.summary().map(|s| Arc::clone(&s.keys))
    }

    /// 실패 원인
    pub fn failure(&self) -> Option<&DriverError> {
        match &self.state {
            RunState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// SUCCESS 처리
    pub fn on_success(&mut self, metadata: &SuccessMessage) -> DriverResult<RunSummary> {
        self.ensure_pending("SUCCESS")?;
        let summary = RunSummary::from_success(metadata);
        self.state = RunState::Succeeded(summary.clone());
        Ok(summary)
    }

    /// FAILURE 또는 IGNORED 처리
    pub fn on_failure(&mut self, error: DriverError) -> DriverResult<()> {
        self.ensure_pending("FAILURE")?;
        if let Some(tx) = &self.tx {
            tx.mark_terminated();
        }
        self.state = RunState::Failed(error);
        Ok(())
    }

    /// 연결 실패 (응답을 이미 받았다면 무시)
    pub fn on_fatal(&mut self, error: DriverError) {
        if !self.is_done() {
            self.state = RunState::Failed(error);
        }
    }

    fn ensure_pending(&self, kind: &str) -> DriverResult<()> {
        if self.is_done() {
            return Err(DriverError::protocol(format!(
                "{} received after RUN was already answered",
                kind
            )));
        }
        Ok(())
    }
}

impl Default for RunResponseHandler {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
