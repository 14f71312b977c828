//! ResultCursor - 결과 커서
//!
//! 한 쿼리의 레코드를 한 번만 순회하는 커서

use std::fmt;
use std::sync::Arc;

use futures::stream::{self, Stream};
use tracing::{debug, trace};

use super::record::Record;
use super::summary::{Query, ResultSummary};
use super::{CursorShared, CursorState, StreamEntry};
use crate::bolt::BoltRequest;
use crate::driver::connection::Connection;
use crate::driver::error::{DriverError, DriverResult};
use crate::driver::handlers::{PullState, RunState};

/// 다음 레코드 요청 한 번의 결정
enum Step<T> {
    Ready(T),
    Done,
    Failed(DriverError),
    Send(BoltRequest),
    Wait,
}

/// 결과 커서
///
/// 레코드는 서버가 보낸 순서대로 한 번씩만 나옵니다. 실패가 기록되면 이후
/// 모든 호출이 같은 에러를 돌려주고 전송 계층은 건드리지 않습니다.
pub struct ResultCursor {
    connection: Connection,
    shared: Arc<CursorShared>,
    query: Query,
    summary: Option<ResultSummary>,
}

impl ResultCursor {
    pub(super) fn new(connection: Connection, shared: Arc<CursorShared>, query: Query) -> Self {
        Self {
            connection,
            shared,
            query,
            summary: None,
        }
    }

    /// 쿼리
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// 결과 키 (RUN 응답까지 대기)
    pub async fn keys(&self) -> DriverResult<Arc<[String]>> {
        self.shared
            .wait_for(|state| match state.run.state() {
                RunState::Pending => None,
                RunState::Succeeded(summary) => Some(Ok(Arc::clone(&summary.keys))),
                RunState::Failed(error) => Some(Err(error.clone())),
            })
            .await
    }

    /// 다음 레코드
    ///
    /// 스트림이 끝나면 `None`. 버퍼가 비었고 스트림이 일시 정지 상태일 때만
    /// 다음 배치를 요청합니다.
    pub async fn next(&mut self) -> DriverResult<Option<Record>> {
        self.advance(|state| {
            let values = state.pull.pop_record()?;
            Some(Record::new(record_keys(state), values))
        })
        .await
    }

    /// 다음 레코드를 꺼내지 않고 보기
    pub async fn peek(&mut self) -> DriverResult<Option<Record>> {
        self.advance(|state| {
            let values = state.pull.peek_record()?.clone();
            Some(Record::new(record_keys(state), values))
        })
        .await
    }

    /// 정확히 한 개의 레코드
    ///
    /// 레코드가 없거나 두 개 이상이면 [`DriverError::NoSuchRecord`]. 남은
    /// 레코드는 버려집니다.
    pub async fn single(&mut self) -> DriverResult<Record> {
        let Some(record) = self.next().await? else {
            return Err(DriverError::NoSuchRecord(
                "Cannot retrieve a single record, because this result is empty.".into(),
            ));
        };
        if self.next().await?.is_some() {
            self.consume().await?;
            return Err(DriverError::NoSuchRecord(
                "Expected a result with a single record, but this result contains at least one more. \
                 Ensure your query returns only one record."
                    .into(),
            ));
        }
        Ok(record)
    }

    /// 남은 레코드 전부
    pub async fn list(&mut self) -> DriverResult<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await? {
            records.push(record);
        }
        Ok(records)
    }

    /// 남은 레코드를 버리고 요약 반환
    ///
    /// 일시 정지 상태면 DISCARD를 보내고, 요청이 진행 중이면 그 배치가 끝날
    /// 때까지 기다립니다. 이후 연결에는 이 쿼리의 응답이 남지 않습니다.
    pub async fn consume(&mut self) -> DriverResult<ResultSummary> {
        if let Some(summary) = &self.summary {
            return Ok(summary.clone());
        }

        let discard = self.shared.state.lock().pull.cancel();
        if let Some(request) = discard {
            self.send(request)?;
        }

        let summary = self
            .shared
            .wait_for(|state| {
                if let Some(error) = state.failure() {
                    return Some(Err(error.clone()));
                }
                if state.pull.state() != PullState::Exhausted {
                    return None;
                }
                Some(Ok(ResultSummary::new(
                    self.query.clone(),
                    state.run.summary(),
                    state.pull.summary(),
                )))
            })
            .await?;

        debug!(
            query_type = ?summary.query_type,
            bookmark = ?summary.bookmark,
            "result consumed"
        );
        self.summary = Some(summary.clone());
        Ok(summary)
    }

    /// 기록된 실패
    pub fn failure(&self) -> Option<DriverError> {
        self.shared.state.lock().failure().cloned()
    }

    /// 소비 완료 여부
    pub fn is_consumed(&self) -> bool {
        self.summary.is_some()
    }

    /// 레코드 스트림으로 변환
    ///
    /// 첫 에러를 내보낸 뒤 스트림이 끝납니다.
    pub fn into_stream(self) -> impl Stream<Item = DriverResult<Record>> + Send {
        stream::unfold(Some(self), |cursor| async move {
            let mut cursor = cursor?;
            match cursor.next().await {
                Ok(Some(record)) => Some((Ok(record), Some(cursor))),
                Ok(None) => None,
                Err(error) => Some((Err(error), None)),
            }
        })
    }

    async fn advance<T>(&mut self, mut take: impl FnMut(&mut CursorState) -> Option<T>) -> DriverResult<Option<T>> {
        if self.summary.is_some() {
            return Err(DriverError::ResultConsumed(
                "Cannot access records after the result has been consumed".into(),
            ));
        }

        loop {
            let notified = self.shared.changed.notified();
            let step = {
                let mut state = self.shared.state.lock();
                if let Some(error) = state.failure() {
                    Step::Failed(error.clone())
                } else if let Some(value) = take(&mut *state) {
                    Step::Ready(value)
                } else {
                    match state.pull.state() {
                        PullState::Exhausted => Step::Done,
                        PullState::Paused => match state.pull.request_more() {
                            Some(request) => Step::Send(request),
                            None => Step::Wait,
                        },
                        _ => Step::Wait,
                    }
                }
            };

            match step {
                Step::Ready(value) => return Ok(Some(value)),
                Step::Done => return Ok(None),
                Step::Failed(error) => return Err(error),
                Step::Send(request) => {
                    trace!(request = request.name(), "requesting next batch");
                    self.send(request)?;
                }
                Step::Wait => notified.await,
            }
        }
    }

    /// 스트림 요청 전송 (실패 시 커서도 실패)
    fn send(&self, request: BoltRequest) -> DriverResult<()> {
        let name = request.name();
        let entry = Box::new(StreamEntry::new(Arc::clone(&self.shared), name));
        self.connection.write(request, entry).map_err(|error| {
            self.shared.update(|state| state.pull.on_fatal(error.clone()));
            error
        })
    }
}

fn record_keys(state: &CursorState) -> Arc<[String]> {
    state.run.keys().unwrap_or_else(|| Arc::from(Vec::<String>::new()))
}

impl Drop for ResultCursor {
    fn drop(&mut self) {
        if self.summary.is_some() {
            return;
        }
        let discard = self.shared.state.lock().pull.cancel();
        if let Some(request) = discard {
            debug!("discarding unconsumed result");
            // 연결이 이미 끊겼다면 버릴 레코드도 없습니다.
            let _ = self.send(request);
        }
    }
}

impl fmt::Debug for ResultCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ResultCursor")
            .field("query", &self.query.text)
            .field("state", &state.pull.state())
            .field("buffered", &state.pull.buffered())
            .field("consumed", &self.summary.is_some())
            .finish()
    }
}
