//! Inbound Message Dispatcher
//!
//! 도착한 응답을 보낸 순서대로 핸들러에 전달합니다.

use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use crate::bolt::BoltResponse;
use crate::driver::error::{DriverError, DriverResult};
use crate::driver::handlers::{Outbox, ResponseHandler};

// ============================================================================
// InboundMessageDispatcher - FIFO 핸들러 큐
// ============================================================================

/// 연결 하나의 핸들러 큐
///
/// n번째 응답은 아직 끝나지 않은 n번째 핸들러의 것입니다.
/// 큐는 드라이버 태스크 하나만 소유합니다.
#[derive(Debug, Default)]
pub struct InboundMessageDispatcher {
    handlers: VecDeque<Box<dyn ResponseHandler>>,
    current_failure: Option<DriverError>,
    fatal: Option<DriverError>,
}

impl InboundMessageDispatcher {
    /// 빈 디스패처
    pub fn new() -> Self {
        Self::default()
    }

    /// 핸들러 추가 (요청을 보내기 전에 호출)
    ///
    /// 연결이 이미 실패했다면 핸들러는 즉시 그 에러로 끝납니다.
    pub fn enqueue(&mut self, mut handler: Box<dyn ResponseHandler>) {
        if let Some(fatal) = &self.fatal {
            handler.on_fatal(fatal.clone());
            return;
        }
        trace!(handler = handler.name(), pending = self.handlers.len() + 1, "handler queued");
        self.handlers.push_back(handler);
    }

    /// 대기 중인 핸들러 수
    pub fn pending(&self) -> usize {
        self.handlers.len()
    }

    /// 마지막 서버 실패 (RESET 성공 전까지 유지)
    pub fn current_failure(&self) -> Option<&DriverError> {
        self.current_failure.as_ref()
    }

    /// 연결을 끝낸 에러
    pub fn fatal_error(&self) -> Option<&DriverError> {
        self.fatal.as_ref()
    }

    /// 응답 하나 처리
    ///
    /// `Err`는 연결에 치명적인 에러입니다. 호출자는 [`handle_fatal`]로
    /// 나머지 핸들러를 정리해야 합니다.
    ///
    /// [`handle_fatal`]: InboundMessageDispatcher::handle_fatal
    pub fn handle(&mut self, response: BoltResponse, outbox: &mut Outbox) -> DriverResult<()> {
        if let Some(fatal) = &self.fatal {
            return Err(fatal.clone());
        }

        match response {
            BoltResponse::Record(record) => {
                let handler = self.handlers.front_mut().ok_or_else(|| {
                    DriverError::protocol("RECORD received with no pending request")
                })?;
                handler.on_record(record.values)
            }
            BoltResponse::Success(success) => {
                let mut handler = self.pop("SUCCESS")?;
                if handler.clears_failure() {
                    self.current_failure = None;
                }
                trace!(handler = handler.name(), "SUCCESS");
                let result = handler.on_success(success, outbox);
                Self::settle(handler, result)
            }
            BoltResponse::Failure(failure) => {
                let mut handler = self.pop("FAILURE")?;
                let error = DriverError::from(&failure);
                debug!(handler = handler.name(), code = %failure.code, "FAILURE");
                self.current_failure = Some(error.clone());
                let result = handler.on_failure(error.clone());
                Self::settle(handler, result)?;
                // 서버가 메시지 흐름을 잃었으면 나머지 핸들러도 끝냅니다.
                if error.is_fatal() {
                    return Err(error);
                }
                Ok(())
            }
            BoltResponse::Ignored => {
                let mut handler = self.pop("IGNORED")?;
                trace!(handler = handler.name(), "IGNORED");
                let result = handler.on_ignored(DriverError::ignored(self.current_failure.as_ref()));
                Self::settle(handler, result)
            }
        }
    }

    /// 연결 실패: 모든 핸들러를 보낸 순서대로 같은 에러로 끝냅니다.
    ///
    /// 한 번만 적용되며 이후 추가되는 핸들러도 같은 에러를 받습니다.
    pub fn handle_fatal(&mut self, error: DriverError) {
        if self.fatal.is_some() {
            return;
        }
        warn!(error = %error, pending = self.handlers.len(), "connection failed, flushing handlers");
        self.fatal = Some(error.clone());
        while let Some(mut handler) = self.handlers.pop_front() {
            handler.on_fatal(error.clone());
        }
    }

    fn pop(&mut self, kind: &str) -> DriverResult<Box<dyn ResponseHandler>> {
        self.handlers
            .pop_front()
            .ok_or_else(|| DriverError::protocol(format!("{} received with no pending request", kind)))
    }

    /// 꺼낸 핸들러가 응답을 거부하면 그 핸들러도 같은 에러로 끝냅니다.
    fn settle(mut handler: Box<dyn ResponseHandler>, result: DriverResult<()>) -> DriverResult<()> {
        if let Err(err) = &result {
            handler.on_fatal(err.clone());
        }
        result
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::bolt::{FailureMessage, PackStreamValue, RecordMessage, SuccessMessage};

    /// 받은 이벤트를 공유 로그에 남기는 핸들러
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        accepts_records: bool,
        reset: bool,
    }

    impl Recorder {
        fn boxed(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Box<dyn ResponseHandler> {
            Box::new(Self {
                name,
                log: Arc::clone(log),
                accepts_records: true,
                reset: false,
            })
        }
    }

    impl ResponseHandler for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn on_record(&mut self, values: Vec<PackStreamValue>) -> DriverResult<()> {
            if !self.accepts_records {
                return Err(DriverError::protocol("no records expected"));
            }
            self.log.lock().push(format!("{}:record:{}", self.name, values.len()));
            Ok(())
        }

        fn on_success(&mut self, _metadata: SuccessMessage, _outbox: &mut Outbox) -> DriverResult<()> {
            self.log.lock().push(format!("{}:success", self.name));
            Ok(())
        }

        fn on_failure(&mut self, error: DriverError) -> DriverResult<()> {
            self.log.lock().push(format!("{}:failure:{}", self.name, error.code().unwrap_or("-")));
            Ok(())
        }

        fn on_ignored(&mut self, error: DriverError) -> DriverResult<()> {
            let kind = if error.to_string().contains("earlier failure:") { "with-cause" } else { "bare" };
            self.log.lock().push(format!("{}:ignored:{}", self.name, kind));
            Ok(())
        }

        fn on_fatal(&mut self, _error: DriverError) {
            self.log.lock().push(format!("{}:fatal", self.name));
        }

        fn clears_failure(&self) -> bool {
            self.reset
        }
    }

    fn record() -> BoltResponse {
        BoltResponse::Record(RecordMessage::new(vec![PackStreamValue::Integer(1)]))
    }

    fn success() -> BoltResponse {
        BoltResponse::Success(SuccessMessage::new())
    }

    #[test]
    fn test_responses_match_handlers_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = InboundMessageDispatcher::new();
        dispatcher.enqueue(Recorder::boxed("run", &log));
        dispatcher.enqueue(Recorder::boxed("pull", &log));

        let mut outbox = Outbox::new();
        dispatcher.handle(success(), &mut outbox).unwrap();
        dispatcher.handle(record(), &mut outbox).unwrap();
        dispatcher.handle(success(), &mut outbox).unwrap();

        assert_eq!(*log.lock(), vec!["run:success", "pull:record:1", "pull:success"]);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn test_response_without_handler_is_protocol_violation() {
        let mut dispatcher = InboundMessageDispatcher::new();
        let mut outbox = Outbox::new();
        assert!(matches!(dispatcher.handle(success(), &mut outbox), Err(DriverError::Protocol(_))));
        assert!(matches!(dispatcher.handle(record(), &mut outbox), Err(DriverError::Protocol(_))));
    }

    #[test]
    fn test_ignored_carries_failure_until_reset() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = InboundMessageDispatcher::new();
        dispatcher.enqueue(Recorder::boxed("run", &log));
        dispatcher.enqueue(Recorder::boxed("pull", &log));
        dispatcher.enqueue(Box::new(Recorder {
            name: "reset",
            log: Arc::clone(&log),
            accepts_records: false,
            reset: true,
        }));
        dispatcher.enqueue(Recorder::boxed("next", &log));

        let mut outbox = Outbox::new();
        let failure = FailureMessage::new("Neo.ClientError.Statement.SyntaxError", "bad");
        dispatcher.handle(BoltResponse::Failure(failure), &mut outbox).unwrap();
        assert!(dispatcher.current_failure().is_some());
        dispatcher.handle(BoltResponse::Ignored, &mut outbox).unwrap();
        dispatcher.handle(success(), &mut outbox).unwrap();
        assert!(dispatcher.current_failure().is_none());
        dispatcher.handle(BoltResponse::Ignored, &mut outbox).unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                "run:failure:Neo.ClientError.Statement.SyntaxError",
                "pull:ignored:with-cause",
                "reset:success",
                "next:ignored:bare",
            ]
        );
    }

    #[test]
    fn test_rejected_record_is_connection_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = InboundMessageDispatcher::new();
        dispatcher.enqueue(Box::new(Recorder {
            name: "begin",
            log: Arc::clone(&log),
            accepts_records: false,
            reset: false,
        }));

        let mut outbox = Outbox::new();
        assert!(dispatcher.handle(record(), &mut outbox).is_err());
        assert_eq!(dispatcher.pending(), 1);
    }

    #[test]
    fn test_request_level_failure_poisons_queue() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = InboundMessageDispatcher::new();
        dispatcher.enqueue(Recorder::boxed("run", &log));
        dispatcher.enqueue(Recorder::boxed("pull", &log));

        let failure = FailureMessage::new("Neo.ClientError.Request.InvalidFormat", "garbled");
        let err = dispatcher.handle(BoltResponse::Failure(failure), &mut Outbox::new()).unwrap_err();
        assert_eq!(err.code(), Some("Neo.ClientError.Request.InvalidFormat"));
        assert_eq!(*log.lock(), vec!["run:failure:Neo.ClientError.Request.InvalidFormat"]);

        dispatcher.handle_fatal(err);
        assert_eq!(log.lock().last().map(String::as_str), Some("pull:fatal"));
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn test_fatal_flushes_in_submission_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = InboundMessageDispatcher::new();
        for name in ["a", "b", "c"] {
            dispatcher.enqueue(Recorder::boxed(name, &log));
        }

        dispatcher.handle_fatal(DriverError::connection("reset by peer"));
        dispatcher.handle_fatal(DriverError::connection("again"));
        assert_eq!(*log.lock(), vec!["a:fatal", "b:fatal", "c:fatal"]);
        assert_eq!(dispatcher.pending(), 0);

        dispatcher.enqueue(Recorder::boxed("late", &log));
        assert_eq!(log.lock().last().map(String::as_str), Some("late:fatal"));
        assert!(matches!(
            dispatcher.handle(success(), &mut Outbox::new()),
            Err(DriverError::Connection(_))
        ));
    }
}
