//! Connection
//!
//! 연결 핸들과 메시지 전송 경계
//!
//! 드라이버 태스크 하나가 [`InboundMessageDispatcher`]를 소유합니다. 요청과
//! 도착한 응답은 채널을 통해 그 태스크로 전달되므로 핸들러 큐에는 잠금이
//! 필요 없습니다.
//!
//! ```text
//! Connection::write ──(Command)──▶ driver task ──▶ MessageSink::send_message
//! InboundSender::on_message ──(Inbound)──▶ driver task ──▶ dispatcher
//! ```

mod dispatcher;
pub mod io;

pub use dispatcher::InboundMessageDispatcher;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::config::ProtocolConfig;
use super::error::{DriverError, DriverResult};
use super::handlers::{Outbox, ResetResponseHandler, ResponseHandler};
use super::protocol::{BoltProtocol, Capabilities};
use crate::bolt::{BoltRequest, BoltResponse, BoltVersion};

// ============================================================================
// Transport Boundary - 전송 경계
// ============================================================================

/// 인코딩된 메시지를 내보내는 쪽
///
/// 메시지는 청크로 나누기 전의 PackStream 바이트입니다.
/// 청크 처리는 전송 계층이 합니다 ([`io::spawn_framed`]).
pub trait MessageSink: Send + 'static {
    /// 메시지 하나 전송
    fn send_message(&mut self, message: Bytes) -> DriverResult<()>;
}

/// 채널로 메시지를 넘기는 싱크
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl ChannelSink {
    /// 싱크와 수신측 생성
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageSink for ChannelSink {
    fn send_message(&mut self, message: Bytes) -> DriverResult<()> {
        self.tx
            .send(message)
            .map_err(|_| DriverError::connection("transport writer is closed"))
    }
}

enum Inbound {
    Message(BoltResponse),
    Error(DriverError),
}

/// 전송 계층이 디코딩한 응답을 넘기는 쪽
#[derive(Debug, Clone)]
pub struct InboundSender {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl InboundSender {
    /// 응답 하나 전달
    pub fn on_message(&self, response: BoltResponse) {
        if self.tx.send(Inbound::Message(response)).is_err() {
            trace!("response arrived after connection shut down");
        }
    }

    /// 전송 에러 전달 (대기 중인 모든 핸들러가 이 에러로 끝남)
    pub fn on_error(&self, error: DriverError) {
        if self.tx.send(Inbound::Error(error)).is_err() {
            trace!("transport error after connection shut down");
        }
    }
}

// ============================================================================
// Connection - 연결 핸들
// ============================================================================

enum Command {
    Write(Vec<(Bytes, Box<dyn ResponseHandler>)>),
    Fail(DriverError),
}

#[derive(Debug, Default)]
struct Shared {
    failure: Mutex<Option<DriverError>>,
}

impl Shared {
    fn fail(&self, error: &DriverError) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(error.clone());
        }
    }

    fn failure(&self) -> Option<DriverError> {
        self.failure.lock().clone()
    }
}

/// 연결 핸들
///
/// 복제해도 같은 연결을 가리킵니다. 한 연결은 한 논리적 호출자만 사용해야
/// 합니다. 동시 사용은 상위 계층(연결 풀)이 막습니다.
#[derive(Clone)]
pub struct Connection {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    protocol: &'static BoltProtocol,
    config: Arc<ProtocolConfig>,
}

impl Connection {
    /// 기본 설정으로 드라이버 태스크를 시작하고 응답 입력 쪽을 돌려줍니다.
    ///
    /// tokio 런타임 안에서 호출해야 합니다.
    pub fn start<S: MessageSink>(protocol: &'static BoltProtocol, sink: S) -> (Self, InboundSender) {
        Self::start_with_config(protocol, sink, ProtocolConfig::default())
    }

    /// 설정을 지정해 드라이버 태스크 시작
    ///
    /// 쿼리를 실행할 때 fetch size와 RUN 응답 대기를 따로 주지 않으면 이
    /// 설정의 값이 쓰입니다.
    pub fn start_with_config<S: MessageSink>(
        protocol: &'static BoltProtocol,
        sink: S,
        config: ProtocolConfig,
    ) -> (Self, InboundSender) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());

        tokio::spawn(drive(protocol, sink, commands_rx, inbound_rx, Arc::clone(&shared)));
        debug!(version = %protocol.version(), "connection driver started");

        (
            Self {
                commands: commands_tx,
                shared,
                protocol,
                config: Arc::new(config),
            },
            InboundSender { tx: inbound_tx },
        )
    }

    /// 협상된 프로토콜
    pub fn protocol(&self) -> &'static BoltProtocol {
        self.protocol
    }

    /// 연결 설정
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// 협상된 버전
    pub fn negotiated_version(&self) -> BoltVersion {
        self.protocol.version()
    }

    /// 지원 기능
    pub fn capabilities(&self) -> Capabilities {
        self.protocol.capabilities()
    }

    /// 사용 가능 여부
    pub fn is_open(&self) -> bool {
        self.shared.failure.lock().is_none() && !self.commands.is_closed()
    }

    /// 연결을 끝낸 에러
    pub fn failure(&self) -> Option<DriverError> {
        self.shared.failure()
    }

    /// 요청 하나 전송
    ///
    /// 인코딩은 호출자 쪽에서 바로 일어나므로 잘못된 요청은 한 바이트도
    /// 보내지 않고 실패합니다.
    pub fn write(&self, request: BoltRequest, handler: Box<dyn ResponseHandler>) -> DriverResult<()> {
        self.write_all(vec![(request, handler)])
    }

    /// 여러 요청을 순서대로 파이프라인 전송
    ///
    /// 하나라도 인코딩에 실패하면 아무것도 보내지 않습니다.
    pub fn write_all(&self, requests: Vec<(BoltRequest, Box<dyn ResponseHandler>)>) -> DriverResult<()> {
        self.ensure_open()?;

        let format = self.protocol.message_format();
        let mut batch = Vec::with_capacity(requests.len());
        for (request, handler) in requests {
            let bytes = format.encode(&request)?;
            trace!(request = request.name(), size = bytes.len(), "queue request");
            batch.push((bytes, handler));
        }
        self.send(Command::Write(batch))
    }

    /// RESET 전송 후 응답 대기
    pub async fn reset(&self) -> DriverResult<()> {
        let (handler, rx) = ResetResponseHandler::new();
        self.write(BoltRequest::Reset, Box::new(handler))?;
        rx.await
            .map_err(|_| DriverError::connection("connection closed before RESET completed"))?
    }

    /// 연결을 사용할 수 없게 표시 (대기 중인 핸들러도 이 에러로 끝남)
    pub fn mark_unusable(&self, reason: impl Into<String>) {
        let error = DriverError::connection(reason);
        warn!(error = %error, "connection marked unusable");
        self.shared.fail(&error);
        // 드라이버가 이미 끝났다면 정리할 핸들러도 없습니다.
        let _ = self.commands.send(Command::Fail(error));
    }

    fn ensure_open(&self) -> DriverResult<()> {
        match self.shared.failure() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn send(&self, command: Command) -> DriverResult<()> {
        self.commands.send(command).map_err(|_| {
            let error = DriverError::connection("connection driver has stopped");
            self.shared.fail(&error);
            error
        })
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("version", &self.protocol.version())
            .field("open", &self.is_open())
            .finish()
    }
}

// ============================================================================
// Driver Task - 드라이버 태스크
// ============================================================================

struct Driver<S> {
    protocol: &'static BoltProtocol,
    sink: S,
    dispatcher: InboundMessageDispatcher,
    shared: Arc<Shared>,
}

impl<S: MessageSink> Driver<S> {
    fn fail(&mut self, error: DriverError) {
        self.shared.fail(&error);
        self.dispatcher.handle_fatal(error);
    }

    fn write(&mut self, bytes: Bytes, handler: Box<dyn ResponseHandler>) {
        // 응답보다 핸들러가 먼저 큐에 있어야 합니다.
        self.dispatcher.enqueue(handler);
        if self.dispatcher.fatal_error().is_some() {
            return;
        }
        if let Err(error) = self.sink.send_message(bytes) {
            self.fail(error);
        }
    }

    fn flush_outbox(&mut self, outbox: &mut Outbox) {
        let format = self.protocol.message_format();
        for (request, mut handler) in outbox.drain() {
            match format.encode(&request) {
                Ok(bytes) => {
                    trace!(request = request.name(), "follow-up request");
                    self.write(bytes, handler);
                }
                Err(error) => {
                    handler.on_fatal(error.clone());
                    self.fail(error);
                }
            }
        }
    }

    fn on_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Message(response) => {
                let mut outbox = Outbox::new();
                match self.dispatcher.handle(response, &mut outbox) {
                    Ok(()) => self.flush_outbox(&mut outbox),
                    Err(error) => self.fail(error),
                }
            }
            Inbound::Error(error) => self.fail(error),
        }
    }
}

async fn drive<S: MessageSink>(
    protocol: &'static BoltProtocol,
    sink: S,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
    shared: Arc<Shared>,
) {
    let mut driver = Driver {
        protocol,
        sink,
        dispatcher: InboundMessageDispatcher::new(),
        shared,
    };
    let mut commands_open = true;
    let mut inbound_open = true;

    loop {
        // 모든 핸들이 사라졌다면 남은 응답만 마저 처리합니다.
        if !commands_open && (!inbound_open || driver.dispatcher.pending() == 0) {
            break;
        }

        tokio::select! {
            biased;

            command = commands.recv(), if commands_open => match command {
                Some(Command::Write(batch)) => {
                    for (bytes, handler) in batch {
                        driver.write(bytes, handler);
                    }
                }
                Some(Command::Fail(error)) => driver.fail(error),
                None => commands_open = false,
            },

            message = inbound.recv(), if inbound_open => match message {
                Some(message) => driver.on_inbound(message),
                None => {
                    inbound_open = false;
                    driver.fail(DriverError::connection("transport closed"));
                }
            },

            else => break,
        }
    }

    debug!(pending = driver.dispatcher.pending(), "connection driver stopped");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::codec::decode_request;
    use crate::bolt::{BeginMessage, FailureMessage, SuccessMessage};
    use crate::driver::handlers::{BeginTxResponseHandler, RollbackTxResponseHandler};

    fn v4() -> &'static BoltProtocol {
        BoltProtocol::for_version(BoltVersion::V4_4)
    }

    #[tokio::test]
    async fn test_write_sends_encoded_request() {
        let (sink, mut wire) = ChannelSink::new();
        let (conn, inbound) = Connection::start(v4(), sink);

        let (handler, rx) = BeginTxResponseHandler::new();
        conn.write(BoltRequest::Begin(BeginMessage::default()), Box::new(handler)).unwrap();

        let bytes = wire.recv().await.unwrap();
        assert_eq!(decode_request(&bytes).unwrap(), BoltRequest::Begin(BeginMessage::default()));

        inbound.on_message(BoltResponse::Success(SuccessMessage::new()));
        assert!(rx.await.unwrap().is_ok());
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn test_reset_clears_failure() {
        let (sink, mut wire) = ChannelSink::new();
        let (conn, inbound) = Connection::start(v4(), sink);

        let (rollback, rollback_rx) = RollbackTxResponseHandler::new();
        conn.write(BoltRequest::Rollback, Box::new(rollback)).unwrap();
        inbound.on_message(BoltResponse::Failure(FailureMessage::new(
            "Neo.ClientError.Transaction.TransactionNotFound",
            "no tx",
        )));
        assert!(rollback_rx.await.unwrap().is_err());

        let reset = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.reset().await })
        };
        let _ = wire.recv().await;
        let reset_bytes = wire.recv().await.unwrap();
        assert_eq!(decode_request(&reset_bytes).unwrap(), BoltRequest::Reset);
        inbound.on_message(BoltResponse::Success(SuccessMessage::new()));
        reset.await.unwrap().unwrap();
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn test_transport_error_fails_everything() {
        let (sink, _wire) = ChannelSink::new();
        let (conn, inbound) = Connection::start(v4(), sink);

        let (first, first_rx) = RollbackTxResponseHandler::new();
        let (second, second_rx) = RollbackTxResponseHandler::new();
        conn.write_all(vec![
            (BoltRequest::Rollback, Box::new(first) as Box<dyn ResponseHandler>),
            (BoltRequest::Rollback, Box::new(second)),
        ])
        .unwrap();

        inbound.on_error(DriverError::connection("reset by peer"));
        assert!(matches!(first_rx.await.unwrap(), Err(DriverError::Connection(_))));
        assert!(matches!(second_rx.await.unwrap(), Err(DriverError::Connection(_))));

        tokio::task::yield_now().await;
        assert!(!conn.is_open());
        let (late, _rx) = RollbackTxResponseHandler::new();
        assert!(conn.write(BoltRequest::Rollback, Box::new(late)).is_err());
    }

    #[tokio::test]
    async fn test_unexpected_response_is_fatal() {
        let (sink, _wire) = ChannelSink::new();
        let (conn, inbound) = Connection::start(v4(), sink);

        inbound.on_message(BoltResponse::Success(SuccessMessage::new()));
        let (handler, rx) = RollbackTxResponseHandler::new();
        // 드라이버가 위반을 먼저 처리하도록 양보
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(matches!(conn.failure(), Some(DriverError::Protocol(_))));
        assert!(conn.write(BoltRequest::Rollback, Box::new(handler)).is_err());
        drop(rx);
    }

    #[tokio::test]
    async fn test_mark_unusable_flushes_pending() {
        let (sink, _wire) = ChannelSink::new();
        let (conn, _inbound) = Connection::start(v4(), sink);

        let (handler, rx) = RollbackTxResponseHandler::new();
        conn.write(BoltRequest::Rollback, Box::new(handler)).unwrap();
        conn.mark_unusable("cancelled mid-stream");

        assert!(matches!(rx.await.unwrap(), Err(DriverError::Connection(_))));
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn test_connection_keeps_its_config() {
        let config = ProtocolConfig::builder()
            .fetch_size(crate::driver::config::FetchSize::new(25).unwrap())
            .build()
            .unwrap();
        let (sink, _wire) = ChannelSink::new();
        let (conn, _inbound) = Connection::start_with_config(v4(), sink, config);
        assert_eq!(conn.config().fetch_size.value(), 25);
        assert_eq!(conn.clone().config().fetch_size.value(), 25);

        let (sink, _wire) = ChannelSink::new();
        let (plain, _inbound) = Connection::start(v4(), sink);
        assert_eq!(plain.config(), &ProtocolConfig::default());
    }

    #[tokio::test]
    async fn test_capabilities_follow_protocol() {
        let (sink, _wire) = ChannelSink::new();
        let (conn, _inbound) = Connection::start(BoltProtocol::for_version(BoltVersion::V3), sink);
        assert_eq!(conn.negotiated_version(), BoltVersion::V3);
        assert!(!conn.capabilities().contains(Capabilities::DATABASE_SELECTION));
    }
}
