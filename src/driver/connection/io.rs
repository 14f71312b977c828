//! Stream Transport
//!
//! `AsyncRead + AsyncWrite` 스트림을 메시지 경계에 연결합니다.
//! 소켓/TLS 생성은 호출자가 합니다.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info};

use super::{ChannelSink, Connection};
use crate::bolt::codec::{BoltResponseCodec, ChunkCodec};
use crate::bolt::handshake::negotiate;
use crate::driver::config::ProtocolConfig;
use crate::driver::error::{DriverError, DriverResult};
use crate::driver::protocol::BoltProtocol;

/// 핸드셰이크가 끝난 스트림에 연결을 띄웁니다.
///
/// 쓰기 태스크는 메시지를 청크로 나눠 보내고, 읽기 태스크는 청크를 모아
/// 디코딩한 응답을 연결에 넘깁니다. 어느 쪽이든 에러가 나면 대기 중인
/// 모든 핸들러가 그 에러로 끝납니다.
pub fn spawn_framed<T>(stream: T, protocol: &'static BoltProtocol, config: &ProtocolConfig) -> Connection
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let max_message_size = config.max_message_size;
    let (reader, writer) = tokio::io::split(stream);
    let (sink, mut outgoing) = ChannelSink::new();
    let (connection, inbound) = Connection::start_with_config(protocol, sink, config.clone());

    let writer_inbound = inbound.clone();
    tokio::spawn(async move {
        let mut framed = FramedWrite::new(writer, ChunkCodec::with_max_size(max_message_size));
        while let Some(message) = outgoing.recv().await {
            if let Err(e) = framed.send(message).await {
                writer_inbound.on_error(DriverError::from(e));
                return;
            }
        }
        debug!("bolt writer finished");
    });

    tokio::spawn(async move {
        let mut framed = FramedRead::new(reader, BoltResponseCodec::with_max_size(max_message_size));
        while let Some(item) = framed.next().await {
            match item {
                Ok(response) => inbound.on_message(response),
                Err(e) => {
                    inbound.on_error(DriverError::from(e));
                    return;
                }
            }
        }
        inbound.on_error(DriverError::connection("connection closed by server"));
    });

    connection
}

/// 핸드셰이크 후 연결 생성
///
/// 서버가 `handshake_timeout` 안에 버전을 고르지 않으면 [`DriverError::Timeout`].
pub async fn connect<T>(mut stream: T, config: &ProtocolConfig) -> DriverResult<Connection>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let version = tokio::time::timeout(config.handshake_timeout, negotiate(&mut stream, &config.proposed_versions))
        .await
        .map_err(|_| {
            DriverError::timeout(format!("no handshake answer within {:?}", config.handshake_timeout))
        })??;
    let protocol = BoltProtocol::for_version(version);
    info!(%version, fetch_size = %config.fetch_size, "bolt connection established");
    Ok(spawn_framed(stream, protocol, config))
}
