//! Scripted peer for driving a [`Connection`] without a network.

#![allow(dead_code)]

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use zeta4g_protocol::bolt::codec::decode_request;
use zeta4g_protocol::bolt::{
    BoltRequest, BoltResponse, BoltVersion, FailureMessage, PackStreamValue, RecordMessage, SuccessMessage,
};
use zeta4g_protocol::driver::{BoltProtocol, ChannelSink, Connection, DriverError, InboundSender, ProtocolConfig};

/// A fake server on the far side of a channel transport.
///
/// Requests are decoded as they leave the connection; responses are pushed
/// back in whatever order the test scripts them.
pub struct ScriptedServer {
    pub connection: Connection,
    wire: mpsc::UnboundedReceiver<Bytes>,
    inbound: InboundSender,
}

impl ScriptedServer {
    pub fn start(version: BoltVersion) -> Self {
        Self::start_with_config(version, ProtocolConfig::default())
    }

    pub fn start_with_config(version: BoltVersion, config: ProtocolConfig) -> Self {
        let (sink, wire) = ChannelSink::new();
        let (connection, inbound) = Connection::start_with_config(BoltProtocol::for_version(version), sink, config);
        Self {
            connection,
            wire,
            inbound,
        }
    }

    /// Next request written by the client; panics after one second.
    pub async fn expect_request(&mut self) -> BoltRequest {
        let bytes = tokio::time::timeout(Duration::from_secs(1), self.wire.recv())
            .await
            .expect("timed out waiting for a request")
            .expect("connection closed its sink");
        decode_request(&bytes).expect("undecodable request")
    }

    /// Everything written so far, without waiting.
    pub async fn drain_requests(&mut self) -> Vec<BoltRequest> {
        settle().await;
        let mut requests = Vec::new();
        while let Ok(bytes) = self.wire.try_recv() {
            requests.push(decode_request(&bytes).expect("undecodable request"));
        }
        requests
    }

    pub fn reply(&self, response: BoltResponse) {
        self.inbound.on_message(response);
    }

    pub fn success(&self, metadata: SuccessMessage) {
        self.reply(BoltResponse::Success(metadata));
    }

    pub fn run_success(&self, fields: &[&str]) {
        self.success(SuccessMessage::run(fields, None));
    }

    pub fn records(&self, values: impl IntoIterator<Item = i64>) {
        for value in values {
            self.reply(BoltResponse::Record(RecordMessage::new(vec![PackStreamValue::Integer(value)])));
        }
    }

    pub fn has_more(&self) {
        self.success(SuccessMessage::has_more_records());
    }

    pub fn stream_end(&self, bookmark: Option<&str>) {
        self.success(SuccessMessage::stream_end(bookmark));
    }

    pub fn failure(&self, code: &str, message: &str) {
        self.reply(BoltResponse::Failure(FailureMessage::new(code, message)));
    }

    pub fn ignored(&self) {
        self.reply(BoltResponse::Ignored);
    }

    pub fn break_transport(&self, reason: &str) {
        self.inbound.on_error(DriverError::connection(reason));
    }
}

/// Let the connection's driver task catch up.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub fn int(record: &zeta4g_protocol::Record) -> i64 {
    record.get_by_index(0).and_then(PackStreamValue::as_int).expect("integer column")
}

pub fn pull_sizes(requests: &[BoltRequest]) -> Vec<i64> {
    requests
        .iter()
        .filter_map(|r| match r {
            BoltRequest::Pull(pull) => Some(pull.n),
            _ => None,
        })
        .collect()
}
