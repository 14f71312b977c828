//! Bolt 4.x
//!
//! 4.0이 데이터베이스 선택과 배치 PULL을 추가하고, 이후 버전은 기능만 더합니다.

use super::{BoltProtocol, Capabilities, V4_FORMAT};
use crate::bolt::{BoltVersion, RunMessage};
use crate::driver::bookmark::BookmarkHolder;
use crate::driver::config::{DatabaseName, FetchSize};
use crate::driver::connection::Connection;
use crate::driver::cursor::{CursorFactory, PullStrategy};
use crate::driver::error::DriverResult;
use crate::driver::handlers::TransactionContext;

pub(super) const BOLT_V4_0: BoltProtocol = BoltProtocol {
    version: BoltVersion::V4_0,
    capabilities: super::v3::BOLT_V3
        .capabilities
        .union(Capabilities::DATABASE_SELECTION)
        .union(Capabilities::BOUNDED_PULL)
        .union(Capabilities::QUERY_ID),
    message_format: &V4_FORMAT,
    build_cursor_factory: build_cursor_factory,
    verify_database: verify_database,
};

pub(super) const BOLT_V4_1: BoltProtocol = BoltProtocol {
    version: BoltVersion::V4_1,
    capabilities: BOLT_V4_0.capabilities.union(Capabilities::NOOP_CHUNKS),
    ..BOLT_V4_0
};

pub(super) const BOLT_V4_2: BoltProtocol = BoltProtocol {
    version: BoltVersion::V4_2,
    ..BOLT_V4_1
};

pub(super) const BOLT_V4_3: BoltProtocol = BoltProtocol {
    version: BoltVersion::V4_3,
    capabilities: BOLT_V4_2.capabilities.union(Capabilities::ROUTE_MESSAGE),
    ..BOLT_V4_2
};

pub(super) const BOLT_V4_4: BoltProtocol = BoltProtocol {
    version: BoltVersion::V4_4,
    capabilities: BOLT_V4_3.capabilities.union(Capabilities::IMPERSONATION),
    ..BOLT_V4_3
};

/// fetch size가 ALL이면 PULL 한 번, 아니면 배치 PULL
fn build_cursor_factory(
    connection: Connection,
    run: RunMessage,
    bookmark_holder: Option<BookmarkHolder>,
    tx: Option<TransactionContext>,
    wait_for_run_response: bool,
    fetch_size: FetchSize,
) -> CursorFactory {
    let strategy = if fetch_size.is_all() {
        PullStrategy::Auto
    } else {
        PullStrategy::Bounded(fetch_size)
    };
    CursorFactory::new(connection, run, strategy, bookmark_holder, tx, wait_for_run_response)
}

fn verify_database(_database: &DatabaseName) -> DriverResult<()> {
    Ok(())
}
