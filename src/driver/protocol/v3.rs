//! Bolt 3
//!
//! 전체 결과를 한 번에 받고 데이터베이스 선택이 없는 버전

use super::{BoltProtocol, Capabilities, V3_FORMAT};
use crate::bolt::{BoltVersion, RunMessage};
use crate::driver::bookmark::BookmarkHolder;
use crate::driver::config::{DatabaseName, FetchSize};
use crate::driver::connection::Connection;
use crate::driver::cursor::{CursorFactory, PullStrategy};
use crate::driver::error::{DriverError, DriverResult};
use crate::driver::handlers::TransactionContext;

pub(super) const BOLT_V3: BoltProtocol = BoltProtocol {
    version: BoltVersion::V3,
    capabilities: Capabilities::TRANSACTION_METADATA,
    message_format: &V3_FORMAT,
    build_cursor_factory: build_cursor_factory,
    verify_database: verify_database,
};

/// fetch size와 관계없이 PULL_ALL
fn build_cursor_factory(
    connection: Connection,
    run: RunMessage,
    bookmark_holder: Option<BookmarkHolder>,
    tx: Option<TransactionContext>,
    wait_for_run_response: bool,
    _fetch_size: FetchSize,
) -> CursorFactory {
    CursorFactory::new(connection, run, PullStrategy::Auto, bookmark_holder, tx, wait_for_run_response)
}

fn verify_database(database: &DatabaseName) -> DriverResult<()> {
    match database.name() {
        None => Ok(()),
        Some(name) => Err(DriverError::invalid_argument(format!(
            "Database name parameter for selecting database is not supported in Bolt Protocol Version 3.0. Database name: '{}'",
            name
        ))),
    }
}
