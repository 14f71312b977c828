//! Message Formats
//!
//! 버전별 요청 메시지 인코딩

use bytes::Bytes;

use crate::bolt::codec;
use crate::bolt::packstream::{self, PackStreamStructure, PackStreamValue};
use crate::bolt::{BoltError, BoltRequest, BoltResponse};
use crate::driver::error::{DriverError, DriverResult};

// ============================================================================
// MessageFormat - 버전별 코덱
// ============================================================================

/// 버전 하나의 메시지 코덱
///
/// 요청은 버전마다 모양이 다르고, 응답 디코딩은 모든 버전에서 같습니다.
/// `encode`는 청크로 나누기 전의 메시지 바이트를 만듭니다.
pub struct MessageFormat {
    name: &'static str,
    write_request: fn(&BoltRequest) -> DriverResult<PackStreamStructure>,
}

impl MessageFormat {
    /// 포맷 이름
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 요청을 구조체로 변환
    pub fn to_structure(&self, request: &BoltRequest) -> DriverResult<PackStreamStructure> {
        (self.write_request)(request)
    }

    /// 요청 인코딩
    pub fn encode(&self, request: &BoltRequest) -> DriverResult<Bytes> {
        let structure = self.to_structure(request)?;
        let bytes = packstream::encode(&PackStreamValue::Structure(structure))
            .map_err(|e| DriverError::from(BoltError::from(e)))?;
        Ok(bytes.freeze())
    }

    /// 응답 디코딩
    pub fn decode_response(&self, payload: &[u8]) -> DriverResult<BoltResponse> {
        Ok(codec::decode_response(payload)?)
    }
}

impl std::fmt::Debug for MessageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageFormat").field("name", &self.name).finish()
    }
}

// ============================================================================
// Bolt 3
// ============================================================================

/// Bolt 3 포맷
///
/// PULL_ALL / DISCARD_ALL만 있고 데이터베이스 선택이 없습니다.
pub const V3_FORMAT: MessageFormat = MessageFormat {
    name: "v3",
    write_request: write_v3,
};

fn write_v3(request: &BoltRequest) -> DriverResult<PackStreamStructure> {
    match request {
        BoltRequest::Pull(pull) => {
            if !pull.is_all() {
                return Err(DriverError::protocol(format!(
                    "Bolt 3 cannot pull a bounded batch (n = {})",
                    pull.n
                )));
            }
            Ok(PackStreamStructure::new(request.tag(), vec![]))
        }
        BoltRequest::Discard(discard) => {
            if !discard.is_all() {
                return Err(DriverError::protocol(format!(
                    "Bolt 3 cannot discard a bounded batch (n = {})",
                    discard.n
                )));
            }
            Ok(PackStreamStructure::new(request.tag(), vec![]))
        }
        BoltRequest::Run(run) if run.extra.database.is_some() => Err(DriverError::invalid_argument(
            "Database name parameter for selecting database is not supported in Bolt Protocol Version 3.0",
        )),
        BoltRequest::Begin(begin) if begin.extra.database.is_some() => {
            Err(DriverError::invalid_argument(
                "Database name parameter for selecting database is not supported in Bolt Protocol Version 3.0",
            ))
        }
        other => Ok(other.to_structure()),
    }
}

// ============================================================================
// Bolt 4
// ============================================================================

/// Bolt 4.x 포맷 (PULL/DISCARD에 `n`, `qid`; `db` 허용)
pub const V4_FORMAT: MessageFormat = MessageFormat {
    name: "v4",
    write_request: write_v4,
};

fn write_v4(request: &BoltRequest) -> DriverResult<PackStreamStructure> {
    Ok(request.to_structure())
}

// ============================================================================
// Tests
// ============================================================================
