//! Request messages sent from the client to the server.
//!
//! [`BoltRequest::to_structure`] produces the Bolt 4 shape. Version-specific
//! shapes (the field-less `PULL_ALL`/`DISCARD_ALL` of Bolt 3) are chosen by the
//! driver's message format, which rewrites the structure before packing.

use std::collections::HashMap;
use std::time::Duration;

use super::tag;
use crate::bolt::packstream::{PackStreamError, PackStreamStructure, PackStreamValue};

/// `n` value meaning "every remaining record".
pub const ALL_RECORDS: i64 = -1;

/// `qid` value meaning "the last query run in this transaction".
pub const LAST_QUERY: i64 = -1;

/// Access mode for transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Read-write access (default)
    #[default]
    Write,
    /// Read-only access
    Read,
}

impl AccessMode {
    /// Convert to string for metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "r",
            AccessMode::Write => "w",
        }
    }
}

/// The `extra` map of RUN (auto-commit) and BEGIN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionMetadata {
    /// Raw bookmark tokens the server must catch up to
    pub bookmarks: Vec<String>,
    /// Transaction timeout, sent in whole milliseconds
    pub tx_timeout: Option<Duration>,
    /// User metadata attached to the transaction
    pub tx_metadata: HashMap<String, PackStreamValue>,
    /// Access mode; only `Read` is written
    pub mode: AccessMode,
    /// Target database; `None` means the server default
    pub database: Option<String>,
    /// User to impersonate
    pub imp_user: Option<String>,
}

impl TransactionMetadata {
    /// Empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bookmarks.
    pub fn with_bookmarks<I, S>(mut self, bookmarks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bookmarks = bookmarks.into_iter().map(Into::into).collect();
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.tx_timeout = Some(timeout);
        self
    }

    /// Set access mode.
    pub fn with_mode(mut self, mode: AccessMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set database.
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = Some(db.into());
        self
    }

    /// Set impersonated user.
    pub fn with_imp_user(mut self, user: impl Into<String>) -> Self {
        self.imp_user = Some(user.into());
        self
    }

    /// Attach a transaction metadata entry.
    pub fn with_tx_metadata(mut self, key: impl Into<String>, value: PackStreamValue) -> Self {
        self.tx_metadata.insert(key.into(), value);
        self
    }

    /// Whether nothing would be written.
    pub fn is_empty(&self) -> bool {
        self.to_map().is_empty()
    }

    /// Convert to the wire map. Unset entries are omitted.
    pub fn to_map(&self) -> HashMap<String, PackStreamValue> {
        let mut extra = HashMap::new();

        if !self.bookmarks.is_empty() {
            let list = self.bookmarks.iter().map(|b| b.as_str().into()).collect();
            extra.insert("bookmarks".to_string(), PackStreamValue::List(list));
        }
        if let Some(timeout) = self.tx_timeout {
            let millis = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
            extra.insert("tx_timeout".to_string(), PackStreamValue::Integer(millis));
        }
        if !self.tx_metadata.is_empty() {
            extra.insert(
                "tx_metadata".to_string(),
                PackStreamValue::Map(self.tx_metadata.clone()),
            );
        }
        if self.mode == AccessMode::Read {
            extra.insert("mode".to_string(), AccessMode::Read.as_str().into());
        }
        if let Some(ref db) = self.database {
            extra.insert("db".to_string(), db.as_str().into());
        }
        if let Some(ref user) = self.imp_user {
            extra.insert("imp_user".to_string(), user.as_str().into());
        }

        extra
    }

    /// Parse the wire map. Unknown entries are ignored.
    pub fn from_map(extra: &HashMap<String, PackStreamValue>) -> Self {
        let text = |key: &str| extra.get(key).and_then(|v| v.as_str()).map(str::to_string);

        Self {
            bookmarks: extra
                .get("bookmarks")
                .and_then(PackStreamValue::as_string_list)
                .unwrap_or_default(),
            tx_timeout: extra
                .get("tx_timeout")
                .and_then(PackStreamValue::as_int)
                .and_then(|ms| u64::try_from(ms).ok())
                .map(Duration::from_millis),
            tx_metadata: extra
                .get("tx_metadata")
                .and_then(|v| v.as_map())
                .cloned()
                .unwrap_or_default(),
            mode: match text("mode").as_deref() {
                Some("r") => AccessMode::Read,
                _ => AccessMode::Write,
            },
            database: text("db"),
            imp_user: text("imp_user"),
        }
    }
}

/// All request messages this engine sends.
#[derive(Debug, Clone, PartialEq)]
pub enum BoltRequest {
    /// RUN - submit a query
    Run(RunMessage),
    /// PULL - request up to `n` records
    Pull(PullMessage),
    /// DISCARD - drop up to `n` records
    Discard(DiscardMessage),
    /// BEGIN - open an explicit transaction
    Begin(BeginMessage),
    /// COMMIT
    Commit,
    /// ROLLBACK
    Rollback,
    /// RESET - return the connection to a clean state
    Reset,
    /// GOODBYE - close gracefully
    Goodbye,
}

impl BoltRequest {
    /// Get the message tag.
    pub fn tag(&self) -> u8 {
        match self {
            BoltRequest::Run(_) => tag::RUN,
            BoltRequest::Pull(_) => tag::PULL,
            BoltRequest::Discard(_) => tag::DISCARD,
            BoltRequest::Begin(_) => tag::BEGIN,
            BoltRequest::Commit => tag::COMMIT,
            BoltRequest::Rollback => tag::ROLLBACK,
            BoltRequest::Reset => tag::RESET,
            BoltRequest::Goodbye => tag::GOODBYE,
        }
    }

    /// Get message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            BoltRequest::Run(_) => "RUN",
            BoltRequest::Pull(_) => "PULL",
            BoltRequest::Discard(_) => "DISCARD",
            BoltRequest::Begin(_) => "BEGIN",
            BoltRequest::Commit => "COMMIT",
            BoltRequest::Rollback => "ROLLBACK",
            BoltRequest::Reset => "RESET",
            BoltRequest::Goodbye => "GOODBYE",
        }
    }

    /// Convert to the Bolt 4 structure.
    pub fn to_structure(&self) -> PackStreamStructure {
        match self {
            BoltRequest::Run(msg) => msg.to_structure(),
            BoltRequest::Pull(msg) => {
                PackStreamStructure::new(tag::PULL, vec![stream_extra(msg.n, msg.qid)])
            }
            BoltRequest::Discard(msg) => {
                PackStreamStructure::new(tag::DISCARD, vec![stream_extra(msg.n, msg.qid)])
            }
            BoltRequest::Begin(msg) => PackStreamStructure::new(
                tag::BEGIN,
                vec![PackStreamValue::Map(msg.extra.to_map())],
            ),
            BoltRequest::Commit
            | BoltRequest::Rollback
            | BoltRequest::Reset
            | BoltRequest::Goodbye => PackStreamStructure::new(self.tag(), vec![]),
        }
    }

    /// Parse from a structure. Accepts both the Bolt 3 and Bolt 4 shapes.
    pub fn from_structure(s: &PackStreamStructure) -> Result<Self, PackStreamError> {
        match s.tag {
            tag::RUN => Ok(BoltRequest::Run(RunMessage::from_structure(s)?)),
            tag::PULL => {
                let (n, qid) = parse_stream_extra(s);
                Ok(BoltRequest::Pull(PullMessage { n, qid }))
            }
            tag::DISCARD => {
                let (n, qid) = parse_stream_extra(s);
                Ok(BoltRequest::Discard(DiscardMessage { n, qid }))
            }
            tag::BEGIN => Ok(BoltRequest::Begin(BeginMessage {
                extra: extra_at(s, 0),
            })),
            tag::COMMIT => Ok(BoltRequest::Commit),
            tag::ROLLBACK => Ok(BoltRequest::Rollback),
            tag::RESET => Ok(BoltRequest::Reset),
            tag::GOODBYE => Ok(BoltRequest::Goodbye),
            other => Err(PackStreamError::InvalidStructure(format!(
                "Unknown request message tag: 0x{:02X}",
                other
            ))),
        }
    }
}

fn stream_extra(n: i64, qid: Option<i64>) -> PackStreamValue {
    let mut extra = HashMap::new();
    extra.insert("n".to_string(), PackStreamValue::Integer(n));
    if let Some(qid) = qid.filter(|q| *q != LAST_QUERY) {
        extra.insert("qid".to_string(), PackStreamValue::Integer(qid));
    }
    PackStreamValue::Map(extra)
}

fn parse_stream_extra(s: &PackStreamStructure) -> (i64, Option<i64>) {
    match s.field(0).and_then(|v| v.as_map()) {
        Some(extra) => (
            extra.get("n").and_then(|v| v.as_int()).unwrap_or(ALL_RECORDS),
            extra.get("qid").and_then(|v| v.as_int()),
        ),
        // PULL_ALL / DISCARD_ALL carry no fields
        None => (ALL_RECORDS, None),
    }
}

fn extra_at(s: &PackStreamStructure, index: usize) -> TransactionMetadata {
    s.field(index)
        .and_then(|v| v.as_map())
        .map(TransactionMetadata::from_map)
        .unwrap_or_default()
}

/// RUN message - submit a query.
#[derive(Debug, Clone, PartialEq)]
pub struct RunMessage {
    /// Query text
    pub query: String,
    /// Query parameters
    pub parameters: HashMap<String, PackStreamValue>,
    /// Transaction metadata; empty inside an explicit transaction
    pub extra: TransactionMetadata,
}

impl RunMessage {
    /// Create a new RUN message.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            parameters: HashMap::new(),
            extra: TransactionMetadata::default(),
        }
    }

    /// Set parameters.
    pub fn with_parameters(mut self, params: HashMap<String, PackStreamValue>) -> Self {
        self.parameters = params;
        self
    }

    /// Set transaction metadata.
    pub fn with_extra(mut self, extra: TransactionMetadata) -> Self {
        self.extra = extra;
        self
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self) -> PackStreamStructure {
        PackStreamStructure::new(
            tag::RUN,
            vec![
                self.query.as_str().into(),
                PackStreamValue::Map(self.parameters.clone()),
                PackStreamValue::Map(self.extra.to_map()),
            ],
        )
    }

    /// Parse from PackStream structure.
    pub fn from_structure(s: &PackStreamStructure) -> Result<Self, PackStreamError> {
        let query = s
            .field(0)
            .and_then(|v| v.as_str())
            .ok_or_else(|| PackStreamError::InvalidStructure("RUN without query".to_string()))?;

        Ok(Self {
            query: query.to_string(),
            parameters: s
                .field(1)
                .and_then(|v| v.as_map())
                .cloned()
                .unwrap_or_default(),
            extra: extra_at(s, 2),
        })
    }
}

/// PULL message - request more records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullMessage {
    /// Batch size; [`ALL_RECORDS`] for everything
    pub n: i64,
    /// Query id; `None` targets the last query
    pub qid: Option<i64>,
}

impl PullMessage {
    /// Pull every remaining record of the last query.
    pub fn all() -> Self {
        Self { n: ALL_RECORDS, qid: None }
    }

    /// Pull a batch of `n` records.
    pub fn new(n: i64, qid: Option<i64>) -> Self {
        Self { n, qid }
    }

    /// Whether this is the unbounded form.
    pub fn is_all(&self) -> bool {
        self.n == ALL_RECORDS
    }
}

/// DISCARD message - drop remaining records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscardMessage {
    /// Number of records to drop; [`ALL_RECORDS`] for everything
    pub n: i64,
    /// Query id; `None` targets the last query
    pub qid: Option<i64>,
}

impl DiscardMessage {
    /// Discard everything that is left of the last query.
    pub fn all() -> Self {
        Self { n: ALL_RECORDS, qid: None }
    }

    /// Discard everything that is left of query `qid`.
    pub fn all_of(qid: Option<i64>) -> Self {
        Self { n: ALL_RECORDS, qid }
    }

    /// Whether this is the unbounded form.
    pub fn is_all(&self) -> bool {
        self.n == ALL_RECORDS
    }
}

/// BEGIN message - start a transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeginMessage {
    /// Transaction metadata
    pub extra: TransactionMetadata,
}

impl BeginMessage {
    /// Create a BEGIN message.
    pub fn new(extra: TransactionMetadata) -> Self {
        Self { extra }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_extra_writes_nothing() {
        let extra = TransactionMetadata::new().with_mode(AccessMode::Write);
        assert!(extra.is_empty());
        assert!(extra.to_map().is_empty());
    }

    #[test]
    fn test_extra_to_map() {
        let extra = TransactionMetadata::new()
            .with_bookmarks(["db1:42"])
            .with_timeout(Duration::from_secs(3))
            .with_mode(AccessMode::Read)
            .with_database("movies");
        let map = extra.to_map();

        assert_eq!(
            map.get("bookmarks").and_then(PackStreamValue::as_string_list),
            Some(vec!["db1:42".to_string()])
        );
        assert_eq!(map.get("tx_timeout").and_then(|v| v.as_int()), Some(3000));
        assert_eq!(map.get("mode").and_then(|v| v.as_str()), Some("r"));
        assert_eq!(map.get("db").and_then(|v| v.as_str()), Some("movies"));
        assert!(!map.contains_key("imp_user"));

        assert_eq!(TransactionMetadata::from_map(&map), extra);
    }

    #[test]
    fn test_pull_omits_last_query_qid() {
        let s = BoltRequest::Pull(PullMessage::new(5, Some(LAST_QUERY))).to_structure();
        let extra = s.fields[0].as_map().unwrap();
        assert_eq!(extra.get("n").and_then(|v| v.as_int()), Some(5));
        assert!(!extra.contains_key("qid"));

        let s = BoltRequest::Discard(DiscardMessage::all_of(Some(7))).to_structure();
        let extra = s.fields[0].as_map().unwrap();
        assert_eq!(extra.get("qid").and_then(|v| v.as_int()), Some(7));
    }

    #[test]
    fn test_parse_bolt3_pull_all() {
        let s = PackStreamStructure::new(tag::PULL, vec![]);
        assert_eq!(
            BoltRequest::from_structure(&s).unwrap(),
            BoltRequest::Pull(PullMessage::all())
        );
    }

    #[test]
    fn test_parse_run() {
        let run = RunMessage::new("RETURN 1")
            .with_extra(TransactionMetadata::new().with_database("neo4j"));
        let parsed = BoltRequest::from_structure(&run.to_structure()).unwrap();
        assert_eq!(parsed, BoltRequest::Run(run));
    }

    #[test]
    fn test_run_without_query_is_rejected() {
        let s = PackStreamStructure::new(tag::RUN, vec![]);
        assert!(RunMessage::from_structure(&s).is_err());
    }

    #[test]
    fn test_unknown_tag() {
        let s = PackStreamStructure::new(0x66, vec![]);
        assert!(BoltRequest::from_structure(&s).is_err());
    }

    #[test]
    fn test_fieldless_requests() {
        for req in [BoltRequest::Commit, BoltRequest::Rollback, BoltRequest::Reset, BoltRequest::Goodbye] {
            let s = req.to_structure();
            assert!(s.fields.is_empty());
            assert_eq!(BoltRequest::from_structure(&s).unwrap(), req);
        }
    }
}
