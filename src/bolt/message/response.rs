//! Response messages sent from the server to the client.
//!
//! The server-side constructors (`SuccessMessage::run`, `FailureMessage::new`,
//! ...) exist so scripted peers can produce well-formed answers.

use std::collections::HashMap;

use super::metadata::{Notification, QueryStats, QueryType};
use super::tag;
use crate::bolt::packstream::{PackStreamError, PackStreamStructure, PackStreamValue};

/// All Bolt response messages.
#[derive(Debug, Clone, PartialEq)]
pub enum BoltResponse {
    /// SUCCESS - request completed
    Success(SuccessMessage),
    /// RECORD - one result row
    Record(RecordMessage),
    /// FAILURE - request failed
    Failure(FailureMessage),
    /// IGNORED - request skipped because of an earlier failure
    Ignored,
}

impl BoltResponse {
    /// Get the message tag.
    pub fn tag(&self) -> u8 {
        match self {
            BoltResponse::Success(_) => tag::SUCCESS,
            BoltResponse::Record(_) => tag::RECORD,
            BoltResponse::Failure(_) => tag::FAILURE,
            BoltResponse::Ignored => tag::IGNORED,
        }
    }

    /// Get message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            BoltResponse::Success(_) => "SUCCESS",
            BoltResponse::Record(_) => "RECORD",
            BoltResponse::Failure(_) => "FAILURE",
            BoltResponse::Ignored => "IGNORED",
        }
    }

    /// Whether this message ends the exchange of the front handler.
    pub fn is_summary(&self) -> bool {
        !matches!(self, BoltResponse::Record(_))
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self) -> PackStreamStructure {
        match self {
            BoltResponse::Success(msg) => PackStreamStructure::new(
                tag::SUCCESS,
                vec![PackStreamValue::Map(msg.metadata.clone())],
            ),
            BoltResponse::Record(msg) => PackStreamStructure::new(
                tag::RECORD,
                vec![PackStreamValue::List(msg.values.clone())],
            ),
            BoltResponse::Failure(msg) => {
                let mut metadata = HashMap::new();
                metadata.insert("code".to_string(), msg.code.as_str().into());
                metadata.insert("message".to_string(), msg.message.as_str().into());
                PackStreamStructure::new(tag::FAILURE, vec![PackStreamValue::Map(metadata)])
            }
            BoltResponse::Ignored => PackStreamStructure::new(tag::IGNORED, vec![]),
        }
    }

    /// Parse from PackStream structure.
    pub fn from_structure(s: &PackStreamStructure) -> Result<Self, PackStreamError> {
        match s.tag {
            tag::SUCCESS => Ok(BoltResponse::Success(SuccessMessage {
                metadata: s.field(0).and_then(|v| v.as_map()).cloned().unwrap_or_default(),
            })),
            tag::RECORD => match s.field(0) {
                Some(PackStreamValue::List(values)) => {
                    Ok(BoltResponse::Record(RecordMessage::new(values.clone())))
                }
                None => Ok(BoltResponse::Record(RecordMessage::new(Vec::new()))),
                Some(other) => Err(PackStreamError::InvalidStructure(format!(
                    "RECORD fields must be a list, got {}",
                    other.type_name()
                ))),
            },
            tag::FAILURE => {
                let metadata = s.field(0).and_then(|v| v.as_map());
                let text = |key: &str| {
                    metadata
                        .and_then(|m| m.get(key))
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                };
                Ok(BoltResponse::Failure(FailureMessage::new(
                    text("code"),
                    text("message"),
                )))
            }
            tag::IGNORED => Ok(BoltResponse::Ignored),
            other => Err(PackStreamError::InvalidStructure(format!(
                "Unknown response message tag: 0x{:02X}",
                other
            ))),
        }
    }
}

/// SUCCESS message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuccessMessage {
    /// Response metadata
    pub metadata: HashMap<String, PackStreamValue>,
}

impl SuccessMessage {
    /// Create a SUCCESS message with empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a metadata entry.
    pub fn with(mut self, key: &str, value: impl Into<PackStreamValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// RUN answer carrying result keys and an optional query id.
    pub fn run<S: AsRef<str>>(fields: &[S], qid: Option<i64>) -> Self {
        let keys = fields.iter().map(|f| f.as_ref().into()).collect::<Vec<PackStreamValue>>();
        let msg = Self::new().with("fields", keys).with("t_first", 1i64);
        match qid {
            Some(qid) => msg.with("qid", qid),
            None => msg,
        }
    }

    /// End of a PULL batch that left records on the server.
    pub fn has_more_records() -> Self {
        Self::new().with("has_more", true)
    }

    /// End of a result stream, optionally carrying a bookmark.
    pub fn stream_end(bookmark: Option<&str>) -> Self {
        let msg = Self::new().with("t_last", 1i64).with("type", "r");
        match bookmark {
            Some(b) => msg.with("bookmark", b),
            None => msg,
        }
    }

    /// Get a metadata entry.
    pub fn get(&self, key: &str) -> Option<&PackStreamValue> {
        self.metadata.get(key)
    }

    /// Result keys from a RUN answer.
    pub fn fields(&self) -> Option<Vec<String>> {
        self.get("fields").and_then(PackStreamValue::as_string_list)
    }

    /// Query id from a RUN answer inside an explicit transaction.
    pub fn qid(&self) -> Option<i64> {
        self.get("qid").and_then(|v| v.as_int())
    }

    /// Milliseconds until the first record was available.
    pub fn t_first(&self) -> Option<i64> {
        self.get("t_first").and_then(|v| v.as_int())
    }

    /// Milliseconds until the last record was consumed.
    pub fn t_last(&self) -> Option<i64> {
        self.get("t_last").and_then(|v| v.as_int())
    }

    /// Whether the batch ended with records still on the server.
    pub fn has_more(&self) -> bool {
        self.get("has_more").and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// Causal bookmark token. An empty string counts as absent.
    pub fn bookmark(&self) -> Option<&str> {
        self.get("bookmark")
            .and_then(|v| v.as_str())
            .filter(|b| !b.is_empty())
    }

    /// Database the query ran against.
    pub fn db(&self) -> Option<&str> {
        self.get("db").and_then(|v| v.as_str())
    }

    /// Statement type.
    pub fn query_type(&self) -> Option<QueryType> {
        self.get("type").and_then(|v| v.as_str()).and_then(QueryType::from_code)
    }

    /// Update counters, if reported.
    pub fn stats(&self) -> Option<QueryStats> {
        self.get("stats").and_then(|v| v.as_map()).map(QueryStats::from_map)
    }

    /// Notifications, if any.
    pub fn notifications(&self) -> Vec<Notification> {
        self.get("notifications")
            .and_then(|v| v.as_list())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_map().and_then(Notification::from_map))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// RECORD message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordMessage {
    /// Values in key order
    pub values: Vec<PackStreamValue>,
}

impl RecordMessage {
    /// Create a RECORD message.
    pub fn new(values: Vec<PackStreamValue>) -> Self {
        Self { values }
    }
}

/// FAILURE message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureMessage {
    /// Status code, e.g. `Neo.ClientError.Statement.SyntaxError`
    pub code: String,
    /// Human readable message
    pub message: String,
}

impl FailureMessage {
    /// Create a FAILURE message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Classification segment of the code (`ClientError`, `TransientError`, ...).
    pub fn classification(&self) -> &str {
        self.code.split('.').nth(1).unwrap_or("Unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_success_accessors() {
        let msg = SuccessMessage::run(&["name", "age"], Some(3));
        assert_eq!(msg.fields(), Some(vec!["name".to_string(), "age".to_string()]));
        assert_eq!(msg.qid(), Some(3));
        assert_eq!(msg.t_first(), Some(1));
        assert!(!msg.has_more());
    }

    #[test]
    fn test_empty_bookmark_is_absent() {
        let msg = SuccessMessage::new().with("bookmark", "");
        assert_eq!(msg.bookmark(), None);
        assert_eq!(SuccessMessage::stream_end(Some("db1:42")).bookmark(), Some("db1:42"));
    }

    #[test]
    fn test_stream_end_summary() {
        let mut stats = HashMap::new();
        stats.insert("nodes-created".to_string(), PackStreamValue::Integer(2));
        let msg = SuccessMessage::stream_end(None)
            .with("stats", stats)
            .with("db", "movies");
        assert_eq!(msg.query_type(), Some(QueryType::ReadOnly));
        assert_eq!(msg.stats().map(|s| s.nodes_created), Some(2));
        assert_eq!(msg.db(), Some("movies"));
        assert!(msg.notifications().is_empty());
    }

    #[test]
    fn test_failure_structure() {
        let failure = BoltResponse::Failure(FailureMessage::new(
            "Neo.ClientError.Statement.SyntaxError",
            "bad input",
        ));
        let parsed = BoltResponse::from_structure(&failure.to_structure()).unwrap();
        assert_eq!(parsed, failure);
        if let BoltResponse::Failure(f) = parsed {
            assert_eq!(f.classification(), "ClientError");
        }
    }

    #[test]
    fn test_record_requires_list() {
        let s = PackStreamStructure::new(tag::RECORD, vec![PackStreamValue::Integer(1)]);
        assert!(BoltResponse::from_structure(&s).is_err());
    }

    #[test]
    fn test_summary_kinds() {
        assert!(BoltResponse::Ignored.is_summary());
        assert!(!BoltResponse::Record(RecordMessage::default()).is_summary());
        assert_eq!(BoltResponse::Ignored.name(), "IGNORED");
    }
}
