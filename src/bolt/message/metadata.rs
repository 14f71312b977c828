//! Summary metadata carried by SUCCESS messages.

use std::collections::HashMap;

use crate::bolt::packstream::PackStreamValue;

/// Update counters reported at the end of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Nodes created
    pub nodes_created: i64,
    /// Nodes deleted
    pub nodes_deleted: i64,
    /// Relationships created
    pub relationships_created: i64,
    /// Relationships deleted
    pub relationships_deleted: i64,
    /// Properties set
    pub properties_set: i64,
    /// Labels added
    pub labels_added: i64,
    /// Labels removed
    pub labels_removed: i64,
    /// Indexes added
    pub indexes_added: i64,
    /// Indexes removed
    pub indexes_removed: i64,
    /// Constraints added
    pub constraints_added: i64,
    /// Constraints removed
    pub constraints_removed: i64,
    /// Updates to the system database
    pub system_updates: i64,
    /// Server-side flag; also implied by any non-zero data counter
    pub contains_updates: bool,
}

impl QueryStats {
    /// Read counters from the `stats` map. Missing keys count as zero.
    pub fn from_map(map: &HashMap<String, PackStreamValue>) -> Self {
        let count = |key: &str| map.get(key).and_then(PackStreamValue::as_int).unwrap_or(0);

        let mut stats = Self {
            nodes_created: count("nodes-created"),
            nodes_deleted: count("nodes-deleted"),
            relationships_created: count("relationships-created"),
            relationships_deleted: count("relationships-deleted"),
            properties_set: count("properties-set"),
            labels_added: count("labels-added"),
            labels_removed: count("labels-removed"),
            indexes_added: count("indexes-added"),
            indexes_removed: count("indexes-removed"),
            constraints_added: count("constraints-added"),
            constraints_removed: count("constraints-removed"),
            system_updates: count("system-updates"),
            contains_updates: map
                .get("contains-updates")
                .and_then(PackStreamValue::as_bool)
                .unwrap_or(false),
        };
        stats.contains_updates |= stats.data_counters().iter().any(|c| *c > 0);
        stats
    }

    fn data_counters(&self) -> [i64; 11] {
        [
            self.nodes_created,
            self.nodes_deleted,
            self.relationships_created,
            self.relationships_deleted,
            self.properties_set,
            self.labels_added,
            self.labels_removed,
            self.indexes_added,
            self.indexes_removed,
            self.constraints_added,
            self.constraints_removed,
        ]
    }

    /// Whether the query changed data.
    pub fn contains_updates(&self) -> bool {
        self.contains_updates
    }

    /// Whether the query changed the system database.
    pub fn contains_system_updates(&self) -> bool {
        self.system_updates > 0
    }
}

/// Kind of statement as reported in the `type` metadata entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    /// `r`
    ReadOnly,
    /// `rw`
    ReadWrite,
    /// `w`
    WriteOnly,
    /// `s`: schema changes only
    SchemaWrite,
}

impl QueryType {
    /// Parse the wire code (`r`, `rw`, `w`, `s`).
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "r" => Some(QueryType::ReadOnly),
            "rw" => Some(QueryType::ReadWrite),
            "w" => Some(QueryType::WriteOnly),
            "s" => Some(QueryType::SchemaWrite),
            _ => None,
        }
    }
}

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationSeverity {
    /// `WARNING`
    Warning,
    /// `INFORMATION`
    #[default]
    Information,
    /// Anything else the server sends
    Unknown,
}

impl NotificationSeverity {
    fn parse(s: &str) -> Self {
        match s {
            "WARNING" => NotificationSeverity::Warning,
            "INFORMATION" => NotificationSeverity::Information,
            _ => NotificationSeverity::Unknown,
        }
    }
}

/// Server notification attached to a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Status code, e.g. `Neo.ClientNotification.Statement.CartesianProduct`
    pub code: String,
    /// Short summary
    pub title: String,
    /// Full explanation
    pub description: String,
    /// Severity level
    pub severity: NotificationSeverity,
    /// `(offset, line, column)` of the offending input, when given
    pub position: Option<(i64, i64, i64)>,
}

impl Notification {
    /// Parse one entry of the `notifications` list.
    pub fn from_map(map: &HashMap<String, PackStreamValue>) -> Option<Self> {
        let text = |key: &str| map.get(key).and_then(|v| v.as_str()).map(str::to_string);

        let position = map.get("position").and_then(|v| v.as_map()).and_then(|p| {
            let field = |key: &str| p.get(key).and_then(PackStreamValue::as_int);
            Some((field("offset")?, field("line")?, field("column")?))
        });

        Some(Self {
            code: text("code")?,
            title: text("title").unwrap_or_default(),
            description: text("description").unwrap_or_default(),
            severity: text("severity")
                .map(|s| NotificationSeverity::parse(&s))
                .unwrap_or_default(),
            position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, PackStreamValue)]) -> HashMap<String, PackStreamValue> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_stats_missing_keys_are_zero() {
        let stats = QueryStats::from_map(&HashMap::new());
        assert_eq!(stats, QueryStats::default());
        assert!(!stats.contains_updates());
    }

    #[test]
    fn test_stats_counters_imply_updates() {
        let stats = QueryStats::from_map(&map(&[
            ("nodes-created", 3.into()),
            ("properties-set", 6.into()),
        ]));
        assert_eq!(stats.nodes_created, 3);
        assert_eq!(stats.properties_set, 6);
        assert!(stats.contains_updates());
        assert!(!stats.contains_system_updates());
    }

    #[test]
    fn test_query_type_codes() {
        assert_eq!(QueryType::from_code("rw"), Some(QueryType::ReadWrite));
        assert_eq!(QueryType::from_code("s"), Some(QueryType::SchemaWrite));
        assert_eq!(QueryType::from_code("x"), None);
    }

    #[test]
    fn test_notification_parse() {
        let position = map(&[("offset", 0.into()), ("line", 1.into()), ("column", 8.into())]);
        let n = Notification::from_map(&map(&[
            ("code", "Neo.ClientNotification.Statement.CartesianProduct".into()),
            ("title", "Cartesian product".into()),
            ("severity", "WARNING".into()),
            ("position", PackStreamValue::Map(position)),
        ]))
        .unwrap();
        assert_eq!(n.severity, NotificationSeverity::Warning);
        assert_eq!(n.position, Some((0, 1, 8)));
        assert!(n.description.is_empty());
    }

    #[test]
    fn test_notification_requires_code() {
        assert!(Notification::from_map(&map(&[("title", "t".into())])).is_none());
    }
}
