//! Query and Result Summary
//!
//! 쿼리 정의와 결과 요약

use std::collections::HashMap;
use std::time::Duration;

use crate::bolt::{Notification, PackStreamValue, QueryStats, QueryType, RunMessage, SuccessMessage};

use crate::driver::handlers::RunSummary;

// ============================================================================
// Query - 쿼리 정의
// ============================================================================

/// 쿼리 정의
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// 쿼리 텍스트
    pub text: String,
    /// 파라미터
    pub parameters: HashMap<String, PackStreamValue>,
}

impl Query {
    /// 새 쿼리 생성
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: HashMap::new(),
        }
    }

    /// 파라미터 추가
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<PackStreamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// 파라미터들 추가
    pub fn with_params(mut self, params: HashMap<String, PackStreamValue>) -> Self {
        self.parameters.extend(params);
        self
    }
}

impl From<&str> for Query {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Query {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&RunMessage> for Query {
    fn from(run: &RunMessage) -> Self {
        Self {
            text: run.query.clone(),
            parameters: run.parameters.clone(),
        }
    }
}

// ============================================================================
// ResultSummary - 결과 요약
// ============================================================================

/// 결과 요약 (스트림이 끝난 뒤)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSummary {
    /// 쿼리
    pub query: Query,
    /// 쿼리 타입
    pub query_type: Option<QueryType>,
    /// 카운터
    pub stats: QueryStats,
    /// 결과 대기 시간 (`t_first`)
    pub result_available_after: Option<Duration>,
    /// 결과 소비 시간 (`t_last`)
    pub result_consumed_after: Option<Duration>,
    /// 데이터베이스
    pub database: Option<String>,
    /// 알림
    pub notifications: Vec<Notification>,
    /// 스트림이 끝날 때 받은 북마크 (자동 커밋)
    pub bookmark: Option<String>,
}

impl ResultSummary {
    /// RUN 응답과 마지막 SUCCESS로 요약 생성
    pub fn new(query: Query, run: Option<&RunSummary>, end: Option<&SuccessMessage>) -> Self {
        let millis = |v: Option<i64>| v.filter(|ms| *ms >= 0).map(|ms| Duration::from_millis(ms as u64));

        Self {
            query,
            query_type: end.and_then(SuccessMessage::query_type),
            stats: end.and_then(SuccessMessage::stats).unwrap_or_default(),
            result_available_after: millis(run.and_then(|r| r.t_first)),
            result_consumed_after: millis(end.and_then(SuccessMessage::t_last)),
            database: end
                .and_then(SuccessMessage::db)
                .map(str::to_string)
                .or_else(|| run.and_then(|r| r.db.clone())),
            notifications: end.map(SuccessMessage::notifications).unwrap_or_default(),
            bookmark: end.and_then(SuccessMessage::bookmark).map(str::to_string),
        }
    }

    /// 데이터 변경 여부
    pub fn contains_updates(&self) -> bool {
        self.stats.contains_updates()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_from_messages() {
        let run = RunSummary::from_success(&SuccessMessage::run(&["n"], None).with("db", "movies"));
        let mut stats = HashMap::new();
        stats.insert("nodes-created".to_string(), PackStreamValue::Integer(2));
        let end = SuccessMessage::stream_end(Some("db1:42")).with("stats", stats);

        let summary = ResultSummary::new(Query::new("CREATE (n), (m)"), Some(&run), Some(&end));
        assert_eq!(summary.query.text, "CREATE (n), (m)");
        assert_eq!(summary.stats.nodes_created, 2);
        assert!(summary.contains_updates());
        assert_eq!(summary.database.as_deref(), Some("movies"));
        assert_eq!(summary.bookmark.as_deref(), Some("db1:42"));
        assert_eq!(summary.result_available_after, Some(Duration::from_millis(1)));
        assert_eq!(summary.query_type, Some(QueryType::ReadOnly));
    }

    #[test]
    fn test_query_builder() {
        let query = Query::from("MATCH (n) WHERE n.age > $age RETURN n").with_param("age", 30i64);
        assert_eq!(query.parameters.get("age"), Some(&PackStreamValue::Integer(30)));
    }

    #[test]
    fn test_params_macro_converts_values() {
        let name = String::from("Alice");
        let query = Query::new("CREATE (n {name: $name, score: $score, active: $active})").with_params(crate::params! {
            "name" => name,
            "score" => 0.5,
            "active" => true,
        });
        assert_eq!(query.parameters.get("name").and_then(PackStreamValue::as_str), Some("Alice"));
        assert_eq!(query.parameters.get("score").and_then(PackStreamValue::as_float), Some(0.5));
        assert_eq!(query.parameters.get("active").and_then(PackStreamValue::as_bool), Some(true));
    }
}
