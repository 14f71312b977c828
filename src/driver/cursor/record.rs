//! Record - 쿼리 결과 레코드
//!
//! 쿼리 결과의 단일 레코드

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::bolt::PackStreamValue;

// ============================================================================
// Record - 단일 레코드
// ============================================================================

/// 쿼리 결과 레코드
///
/// 키는 같은 결과의 모든 레코드가 공유합니다. 값은 해석하지 않은
/// [`PackStreamValue`] 그대로입니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 컬럼 키
    keys: Arc<[String]>,
    /// 값들
    values: Vec<PackStreamValue>,
}

impl Record {
    /// 새 레코드 생성
    pub fn new(keys: Arc<[String]>, values: Vec<PackStreamValue>) -> Self {
        Self { keys, values }
    }

    /// 키 목록
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// 값 목록
    pub fn values(&self) -> &[PackStreamValue] {
        &self.values
    }

    /// 값 소유권 가져오기
    pub fn into_values(self) -> Vec<PackStreamValue> {
        self.values
    }

    /// 레코드 길이
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 빈 레코드 여부
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 키의 위치
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// 키로 값 가져오기
    pub fn get(&self, key: &str) -> Option<&PackStreamValue> {
        self.index_of(key).and_then(|i| self.values.get(i))
    }

    /// 인덱스로 값 가져오기
    pub fn get_by_index(&self, index: usize) -> Option<&PackStreamValue> {
        self.values.get(index)
    }

    /// Integer 값 가져오기
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(PackStreamValue::as_int)
    }

    /// String 값 가져오기
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PackStreamValue::as_str)
    }

    /// Boolean 값 가져오기
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(PackStreamValue::as_bool)
    }

    /// Float 값 가져오기
    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(PackStreamValue::as_float)
    }

    /// 키 존재 여부
    pub fn contains_key(&self, key: &str) -> bool {
        self.index_of(key).is_some()
    }

    /// Map으로 변환
    pub fn to_map(&self) -> HashMap<String, PackStreamValue> {
        self.keys
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .keys
            .iter()
            .zip(self.values.iter())
            .map(|(k, v)| format!("{}: {:?}", k, v))
            .collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a PackStreamValue);
    type IntoIter = std::iter::Zip<std::slice::Iter<'a, String>, std::slice::Iter<'a, PackStreamValue>>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter().zip(self.values.iter())
    }
}

// ============================================================================
// Tests
// ============================================================================
