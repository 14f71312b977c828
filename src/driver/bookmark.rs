//! Bookmark
//!
//! 인과적 일관성(causal consistency) 북마크

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use super::error::{DriverError, DriverResult};

// ============================================================================
// Bookmark - 북마크 트레이트
// ============================================================================

/// 세션 계층에 노출되는 북마크
///
/// 엔진은 [`BookmarkSet`]만 받아들이며, 다른 구현은 병합 시 거부됩니다.
pub trait Bookmark: fmt::Debug + Send + Sync {
    /// 빈 북마크 여부
    fn is_empty(&self) -> bool;

    /// 다운캐스트용
    fn as_any(&self) -> &dyn Any;
}

// ============================================================================
// BookmarkSet - 불변 토큰 집합
// ============================================================================

/// 불변 북마크 토큰 집합
///
/// 복제는 내부 `Arc`만 공유합니다. 동일한 토큰을 가진 두 집합은 삽입 순서와
/// 무관하게 같고 같은 해시를 가집니다.
#[derive(Clone)]
pub struct BookmarkSet {
    tokens: Arc<HashSet<String>>,
}

fn empty_tokens() -> &'static Arc<HashSet<String>> {
    static EMPTY: OnceLock<Arc<HashSet<String>>> = OnceLock::new();
    EMPTY.get_or_init(|| Arc::new(HashSet::new()))
}

impl BookmarkSet {
    /// 정규 빈 집합
    pub fn empty() -> Self {
        Self {
            tokens: Arc::clone(empty_tokens()),
        }
    }

    fn from_tokens(tokens: HashSet<String>) -> Self {
        if tokens.is_empty() {
            Self::empty()
        } else {
            Self {
                tokens: Arc::new(tokens),
            }
        }
    }

    /// 정규 빈 집합과 같은 인스턴스인지 여부 (포인터 비교)
    pub fn is_canonical_empty(&self) -> bool {
        Arc::ptr_eq(&self.tokens, empty_tokens())
    }

    /// 같은 할당을 공유하는지 여부
    pub fn ptr_eq(&self, other: &BookmarkSet) -> bool {
        Arc::ptr_eq(&self.tokens, &other.tokens)
    }

    /// 여러 북마크 병합
    ///
    /// - `None` 컬렉션, 빈 컬렉션 → 빈 집합
    /// - 원소 하나 → 그 집합을 그대로 반환 (`None` 원소면 빈 집합)
    /// - `None` 원소는 건너뜀
    /// - [`BookmarkSet`]이 아닌 원소 → `InvalidArgument`, 아무것도 병합하지 않음
    pub fn merge<'a, I>(bookmarks: Option<I>) -> DriverResult<BookmarkSet>
    where
        I: IntoIterator<Item = Option<&'a dyn Bookmark>>,
    {
        let items: Vec<Option<&'a dyn Bookmark>> = match bookmarks {
            Some(items) => items.into_iter().collect(),
            None => return Ok(Self::empty()),
        };

        match items.as_slice() {
            [] | [None] => return Ok(Self::empty()),
            [Some(single)] => return Self::downcast(*single).cloned(),
            _ => {}
        }

        let mut tokens = HashSet::new();
        for bookmark in items.into_iter().flatten() {
            let set = Self::downcast(bookmark)?;
            tokens.extend(set.tokens.iter().cloned());
        }
        Ok(Self::from_tokens(tokens))
    }

    fn downcast(bookmark: &dyn Bookmark) -> DriverResult<&BookmarkSet> {
        bookmark.as_any().downcast_ref::<BookmarkSet>().ok_or_else(|| {
            DriverError::invalid_argument(format!(
                "Received bookmark '{:?}' is not generated by driver sessions.",
                bookmark
            ))
        })
    }

    /// 두 집합의 합집합 (한쪽이 비어 있으면 다른 쪽을 그대로 반환)
    pub fn union(&self, other: &BookmarkSet) -> BookmarkSet {
        if other.tokens.is_empty() || self.ptr_eq(other) {
            return self.clone();
        }
        if self.tokens.is_empty() {
            return other.clone();
        }
        let mut tokens = (*self.tokens).clone();
        tokens.extend(other.tokens.iter().cloned());
        Self::from_tokens(tokens)
    }

    /// 서버가 준 토큰 하나로 생성
    pub fn parse(value: &str) -> BookmarkSet {
        Self::parse_all([value])
    }

    /// 토큰 목록으로 생성 (신뢰된 입력이므로 검증하지 않음)
    pub fn parse_all<I, S>(values: I) -> BookmarkSet
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_tokens(values.into_iter().map(Into::into).collect())
    }

    /// 빈 집합 여부
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// 토큰 수
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// 토큰 포함 여부
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    /// 토큰 반복자 (순서 없음)
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// BEGIN/RUN 메타데이터용 토큰 목록
    pub fn to_vec(&self) -> Vec<String> {
        self.tokens.iter().cloned().collect()
    }

    fn sorted(&self) -> Vec<&str> {
        let mut values: Vec<&str> = self.values().collect();
        values.sort_unstable();
        values
    }
}

impl Default for BookmarkSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl Bookmark for BookmarkSet {
    fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl PartialEq for BookmarkSet {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.tokens == other.tokens
    }
}

impl Eq for BookmarkSet {}

impl Hash for BookmarkSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sorted().hash(state);
    }
}

impl fmt::Debug for BookmarkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bookmark{{values={:?}}}", self.sorted())
    }
}

impl fmt::Display for BookmarkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sorted().join(","))
    }
}

// ============================================================================
// BookmarkHolder - 세션 북마크 슬롯
// ============================================================================

/// 세션 범위 북마크 슬롯
///
/// 결과 스트림이나 커밋이 끝날 때 서버가 돌려준 토큰으로 갱신됩니다.
/// 비어 있지 않은 토큰은 기존 값을 대체하고, 없거나 빈 토큰은 값을 유지합니다.
#[derive(Debug, Clone, Default)]
pub struct BookmarkHolder {
    current: Arc<RwLock<BookmarkSet>>,
}

impl BookmarkHolder {
    /// 빈 슬롯 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 초기값으로 생성
    pub fn with_bookmark(bookmark: BookmarkSet) -> Self {
        Self {
            current: Arc::new(RwLock::new(bookmark)),
        }
    }

    /// 현재 북마크
    pub fn get(&self) -> BookmarkSet {
        self.current.read().clone()
    }

    /// 북마크 설정 (빈 값은 무시)
    pub fn set(&self, bookmark: BookmarkSet) {
        if bookmark.is_empty() {
            return;
        }
        debug!(bookmark = %bookmark, "bookmark replaced");
        *self.current.write() = bookmark;
    }

    /// 서버 토큰으로 갱신
    pub fn set_from_server(&self, token: Option<&str>) {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.set(BookmarkSet::parse(token));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
