//! Keyset pagination shared by the list queries.
//!
//! Listings are ordered newest first by sqlite `rowid`. A cursor names the
//! `rowid` of the last row handed out; the next page starts strictly below it.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

pub const DEFAULT_PAGE_SIZE: i64 = 25;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("malformed cursor")]
    Malformed,
}

/// Decoded position in a keyset listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    row_seq: i64,
}

impl PageCursor {
    pub fn after(row_seq: i64) -> Self {
        Self { row_seq }
    }

    pub fn row_seq(&self) -> i64 {
        self.row_seq
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.row_seq.to_string())
    }

    pub fn decode(raw: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw.trim())
            .map_err(|_| CursorError::Malformed)?;
        let text = std::str::from_utf8(&bytes).map_err(|_| CursorError::Malformed)?;
        let row_seq: i64 = text.parse().map_err(|_| CursorError::Malformed)?;
        if row_seq <= 0 {
            return Err(CursorError::Malformed);
        }
        Ok(Self { row_seq })
    }
}

/// One page of a keyset listing
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl<T> Paginated<T> {
    /// Build a page from `(rowid, item)` pairs fetched with `LIMIT limit + 1`.
    pub(crate) fn from_rows(mut rows: Vec<(i64, T)>, limit: i64) -> Self {
        let limit = limit.max(1) as usize;
        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let next_cursor = if has_more {
            rows.last()
                .map(|(row_seq, _)| PageCursor::after(*row_seq).encode())
        } else {
            None
        };

        Self {
            items: rows.into_iter().map(|(_, item)| item).collect(),
            next_cursor,
            has_more,
        }
    }
}

/// Clamp a requested page size into `1..=MAX_PAGE_SIZE`.
pub fn clamp_page_size(limit: i64) -> i64 {
    limit.clamp(1, MAX_PAGE_SIZE)
}

/// `LIKE` pattern for a free-text search, `None` when the search is blank.
pub(crate) fn search_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_decode_rejects_garbage() {
        assert_eq!(PageCursor::decode("%%%"), Err(CursorError::Malformed));
        assert_eq!(
            PageCursor::decode(&URL_SAFE_NO_PAD.encode("abc")),
            Err(CursorError::Malformed)
        );
        assert_eq!(
            PageCursor::decode(&URL_SAFE_NO_PAD.encode("-4")),
            Err(CursorError::Malformed)
        );
    }

    #[test]
    fn test_cursor_is_opaque_but_stable() {
        let cursor = PageCursor::after(42);
        let encoded = cursor.encode();
        assert!(!encoded.contains("42"));
        assert_eq!(PageCursor::decode(&encoded), Ok(cursor));
    }

    #[test]
    fn test_from_rows_detects_extra_row() {
        let page = Paginated::from_rows(vec![(9, "a"), (8, "b"), (7, "c")], 2);
        assert_eq!(page.items, vec!["a", "b"]);
        assert!(page.has_more);
        assert_eq!(page.next_cursor, Some(PageCursor::after(8).encode()));

        let last = Paginated::from_rows(vec![(2, "y"), (1, "z")], 2);
        assert!(!last.has_more);
        assert_eq!(last.next_cursor, None);
    }

    #[test]
    fn test_search_pattern_ignores_blank() {
        assert_eq!(search_pattern(Some("   ")), None);
        assert_eq!(search_pattern(Some("koi")), Some("%koi%".to_string()));
        assert_eq!(search_pattern(None), None);
    }
}
