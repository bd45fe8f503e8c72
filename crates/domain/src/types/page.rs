//! Paginated list envelope

use serde::{Deserialize, Serialize};

/// The single list contract accepted from the backend.
///
/// Every field is required; a response in any other shape is a decode error
/// rather than something to be guessed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Offset to request for the following page, if there is one.
    pub fn next_offset(&self) -> Option<u64> {
        self.has_more.then(|| self.offset + self.items.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_fixed_contract() {
        let page: Page<u32> = serde_json::from_str(
            r#"{"items":[1,2],"total":5,"limit":2,"offset":0,"has_more":true}"#,
        )
        .unwrap();
        assert_eq!(page.items, vec![1, 2]);
        assert_eq!(page.next_offset(), Some(2));
    }

    /// Validates that alternative list shapes are rejected.
    ///
    /// Assertions:
    /// - A bare array and a `{data: [...]}` wrapper both fail to decode.
    #[test]
    fn rejects_alternative_shapes() {
        assert!(serde_json::from_str::<Page<u32>>("[1,2,3]").is_err());
        assert!(serde_json::from_str::<Page<u32>>(r#"{"data":[1,2,3]}"#).is_err());
    }
}
