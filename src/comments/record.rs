//! The comment record shape (§4.6): `{id, author, text, createdAt, resolved}`
//! with bounded author/text lengths.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

pub const MAX_AUTHOR_LEN: usize = 128;
pub const MAX_TEXT_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
}

impl CommentRecord {
    pub fn new(id: impl Into<String>, author: impl Into<String>, text: impl Into<String>, created_at: DateTime<Utc>) -> Result<Self, CatalogError> {
        let author = author.into();
        let text = text.into();
        if author.is_empty() || author.len() > MAX_AUTHOR_LEN {
            return Err(CatalogError::syntax(format!("comment author length must be 1..={MAX_AUTHOR_LEN}")));
        }
        if text.is_empty() || text.len() > MAX_TEXT_LEN {
            return Err(CatalogError::syntax(format!("comment text length must be 1..={MAX_TEXT_LEN}")));
        }
        Ok(CommentRecord {
            id: id.into(),
            author,
            text,
            created_at,
            resolved: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_text() {
        let text = "x".repeat(MAX_TEXT_LEN + 1);
        let err = CommentRecord::new("c1", "alice", text, Utc::now()).unwrap_err();
        assert!(matches!(err, CatalogError::Syntax(_)));
    }

    #[test]
    fn rejects_empty_author() {
        let err = CommentRecord::new("c1", "", "hello", Utc::now()).unwrap_err();
        assert!(matches!(err, CatalogError::Syntax(_)));
    }

    #[test]
    fn accepts_well_formed_record() {
        let record = CommentRecord::new("c1", "alice", "looks good", Utc::now()).unwrap();
        assert!(!record.resolved);
    }
}
