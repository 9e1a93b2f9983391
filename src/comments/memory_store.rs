//! An in-memory `CommentStore`, illustrative backend for the caching
//! layer's tests and doc examples (not the storage subsystem itself).

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::CatalogError;
use crate::reference::EntityRef;

use super::record::CommentRecord;
use super::store::CommentStore;

#[derive(Default)]
pub struct MemoryCommentStore {
    comments: Mutex<HashMap<EntityRef, Vec<CommentRecord>>>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommentStore for MemoryCommentStore {
    fn get_comments(&self, entity: &EntityRef) -> Result<Vec<CommentRecord>, CatalogError> {
        Ok(self.comments.lock().get(entity).cloned().unwrap_or_default())
    }

    fn add_comment(&self, entity: &EntityRef, comment: CommentRecord) -> Result<(), CatalogError> {
        self.comments.lock().entry(entity.clone()).or_default().push(comment);
        Ok(())
    }

    fn resolve_comment(&self, entity: &EntityRef, comment_id: &str) -> Result<(), CatalogError> {
        let mut guard = self.comments.lock();
        let Some(list) = guard.get_mut(entity) else {
            return Ok(());
        };
        if let Some(c) = list.iter_mut().find(|c| c.id == comment_id) {
            c.resolved = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::EntityKind;
    use chrono::Utc;

    fn target() -> EntityRef {
        EntityRef::new(EntityKind::Component, "default", "cache-loader")
    }

    #[test]
    fn round_trips_comments() {
        let store = MemoryCommentStore::new();
        let comment = CommentRecord::new("c1", "alice", "hello", Utc::now()).unwrap();
        store.add_comment(&target(), comment).unwrap();
        assert_eq!(store.get_comments(&target()).unwrap().len(), 1);
    }

    #[test]
    fn resolve_flips_flag() {
        let store = MemoryCommentStore::new();
        let comment = CommentRecord::new("c1", "alice", "hello", Utc::now()).unwrap();
        store.add_comment(&target(), comment).unwrap();
        store.resolve_comment(&target(), "c1").unwrap();
        assert!(store.get_comments(&target()).unwrap()[0].resolved);
    }
}
