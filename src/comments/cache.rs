//! The write-through caching layer (§4.6) over any `CommentStore`.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::trace;

use crate::error::CatalogError;
use crate::reference::EntityRef;

use super::record::CommentRecord;
use super::store::CommentStore;

pub struct CachingCommentStore<S: CommentStore> {
    inner: S,
    cache: RwLock<HashMap<EntityRef, Vec<CommentRecord>>>,
}

impl<S: CommentStore> CachingCommentStore<S> {
    pub fn new(inner: S) -> Self {
        CachingCommentStore {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn get_comments(&self, entity: &EntityRef) -> Result<Vec<CommentRecord>, CatalogError> {
        if let Some(hit) = self.cache.read().get(entity) {
            trace!(entity = %entity, "comment cache hit");
            return Ok(hit.clone());
        }
        trace!(entity = %entity, "comment cache miss");
        let fetched = self.inner.get_comments(entity)?;
        self.cache.write().insert(entity.clone(), fetched.clone());
        Ok(fetched)
    }

    pub fn get_open_comments(&self, entity: &EntityRef) -> Result<Vec<CommentRecord>, CatalogError> {
        Ok(self.get_comments(entity)?.into_iter().filter(|c| !c.resolved).collect())
    }

    pub fn add_comment(&self, entity: &EntityRef, comment: CommentRecord) -> Result<(), CatalogError> {
        self.inner.add_comment(entity, comment.clone())?;
        self.cache.write().entry(entity.clone()).or_default().push(comment);
        Ok(())
    }

    pub fn resolve_comment(&self, entity: &EntityRef, comment_id: &str) -> Result<(), CatalogError> {
        self.inner.resolve_comment(entity, comment_id)?;
        if let Some(list) = self.cache.write().get_mut(entity) {
            if let Some(c) = list.iter_mut().find(|c| c.id == comment_id) {
                c.resolved = true;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comments::memory_store::MemoryCommentStore;
    use crate::reference::EntityKind;
    use chrono::Utc;

    fn target() -> EntityRef {
        EntityRef::new(EntityKind::Component, "default", "cache-loader")
    }

    #[test]
    fn caches_after_first_read() {
        let cache = CachingCommentStore::new(MemoryCommentStore::new());
        assert!(cache.get_comments(&target()).unwrap().is_empty());
        assert!(cache.cache.read().contains_key(&target()));
    }

    #[test]
    fn add_comment_writes_through_and_updates_cache() {
        let cache = CachingCommentStore::new(MemoryCommentStore::new());
        cache.get_comments(&target()).unwrap();
        let comment = CommentRecord::new("c1", "alice", "hi", Utc::now()).unwrap();
        cache.add_comment(&target(), comment).unwrap();
        assert_eq!(cache.cache.read().get(&target()).unwrap().len(), 1);
        assert_eq!(cache.inner.get_comments(&target()).unwrap().len(), 1);
    }

    #[test]
    fn add_comment_creates_cache_entry_when_absent() {
        let cache = CachingCommentStore::new(MemoryCommentStore::new());
        let comment = CommentRecord::new("c1", "alice", "hi", Utc::now()).unwrap();
        cache.add_comment(&target(), comment).unwrap();
        assert_eq!(cache.cache.read().get(&target()).unwrap().len(), 1);
    }

    #[test]
    fn resolve_comment_flips_cached_flag_when_present() {
        let cache = CachingCommentStore::new(MemoryCommentStore::new());
        let comment = CommentRecord::new("c1", "alice", "hi", Utc::now()).unwrap();
        cache.add_comment(&target(), comment).unwrap();
        cache.resolve_comment(&target(), "c1").unwrap();
        assert!(cache.cache.read().get(&target()).unwrap()[0].resolved);
    }

    #[test]
    fn get_open_comments_filters_resolved() {
        let cache = CachingCommentStore::new(MemoryCommentStore::new());
        cache.add_comment(&target(), CommentRecord::new("c1", "alice", "hi", Utc::now()).unwrap()).unwrap();
        cache.add_comment(&target(), CommentRecord::new("c2", "bob", "also hi", Utc::now()).unwrap()).unwrap();
        cache.resolve_comment(&target(), "c1").unwrap();
        let open = cache.get_open_comments(&target()).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, "c2");
    }
}
