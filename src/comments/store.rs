//! The `CommentStore` trait (§4.6): the interface the caching layer wraps.

use crate::error::CatalogError;
use crate::reference::EntityRef;

use super::record::CommentRecord;

pub trait CommentStore: Send + Sync {
    fn get_comments(&self, entity: &EntityRef) -> Result<Vec<CommentRecord>, CatalogError>;
    fn get_open_comments(&self, entity: &EntityRef) -> Result<Vec<CommentRecord>, CatalogError> {
        Ok(self.get_comments(entity)?.into_iter().filter(|c| !c.resolved).collect())
    }
    fn add_comment(&self, entity: &EntityRef, comment: CommentRecord) -> Result<(), CatalogError>;
    fn resolve_comment(&self, entity: &EntityRef, comment_id: &str) -> Result<(), CatalogError>;
}
