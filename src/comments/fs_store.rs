//! A file-per-entity `CommentStore` (§6): one JSON file per entity, named
//! by replacing `:` and `/` with `_` in the canonical ref.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CatalogError;
use crate::reference::EntityRef;

use super::record::CommentRecord;
use super::store::CommentStore;

pub struct FsCommentStore {
    root: PathBuf,
}

impl FsCommentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsCommentStore { root: root.into() }
    }

    fn path_for(&self, entity: &EntityRef) -> PathBuf {
        let name = entity.canonical().replace([':', '/'], "_");
        self.root.join(format!("{name}.json"))
    }

    fn read(&self, path: &Path) -> Result<Vec<CommentRecord>, CatalogError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| CatalogError::Io(format!("malformed comment file {}: {e}", path.display())))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, path: &Path, records: &[CommentRecord]) -> Result<(), CatalogError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(records).map_err(|e| CatalogError::Io(e.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl CommentStore for FsCommentStore {
    fn get_comments(&self, entity: &EntityRef) -> Result<Vec<CommentRecord>, CatalogError> {
        self.read(&self.path_for(entity))
    }

    fn add_comment(&self, entity: &EntityRef, comment: CommentRecord) -> Result<(), CatalogError> {
        let path = self.path_for(entity);
        let mut records = self.read(&path)?;
        records.push(comment);
        self.write(&path, &records)
    }

    fn resolve_comment(&self, entity: &EntityRef, comment_id: &str) -> Result<(), CatalogError> {
        let path = self.path_for(entity);
        let mut records = self.read(&path)?;
        if let Some(c) = records.iter_mut().find(|c| c.id == comment_id) {
            c.resolved = true;
        }
        self.write(&path, &records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::EntityKind;
    use chrono::Utc;

    fn target() -> EntityRef {
        EntityRef::new(EntityKind::Resource, "default", "orders-db")
    }

    #[test]
    fn names_the_file_from_the_canonical_ref() {
        let store = FsCommentStore::new("/tmp/irrelevant");
        let path = store.path_for(&target());
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "resource_orders-db.json");
    }

    #[test]
    fn round_trips_through_a_temp_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FsCommentStore::new(dir.path());
        let comment = CommentRecord::new("c1", "bob", "looks fine", Utc::now()).unwrap();
        store.add_comment(&target(), comment).unwrap();
        let got = store.get_comments(&target()).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].author, "bob");
    }
}
