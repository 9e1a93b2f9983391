//! The Comment Cache (§4.6): a write-through cache layered over any
//! persistent [`CommentStore`].

mod cache;
mod fs_store;
mod memory_store;
mod record;
mod store;

pub use cache::CachingCommentStore;
pub use fs_store::FsCommentStore;
pub use memory_store::MemoryCommentStore;
pub use record::{CommentRecord, MAX_AUTHOR_LEN, MAX_TEXT_LEN};
pub use store::CommentStore;
