//! Structured error kinds surfaced across the catalog subsystems.
//!
//! Every public operation in this crate returns `Result<T, CatalogError>`.
//! Callers are expected to match on the variant rather than the message —
//! the message is for humans, the variant is for control flow.

use thiserror::Error;

use crate::reference::EntityRef;

/// The error type returned by every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Invalid reference, name, label, tag, or query syntax.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// A query referenced an attribute with no built-in accessor and no
    /// registered provider resolved it.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    /// An entity with this reference already exists.
    #[error("duplicate entity: {0}")]
    Duplicate(EntityRef),

    /// A referenced entity does not exist.
    #[error("missing entity referenced from {from}: {target} ({field})")]
    Missing {
        from: EntityRef,
        field: &'static str,
        target: EntityRef,
    },

    /// A reference resolved to an entity of the wrong kind.
    #[error("kind mismatch for {from} field {field}: expected {expected}, found {found}")]
    KindMismatch {
        from: EntityRef,
        field: &'static str,
        expected: &'static str,
        found: EntityRef,
    },

    /// Delete was blocked because the entity still has inverse relations.
    #[error("cannot delete {0}: still referenced by {1:?}")]
    IngoingRefs(EntityRef, Vec<EntityRef>),

    /// A plugin failed, or returned malformed output.
    #[error("plugin {plugin} failed for {entity}: {message}")]
    PluginFailure {
        plugin: String,
        entity: EntityRef,
        message: String,
    },

    /// The external layout tool exited non-zero or produced malformed SVG.
    #[error("subprocess failure: {0}")]
    Subprocess(String),

    /// A cooperative cancellation was observed.
    #[error("operation cancelled")]
    Cancelled,

    /// A deadline elapsed before the operation completed.
    #[error("operation timed out")]
    Timeout,

    /// Underlying filesystem or subprocess pipe failure.
    #[error("io error: {0}")]
    Io(String),
}

impl CatalogError {
    pub fn syntax(msg: impl Into<String>) -> Self {
        CatalogError::Syntax(msg.into())
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(e: std::io::Error) -> Self {
        CatalogError::Io(e.to_string())
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
