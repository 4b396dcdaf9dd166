//! Media library indexer subsystem (components I–M of SPEC_FULL.md).
//!
//! [`source::LibrarySource`] is the public entry point: one instance per
//! monitored set of directories, driving the Loading→Indexing→Scanning→
//! Indexing→Saving state machine and exposing the tree-builder and
//! listener APIs a UI would bind to.

pub mod entry;
pub mod index;
pub mod persistence;
pub mod playlist;
pub mod scanfilter;
pub mod source;
pub mod tree;

/// Errors from the library subsystem (§7).
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("folder index {0} out of range")]
    FolderIndexOutOfRange(usize),
    #[error("listener table full")]
    ListenerTableFull,
    #[error("persistence error: {0}")]
    Persistence(#[from] persistence::PersistenceError),
}
