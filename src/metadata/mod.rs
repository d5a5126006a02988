//! Assembly metadata: CLI image reading, documentation files, the loader
//! seam, reference probing and the append-only metadata cache

pub mod cache;
mod cil;
pub mod documentation;
pub mod loader;
pub mod lookup;

use std::path::PathBuf;

use thiserror::Error;

pub use cache::{AssemblyMetadataCache, AssemblySource};
pub use documentation::{DocEntry, DocumentationError, XmlDocumentationProvider};
pub use loader::{CilMetadataLoader, MetadataLoader};
pub use lookup::{DirectoryGac, GlobalAssemblyCache, NoGac, LookupStrategy, ReferenceResolver};

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Reference could not be found: {reference}")]
    ReferenceNotFound { reference: String },

    #[error("Failed to read assembly {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load assembly {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },
}
