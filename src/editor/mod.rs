//! Editor integration: the controller driving completion from keystrokes,
//! the host seam for popups and bracket matching

pub mod brackets;
pub mod controller;
pub mod host;

use std::path::PathBuf;

use thiserror::Error;

pub use brackets::{BracketSearchResult, search_bracket};
pub use controller::{EditorController, is_csharp_file};
pub use host::{CompletionPopup, EditorHost, NullHost};

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
