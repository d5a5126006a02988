//! In-memory source files merged into the shared project snapshot
//!
//! Only text that declares a type (contains `class `, `enum ` or `struct `) is
//! reparsed; anything else leaves the previous tree for that path
//! authoritative. Files are keyed purely by path, so feeding two different
//! snippets under the same path makes the second replace the first.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::parsers::SourceParser;
use crate::project::snapshot::{SharedProject, UnresolvedFile};

const DECLARATION_KEYWORDS: [&str; 3] = ["class ", "enum ", "struct "];

/// Returns true if `text` contains a type declaration keyword
pub fn declares_type(text: &str) -> bool {
    DECLARATION_KEYWORDS.iter().any(|k| text.contains(k))
}

/// Parsed source files, published through the shared project snapshot
pub struct SourceModel {
    project: Arc<SharedProject>,
    parser: Arc<dyn SourceParser>,
}

impl SourceModel {
    pub fn new(project: Arc<SharedProject>, parser: Arc<dyn SourceParser>) -> Self {
        Self { project, parser }
    }

    /// Parses `text` into the snapshot under `path` if it declares a type.
    ///
    /// Returns `true` if the snapshot entry for `path` was replaced.
    pub fn process_input(&self, text: &str, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        if !declares_type(text) {
            trace!("No type declaration in input for {}, keeping previous tree", path);
            return false;
        }

        let Some(tree) = self.parser.parse(text, path) else {
            debug!("Parser produced no tree for {}, keeping previous tree", path);
            return false;
        };
        let file = Arc::new(UnresolvedFile::from_tree(Arc::new(tree)));
        debug!("Registering {} with {} type(s)", path, file.types.len());
        self.project.update(|project| project.add_or_update_file(file.clone()));
        true
    }
}
