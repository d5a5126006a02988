//! Editor document state
//!
//! Offsets throughout the crate are character offsets into the document, the
//! unit the editing widget reports caret positions in.

use ropey::Rope;

/// Mutable document held by the editor
#[derive(Debug, Clone, Default)]
pub struct EditorDocument {
    file_name: Option<String>,
    text: Rope,
    version: u64,
}

impl EditorDocument {
    pub fn new(file_name: Option<String>, text: &str) -> Self {
        Self {
            file_name,
            text: Rope::from_str(text),
            version: 0,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn set_file_name(&mut self, file_name: Option<String>) {
        self.file_name = file_name;
    }

    pub fn text(&self) -> &Rope {
        &self.text
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len_chars(&self) -> usize {
        self.text.len_chars()
    }

    /// Replaces the characters in `start..end` with `replacement`. Offsets
    /// past the end are clamped.
    pub fn replace(&mut self, start: usize, end: usize, replacement: &str) {
        let len = self.text.len_chars();
        let end = end.min(len);
        let start = start.min(end);
        self.text.remove(start..end);
        self.text.insert(start, replacement);
        self.version += 1;
    }

    pub fn insert(&mut self, offset: usize, text: &str) {
        self.replace(offset, offset, text);
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = Rope::from_str(text);
        self.version += 1;
    }

    /// Immutable view of the current text and version
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            file_name: self.file_name.clone(),
            text: self.text.clone(),
            version: self.version,
        }
    }
}

/// Verbatim, immutable copy of a document at one version.
///
/// Cloning a `Rope` is cheap (shared chunks), so snapshots can be taken per
/// keystroke.
#[derive(Debug, Clone, Default)]
pub struct DocumentSnapshot {
    pub file_name: Option<String>,
    pub text: Rope,
    pub version: u64,
}

impl DocumentSnapshot {
    pub fn new(file_name: Option<&str>, text: &str) -> Self {
        Self {
            file_name: file_name.map(str::to_string),
            text: Rope::from_str(text),
            version: 0,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn len_chars(&self) -> usize {
        self.text.len_chars()
    }

    /// Character at `offset`, if any
    pub fn char_at(&self, offset: usize) -> Option<char> {
        (offset < self.text.len_chars()).then(|| self.text.char(offset))
    }

    /// Text of `start..end` (char offsets, clamped)
    pub fn slice(&self, start: usize, end: usize) -> String {
        let len = self.text.len_chars();
        let end = end.min(len);
        let start = start.min(end);
        self.text.slice(start..end).to_string()
    }

    pub fn char_to_byte(&self, offset: usize) -> usize {
        self.text.char_to_byte(offset.min(self.text.len_chars()))
    }

    pub fn to_text(&self) -> String {
        self.text.to_string()
    }
}
