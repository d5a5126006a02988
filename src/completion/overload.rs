//! Overload insight for method and constructor calls
//!
//! An [`OverloadProvider`] is created when the caret enters an argument
//! list. It knows the candidate signatures and, after every keystroke,
//! recomputes which argument the caret is in. Leaving the argument list
//! (moving before the opening parenthesis or typing the closing one) asks the
//! host to close the tooltip.

use serde::Serialize;

use crate::document::DocumentSnapshot;
use crate::project::MemberDef;

/// One candidate signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverloadSignature {
    /// Full signature, e.g. `string Substring(int startIndex, int length)`
    pub label: String,
    /// Rendered parameters, e.g. `int startIndex`
    pub parameters: Vec<String>,
    pub documentation: Option<String>,
}

impl From<&MemberDef> for OverloadSignature {
    fn from(member: &MemberDef) -> Self {
        Self {
            label: member.signature(),
            parameters: member.parameters.iter().map(ToString::to_string).collect(),
            documentation: member.documentation.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverloadProvider {
    /// Character offset just after the opening parenthesis
    start_offset: usize,
    signatures: Vec<OverloadSignature>,
    selected: usize,
    parameter_index: usize,
    request_close: bool,
}

impl OverloadProvider {
    /// Returns `None` when there is nothing to show
    pub fn new(start_offset: usize, signatures: Vec<OverloadSignature>) -> Option<Self> {
        if signatures.is_empty() {
            return None;
        }
        Some(Self {
            start_offset,
            signatures,
            selected: 0,
            parameter_index: 0,
            request_close: false,
        })
    }

    pub fn start_offset(&self) -> usize {
        self.start_offset
    }

    pub fn signatures(&self) -> &[OverloadSignature] {
        &self.signatures
    }

    pub fn count(&self) -> usize {
        self.signatures.len()
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn current(&self) -> &OverloadSignature {
        &self.signatures[self.selected]
    }

    /// Zero-based index of the argument the caret is in
    pub fn parameter_index(&self) -> usize {
        self.parameter_index
    }

    /// Parameter of the selected overload the caret is in, if it has that many
    pub fn current_parameter(&self) -> Option<&str> {
        self.current().parameters.get(self.parameter_index).map(String::as_str)
    }

    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1) % self.signatures.len();
    }

    pub fn select_previous(&mut self) {
        self.selected = (self.selected + self.signatures.len() - 1) % self.signatures.len();
    }

    pub fn request_close(&self) -> bool {
        self.request_close
    }

    pub fn close(&mut self) {
        self.request_close = true;
    }

    /// Recomputes the active argument for the caret at `offset`.
    pub fn update(&mut self, document: &DocumentSnapshot, offset: usize) {
        if offset < self.start_offset || offset > document.len_chars() {
            self.close();
            return;
        }
        let arguments = document.slice(self.start_offset, offset);
        match argument_index(&arguments) {
            Some(index) => self.parameter_index = index,
            None => self.close(),
        }
    }
}

/// Counts top-level commas in `arguments` (the text between the opening
/// parenthesis and the caret). Returns `None` once the call's closing
/// parenthesis has been passed.
fn argument_index(arguments: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut commas = 0usize;
    let mut chars = arguments.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                // Skip the literal; an unterminated one runs to the caret
                while let Some(inner) = chars.next() {
                    if inner == '\\' {
                        chars.next();
                    } else if inner == c {
                        break;
                    }
                }
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                if depth == 0 {
                    return None;
                }
                depth -= 1;
            }
            ',' if depth == 0 => commas += 1,
            _ => {}
        }
    }
    Some(commas)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(start: usize) -> OverloadProvider {
        OverloadProvider::new(
            start,
            vec![
                OverloadSignature {
                    label: "string Substring(int startIndex)".to_string(),
                    parameters: vec!["int startIndex".to_string()],
                    documentation: None,
                },
                OverloadSignature {
                    label: "string Substring(int startIndex, int length)".to_string(),
                    parameters: vec!["int startIndex".to_string(), "int length".to_string()],
                    documentation: None,
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_empty_signatures_yield_no_provider() {
        assert!(OverloadProvider::new(0, Vec::new()).is_none());
    }

    #[test]
    fn test_parameter_index_tracks_commas() {
        let doc = DocumentSnapshot::new(Some("a.cs"), "s.Substring(1, f(2, 3), \"a,b\"");
        let mut p = provider(12);
        p.update(&doc, 13);
        assert_eq!(p.parameter_index(), 0);
        p.update(&doc, doc.len_chars());
        assert_eq!(p.parameter_index(), 2);
        assert!(!p.request_close());
    }

    #[test]
    fn test_closing_paren_requests_close() {
        let doc = DocumentSnapshot::new(Some("a.cs"), "s.Substring(1)");
        let mut p = provider(12);
        p.update(&doc, 14);
        assert!(p.request_close());
    }

    #[test]
    fn test_caret_before_start_requests_close() {
        let doc = DocumentSnapshot::new(Some("a.cs"), "s.Substring(");
        let mut p = provider(12);
        p.update(&doc, 5);
        assert!(p.request_close());
    }

    #[test]
    fn test_overload_selection_wraps() {
        let mut p = provider(0);
        p.select_previous();
        assert_eq!(p.selected_index(), 1);
        p.select_next();
        assert_eq!(p.selected_index(), 0);
        p.update(&DocumentSnapshot::new(None, "1, 2"), 4);
        assert_eq!(p.current_parameter(), None);
        p.select_next();
        assert_eq!(p.current_parameter(), Some("int length"));
    }
}
