//! Classifying the character before the caret
//!
//! Every completion request is reduced to a [`Dispatch`]: show a caller
//! table, resolve C# symbols at some anchor, or do nothing.

use crate::completion::callers::CallerPrefix;
use crate::document::DocumentSnapshot;

/// Width of the caller prefix window
const PREFIX_WINDOW: usize = 4;

/// The word before the caret that a committed candidate replaces
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TriggerWord {
    pub text: String,
    pub length: usize,
}

impl TriggerWord {
    /// The `length` characters ending at `offset`
    pub fn before(document: &DocumentSnapshot, offset: usize, length: usize) -> Self {
        Self {
            text: document.slice(offset.saturating_sub(length), offset),
            length,
        }
    }
}

/// What a completion request should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Show the fixed caller table; no semantic resolution
    Caller { prefix: CallerPrefix, word: TriggerWord },
    /// Resolve symbols with the resolver anchored at `resolve_at`
    Semantic { resolve_at: usize, word: TriggerWord },
    /// Typing inside an identifier; show nothing
    Suppressed,
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Start and length of the identifier ending at `offset`, or a zero-length
/// word at `offset` when the caret does not follow an identifier character.
pub fn completion_word(document: &DocumentSnapshot, offset: usize) -> (usize, usize) {
    let mut start = offset;
    while start > 0 && document.char_at(start - 1).is_some_and(is_identifier_char) {
        start -= 1;
    }
    (start, offset - start)
}

/// The caller prefix in the window that ends one character before `end`
fn caller_prefix_before(document: &DocumentSnapshot, end: usize) -> Option<CallerPrefix> {
    if end < PREFIX_WINDOW + 1 {
        return None;
    }
    let start = end - PREFIX_WINDOW - 1;
    let window = document.slice(start, start + PREFIX_WINDOW);
    if window.trim().is_empty() {
        return None;
    }
    CallerPrefix::from_window(&window)
}

/// Classifies a request at `offset` (already clamped to the document).
pub fn classify(document: &DocumentSnapshot, offset: usize, control_space: bool) -> Dispatch {
    if control_space {
        return classify_explicit(document, offset);
    }

    let Some(completion_char) = offset.checked_sub(1).and_then(|i| document.char_at(i)) else {
        return Dispatch::Semantic {
            resolve_at: offset,
            word: TriggerWord::default(),
        };
    };

    if is_identifier_char(completion_char) {
        let inside_identifier = offset > 1
            && document
                .char_at(offset - 2)
                .is_some_and(char::is_alphanumeric);
        if inside_identifier {
            return Dispatch::Suppressed;
        }
        return Dispatch::Semantic {
            resolve_at: offset,
            word: TriggerWord::before(document, offset, 1),
        };
    }

    if let Some(prefix) = caller_prefix_before(document, offset) {
        let text = prefix.trigger_word();
        let length = text.chars().count();
        return Dispatch::Caller {
            prefix,
            word: TriggerWord { text, length },
        };
    }

    Dispatch::Semantic {
        resolve_at: offset,
        word: TriggerWord::default(),
    }
}

/// Ctrl+Space: the full candidate set for the word at the caret. A word
/// directly following `Pnt:@` / `Mdl:@` selects the caller table instead.
fn classify_explicit(document: &DocumentSnapshot, offset: usize) -> Dispatch {
    let (start, length) = completion_word(document, offset);
    let word = TriggerWord::before(document, offset, length);

    let after_at = start > 0 && document.char_at(start - 1) == Some('@');
    if after_at {
        if let Some(prefix) = caller_prefix_before(document, start) {
            return Dispatch::Caller { prefix, word };
        }
    }

    Dispatch::Semantic {
        resolve_at: start,
        word,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> DocumentSnapshot {
        DocumentSnapshot::new(Some("a.cs"), text)
    }

    #[test]
    fn test_identifier_inside_word_is_suppressed() {
        assert_eq!(classify(&doc("ab"), 2, false), Dispatch::Suppressed);
        assert_eq!(classify(&doc("x1"), 2, false), Dispatch::Suppressed);
    }

    #[test]
    fn test_first_identifier_char_anchors_one_back() {
        assert_eq!(
            classify(&doc("x.T"), 3, false),
            Dispatch::Semantic {
                resolve_at: 3,
                word: TriggerWord {
                    text: "T".to_string(),
                    length: 1
                }
            }
        );
        // Underscore before the identifier char does not suppress
        assert!(matches!(classify(&doc("_a"), 2, false), Dispatch::Semantic { .. }));
    }

    #[test]
    fn test_caller_prefixes() {
        let d = doc("x = Pnt:@");
        assert_eq!(
            classify(&d, d.len_chars(), false),
            Dispatch::Caller {
                prefix: CallerPrefix::Point,
                word: TriggerWord {
                    text: "Pnt:@".to_string(),
                    length: 5
                }
            }
        );
        let d = doc("Mdl:@");
        assert!(matches!(
            classify(&d, 5, false),
            Dispatch::Caller {
                prefix: CallerPrefix::Model,
                ..
            }
        ));
    }

    #[test]
    fn test_short_prefix_window_falls_back_to_semantic() {
        let d = doc("nt:@");
        assert_eq!(
            classify(&d, 4, false),
            Dispatch::Semantic {
                resolve_at: 4,
                word: TriggerWord::default()
            }
        );
    }

    #[test]
    fn test_dot_is_semantic_with_empty_word() {
        assert_eq!(
            classify(&doc("label."), 6, false),
            Dispatch::Semantic {
                resolve_at: 6,
                word: TriggerWord::default()
            }
        );
    }

    #[test]
    fn test_offset_zero() {
        assert_eq!(
            classify(&doc(""), 0, false),
            Dispatch::Semantic {
                resolve_at: 0,
                word: TriggerWord::default()
            }
        );
        assert_eq!(
            classify(&doc(""), 0, true),
            Dispatch::Semantic {
                resolve_at: 0,
                word: TriggerWord::default()
            }
        );
    }

    #[test]
    fn test_explicit_uses_word_boundaries() {
        assert_eq!(completion_word(&doc("var count"), 9), (4, 5));
        assert_eq!(completion_word(&doc("x.("), 3), (3, 0));
        assert_eq!(
            classify(&doc("x.Sub"), 5, true),
            Dispatch::Semantic {
                resolve_at: 2,
                word: TriggerWord {
                    text: "Sub".to_string(),
                    length: 3
                }
            }
        );
    }

    #[test]
    fn test_explicit_after_caller_prefix() {
        let d = doc("Pnt:@Va");
        assert_eq!(
            classify(&d, 7, true),
            Dispatch::Caller {
                prefix: CallerPrefix::Point,
                word: TriggerWord {
                    text: "Va".to_string(),
                    length: 2
                }
            }
        );
    }
}
