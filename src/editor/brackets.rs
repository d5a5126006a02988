//! Matching bracket search around the caret
//!
//! Brackets inside string, verbatim string and character literals or
//! comments are ignored on both ends of the search.

use serde::Serialize;

/// Character offsets of a matched bracket pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BracketSearchResult {
    pub opening_offset: usize,
    pub opening_length: usize,
    pub closing_offset: usize,
    pub closing_length: usize,
}

impl BracketSearchResult {
    fn pair(opening_offset: usize, closing_offset: usize) -> Self {
        Self {
            opening_offset,
            opening_length: 1,
            closing_offset,
            closing_length: 1,
        }
    }
}

fn closing_for(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        _ => None,
    }
}

fn opening_for(close: char) -> Option<char> {
    match close {
        ')' => Some('('),
        ']' => Some('['),
        '}' => Some('{'),
        _ => None,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Lexeme {
    Code,
    LineComment,
    BlockComment,
    String,
    VerbatimString,
    Char,
}

/// `true` for every character that is plain code
fn code_mask(chars: &[char]) -> Vec<bool> {
    let mut mask = vec![true; chars.len()];
    let mut state = Lexeme::Code;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match state {
            Lexeme::Code => match (c, next) {
                ('/', Some('/')) => state = Lexeme::LineComment,
                ('/', Some('*')) => {
                    state = Lexeme::BlockComment;
                    mask[i] = false;
                    i += 1;
                }
                ('@', Some('"')) => {
                    state = Lexeme::VerbatimString;
                    mask[i] = false;
                    i += 1;
                }
                ('"', _) => state = Lexeme::String,
                ('\'', _) => state = Lexeme::Char,
                _ => {}
            },
            Lexeme::LineComment => {
                if c == '\n' {
                    state = Lexeme::Code;
                }
            }
            Lexeme::BlockComment => {
                if c == '*' && next == Some('/') {
                    mask[i] = false;
                    mask[i + 1] = false;
                    state = Lexeme::Code;
                    i += 2;
                    continue;
                }
            }
            Lexeme::String | Lexeme::Char => {
                let quote = if state == Lexeme::String { '"' } else { '\'' };
                if c == '\\' {
                    mask[i] = false;
                    i += 1;
                } else if c == quote || c == '\n' {
                    state = Lexeme::Code;
                }
            }
            Lexeme::VerbatimString => {
                if c == '"' {
                    if next == Some('"') {
                        mask[i] = false;
                        i += 1;
                    } else {
                        state = Lexeme::Code;
                        mask[i] = false;
                        i += 1;
                        continue;
                    }
                }
            }
        }
        if state != Lexeme::Code || matches!(c, '"' | '\'') {
            if let Some(slot) = mask.get_mut(i) {
                *slot = false;
            }
        }
        i += 1;
    }
    mask
}

/// Finds the bracket pair the character before `offset` belongs to. An
/// opening bracket searches forward, a closing one backward.
pub fn search_bracket(text: &str, offset: usize) -> Option<BracketSearchResult> {
    let chars: Vec<char> = text.chars().collect();
    if offset == 0 || offset > chars.len() {
        return None;
    }
    let mask = code_mask(&chars);
    let at = offset - 1;
    if !mask[at] {
        return None;
    }

    let bracket = chars[at];
    if let Some(close) = closing_for(bracket) {
        let mut depth = 0usize;
        for i in at + 1..chars.len() {
            if !mask[i] {
                continue;
            }
            if chars[i] == bracket {
                depth += 1;
            } else if chars[i] == close {
                if depth == 0 {
                    return Some(BracketSearchResult::pair(at, i));
                }
                depth -= 1;
            }
        }
        return None;
    }

    let open = opening_for(bracket)?;
    let mut depth = 0usize;
    for i in (0..at).rev() {
        if !mask[i] {
            continue;
        }
        if chars[i] == bracket {
            depth += 1;
        } else if chars[i] == open {
            if depth == 0 {
                return Some(BracketSearchResult::pair(i, at));
            }
            depth -= 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_search_from_opening_bracket() {
        let text = "f(a, g(b), c)";
        assert_eq!(search_bracket(text, 2), Some(BracketSearchResult::pair(1, 12)));
        assert_eq!(search_bracket(text, 7), Some(BracketSearchResult::pair(6, 8)));
    }

    #[test]
    fn test_backward_search_from_closing_bracket() {
        let text = "{ x[1] = 2; }";
        assert_eq!(search_bracket(text, 13), Some(BracketSearchResult::pair(0, 12)));
        assert_eq!(search_bracket(text, 6), Some(BracketSearchResult::pair(3, 5)));
    }

    #[test]
    fn test_brackets_in_literals_and_comments_are_skipped() {
        let text = "f(\")\", ')', @\"(\"\")\" /* ) */ // )\n)";
        let close = text.chars().count() - 1;
        assert_eq!(search_bracket(text, 2), Some(BracketSearchResult::pair(1, close)));
        assert_eq!(search_bracket(text, close + 1), Some(BracketSearchResult::pair(1, close)));
    }

    #[test]
    fn test_caret_inside_literal_finds_nothing() {
        let text = "s = \"(\" + x;";
        assert_eq!(search_bracket(text, 6), None);
    }

    #[test]
    fn test_unbalanced_and_out_of_range() {
        assert_eq!(search_bracket("(((", 1), None);
        assert_eq!(search_bracket("a)", 2), None);
        assert_eq!(search_bracket("()", 0), None);
        assert_eq!(search_bracket("()", 9), None);
        assert_eq!(search_bracket("ab", 1), None);
    }
}
