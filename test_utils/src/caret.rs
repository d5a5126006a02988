use ropey::Rope;

/// Marker for the caret position in test sources
pub const CARET: char = '|';

/// Removes the first `|` from `marked` and returns the text with the caret's
/// character offset. Without a marker the caret is at the end.
///
/// ```
/// let (text, caret) = test_utils::with_caret("s.|Trim()");
/// assert_eq!(text, "s.Trim()");
/// assert_eq!(caret, 2);
/// ```
pub fn with_caret(marked: &str) -> (String, usize) {
    match marked.find(CARET) {
        Some(byte) => {
            let mut text = String::with_capacity(marked.len());
            text.push_str(&marked[..byte]);
            text.push_str(&marked[byte + CARET.len_utf8()..]);
            let caret = Rope::from_str(&marked[..byte]).len_chars();
            (text, caret)
        }
        None => {
            let caret = Rope::from_str(marked).len_chars();
            (marked.to_string(), caret)
        }
    }
}
