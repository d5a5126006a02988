//! Editor glue: keystrokes in, popups out
//!
//! The controller owns the edited document, the caret and the state of the
//! two popups (at most one candidate popup and one overload popup). Typing a
//! character goes through [`EditorController::type_text`]:
//!
//! 1. while a candidate popup is open, a character that is not a letter or
//!    digit first commits the highlighted candidate; the character itself is
//!    still inserted;
//! 2. the character is inserted and the caret moves past it;
//! 3. a completion request runs unless a candidate popup is already open. An
//!    overload provider in the result opens the overload popup and nothing
//!    else; otherwise candidates open the candidate popup;
//! 4. an open overload popup is updated against the new text and closed when
//!    its provider asks for it.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::completion::callers::is_caller_trigger_word;
use crate::completion::ranking::best_match_index;
use crate::completion::{CompletionEngine, CompletionResult, OverloadProvider};
use crate::document::EditorDocument;
use crate::editor::EditorError;
use crate::editor::brackets::search_bracket;
use crate::editor::host::{CompletionPopup, EditorHost};

/// Completion runs for `.cs`, `.csx` and similar extensions only
pub fn is_csharp_file(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.to_lowercase().starts_with("cs"))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

pub struct EditorController<H: EditorHost> {
    host: H,
    engine: Option<Arc<CompletionEngine>>,
    document: EditorDocument,
    caret: usize,
    completion_popup: Option<CompletionPopup>,
    overload_popup: Option<OverloadProvider>,
}

impl<H: EditorHost> EditorController<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            engine: None,
            document: EditorDocument::new(None, ""),
            caret: 0,
            completion_popup: None,
            overload_popup: None,
        }
    }

    pub fn with_engine(mut self, engine: Arc<CompletionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn set_engine(&mut self, engine: Option<Arc<CompletionEngine>>) {
        self.engine = engine;
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn document(&self) -> &EditorDocument {
        &self.document
    }

    pub fn file_name(&self) -> Option<&str> {
        self.document.file_name()
    }

    pub fn caret_offset(&self) -> usize {
        self.caret
    }

    pub fn completion_popup(&self) -> Option<&CompletionPopup> {
        self.completion_popup.as_ref()
    }

    pub fn overload_popup(&self) -> Option<&OverloadProvider> {
        self.overload_popup.as_ref()
    }

    /// Moves the caret, closing the candidate popup when the caret leaves it
    /// and highlighting the bracket pair at the new position
    pub fn set_caret(&mut self, offset: usize) {
        self.caret = offset.min(self.document.len_chars());
        self.caret_changed();
    }

    /// Types `text` at the caret, as if entered on the keyboard
    pub fn type_text(&mut self, text: &str) {
        self.on_text_entering(text);
        self.document.insert(self.caret, text);
        self.caret += text.chars().count();
        self.caret_changed();
        self.on_text_entered(text);
    }

    /// Commits the highlighted candidate when `text` starts with a character
    /// that cannot continue the word
    pub fn on_text_entering(&mut self, text: &str) {
        trace!("Text entering: {:?}", text);
        let Some(first) = text.chars().next() else { return };
        if self.completion_popup.is_some() && !first.is_alphanumeric() {
            self.commit_completion();
        }
    }

    pub fn on_text_entered(&mut self, text: &str) {
        self.show_completion(Some(text), false);
    }

    /// Ctrl+Space
    pub fn on_control_space(&mut self) {
        self.show_completion(None, true);
    }

    /// Replaces the text between the popup start and the caret with the
    /// highlighted candidate and closes the popup. Returns `false` when
    /// nothing was inserted.
    pub fn commit_completion(&mut self) -> bool {
        let Some(popup) = self.completion_popup.take() else {
            return false;
        };
        self.host.close_completion_popup();
        let Some(item) = popup.selected_item() else {
            return false;
        };

        let start = popup.start_offset.min(self.caret);
        let insertion = item.insertion_text();
        debug!("Committing '{}' over {}..{}", insertion, start, self.caret);
        self.document.replace(start, self.caret, &insertion);
        self.caret = start + insertion.chars().count();
        self.caret_changed();
        true
    }

    pub fn select_next_candidate(&mut self) {
        if let Some(popup) = self.completion_popup.as_mut() {
            popup.select_next();
            self.host.show_completion_popup(popup);
        }
    }

    pub fn select_previous_candidate(&mut self) {
        if let Some(popup) = self.completion_popup.as_mut() {
            popup.select_previous();
            self.host.show_completion_popup(popup);
        }
    }

    pub fn select_next_overload(&mut self) {
        if let Some(provider) = self.overload_popup.as_mut() {
            provider.select_next();
            self.host.update_overload_popup(provider);
        }
    }

    pub fn select_previous_overload(&mut self) {
        if let Some(provider) = self.overload_popup.as_mut() {
            provider.select_previous();
            self.host.update_overload_popup(provider);
        }
    }

    pub fn close_completion_popup(&mut self) {
        if self.completion_popup.take().is_some() {
            self.host.close_completion_popup();
        }
    }

    pub fn close_overload_popup(&mut self) {
        if self.overload_popup.take().is_some() {
            self.host.close_overload_popup();
        }
    }

    /// Loads `path` into the editor
    pub fn open_file(&mut self, path: impl AsRef<Path>) -> Result<(), EditorError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(EditorError::FileNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| EditorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.new_file(&path.to_string_lossy(), &text);
        Ok(())
    }

    /// Replaces the document with `text` under `file_name`
    pub fn new_file(&mut self, file_name: &str, text: &str) {
        self.close_completion_popup();
        self.close_overload_popup();
        self.document = EditorDocument::new(Some(file_name.to_string()), text);
        self.caret = 0;
        debug!("Editing {}", file_name);
    }

    /// Writes the document to its file. Returns `false` when it has no file name.
    pub fn save_file(&self) -> Result<bool, EditorError> {
        let Some(file_name) = self.document.file_name().filter(|f| !f.is_empty()) else {
            return Ok(false);
        };
        let path = PathBuf::from(file_name);
        std::fs::write(&path, self.document.text().to_string())
            .map_err(|source| EditorError::Io { path, source })?;
        Ok(true)
    }

    fn caret_changed(&mut self) {
        if let Some(popup) = self.completion_popup.as_mut() {
            if popup.keeps_open_at(self.caret) {
                let word = self.document.snapshot().slice(popup.start_offset, self.caret);
                if !is_caller_trigger_word(&word) {
                    if let Some(index) = best_match_index(&popup.items, &word) {
                        popup.selected = Some(index);
                    }
                }
            } else {
                self.completion_popup = None;
                self.host.close_completion_popup();
            }
        }
        let text = self.document.text().to_string();
        self.host.highlight_brackets(search_bracket(&text, self.caret));
    }

    fn completions(&self, engine: &CompletionEngine, control_space: bool) -> Option<CompletionResult> {
        let snapshot = self.document.snapshot();
        let caret = self.caret;
        match catch_unwind(AssertUnwindSafe(|| engine.get_completions(&snapshot, caret, control_space))) {
            Ok(Ok(result)) => Some(result),
            Ok(Err(e)) => {
                error!("Error in getting completion: {}", e);
                None
            }
            Err(payload) => {
                error!("Completion panicked: {}", panic_message(payload.as_ref()));
                None
            }
        }
    }

    fn show_completion(&mut self, entered_text: Option<&str>, control_space: bool) {
        match entered_text {
            Some(text) => debug!("Code completion: text entered {:?}", text),
            None => debug!("Code completion: Ctrl+Space"),
        }

        let Some(file_name) = self.document.file_name().filter(|f| !f.is_empty()) else {
            debug!("No document file name, cannot run code completion");
            return;
        };
        if !is_csharp_file(file_name) {
            debug!("Wrong file extension, cannot run code completion");
            return;
        }
        let Some(engine) = self.engine.clone() else {
            debug!("No completion engine, cannot run code completion");
            return;
        };

        if self.completion_popup.is_none() {
            let Some(result) = self.completions(&engine, control_space) else {
                return;
            };

            if self.overload_popup.is_none() {
                if let Some(provider) = result.overload_provider {
                    self.host.show_overload_popup(&provider);
                    self.overload_popup = Some(provider);
                    return;
                }
            }

            if !result.candidates.is_empty() {
                let selected = if result.trigger_word_length > 0 && !is_caller_trigger_word(&result.trigger_word) {
                    best_match_index(&result.candidates, &result.trigger_word)
                } else {
                    None
                };
                let popup = CompletionPopup {
                    start_offset: self.caret.saturating_sub(result.trigger_word_length),
                    items: result.candidates,
                    selected,
                    close_when_caret_at_beginning: control_space,
                };
                self.host.show_completion_popup(&popup);
                self.completion_popup = Some(popup);
            }
        }

        if entered_text.is_some_and(|text| !text.is_empty()) {
            if let Some(provider) = self.overload_popup.as_mut() {
                provider.update(&self.document.snapshot(), self.caret);
                if provider.request_close() {
                    self.overload_popup = None;
                    self.host.close_overload_popup();
                } else {
                    self.host.update_overload_popup(provider);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{
        CallerTables, CandidateKind, CompletionContext, CompletionError, CompletionItem, OverloadSignature,
        ResolvedCandidate, SemanticResolver,
    };
    use crate::editor::brackets::BracketSearchResult;
    use crate::parsers::TreeSitterCSharpParser;
    use crate::project::SharedProject;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        ShowCompletion(usize, Vec<String>, Option<usize>),
        CloseCompletion,
        ShowOverload(usize),
        UpdateOverload(usize),
        CloseOverload,
    }

    #[derive(Default)]
    struct RecordingHost {
        events: Vec<Event>,
        brackets: Option<BracketSearchResult>,
    }

    impl EditorHost for RecordingHost {
        fn show_completion_popup(&mut self, popup: &CompletionPopup) {
            let labels = popup.items.iter().map(|i| i.label.clone()).collect();
            self.events.push(Event::ShowCompletion(popup.start_offset, labels, popup.selected));
        }
        fn close_completion_popup(&mut self) {
            self.events.push(Event::CloseCompletion);
        }
        fn show_overload_popup(&mut self, provider: &OverloadProvider) {
            self.events.push(Event::ShowOverload(provider.parameter_index()));
        }
        fn update_overload_popup(&mut self, provider: &OverloadProvider) {
            self.events.push(Event::UpdateOverload(provider.parameter_index()));
        }
        fn close_overload_popup(&mut self) {
            self.events.push(Event::CloseOverload);
        }
        fn highlight_brackets(&mut self, result: Option<BracketSearchResult>) {
            self.brackets = result;
        }
    }

    /// Members after `.`, scope names on Ctrl+Space, a two-parameter signature after `(`
    struct ScriptedResolver {
        panic: bool,
    }

    impl SemanticResolver for ScriptedResolver {
        fn completion_data(
            &self,
            context: &CompletionContext,
            offset: usize,
            explicit: bool,
        ) -> Result<Vec<ResolvedCandidate>, CompletionError> {
            if self.panic {
                panic!("resolver failure");
            }
            let dotted = offset > 0 && context.document().char_at(offset - 1) == Some('.');
            let labels: &[&str] = match (dotted, explicit) {
                (true, _) => &["Trim", "Length"],
                (false, true) => &["Console", "string"],
                (false, false) => &[],
            };
            Ok(labels
                .iter()
                .map(|l| ResolvedCandidate::Item(CompletionItem::new(*l, CandidateKind::Method)))
                .collect())
        }

        fn parameter_data(
            &self,
            context: &CompletionContext,
            offset: usize,
            completion_char: Option<char>,
        ) -> Result<Option<OverloadProvider>, CompletionError> {
            if completion_char != Some('(') {
                return Ok(None);
            }
            let signature = OverloadSignature {
                label: "void Write(int a, int b)".to_string(),
                parameters: vec!["int a".to_string(), "int b".to_string()],
                documentation: None,
            };
            Ok(OverloadProvider::new(offset, vec![signature]).map(|mut p| {
                p.update(context.document(), offset);
                p
            }))
        }
    }

    fn controller(panic: bool) -> EditorController<RecordingHost> {
        let engine = CompletionEngine::new(
            Arc::new(SharedProject::new()),
            Arc::new(TreeSitterCSharpParser::new()),
            Arc::new(ScriptedResolver { panic }),
            Arc::new(CallerTables::default()),
        );
        EditorController::new(RecordingHost::default()).with_engine(Arc::new(engine))
    }

    fn typed(controller: &mut EditorController<RecordingHost>, file: &str, before: &str, text: &str) {
        controller.new_file(file, before);
        controller.set_caret(before.chars().count());
        controller.type_text(text);
    }

    #[test]
    fn test_extension_guard() {
        assert!(is_csharp_file("a.cs"));
        assert!(is_csharp_file("Script.CSX"));
        assert!(!is_csharp_file("notes.txt"));
        assert!(!is_csharp_file("Makefile"));

        let mut c = controller(false);
        typed(&mut c, "notes.txt", "x", ".");
        assert!(c.completion_popup().is_none());
        assert!(c.host().events.is_empty());
    }

    #[test]
    fn test_no_engine_no_popup() {
        let mut c = EditorController::new(RecordingHost::default());
        typed(&mut c, "a.cs", "x", ".");
        assert!(c.completion_popup().is_none());
        assert_eq!(c.document().text().to_string(), "x.");
    }

    #[test]
    fn test_dot_opens_sorted_popup_at_caret() {
        let mut c = controller(false);
        typed(&mut c, "a.cs", "s", ".");
        let popup = c.completion_popup().unwrap();
        assert_eq!(popup.start_offset, 2);
        assert!(!popup.close_when_caret_at_beginning);
        assert_eq!(
            c.host().events,
            vec![Event::ShowCompletion(2, vec!["Length".into(), "Trim".into()], None)]
        );
    }

    #[test]
    fn test_typing_filters_and_non_letter_commits() {
        let mut c = controller(false);
        typed(&mut c, "a.cs", "s", ".");
        c.type_text("T");
        assert_eq!(c.completion_popup().unwrap().selected, Some(1));

        c.type_text(";");
        assert!(c.completion_popup().is_none());
        assert_eq!(c.document().text().to_string(), "s.Trim;");
        assert_eq!(c.caret_offset(), 7);
    }

    #[test]
    fn test_caret_before_start_closes_popup() {
        let mut c = controller(false);
        typed(&mut c, "a.cs", "s", ".");
        c.set_caret(0);
        assert!(c.completion_popup().is_none());
        assert_eq!(c.host().events.last(), Some(&Event::CloseCompletion));
    }

    #[test]
    fn test_explicit_popup_closes_at_beginning() {
        let mut c = controller(false);
        c.new_file("a.cs", "Con");
        c.set_caret(3);
        c.on_control_space();
        let popup = c.completion_popup().unwrap();
        assert_eq!(popup.start_offset, 0);
        assert!(popup.close_when_caret_at_beginning);
        assert_eq!(popup.selected, Some(0));

        c.set_caret(0);
        assert!(c.completion_popup().is_none());
    }

    #[test]
    fn test_overload_popup_preempts_candidates() {
        let mut c = controller(false);
        typed(&mut c, "a.cs", "Write", "(");
        assert!(c.completion_popup().is_none());
        assert_eq!(c.host().events, vec![Event::ShowOverload(0)]);

        c.type_text("1");
        c.type_text(",");
        assert_eq!(c.overload_popup().unwrap().parameter_index(), 1);

        c.type_text(")");
        assert!(c.overload_popup().is_none());
        assert_eq!(c.host().events.last(), Some(&Event::CloseOverload));
    }

    #[test]
    fn test_resolver_panic_is_contained() {
        let mut c = controller(true);
        typed(&mut c, "a.cs", "s", ".");
        assert!(c.completion_popup().is_none());
        assert_eq!(c.document().text().to_string(), "s.");
    }

    #[test]
    fn test_new_file_closes_popups() {
        let mut c = controller(false);
        typed(&mut c, "a.cs", "s", ".");
        c.new_file("b.cs", "");
        assert!(c.completion_popup().is_none());
        assert_eq!(c.host().events.last(), Some(&Event::CloseCompletion));
        assert_eq!(c.file_name(), Some("b.cs"));
    }

    #[test]
    fn test_open_and_save_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Program.cs");

        let mut c = controller(false);
        assert!(matches!(c.open_file(&path), Err(EditorError::FileNotFound(_))));
        assert!(!c.save_file().unwrap());

        std::fs::write(&path, "class A {}").unwrap();
        c.open_file(&path).unwrap();
        c.set_caret(10);
        assert_eq!(
            c.host().brackets,
            Some(BracketSearchResult {
                opening_offset: 8,
                opening_length: 1,
                closing_offset: 9,
                closing_length: 1,
            })
        );
        c.type_text(" ");
        assert!(c.save_file().unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "class A {} ");
    }
}
