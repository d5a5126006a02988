//! The widget seam: what the controller asks the editor UI to show

use serde::Serialize;

use crate::completion::{CompletionItem, OverloadProvider};
use crate::editor::brackets::BracketSearchResult;

/// State of the open candidate popup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionPopup {
    /// Offset the committed candidate replaces from
    pub start_offset: usize,
    pub items: Vec<CompletionItem>,
    /// Highlighted candidate
    pub selected: Option<usize>,
    /// Close when the caret moves back to `start_offset` (explicit requests)
    pub close_when_caret_at_beginning: bool,
}

impl CompletionPopup {
    pub fn selected_item(&self) -> Option<&CompletionItem> {
        self.selected.and_then(|i| self.items.get(i))
    }

    pub fn select_next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.selected = Some(self.selected.map_or(0, |i| (i + 1).min(self.items.len() - 1)));
    }

    pub fn select_previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.selected = Some(self.selected.map_or(0, |i| i.saturating_sub(1)));
    }

    /// Whether the popup survives the caret moving to `caret`
    pub fn keeps_open_at(&self, caret: usize) -> bool {
        if self.close_when_caret_at_beginning {
            caret > self.start_offset
        } else {
            caret >= self.start_offset
        }
    }
}

/// Editor widget callbacks. The controller owns the popup state; the host
/// only renders it.
pub trait EditorHost {
    fn show_completion_popup(&mut self, popup: &CompletionPopup);

    fn close_completion_popup(&mut self);

    fn show_overload_popup(&mut self, provider: &OverloadProvider);

    fn update_overload_popup(&mut self, _provider: &OverloadProvider) {}

    fn close_overload_popup(&mut self);

    /// `None` clears the highlight
    fn highlight_brackets(&mut self, _result: Option<BracketSearchResult>) {}
}

/// Host for headless use: renders nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl EditorHost for NullHost {
    fn show_completion_popup(&mut self, _popup: &CompletionPopup) {}
    fn close_completion_popup(&mut self) {}
    fn show_overload_popup(&mut self, _provider: &OverloadProvider) {}
    fn close_overload_popup(&mut self) {}
}
