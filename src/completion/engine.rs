//! Completion requests
//!
//! [`CompletionEngine::get_completions_with`] turns a document snapshot and
//! caret offset into a [`CompletionResult`]:
//!
//! 1. documents without a file name get an empty result;
//! 2. the character before the caret is classified into a [`Dispatch`];
//! 3. caller prefixes return their fixed table, everything else is resolved
//!    against the project snapshot current at request time;
//! 4. renderable candidates are stamped with the trigger word and sorted;
//! 5. implicit requests also ask for overload insight.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::completion::CompletionError;
use crate::completion::callers::CallerTables;
use crate::completion::context::{CompletionContext, ScriptInputs, ScriptProvider};
use crate::completion::item::CompletionItem;
use crate::completion::overload::OverloadProvider;
use crate::completion::ranking::sort_by_label;
use crate::completion::resolver::{ResolvedCandidate, SemanticResolver};
use crate::completion::trigger::{Dispatch, TriggerWord, classify};
use crate::document::DocumentSnapshot;
use crate::parsers::{ParseCache, SourceParser};
use crate::project::SharedProject;

/// Outcome of one completion request
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompletionResult {
    /// Candidates in ascending label order
    pub candidates: Vec<CompletionItem>,
    pub trigger_word: String,
    pub trigger_word_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overload_provider: Option<OverloadProvider>,
}

impl CompletionResult {
    fn stamped(mut candidates: Vec<CompletionItem>, word: TriggerWord) -> Self {
        for candidate in &mut candidates {
            candidate.stamp(&word.text, word.length);
        }
        sort_by_label(&mut candidates);
        Self {
            candidates,
            trigger_word: word.text,
            trigger_word_length: word.length,
            overload_provider: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty() && self.overload_provider.is_none()
    }
}

pub struct CompletionEngine {
    project: Arc<SharedProject>,
    parser: Arc<dyn SourceParser>,
    resolver: Arc<dyn SemanticResolver>,
    callers: Arc<CallerTables>,
    parse_cache: ParseCache,
    script_provider: RwLock<Option<Arc<dyn ScriptProvider>>>,
}

impl CompletionEngine {
    pub fn new(
        project: Arc<SharedProject>,
        parser: Arc<dyn SourceParser>,
        resolver: Arc<dyn SemanticResolver>,
        callers: Arc<CallerTables>,
    ) -> Self {
        Self {
            project,
            parser,
            resolver,
            callers,
            parse_cache: ParseCache::default(),
            script_provider: RwLock::new(None),
        }
    }

    pub fn project(&self) -> &Arc<SharedProject> {
        &self.project
    }

    pub fn callers(&self) -> &CallerTables {
        &self.callers
    }

    pub fn set_script_provider(&self, provider: Option<Arc<dyn ScriptProvider>>) {
        *self.script_provider.write() = provider;
    }

    pub fn script_provider(&self) -> Option<Arc<dyn ScriptProvider>> {
        self.script_provider.read().clone()
    }

    /// Completes using the scripting scope of the current script provider, if any
    pub fn get_completions(
        &self,
        document: &DocumentSnapshot,
        offset: usize,
        control_space: bool,
    ) -> Result<CompletionResult, CompletionError> {
        let inputs = self
            .script_provider()
            .map(|provider| ScriptInputs::from_provider(provider.as_ref()))
            .unwrap_or_default();
        self.get_completions_with(document, offset, control_space, &inputs)
    }

    pub fn get_completions_with(
        &self,
        document: &DocumentSnapshot,
        offset: usize,
        control_space: bool,
        inputs: &ScriptInputs,
    ) -> Result<CompletionResult, CompletionError> {
        let Some(file_name) = document.file_name().filter(|f| !f.is_empty()) else {
            debug!("Document has no file name, skipping completion");
            return Ok(CompletionResult::default());
        };
        let offset = offset.min(document.len_chars());

        match classify(document, offset, control_space) {
            Dispatch::Suppressed => Ok(CompletionResult::default()),
            Dispatch::Caller { prefix, word } => {
                debug!("Trigger word: '{}' ({:?} caller table)", word.text, prefix);
                let candidates = self.callers.candidates(prefix, &word.text, word.length);
                Ok(CompletionResult::stamped(candidates, word))
            }
            Dispatch::Semantic { resolve_at, word } => {
                debug!("Trigger word: '{}' in {} at {}", word.text, file_name, offset);
                let context = CompletionContext::build(
                    document,
                    offset,
                    self.project.snapshot(),
                    self.parser.as_ref(),
                    &self.parse_cache,
                    inputs,
                );

                let candidates: Vec<CompletionItem> = self
                    .resolver
                    .completion_data(&context, resolve_at, control_space)?
                    .into_iter()
                    .filter_map(|candidate| match candidate {
                        ResolvedCandidate::Item(item) => Some(item),
                        ResolvedCandidate::ImportSuggestion { .. } => None,
                    })
                    .collect();
                let mut result = CompletionResult::stamped(candidates, word);

                if !control_space {
                    let completion_char = offset.checked_sub(1).and_then(|i| document.char_at(i));
                    result.overload_provider = self.resolver.parameter_data(&context, offset, completion_char)?;
                }
                Ok(result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::item::CandidateKind;

    /// Resolver returning a fixed list, counting nothing, never touching the snapshot
    struct FixedResolver(Vec<ResolvedCandidate>);

    impl SemanticResolver for FixedResolver {
        fn completion_data(
            &self,
            _context: &CompletionContext,
            _offset: usize,
            _explicit: bool,
        ) -> Result<Vec<ResolvedCandidate>, CompletionError> {
            Ok(self.0.clone())
        }

        fn parameter_data(
            &self,
            _context: &CompletionContext,
            _offset: usize,
            _completion_char: Option<char>,
        ) -> Result<Option<OverloadProvider>, CompletionError> {
            Ok(None)
        }
    }

    fn engine(candidates: Vec<ResolvedCandidate>) -> CompletionEngine {
        CompletionEngine::new(
            Arc::new(SharedProject::new()),
            Arc::new(crate::parsers::TreeSitterCSharpParser::new()),
            Arc::new(FixedResolver(candidates)),
            Arc::new(CallerTables::default()),
        )
    }

    fn item(label: &str) -> ResolvedCandidate {
        ResolvedCandidate::Item(CompletionItem::new(label, CandidateKind::Method))
    }

    #[test]
    fn test_missing_file_name_yields_empty_result() {
        let engine = engine(vec![item("Foo")]);
        let result = engine
            .get_completions(&DocumentSnapshot::new(None, "x."), 2, false)
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_import_suggestions_are_dropped_and_items_sorted() {
        let engine = engine(vec![
            item("Foo"),
            ResolvedCandidate::ImportSuggestion {
                type_name: "StringBuilder".to_string(),
                namespace: "System.Text".to_string(),
            },
            item("Bar"),
        ]);
        let doc = DocumentSnapshot::new(Some("a.cs"), "x.");
        let result = engine.get_completions(&doc, 2, false).unwrap();
        let labels: Vec<&str> = result.candidates.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Bar", "Foo"]);
        assert_eq!(result.trigger_word, "");
    }

    #[test]
    fn test_identifier_trigger_stamps_candidates() {
        let engine = engine(vec![item("Trim")]);
        let doc = DocumentSnapshot::new(Some("a.cs"), "x.T");
        let result = engine.get_completions(&doc, 3, false).unwrap();
        assert_eq!(result.trigger_word, "T");
        assert_eq!(result.trigger_word_length, 1);
        assert_eq!(result.candidates[0].trigger_word, "T");
    }

    #[test]
    fn test_offset_is_clamped() {
        let engine = engine(vec![item("Trim")]);
        let doc = DocumentSnapshot::new(Some("a.cs"), "x.");
        let result = engine.get_completions(&doc, 100, false).unwrap();
        assert_eq!(result.candidates.len(), 1);
    }

    #[test]
    fn test_script_provider_is_consulted() {
        struct Scope;
        impl ScriptProvider for Scope {
            fn usings(&self) -> Option<String> {
                Some("using System;".to_string())
            }
            fn variables(&self) -> Option<String> {
                None
            }
            fn namespace(&self) -> Option<String> {
                None
            }
        }

        let engine = engine(Vec::new());
        assert!(engine.script_provider().is_none());
        engine.set_script_provider(Some(Arc::new(Scope)));
        assert!(engine.script_provider().is_some());
        let doc = DocumentSnapshot::new(Some("a.cs"), "x.");
        assert!(engine.get_completions(&doc, 2, false).unwrap().candidates.is_empty());
    }
}
