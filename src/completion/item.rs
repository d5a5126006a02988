//! Renderable completion candidates

use serde::Serialize;

use crate::project::{MemberKind, TypeKind};

/// Icon/category of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CandidateKind {
    Keyword,
    Namespace,
    Class,
    Struct,
    Interface,
    Enum,
    Delegate,
    Method,
    Constructor,
    Property,
    Field,
    Event,
    EnumValue,
    Variable,
    /// Entry of a point/model caller table
    CallerEntry,
}

impl From<TypeKind> for CandidateKind {
    fn from(kind: TypeKind) -> Self {
        match kind {
            TypeKind::Class | TypeKind::Record => CandidateKind::Class,
            TypeKind::Struct => CandidateKind::Struct,
            TypeKind::Interface => CandidateKind::Interface,
            TypeKind::Enum => CandidateKind::Enum,
            TypeKind::Delegate => CandidateKind::Delegate,
        }
    }
}

impl From<MemberKind> for CandidateKind {
    fn from(kind: MemberKind) -> Self {
        match kind {
            MemberKind::Method => CandidateKind::Method,
            MemberKind::Constructor => CandidateKind::Constructor,
            MemberKind::Property => CandidateKind::Property,
            MemberKind::Field => CandidateKind::Field,
            MemberKind::Event => CandidateKind::Event,
            MemberKind::EnumValue => CandidateKind::EnumValue,
        }
    }
}

/// A candidate shown in the completion popup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionItem {
    pub label: String,
    pub kind: CandidateKind,
    /// Signature or short description shown next to the label
    pub description: Option<String>,
    pub documentation: Option<String>,
    /// Text immediately before the caret that committing this item replaces
    pub trigger_word: String,
    pub trigger_word_length: usize,
    /// Caller prefix (`Pnt:`/`Mdl:`) for caller table entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl CompletionItem {
    pub fn new(label: impl Into<String>, kind: CandidateKind) -> Self {
        Self {
            label: label.into(),
            kind,
            description: None,
            documentation: None,
            trigger_word: String::new(),
            trigger_word_length: 0,
            prefix: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_documentation(mut self, documentation: Option<String>) -> Self {
        self.documentation = documentation;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Records the trigger word this item will replace on commit
    pub fn stamp(&mut self, trigger_word: &str, trigger_word_length: usize) {
        self.trigger_word = trigger_word.to_string();
        self.trigger_word_length = trigger_word_length;
    }

    /// Text inserted in place of the trigger word. Caller entries committed
    /// over their own `prefix@` trigger keep the prefix in front.
    pub fn insertion_text(&self) -> String {
        match &self.prefix {
            Some(prefix) if self.trigger_word.starts_with(prefix.as_str()) => {
                format!("{}@{}", prefix, self.label)
            }
            _ => self.label.clone(),
        }
    }
}
