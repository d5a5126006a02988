//! Point/model caller tables
//!
//! Typing `Pnt:@` or `Mdl:@` pops up a fixed list of point or model
//! attributes instead of resolving C# symbols. The tables are built once per
//! session, from configuration or the built-in defaults below, and never
//! depend on the project snapshot.

use serde::{Deserialize, Serialize};

use crate::completion::item::{CandidateKind, CompletionItem};

pub const POINT_CALLER: &str = "Pnt:";
pub const MODEL_CALLER: &str = "Mdl:";

/// Which caller table a prefix selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CallerPrefix {
    Point,
    Model,
}

impl CallerPrefix {
    pub const ALL: [CallerPrefix; 2] = [CallerPrefix::Point, CallerPrefix::Model];

    pub fn as_str(&self) -> &'static str {
        match self {
            CallerPrefix::Point => POINT_CALLER,
            CallerPrefix::Model => MODEL_CALLER,
        }
    }

    /// `Pnt:@` / `Mdl:@`
    pub fn trigger_word(&self) -> String {
        format!("{}@", self.as_str())
    }

    /// Matches a 4-character window exactly against the reserved prefixes
    pub fn from_window(window: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == window)
    }
}

/// True for `Pnt:@` and `Mdl:@`
pub fn is_caller_trigger_word(word: &str) -> bool {
    CallerPrefix::ALL.iter().any(|p| word.strip_suffix('@') == Some(p.as_str()))
}

/// One row of a caller table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerEntry {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CallerEntry {
    fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
        }
    }
}

/// The point and model tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerTables {
    point: Vec<CallerEntry>,
    model: Vec<CallerEntry>,
}

impl Default for CallerTables {
    fn default() -> Self {
        Self {
            point: default_point_entries(),
            model: default_model_entries(),
        }
    }
}

impl CallerTables {
    pub fn new(point: Vec<CallerEntry>, model: Vec<CallerEntry>) -> Self {
        Self { point, model }
    }

    /// Uses the configured tables where given, the built-in ones otherwise
    pub fn from_overrides(point: Option<Vec<CallerEntry>>, model: Option<Vec<CallerEntry>>) -> Self {
        let defaults = Self::default();
        Self {
            point: point.unwrap_or(defaults.point),
            model: model.unwrap_or(defaults.model),
        }
    }

    pub fn entries(&self, prefix: CallerPrefix) -> &[CallerEntry] {
        match prefix {
            CallerPrefix::Point => &self.point,
            CallerPrefix::Model => &self.model,
        }
    }

    /// The table for `prefix` as candidates stamped with the given trigger word
    pub fn candidates(&self, prefix: CallerPrefix, trigger_word: &str, trigger_word_length: usize) -> Vec<CompletionItem> {
        self.entries(prefix)
            .iter()
            .map(|entry| {
                let mut item = CompletionItem::new(entry.name.clone(), CandidateKind::CallerEntry)
                    .with_prefix(prefix.as_str())
                    .with_documentation(entry.description.clone());
                item.stamp(trigger_word, trigger_word_length);
                item
            })
            .collect()
    }
}

fn default_point_entries() -> Vec<CallerEntry> {
    vec![
        CallerEntry::new("Value", "Current value of the point"),
        CallerEntry::new("Quality", "Quality code of the current value"),
        CallerEntry::new("Timestamp", "Time the current value was recorded"),
        CallerEntry::new("Description", "Point description"),
        CallerEntry::new("EngineeringUnits", "Engineering units of the value"),
        CallerEntry::new("HighLimit", "Upper alarm limit"),
        CallerEntry::new("LowLimit", "Lower alarm limit"),
        CallerEntry::new("Name", "Point tag name"),
    ]
}

fn default_model_entries() -> Vec<CallerEntry> {
    vec![
        CallerEntry::new("Name", "Model name"),
        CallerEntry::new("Path", "Full path of the model in the hierarchy"),
        CallerEntry::new("Parent", "Parent model"),
        CallerEntry::new("Children", "Child models"),
        CallerEntry::new("Points", "Points attached to the model"),
        CallerEntry::new("Attributes", "Model attributes"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_matching_is_exact() {
        assert_eq!(CallerPrefix::from_window("Pnt:"), Some(CallerPrefix::Point));
        assert_eq!(CallerPrefix::from_window("Mdl:"), Some(CallerPrefix::Model));
        assert_eq!(CallerPrefix::from_window("pnt:"), None);
        assert_eq!(CallerPrefix::from_window(" Pnt"), None);
    }

    #[test]
    fn test_caller_trigger_words() {
        assert!(is_caller_trigger_word("Pnt:@"));
        assert!(is_caller_trigger_word("Mdl:@"));
        assert!(!is_caller_trigger_word("Pnt:"));
        assert!(!is_caller_trigger_word("Value"));
    }

    #[test]
    fn test_candidates_are_stamped_and_prefixed() {
        let tables = CallerTables::default();
        let items = tables.candidates(CallerPrefix::Model, "Mdl:@", 5);
        assert_eq!(items.len(), tables.entries(CallerPrefix::Model).len());
        assert!(items.iter().all(|i| i.trigger_word == "Mdl:@" && i.trigger_word_length == 5));
        assert!(items.iter().all(|i| i.prefix.as_deref() == Some("Mdl:")));
    }

    #[test]
    fn test_overrides() {
        let tables = CallerTables::from_overrides(
            Some(vec![CallerEntry {
                name: "Setpoint".to_string(),
                description: None,
            }]),
            None,
        );
        assert_eq!(tables.entries(CallerPrefix::Point).len(), 1);
        assert_eq!(tables.entries(CallerPrefix::Model), CallerTables::default().entries(CallerPrefix::Model));
    }
}
