//! Ordering of completion results
//!
//! Candidates are presented in ascending ordinal order of their label. The
//! sort is stable: candidates with equal labels (overloads from different
//! sources, a local shadowing a type) keep the order the resolver produced.
//!
//! Selecting the trigger word in the popup picks, in order of priority:
//! 1. an exact label match
//! 2. the first label starting with the word
//! 3. the first label starting with the word, ignoring ASCII case

use crate::completion::item::CompletionItem;

/// Sorts candidates by label, ordinal and stable
pub fn sort_by_label(items: &mut [CompletionItem]) {
    items.sort_by(|a, b| a.label.cmp(&b.label));
}

/// Index of the candidate the popup should highlight for `word`
pub fn best_match_index(items: &[CompletionItem], word: &str) -> Option<usize> {
    if word.is_empty() {
        return None;
    }
    items
        .iter()
        .position(|item| item.label == word)
        .or_else(|| items.iter().position(|item| item.label.starts_with(word)))
        .or_else(|| {
            let lower = word.to_ascii_lowercase();
            items
                .iter()
                .position(|item| item.label.to_ascii_lowercase().starts_with(&lower))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::item::CandidateKind;
    use quickcheck::quickcheck;

    fn items(labels: &[&str]) -> Vec<CompletionItem> {
        labels
            .iter()
            .map(|l| CompletionItem::new(*l, CandidateKind::Field))
            .collect()
    }

    #[test]
    fn test_sort_is_ordinal() {
        let mut list = items(&["b", "Bar", "Foo", "_x", "a"]);
        sort_by_label(&mut list);
        let labels: Vec<&str> = list.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["Bar", "Foo", "_x", "a", "b"]);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut list = vec![
            CompletionItem::new("Name", CandidateKind::Property),
            CompletionItem::new("Age", CandidateKind::Field),
            CompletionItem::new("Name", CandidateKind::Variable),
        ];
        sort_by_label(&mut list);
        assert_eq!(list[1].kind, CandidateKind::Property);
        assert_eq!(list[2].kind, CandidateKind::Variable);
    }

    #[test]
    fn test_best_match() {
        let list = items(&["Substring", "Sub", "ToString", "toArray"]);
        assert_eq!(best_match_index(&list, "Sub"), Some(1));
        assert_eq!(best_match_index(&list, "Subs"), Some(0));
        assert_eq!(best_match_index(&list, "toS"), Some(2));
        assert_eq!(best_match_index(&list, "x"), None);
        assert_eq!(best_match_index(&list, ""), None);
    }

    quickcheck! {
        fn prop_sorted_labels_are_ascending(labels: Vec<String>) -> bool {
            let mut list: Vec<CompletionItem> = labels
                .iter()
                .map(|l| CompletionItem::new(l.clone(), CandidateKind::Field))
                .collect();
            sort_by_label(&mut list);
            list.windows(2).all(|w| w[0].label <= w[1].label)
        }
    }
}
