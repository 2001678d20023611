//! Classification of whiteboard document transitions.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// What happened to the board between two consecutive documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Started,
    Added,
    Erased,
    Cleared,
    Updated,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Added => "added",
            Self::Erased => "erased",
            Self::Cleared => "cleared",
            Self::Updated => "updated",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a transition from the item ids of the previous document to those
/// of the current one.
///
/// Only set sizes are compared once the empty cases are handled, so removing
/// one item while adding another yields [`ChangeAction::Updated`].
pub fn classify(current: &HashSet<String>, previous: &HashSet<String>) -> ChangeAction {
    if !current.is_empty() && previous.is_empty() {
        ChangeAction::Started
    } else if current.is_empty() && !previous.is_empty() {
        ChangeAction::Cleared
    } else if current.len() > previous.len() {
        ChangeAction::Added
    } else if current.len() < previous.len() {
        ChangeAction::Erased
    } else {
        ChangeAction::Updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_started_and_cleared() {
        assert_eq!(classify(&ids(&["a"]), &ids(&[])), ChangeAction::Started);
        assert_eq!(classify(&ids(&[]), &ids(&["a"])), ChangeAction::Cleared);
    }

    #[test]
    fn test_size_comparisons() {
        assert_eq!(classify(&ids(&["a", "b"]), &ids(&["a"])), ChangeAction::Added);
        assert_eq!(classify(&ids(&["a"]), &ids(&["a", "b"])), ChangeAction::Erased);
        assert_eq!(classify(&ids(&["a"]), &ids(&["a"])), ChangeAction::Updated);
    }

    #[test]
    fn test_swap_is_updated() {
        assert_eq!(classify(&ids(&["b"]), &ids(&["a"])), ChangeAction::Updated);
    }

    #[test]
    fn test_empty_to_empty_is_updated() {
        assert_eq!(classify(&ids(&[]), &ids(&[])), ChangeAction::Updated);
    }

    #[test]
    fn test_display() {
        assert_eq!(ChangeAction::Erased.to_string(), "erased");
    }
}
