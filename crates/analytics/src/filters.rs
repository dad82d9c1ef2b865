use serde::{Deserialize, Serialize};

/// Subject allow/deny lists applied before a record is queued.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsFilters {
    /// When non-empty, only these subjects are recorded.
    pub subjects: Vec<String>,
    pub skipped_subjects: Vec<String>,
}

impl AnalyticsFilters {
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty() && self.skipped_subjects.is_empty()
    }

    /// Returns true when a record for `subject` must not be recorded.
    pub fn should_filter(&self, subject: &str) -> bool {
        if self.skipped_subjects.iter().any(|s| s == subject) {
            return true;
        }
        !self.subjects.is_empty() && !self.subjects.iter().any(|s| s == subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_subjects_win_over_allow_list() {
        let filters = AnalyticsFilters {
            subjects: vec!["alice".into(), "bob".into()],
            skipped_subjects: vec!["bob".into()],
        };
        assert!(!filters.should_filter("alice"));
        assert!(filters.should_filter("bob"));
        assert!(filters.should_filter("carol"));
    }

    #[test]
    fn empty_filters_keep_everything() {
        let filters = AnalyticsFilters::default();
        assert!(filters.is_empty());
        assert!(!filters.should_filter("anyone"));
    }
}
