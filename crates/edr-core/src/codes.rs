//! Static code tables translating portal event type and status codes into labels.

use crate::types::NOT_AVAILABLE;

const EVENT_TYPES: &[(&str, &str)] = &[
    ("1", "Sampling"),
    ("2", "Demo/Sampling"),
    ("3", "Cooking Demo"),
    ("4", "Product Demo"),
    ("5", "Educational"),
    ("6", "Seasonal"),
    ("7", "Holiday"),
    ("8", "Back to School"),
    ("9", "Health & Wellness"),
    ("10", "New Product Launch"),
    ("45", "Food Demo/Sampling"),
    ("46", "Beverage Demo"),
    ("47", "Product Demonstration"),
    ("48", "Special Event"),
    ("49", "Promotional Event"),
    ("50", "Tasting Event"),
    ("DEMO", "Demonstration"),
    ("SAMP", "Sampling"),
    ("COOK", "Cooking Demo"),
    ("SPEC", "Special Event"),
    ("PROM", "Promotion"),
    ("DISP", "Display"),
    ("TAST", "Tasting"),
    ("EDUC", "Educational"),
    ("SEAS", "Seasonal"),
    ("NEW", "New Product"),
    ("HOLI", "Holiday"),
    ("BACK", "Back to School"),
    ("GRIL", "Grilling"),
    ("HEAL", "Health & Wellness"),
];

const EVENT_STATUSES: &[(&str, &str)] = &[
    ("1", "Pending"),
    ("2", "Active/Scheduled"),
    ("3", "In Progress"),
    ("4", "Completed"),
    ("5", "Cancelled"),
    ("6", "On Hold"),
    ("7", "Under Review"),
    ("8", "Approved"),
    ("9", "Rejected"),
    ("10", "Suspended"),
    ("ACTV", "Active"),
    ("COMP", "Completed"),
    ("CANC", "Cancelled"),
    ("PEND", "Pending"),
    ("HOLD", "On Hold"),
    ("PREP", "In Preparation"),
    ("SCHED", "Scheduled"),
    ("INPR", "In Progress"),
    ("SUSP", "Suspended"),
    ("CLOS", "Closed"),
    ("APPR", "Approved"),
    ("REJE", "Rejected"),
    ("SUBM", "Submitted"),
    ("REVI", "Under Review"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCategory {
    EventType,
    EventStatus,
}

impl CodeCategory {
    fn table(self) -> &'static [(&'static str, &'static str)] {
        match self {
            CodeCategory::EventType => EVENT_TYPES,
            CodeCategory::EventStatus => EVENT_STATUSES,
        }
    }

    /// Prefix used for codes missing from the table
    pub fn fallback_prefix(self) -> &'static str {
        match self {
            CodeCategory::EventType => "Event Type",
            CodeCategory::EventStatus => "Status",
        }
    }

    /// Human-readable label for `code`.
    ///
    /// Lookup is case-insensitive. Empty input and the `N/A` marker come back as
    /// `N/A`; unknown codes become `"<prefix> <code>"` with the code as given.
    pub fn describe(self, code: &str) -> String {
        if code.is_empty() || code == NOT_AVAILABLE {
            return NOT_AVAILABLE.to_string();
        }
        let key = code.to_uppercase();
        self.table()
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, label)| (*label).to_string())
            .unwrap_or_else(|| format!("{} {}", self.fallback_prefix(), code))
    }
}

pub fn describe_event_type(code: &str) -> String {
    CodeCategory::EventType.describe(code)
}

pub fn describe_event_status(code: &str) -> String {
    CodeCategory::EventStatus.describe(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_entry_maps_to_its_label() {
        for category in [CodeCategory::EventType, CodeCategory::EventStatus] {
            for (code, label) in category.table() {
                assert_eq!(category.describe(code), *label, "code {code}");
            }
        }
    }

    #[test]
    fn known_codes() {
        assert_eq!(describe_event_type("45"), "Food Demo/Sampling");
        assert_eq!(describe_event_type("1"), "Sampling");
        assert_eq!(describe_event_status("2"), "Active/Scheduled");
        assert_eq!(describe_event_status("1"), "Pending");
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(describe_event_type("demo"), "Demonstration");
        assert_eq!(describe_event_status("Sched"), "Scheduled");
    }

    #[test]
    fn unknown_codes_fall_back_verbatim() {
        assert_eq!(describe_event_type("999"), "Event Type 999");
        assert_eq!(describe_event_status("999"), "Status 999");
        assert_eq!(describe_event_status("xyz"), "Status xyz");
    }

    #[test]
    fn not_available_passes_through() {
        assert_eq!(describe_event_type("N/A"), "N/A");
        assert_eq!(describe_event_status("N/A"), "N/A");
        assert_eq!(describe_event_type(""), "N/A");
    }
}
